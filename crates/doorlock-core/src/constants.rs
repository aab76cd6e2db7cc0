//! Firmware-wide constants.
//!
//! Queue capacities and payload sizes are fixed by the wire contract with the
//! host and by the memory budget of the target board. Timing values listed
//! here are only the *defaults*; every one of them can be overridden through
//! the firmware configuration.
//!
//! # Usage
//!
//! ```
//! use doorlock_core::constants::*;
//!
//! assert_eq!(PAYLOAD_CAPACITY, 31);
//! assert_eq!(EVENT_QUEUE_CAPACITY, 10);
//! assert!(FIRST_SLOT <= DEFAULT_SENSOR_CAPACITY);
//! ```

// ============================================================================
// Payloads
// ============================================================================

/// Maximum payload length in bytes for events and display commands.
///
/// The firmware historically reserved 32 bytes including the terminator, so
/// 31 bytes of text remain usable.
pub const PAYLOAD_CAPACITY: usize = 31;

// ============================================================================
// Queue capacities
// ============================================================================

/// Identification events from the sensing unit to the host bridge.
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Actuator commands (unlock, lock, beep, status light).
pub const ACTUATOR_QUEUE_CAPACITY: usize = 10;

/// Display update commands.
pub const DISPLAY_QUEUE_CAPACITY: usize = 5;

/// Sensor requests from the host bridge to the sensing unit.
pub const SENSOR_REQUEST_QUEUE_CAPACITY: usize = 4;

// ============================================================================
// Biometric sensor
// ============================================================================

/// First valid identity slot in the sensor database.
pub const FIRST_SLOT: u16 = 1;

/// Number of candidate slots probed when listing enrolled templates.
pub const DEFAULT_SENSOR_CAPACITY: u16 = 127;

/// Slot used when the host starts an enrollment without an `id`.
pub const DEFAULT_ENROLL_SLOT: u16 = 1;

// ============================================================================
// Host protocol defaults
// ============================================================================

/// Serial link baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Unlock duration in seconds when the host omits `duration`.
pub const DEFAULT_UNLOCK_SECONDS: i32 = 5;

/// Beep count when the host omits `times`.
pub const DEFAULT_BEEP_TIMES: i32 = 1;

/// Longest inbound line accepted before it is discarded, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 512;

// ============================================================================
// Timing defaults (milliseconds)
// ============================================================================

/// Delay between two sensing passes.
pub const DEFAULT_SENSING_PASS_MS: u64 = 50;

/// Delay between two sensing passes while enrolling.
pub const DEFAULT_ENROLLMENT_PASS_MS: u64 = 100;

/// Minimum interval between two accepted probes of the same modality.
pub const DEFAULT_COOLDOWN_MS: u64 = 1_000;

/// Keypad buffer is discarded when no key arrives for longer than this.
pub const DEFAULT_KEY_IDLE_MS: u64 = 5_000;

/// Repeated detections of the same key within this window are ignored.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Settling delay after the first enrollment capture.
pub const DEFAULT_ENROLL_SETTLE_MS: u64 = 2_000;

/// Command wait of the arbitration unit per pass.
pub const DEFAULT_ACTUATOR_POLL_MS: u64 = 10;

/// Event wait of the host bridge per pass.
pub const DEFAULT_BRIDGE_POLL_MS: u64 = 10;

/// Command wait of the feedback unit per pass.
pub const DEFAULT_DISPLAY_POLL_MS: u64 = 100;

/// Time a status message stays on the second display line.
pub const DEFAULT_DISPLAY_DWELL_MS: u64 = 3_000;

/// Time the boot banner is shown.
pub const DEFAULT_BANNER_MS: u64 = 2_000;
