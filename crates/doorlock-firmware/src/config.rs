//! Firmware configuration.
//!
//! Every tunable of the firmware lives here: queue capacities, scheduling
//! intervals, actuator cadences, keypad bindings and the strings shown on
//! the display. All durations are whole milliseconds in fields ending in
//! `_ms`, with a [`Duration`] accessor of the same name minus the suffix.
//!
//! A configuration file only needs the values it changes:
//!
//! ```toml
//! [timing]
//! cooldown_ms = 1500
//!
//! [messages]
//! valid = "BIENVENIDO"
//! ```

use doorlock_core::{BeepPattern, Error, LightMode, Result, constants::*};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete firmware configuration.
///
/// # Examples
///
/// ```
/// use doorlock_firmware::FirmwareConfig;
///
/// let config = FirmwareConfig::from_toml_str("[keypad]\nsubmit_key = '*'\n").unwrap();
/// assert_eq!(config.keypad.submit_key, '*');
/// assert_eq!(config.queues.events, 10);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    pub serial: SerialConfig,
    pub queues: QueueConfig,
    pub timing: TimingConfig,
    pub actuator: ActuatorConfig,
    pub keypad: KeypadConfig,
    pub sensor: SensorConfig,
    pub display: DisplayConfig,
    pub messages: DisplayMessages,
}

impl FirmwareConfig {
    /// Read and validate a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, and `Error::Config`
    /// if it is not valid TOML or fails [`FirmwareConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on a parse or validation failure.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FirmwareConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let queues = [
            ("queues.events", self.queues.events),
            ("queues.actuator", self.queues.actuator),
            ("queues.display", self.queues.display),
            ("queues.sensor_requests", self.queues.sensor_requests),
        ];
        for (field, capacity) in queues {
            if capacity == 0 {
                return Err(config_error(field, "must be at least 1"));
            }
        }

        let intervals = [
            ("timing.sensing_pass_ms", self.timing.sensing_pass_ms),
            ("timing.enrollment_pass_ms", self.timing.enrollment_pass_ms),
            ("timing.actuator_poll_ms", self.timing.actuator_poll_ms),
            ("timing.bridge_poll_ms", self.timing.bridge_poll_ms),
            ("display.poll_ms", self.display.poll_ms),
        ];
        for (field, ms) in intervals {
            if ms == 0 {
                return Err(config_error(field, "must be greater than zero"));
            }
        }

        if self.serial.max_line_length == 0 {
            return Err(config_error("serial.max_line_length", "must be at least 1"));
        }
        if self.sensor.capacity < FIRST_SLOT {
            return Err(config_error("sensor.capacity", "must be at least 1"));
        }
        if self.display.columns == 0 {
            return Err(config_error("display.columns", "must be at least 1"));
        }

        if self.actuator.max_beep_pulses == 0 {
            return Err(config_error("actuator.max_beep_pulses", "must be at least 1"));
        }

        let keypad = &self.keypad;
        if keypad.submit_key == keypad.clear_key {
            return Err(config_error(
                "keypad.clear_key",
                "must differ from keypad.submit_key",
            ));
        }
        // The display controller takes one byte per cell.
        if !keypad.mask_char.is_ascii_graphic() {
            return Err(config_error(
                "keypad.mask_char",
                "must be a printable ASCII character",
            ));
        }

        for (field, text) in self.messages.entries() {
            if text.len() > PAYLOAD_CAPACITY {
                return Err(config_error(
                    field,
                    &format!("exceeds {PAYLOAD_CAPACITY} bytes"),
                ));
            }
        }

        Ok(())
    }
}

fn config_error(field: &str, problem: &str) -> Error {
    Error::Config(format!("{field} {problem}"))
}

/// Serial link to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Informational for board drivers; the firmware itself is link-agnostic.
    pub baud_rate: u32,

    /// Inbound lines longer than this many bytes are discarded.
    pub max_line_length: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Capacities of the inter-unit queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub events: usize,
    pub actuator: usize,
    pub display: usize,
    pub sensor_requests: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            events: EVENT_QUEUE_CAPACITY,
            actuator: ACTUATOR_QUEUE_CAPACITY,
            display: DISPLAY_QUEUE_CAPACITY,
            sensor_requests: SENSOR_REQUEST_QUEUE_CAPACITY,
        }
    }
}

/// Scheduling intervals of the units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sensing_pass_ms: u64,
    pub enrollment_pass_ms: u64,
    /// Minimum gap between two accepted probes of the same modality.
    pub cooldown_ms: u64,
    pub actuator_poll_ms: u64,
    pub bridge_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sensing_pass_ms: DEFAULT_SENSING_PASS_MS,
            enrollment_pass_ms: DEFAULT_ENROLLMENT_PASS_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            actuator_poll_ms: DEFAULT_ACTUATOR_POLL_MS,
            bridge_poll_ms: DEFAULT_BRIDGE_POLL_MS,
        }
    }
}

impl TimingConfig {
    pub fn sensing_pass(&self) -> Duration {
        Duration::from_millis(self.sensing_pass_ms)
    }

    pub fn enrollment_pass(&self) -> Duration {
        Duration::from_millis(self.enrollment_pass_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn actuator_poll(&self) -> Duration {
        Duration::from_millis(self.actuator_poll_ms)
    }

    pub fn bridge_poll(&self) -> Duration {
        Duration::from_millis(self.bridge_poll_ms)
    }
}

/// Buzzer and status light cadences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub click_ms: u64,
    pub confirm_on_ms: u64,
    pub confirm_off_ms: u64,
    pub alert_on_ms: u64,
    pub alert_off_ms: u64,
    /// Half period of the slow blink.
    pub slow_blink_ms: u64,
    pub slow_blink_count: u32,
    /// Half period of the fast blink.
    pub fast_blink_ms: u64,
    pub fast_blink_count: u32,
    /// Upper bound on the pulses of one beep command.
    pub max_beep_pulses: u32,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            click_ms: 50,
            confirm_on_ms: 100,
            confirm_off_ms: 100,
            alert_on_ms: 400,
            alert_off_ms: 400,
            slow_blink_ms: 500,
            slow_blink_count: 3,
            fast_blink_ms: 100,
            fast_blink_count: 6,
            max_beep_pulses: 10,
        }
    }
}

impl ActuatorConfig {
    pub fn click(&self) -> Duration {
        Duration::from_millis(self.click_ms)
    }

    /// On and off time of one confirmation pulse.
    pub fn confirm_pulse(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.confirm_on_ms),
            Duration::from_millis(self.confirm_off_ms),
        )
    }

    /// On and off time of one alert pulse.
    pub fn alert_pulse(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.alert_on_ms),
            Duration::from_millis(self.alert_off_ms),
        )
    }

    pub fn slow_blink(&self) -> Duration {
        Duration::from_millis(self.slow_blink_ms)
    }

    pub fn fast_blink(&self) -> Duration {
        Duration::from_millis(self.fast_blink_ms)
    }

    /// On time, off time and pulse count for `pattern`, with the count
    /// capped at `max_beep_pulses`.
    pub fn beep_cadence(&self, pattern: BeepPattern) -> (Duration, Duration, u32) {
        let (on, off) = match pattern {
            BeepPattern::Click => (self.click(), Duration::ZERO),
            BeepPattern::Confirm(_) => self.confirm_pulse(),
            BeepPattern::Alert(_) => self.alert_pulse(),
        };
        (on, off, pattern.pulses().min(self.max_beep_pulses))
    }

    /// How long the buzzer is busy playing `pattern`.
    pub fn beep_duration(&self, pattern: BeepPattern) -> Duration {
        let (on, off, pulses) = self.beep_cadence(pattern);
        (on + off) * pulses
    }

    /// How long the status light is busy showing `mode`.
    pub fn light_duration(&self, mode: LightMode) -> Duration {
        match mode {
            LightMode::Off | LightMode::Solid => Duration::ZERO,
            LightMode::SlowBlink => self.slow_blink() * 2 * self.slow_blink_count,
            LightMode::FastBlink => self.fast_blink() * 2 * self.fast_blink_count,
        }
    }
}

/// Keypad bindings and timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypadConfig {
    pub submit_key: char,
    pub clear_key: char,
    /// Character echoed on the display for each typed key.
    pub mask_char: char,
    /// The buffer is discarded when no key arrives for longer than this.
    pub idle_window_ms: u64,
    /// A repeat of the same key within this window is ignored.
    pub debounce_ms: u64,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        Self {
            submit_key: '#',
            clear_key: 'C',
            mask_char: '*',
            idle_window_ms: DEFAULT_KEY_IDLE_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl KeypadConfig {
    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Biometric sensor parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Highest slot probed when listing templates.
    pub capacity: u16,
    /// Pause after the first enrollment capture.
    pub enroll_settle_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SENSOR_CAPACITY,
            enroll_settle_ms: DEFAULT_ENROLL_SETTLE_MS,
        }
    }
}

impl SensorConfig {
    pub fn enroll_settle(&self) -> Duration {
        Duration::from_millis(self.enroll_settle_ms)
    }
}

/// Character display layout and timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub columns: u8,
    /// First line while running.
    pub title: String,
    pub banner_title: String,
    pub banner_subtitle: String,
    pub poll_ms: u64,
    /// A status message is blanked this long after it was shown.
    pub dwell_ms: u64,
    pub banner_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            columns: 16,
            title: "Smart Lock".to_string(),
            banner_title: "Smart Lock System".to_string(),
            banner_subtitle: "Initializing...".to_string(),
            poll_ms: DEFAULT_DISPLAY_POLL_MS,
            dwell_ms: DEFAULT_DISPLAY_DWELL_MS,
            banner_ms: DEFAULT_BANNER_MS,
        }
    }
}

impl DisplayConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn banner(&self) -> Duration {
        Duration::from_millis(self.banner_ms)
    }
}

/// Status messages shown on the second display line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayMessages {
    pub door_unlocked: String,
    pub door_locked: String,
    pub valid: String,
    pub not_valid: String,
    pub place_finger: String,
    pub remove_finger: String,
    pub place_again: String,
    pub enroll_ok: String,
    pub enroll_failed: String,
    pub finger_deleted: String,
    pub all_cleared: String,
}

impl Default for DisplayMessages {
    fn default() -> Self {
        Self {
            door_unlocked: "DOOR UNLOCKED".to_string(),
            door_locked: "DOOR LOCKED".to_string(),
            valid: "VALID".to_string(),
            not_valid: "NOT VALID".to_string(),
            place_finger: "PLACE FINGER".to_string(),
            remove_finger: "REMOVE FINGER".to_string(),
            place_again: "PLACE AGAIN".to_string(),
            enroll_ok: "ENROLL OK".to_string(),
            enroll_failed: "ENROLL FAILED".to_string(),
            finger_deleted: "FINGER DELETED".to_string(),
            all_cleared: "ALL CLEARED".to_string(),
        }
    }
}

impl DisplayMessages {
    fn entries(&self) -> [(&'static str, &str); 11] {
        [
            ("messages.door_unlocked", self.door_unlocked.as_str()),
            ("messages.door_locked", self.door_locked.as_str()),
            ("messages.valid", self.valid.as_str()),
            ("messages.not_valid", self.not_valid.as_str()),
            ("messages.place_finger", self.place_finger.as_str()),
            ("messages.remove_finger", self.remove_finger.as_str()),
            ("messages.place_again", self.place_again.as_str()),
            ("messages.enroll_ok", self.enroll_ok.as_str()),
            ("messages.enroll_failed", self.enroll_failed.as_str()),
            ("messages.finger_deleted", self.finger_deleted.as_str()),
            ("messages.all_cleared", self.all_cleared.as_str()),
        ]
    }
}
