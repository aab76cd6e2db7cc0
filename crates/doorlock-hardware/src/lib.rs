//! Peripheral abstraction layer for the door lock firmware.
//!
//! Each peripheral the firmware drives is described by a trait in
//! [`traits`]:
//!
//! - [`FingerprintSensor`]: optical module with an on-board template database.
//! - [`CardReader`]: contactless reader reporting card UIDs.
//! - [`KeypadScanner`]: 4×4 key matrix.
//! - [`CharacterDisplay`]: two-line character LCD.
//! - [`OutputPin`]: relay coil, buzzer and status light.
//!
//! The firmware units are generic over these traits, so the same unit code
//! runs against board drivers or against the simulated devices in [`mock`].
//!
//! # Error Handling
//!
//! Bus-level failures are reported as [`HardwareError`]. The biometric sensor
//! additionally answers every command with a one-byte confirmation code;
//! those are carried as [`SensorCode`] in a [`SensorResult`] so a failed
//! capture can be reported to the host by its raw code.
//!
//! # Example
//!
//! ```
//! use doorlock_hardware::mock::MockFingerprintSensor;
//! use doorlock_hardware::{CharBuffer, FingerprintSensor, SensorCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (mut sensor, handle) = MockFingerprintSensor::new();
//!     assert_eq!(sensor.capture_image().await, Err(SensorCode::NO_FINGER));
//!
//!     handle.place_finger(1);
//!     sensor.capture_image().await.unwrap();
//!     sensor.image_to_template(CharBuffer::One).await.unwrap();
//!     assert_eq!(sensor.search().await, Err(SensorCode::NOT_FOUND));
//! }
//! ```

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{CardReader, CharacterDisplay, FingerprintSensor, KeypadScanner, OutputPin, Unwired};
pub use types::{
    CardUid, CharBuffer, MAX_UID_LENGTH, MIN_UID_LENGTH, SearchMatch, SensorCode, SensorResult,
};
