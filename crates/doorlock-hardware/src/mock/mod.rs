//! Mock device implementations for testing and development.
//!
//! Each constructor returns a `(device, handle)` pair. The device is handed
//! to the firmware; the handle stays with the test (or the desktop runner)
//! to drive inputs and observe outputs without physical hardware.

pub mod biometric;
pub mod display;
pub mod keypad;
pub mod pin;
pub mod rfid;

// Re-export commonly used types
pub use biometric::{Finger, MockFingerprintHandle, MockFingerprintSensor, SensorOp};
pub use display::{DisplayOp, MockDisplay, MockDisplayHandle};
pub use keypad::{MockKeypad, MockKeypadHandle};
pub use pin::{MockPin, MockPinHandle, Transition};
pub use rfid::{MockCardReader, MockCardReaderHandle};
