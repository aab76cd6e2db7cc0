//! Hardware device trait definitions.
//!
//! These traits are the seams between the firmware units and the peripheral
//! drivers. Each peripheral is owned by exactly one unit, so every method
//! takes `&mut self` and no trait requires interior synchronization.
//!
//! Device I/O that talks to a bus (sensor UART, display I2C, reader SPI) is
//! asynchronous. Methods are written as `fn ... -> impl Future<Output = _> + Send`
//! rather than bare `async fn` so a unit generic over the driver can still
//! be spawned on a multi-threaded runtime; implementations may use plain
//! `async fn`. GPIO outputs and the keypad matrix scan are synchronous.

use std::future::Future;

use doorlock_core::SlotId;

use crate::error::Result;
use crate::types::{CardUid, CharBuffer, SearchMatch, SensorResult};

/// Biometric sensor module driver.
///
/// Mirrors the discrete command set of optical fingerprint modules: each
/// operation is a single command/acknowledge exchange returning the module's
/// confirmation code. Templates live inside the module; the firmware only
/// addresses them by slot.
///
/// # Examples
///
/// ```no_run
/// use doorlock_hardware::{CharBuffer, FingerprintSensor, SensorResult};
///
/// async fn identify<S: FingerprintSensor>(sensor: &mut S) -> SensorResult<u16> {
///     sensor.capture_image().await?;
///     sensor.image_to_template(CharBuffer::One).await?;
///     let found = sensor.search().await?;
///     Ok(found.slot)
/// }
/// ```
pub trait FingerprintSensor: Send {
    /// Handshake with the module using its access password.
    fn verify_password(&mut self) -> impl Future<Output = SensorResult> + Send;

    /// Capture an image from the optical window.
    ///
    /// Returns `Err(SensorCode::NO_FINGER)` when nothing rests on the sensor.
    fn capture_image(&mut self) -> impl Future<Output = SensorResult> + Send;

    /// Convert the last captured image into a template in `buffer`.
    fn image_to_template(
        &mut self,
        buffer: CharBuffer,
    ) -> impl Future<Output = SensorResult> + Send;

    /// Search the database for the template in buffer one.
    ///
    /// Returns `Err(SensorCode::NOT_FOUND)` when the finger is not enrolled.
    fn search(&mut self) -> impl Future<Output = SensorResult<SearchMatch>> + Send;

    /// Merge buffers one and two into a model.
    fn create_model(&mut self) -> impl Future<Output = SensorResult> + Send;

    /// Store the merged model at `slot`.
    fn store_model(&mut self, slot: SlotId) -> impl Future<Output = SensorResult> + Send;

    /// Load the template at `slot`; fails when the slot is empty.
    fn load_model(&mut self, slot: SlotId) -> impl Future<Output = SensorResult> + Send;

    /// Delete the template at `slot`.
    fn delete_model(&mut self, slot: SlotId) -> impl Future<Output = SensorResult> + Send;

    /// Erase every stored template.
    fn empty_database(&mut self) -> impl Future<Output = SensorResult> + Send;
}

/// Contactless card reader driver.
pub trait CardReader: Send {
    /// Poll for a card in the field.
    ///
    /// Returns `Ok(None)` when no card is present. Does not wait for one.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be reached.
    fn read_card(&mut self) -> impl Future<Output = Result<Option<CardUid>>> + Send;
}

/// Key matrix scanner.
pub trait KeypadScanner: Send {
    /// Next pressed key, or `None` when no key is down.
    fn poll_key(&mut self) -> Option<char>;
}

/// Character display driver (HD44780-style, rows × columns).
pub trait CharacterDisplay: Send {
    /// Blank every cell and home the cursor.
    fn clear(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Move the cursor to `column`, `row` (both zero-based).
    fn set_cursor(&mut self, column: u8, row: u8) -> impl Future<Output = Result<()>> + Send;

    /// Write `text` at the cursor, advancing it. Text past the last
    /// column is dropped.
    fn print(&mut self, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Digital output (relay coil, buzzer, status LED).
pub trait OutputPin: Send {
    /// Drive the pin high (`true`) or low (`false`).
    fn set_level(&mut self, high: bool);

    fn set_high(&mut self) {
        self.set_level(true);
    }

    fn set_low(&mut self) {
        self.set_level(false);
    }
}

/// Placeholder for a peripheral that is not fitted on this board.
///
/// The sensor answers every command with `PACKET_RECEIVE_ERR`, the card
/// reader never sees a card, the keypad never reports a key and the display
/// accepts and discards everything. Used as the default type parameter of
/// the firmware builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unwired;

impl FingerprintSensor for Unwired {
    async fn verify_password(&mut self) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn capture_image(&mut self) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn image_to_template(&mut self, _buffer: CharBuffer) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn search(&mut self) -> SensorResult<SearchMatch> {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn create_model(&mut self) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn store_model(&mut self, _slot: SlotId) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn load_model(&mut self, _slot: SlotId) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn delete_model(&mut self, _slot: SlotId) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }

    async fn empty_database(&mut self) -> SensorResult {
        Err(crate::SensorCode::PACKET_RECEIVE_ERR)
    }
}

impl CardReader for Unwired {
    async fn read_card(&mut self) -> Result<Option<CardUid>> {
        Ok(None)
    }
}

impl KeypadScanner for Unwired {
    fn poll_key(&mut self) -> Option<char> {
        None
    }
}

impl CharacterDisplay for Unwired {
    async fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    async fn set_cursor(&mut self, _column: u8, _row: u8) -> Result<()> {
        Ok(())
    }

    async fn print(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}
