//! Mock contactless card reader for testing and development.

use crate::{
    HardwareError, Result,
    traits::CardReader,
    types::CardUid,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ReaderState {
    card: Option<CardUid>,
    fault: Option<HardwareError>,
    reads: usize,
}

fn lock(state: &Mutex<ReaderState>) -> MutexGuard<'_, ReaderState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock card reader.
///
/// A presented card stays in the field, and is reported by every read,
/// until [`MockCardReaderHandle::remove_card`] is called.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::mock::MockCardReader;
/// use doorlock_hardware::{CardReader, CardUid};
///
/// #[tokio::main]
/// async fn main() -> doorlock_hardware::Result<()> {
///     let (mut reader, handle) = MockCardReader::new();
///     assert!(reader.read_card().await?.is_none());
///
///     handle.present_card(CardUid::new(&[0xDE, 0xAD, 0xBE, 0xEF])?);
///     assert_eq!(reader.read_card().await?.unwrap().to_hex(), "DEADBEEF");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    state: Arc<Mutex<ReaderState>>,
}

impl MockCardReader {
    /// Create a reader with an empty field.
    pub fn new() -> (Self, MockCardReaderHandle) {
        let state = Arc::new(Mutex::new(ReaderState::default()));
        let handle = MockCardReaderHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }
}

impl CardReader for MockCardReader {
    async fn read_card(&mut self) -> Result<Option<CardUid>> {
        let mut state = lock(&self.state);
        state.reads += 1;
        if let Some(fault) = state.fault.take() {
            return Err(fault);
        }
        Ok(state.card.clone())
    }
}

/// Handle for controlling a [`MockCardReader`].
#[derive(Debug, Clone)]
pub struct MockCardReaderHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl MockCardReaderHandle {
    /// Bring a card into the field.
    pub fn present_card(&self, uid: CardUid) {
        lock(&self.state).card = Some(uid);
    }

    /// Take the card out of the field.
    pub fn remove_card(&self) {
        lock(&self.state).card = None;
    }

    /// Make the next read fail with `error`.
    pub fn fail_next(&self, error: HardwareError) {
        lock(&self.state).fault = Some(error);
    }

    /// Number of reads performed so far.
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid() -> CardUid {
        CardUid::new(&[0x0A, 0x1B, 0x2C, 0x3D]).unwrap()
    }

    #[tokio::test]
    async fn test_card_stays_until_removed() {
        let (mut reader, handle) = MockCardReader::new();
        handle.present_card(uid());

        assert_eq!(reader.read_card().await.unwrap(), Some(uid()));
        assert_eq!(reader.read_card().await.unwrap(), Some(uid()));

        handle.remove_card();
        assert_eq!(reader.read_card().await.unwrap(), None);
        assert_eq!(handle.reads(), 3);
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let (mut reader, handle) = MockCardReader::new();
        handle.present_card(uid());
        handle.fail_next(HardwareError::not_responding("reader"));

        assert!(matches!(
            reader.read_card().await,
            Err(HardwareError::NotResponding { .. })
        ));
        assert!(reader.read_card().await.unwrap().is_some());
    }
}
