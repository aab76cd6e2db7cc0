//! Mock keypad for testing and development.
//!
//! Key presses are queued through a [`MockKeypadHandle`] and surface one per
//! scan, the way a matrix scanner reports at most one newly pressed key.

use crate::traits::KeypadScanner;
use tokio::sync::mpsc;

/// Mock key matrix.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::KeypadScanner;
/// use doorlock_hardware::mock::MockKeypad;
///
/// let (mut keypad, handle) = MockKeypad::new();
/// handle.type_keys("12#");
///
/// assert_eq!(keypad.poll_key(), Some('1'));
/// assert_eq!(keypad.poll_key(), Some('2'));
/// assert_eq!(keypad.poll_key(), Some('#'));
/// assert_eq!(keypad.poll_key(), None);
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    key_rx: mpsc::UnboundedReceiver<char>,
}

impl MockKeypad {
    /// Create a keypad and the handle that presses its keys.
    pub fn new() -> (Self, MockKeypadHandle) {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        (Self { key_rx }, MockKeypadHandle { key_tx })
    }
}

impl KeypadScanner for MockKeypad {
    fn poll_key(&mut self) -> Option<char> {
        self.key_rx.try_recv().ok()
    }
}

/// Handle for pressing keys on a [`MockKeypad`].
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    key_tx: mpsc::UnboundedSender<char>,
}

impl MockKeypadHandle {
    /// Queue a single key press. Ignored once the keypad is dropped.
    pub fn press(&self, key: char) {
        let _ = self.key_tx.send(key);
    }

    /// Queue one press per character of `keys`.
    pub fn type_keys(&self, keys: &str) {
        keys.chars().for_each(|key| self.press(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_keypad_reports_nothing() {
        let (mut keypad, _handle) = MockKeypad::new();
        assert_eq!(keypad.poll_key(), None);
    }

    #[test]
    fn test_keys_arrive_in_order() {
        let (mut keypad, handle) = MockKeypad::new();
        handle.press('C');
        handle.type_keys("0A");

        assert_eq!(keypad.poll_key(), Some('C'));
        assert_eq!(keypad.poll_key(), Some('0'));
        assert_eq!(keypad.poll_key(), Some('A'));
        assert_eq!(keypad.poll_key(), None);
    }

    #[test]
    fn test_press_after_drop_is_ignored() {
        let (keypad, handle) = MockKeypad::new();
        drop(keypad);
        handle.press('1');
    }
}
