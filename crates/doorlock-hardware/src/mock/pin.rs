//! Mock digital output for testing and development.
//!
//! Every level change is stamped with the Tokio clock, so tests running on a
//! paused runtime can assert exact pulse timings.

use crate::traits::OutputPin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A level written to the pin and when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Instant,
    pub high: bool,
}

#[derive(Debug)]
struct PinState {
    high: bool,
    history: Vec<Transition>,
}

fn lock(state: &Mutex<PinState>) -> MutexGuard<'_, PinState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock GPIO output, initially low.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::OutputPin;
/// use doorlock_hardware::mock::MockPin;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut relay, handle) = MockPin::new();
///     relay.set_high();
///     relay.set_low();
///
///     assert!(!handle.is_high());
///     assert_eq!(handle.pulse_count(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct MockPin {
    state: Arc<Mutex<PinState>>,
}

impl MockPin {
    pub fn new() -> (Self, MockPinHandle) {
        let state = Arc::new(Mutex::new(PinState {
            high: false,
            history: Vec::new(),
        }));
        let handle = MockPinHandle {
            state: Arc::clone(&state),
        };
        (Self { state }, handle)
    }
}

impl OutputPin for MockPin {
    fn set_level(&mut self, high: bool) {
        let mut state = lock(&self.state);
        state.high = high;
        state.history.push(Transition {
            at: Instant::now(),
            high,
        });
    }
}

/// Handle for observing a [`MockPin`].
#[derive(Debug, Clone)]
pub struct MockPinHandle {
    state: Arc<Mutex<PinState>>,
}

impl MockPinHandle {
    /// Current level.
    pub fn is_high(&self) -> bool {
        lock(&self.state).high
    }

    /// Every write, including writes that repeat the current level.
    pub fn history(&self) -> Vec<Transition> {
        lock(&self.state).history.clone()
    }

    /// Writes that changed the level.
    pub fn transitions(&self) -> Vec<Transition> {
        let state = lock(&self.state);
        let mut level = false;
        state
            .history
            .iter()
            .filter(|t| {
                let changed = t.high != level;
                level = t.high;
                changed
            })
            .copied()
            .collect()
    }

    /// Number of completed high pulses (rising edge followed by a falling edge).
    pub fn pulse_count(&self) -> usize {
        self.transitions().iter().filter(|t| !t.high).count()
    }

    /// Width of each completed high pulse.
    pub fn pulse_widths(&self) -> Vec<Duration> {
        self.transitions()
            .chunks_exact(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }

    /// Forget recorded history; the current level is kept.
    pub fn reset_history(&self) {
        lock(&self.state).history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pulse_widths_follow_clock() {
        let (mut pin, handle) = MockPin::new();

        pin.set_high();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pin.set_low();
        tokio::time::sleep(Duration::from_millis(100)).await;
        pin.set_high();
        tokio::time::sleep(Duration::from_millis(400)).await;
        pin.set_low();

        assert_eq!(handle.pulse_count(), 2);
        assert_eq!(
            handle.pulse_widths(),
            vec![Duration::from_millis(100), Duration::from_millis(400)]
        );
    }

    #[tokio::test]
    async fn test_repeated_level_is_not_a_transition() {
        let (mut pin, handle) = MockPin::new();
        pin.set_low();
        pin.set_high();
        pin.set_high();

        assert_eq!(handle.history().len(), 3);
        assert_eq!(handle.transitions().len(), 1);
        assert!(handle.is_high());
        assert_eq!(handle.pulse_count(), 0);
    }
}
