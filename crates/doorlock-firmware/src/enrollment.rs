//! Biometric enrollment state machine.
//!
//! Enrollment captures the same finger twice, merges both captures into a
//! model and stores it at a target slot. The sequence is split in two:
//!
//! - [`probe`] performs the sensor commands the current step needs and
//!   condenses their outcome into one [`SensorEvent`].
//! - [`EnrollmentSession::advance`] is a pure function from the current step
//!   and that event to the next step and the outputs to perform.
//!
//! ```text
//! Idle ──▶ AwaitFirstCapture ──▶ AwaitRemoval ──▶ AwaitSecondCapture ──▶ Succeeded
//!                 │                                       │
//!                 └──────────────▶ Failed(code) ◀─────────┘
//! ```
//!
//! Each call consumes one scheduling pass. Terminal outcomes end the
//! session; the caller drops it.

use arrayvec::ArrayVec;
use doorlock_core::{EnrollmentPrompt, SlotId};
use doorlock_hardware::{CharBuffer, FingerprintSensor, SensorCode};

/// Position within an enrollment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollmentStep {
    /// Just started; the operator has not been prompted yet.
    Idle,
    AwaitFirstCapture,
    /// First template is in buffer one; waiting for the finger to lift.
    AwaitRemoval,
    AwaitSecondCapture,
}

/// Outcome of one probe of the sensor, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    /// No sensor command was issued this pass.
    Tick,
    NoFinger,
    /// Something other than "no finger" was reported while waiting for removal.
    FingerPresent,
    CaptureFailed(SensorCode),
    ConvertFailed(SensorCode),
    /// Capture and conversion into the step's buffer succeeded.
    Converted,
    ModelFailed(SensorCode),
    StoreFailed(SensorCode),
    Stored,
}

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Succeeded { slot: SlotId },
    Failed { code: SensorCode },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentOutput {
    Prompt(EnrollmentPrompt),
    /// Pause for the settling delay before the next pass.
    Settle,
    Finished(EnrollmentOutcome),
}

/// Result of [`EnrollmentSession::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Session to keep, or `None` when the session reached a terminal outcome.
    pub next: Option<EnrollmentSession>,
    pub outputs: ArrayVec<EnrollmentOutput, 2>,
}

impl Transition {
    fn stay(session: EnrollmentSession) -> Self {
        Self {
            next: Some(session),
            outputs: ArrayVec::new(),
        }
    }

    fn to(slot: SlotId, step: EnrollmentStep, outputs: &[EnrollmentOutput]) -> Self {
        Self {
            next: Some(EnrollmentSession { slot, step }),
            outputs: outputs.iter().copied().collect(),
        }
    }

    fn finish(outcome: EnrollmentOutcome) -> Self {
        let mut outputs = ArrayVec::new();
        outputs.push(EnrollmentOutput::Finished(outcome));
        Self {
            next: None,
            outputs,
        }
    }

    /// The terminal outcome, if this transition ended the session.
    pub fn outcome(&self) -> Option<EnrollmentOutcome> {
        self.outputs.iter().find_map(|output| match output {
            EnrollmentOutput::Finished(outcome) => Some(*outcome),
            _ => None,
        })
    }
}

/// An enrollment in progress.
///
/// # Examples
///
/// ```
/// use doorlock_core::EnrollmentPrompt;
/// use doorlock_firmware::enrollment::{
///     EnrollmentOutput, EnrollmentSession, EnrollmentStep, SensorEvent,
/// };
///
/// let session = EnrollmentSession::new(7);
/// let transition = session.advance(SensorEvent::Tick);
///
/// let next = transition.next.unwrap();
/// assert_eq!(next.step(), EnrollmentStep::AwaitFirstCapture);
/// assert_eq!(
///     transition.outputs.as_slice(),
///     &[EnrollmentOutput::Prompt(EnrollmentPrompt::PlaceFinger)]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentSession {
    slot: SlotId,
    step: EnrollmentStep,
}

impl EnrollmentSession {
    /// Start a session that will store into `slot`.
    #[must_use]
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            step: EnrollmentStep::Idle,
        }
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn step(&self) -> EnrollmentStep {
        self.step
    }

    /// Apply one probe result.
    ///
    /// Events that do not belong to the current step leave the session
    /// unchanged.
    #[must_use]
    pub fn advance(self, event: SensorEvent) -> Transition {
        use EnrollmentStep::*;
        use SensorEvent::*;

        let slot = self.slot;
        match (self.step, event) {
            (Idle, _) => Transition::to(
                slot,
                AwaitFirstCapture,
                &[EnrollmentOutput::Prompt(EnrollmentPrompt::PlaceFinger)],
            ),

            (AwaitFirstCapture, Converted) => Transition::to(
                slot,
                AwaitRemoval,
                &[
                    EnrollmentOutput::Prompt(EnrollmentPrompt::RemoveFinger),
                    EnrollmentOutput::Settle,
                ],
            ),

            (AwaitRemoval, NoFinger) => Transition::to(
                slot,
                AwaitSecondCapture,
                &[EnrollmentOutput::Prompt(EnrollmentPrompt::PlaceAgain)],
            ),

            (AwaitSecondCapture, Stored) => {
                Transition::finish(EnrollmentOutcome::Succeeded { slot })
            }

            (AwaitFirstCapture, CaptureFailed(code) | ConvertFailed(code))
            | (
                AwaitSecondCapture,
                CaptureFailed(code) | ConvertFailed(code) | ModelFailed(code) | StoreFailed(code),
            ) => Transition::finish(EnrollmentOutcome::Failed { code }),

            _ => Transition::stay(self),
        }
    }
}

/// Issue the sensor commands for the session's current step.
///
/// Stops at the first failing command. `Idle` issues nothing.
pub async fn probe<S: FingerprintSensor>(sensor: &mut S, session: &EnrollmentSession) -> SensorEvent {
    match session.step {
        EnrollmentStep::Idle => SensorEvent::Tick,

        EnrollmentStep::AwaitFirstCapture => capture_into(sensor, CharBuffer::One).await,

        EnrollmentStep::AwaitRemoval => match sensor.capture_image().await {
            Err(SensorCode::NO_FINGER) => SensorEvent::NoFinger,
            _ => SensorEvent::FingerPresent,
        },

        EnrollmentStep::AwaitSecondCapture => {
            match capture_into(sensor, CharBuffer::Two).await {
                SensorEvent::Converted => {}
                other => return other,
            }
            if let Err(code) = sensor.create_model().await {
                return SensorEvent::ModelFailed(code);
            }
            match sensor.store_model(session.slot).await {
                Ok(()) => SensorEvent::Stored,
                Err(code) => SensorEvent::StoreFailed(code),
            }
        }
    }
}

async fn capture_into<S: FingerprintSensor>(sensor: &mut S, buffer: CharBuffer) -> SensorEvent {
    match sensor.capture_image().await {
        Ok(()) => {}
        Err(SensorCode::NO_FINGER) => return SensorEvent::NoFinger,
        Err(code) => return SensorEvent::CaptureFailed(code),
    }
    match sensor.image_to_template(buffer).await {
        Ok(()) => SensorEvent::Converted,
        Err(code) => SensorEvent::ConvertFailed(code),
    }
}
