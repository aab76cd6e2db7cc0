//! Outbound messages to the host.
//!
//! Three shapes travel outward, all as one JSON object per line:
//!
//! - [`HostEvent`], tagged by `type`: identification results and door state.
//! - [`StatusReport`], tagged by `status`: enrollment prompts and the
//!   results of sensor administration.
//! - [`FingerprintFound`]: one occupied slot found while listing.

use doorlock_core::{DoorState, EnrollmentPrompt, EventKind, IdentificationEvent, SlotId};
use serde::{Deserialize, Serialize};

/// Identification result or door state report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// Slot digits on a match, or `ENROLL_OK:<slot>` / `ENROLL_FAIL:<code>`.
    Fingerprint { id: String },
    Rfid { uid: String },
    Keypad { password: String },
    Status { door: DoorState },
}

/// Progress and administration echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusReport {
    PlaceFinger,
    RemoveFinger,
    PlaceAgain,
    EnrollmentStarted,
    FingerprintDeleted { id: SlotId },
    DeleteFailed { id: SlotId },
    ListingFingerprints,
    ListingComplete,
    AllFingerprintsCleared,
    ClearFailed,
}

impl From<EnrollmentPrompt> for StatusReport {
    fn from(prompt: EnrollmentPrompt) -> Self {
        match prompt {
            EnrollmentPrompt::PlaceFinger => StatusReport::PlaceFinger,
            EnrollmentPrompt::RemoveFinger => StatusReport::RemoveFinger,
            EnrollmentPrompt::PlaceAgain => StatusReport::PlaceAgain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintFound {
    pub fingerprint_found: SlotId,
}

/// Any line the firmware writes to the host.
///
/// # Examples
///
/// ```
/// use doorlock_core::IdentificationEvent;
/// use doorlock_protocol::OutboundMessage;
///
/// let event = IdentificationEvent::card_read("0A1B2C3D");
/// let message = OutboundMessage::from_event(&event).unwrap();
/// assert_eq!(
///     serde_json::to_string(&message).unwrap(),
///     r#"{"type":"rfid","uid":"0A1B2C3D"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Event(HostEvent),
    Status(StatusReport),
    Found(FingerprintFound),
}

impl OutboundMessage {
    /// Render an identification event for the host.
    ///
    /// Returns `None` for events that stay on the device (individual key
    /// presses) and for events whose payload does not parse, such as a slot
    /// event with a non-numeric payload.
    #[must_use]
    pub fn from_event(event: &IdentificationEvent) -> Option<Self> {
        let payload = event.payload().to_string();

        let message = match event.kind() {
            EventKind::BiometricMatch | EventKind::EnrollmentOutcome => {
                Self::Event(HostEvent::Fingerprint { id: payload })
            }
            EventKind::CardRead => Self::Event(HostEvent::Rfid { uid: payload }),
            EventKind::KeypadSubmit => Self::Event(HostEvent::Keypad { password: payload }),
            EventKind::KeyPressed => return None,
            EventKind::EnrollmentPrompt => {
                Self::Status(EnrollmentPrompt::from_status(&payload)?.into())
            }
            EventKind::FingerprintDeleted => {
                Self::Status(StatusReport::FingerprintDeleted { id: event.slot()? })
            }
            EventKind::DeleteFailed => Self::Status(StatusReport::DeleteFailed { id: event.slot()? }),
            EventKind::FingerprintFound => Self::Found(FingerprintFound {
                fingerprint_found: event.slot()?,
            }),
            EventKind::ListingComplete => Self::Status(StatusReport::ListingComplete),
            EventKind::AllCleared => Self::Status(StatusReport::AllFingerprintsCleared),
            EventKind::ClearFailed => Self::Status(StatusReport::ClearFailed),
            EventKind::DoorStatus => {
                let door = match event.payload() {
                    "locked" => DoorState::Locked,
                    "unlocked" => DoorState::Unlocked,
                    _ => return None,
                };
                Self::Event(HostEvent::Status { door })
            }
        };

        Some(message)
    }
}

impl From<HostEvent> for OutboundMessage {
    fn from(event: HostEvent) -> Self {
        Self::Event(event)
    }
}

impl From<StatusReport> for OutboundMessage {
    fn from(status: StatusReport) -> Self {
        Self::Status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlock_core::EventText;
    use rstest::rstest;

    fn json(event: IdentificationEvent) -> String {
        let message = OutboundMessage::from_event(&event).unwrap();
        serde_json::to_string(&message).unwrap()
    }

    #[rstest]
    #[case(IdentificationEvent::biometric_match(12), r#"{"type":"fingerprint","id":"12"}"#)]
    #[case(
        IdentificationEvent::enrollment_succeeded(7),
        r#"{"type":"fingerprint","id":"ENROLL_OK:7"}"#
    )]
    #[case(
        IdentificationEvent::enrollment_failed(3),
        r#"{"type":"fingerprint","id":"ENROLL_FAIL:3"}"#
    )]
    #[case(IdentificationEvent::card_read("0A1B2C3D"), r#"{"type":"rfid","uid":"0A1B2C3D"}"#)]
    #[case(
        IdentificationEvent::enrollment_prompt(EnrollmentPrompt::RemoveFinger),
        r#"{"status":"remove_finger"}"#
    )]
    #[case(
        IdentificationEvent::fingerprint_deleted(4),
        r#"{"status":"fingerprint_deleted","id":4}"#
    )]
    #[case(IdentificationEvent::delete_failed(4), r#"{"status":"delete_failed","id":4}"#)]
    #[case(IdentificationEvent::fingerprint_found(9), r#"{"fingerprint_found":9}"#)]
    #[case(IdentificationEvent::listing_complete(), r#"{"status":"listing_complete"}"#)]
    #[case(IdentificationEvent::all_cleared(), r#"{"status":"all_fingerprints_cleared"}"#)]
    #[case(IdentificationEvent::clear_failed(), r#"{"status":"clear_failed"}"#)]
    #[case(
        IdentificationEvent::door_status(DoorState::Unlocked),
        r#"{"type":"status","door":"unlocked"}"#
    )]
    fn test_event_rendering(#[case] event: IdentificationEvent, #[case] expected: &str) {
        assert_eq!(json(event), expected);
    }

    #[test]
    fn test_keypad_submit_rendering() {
        let mut buffer = EventText::new();
        "4711".chars().for_each(|ch| {
            buffer.push(ch);
        });
        assert_eq!(
            json(IdentificationEvent::keypad_submit(&buffer)),
            r#"{"type":"keypad","password":"4711"}"#
        );
    }

    #[test]
    fn test_key_press_stays_local() {
        assert_eq!(
            OutboundMessage::from_event(&IdentificationEvent::key_pressed('5')),
            None
        );
    }

    #[test]
    fn test_malformed_slot_payload_is_dropped() {
        let event = IdentificationEvent::new(EventKind::FingerprintFound, "abc");
        assert_eq!(OutboundMessage::from_event(&event), None);
    }

    #[rstest]
    #[case(StatusReport::EnrollmentStarted, r#"{"status":"enrollment_started"}"#)]
    #[case(StatusReport::ListingFingerprints, r#"{"status":"listing_fingerprints"}"#)]
    #[case(StatusReport::PlaceAgain, r#"{"status":"place_again"}"#)]
    fn test_bridge_echoes(#[case] status: StatusReport, #[case] expected: &str) {
        let message = OutboundMessage::from(status);
        assert_eq!(serde_json::to_string(&message).unwrap(), expected);
    }

    #[test]
    fn test_untagged_parse_picks_right_shape() {
        let parsed: OutboundMessage =
            serde_json::from_str(r#"{"fingerprint_found":42}"#).unwrap();
        assert_eq!(
            parsed,
            OutboundMessage::Found(FingerprintFound {
                fingerprint_found: 42
            })
        );

        let parsed: OutboundMessage = serde_json::from_str(r#"{"status":"clear_failed"}"#).unwrap();
        assert_eq!(parsed, OutboundMessage::Status(StatusReport::ClearFailed));
    }
}
