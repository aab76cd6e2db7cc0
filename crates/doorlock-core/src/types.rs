use crate::{Result, constants::PAYLOAD_CAPACITY, error::Error};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity slot number inside the biometric sensor database.
pub type SlotId = u16;

/// Fixed-capacity, owned UTF-8 text.
///
/// The capacity `N` is part of the type, so a payload can never outgrow the
/// slot it was sized for. Construction either rejects oversize input
/// ([`BoundedText::try_from_str`]) or keeps the longest prefix that fits
/// without splitting a character ([`BoundedText::truncating`]).
///
/// # Examples
///
/// ```
/// use doorlock_core::BoundedText;
///
/// let text = BoundedText::<4>::truncating("123456");
/// assert_eq!(text.as_str(), "1234");
///
/// assert!(BoundedText::<4>::try_from_str("12345").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundedText<const N: usize>(ArrayString<N>);

/// Payload of an [`IdentificationEvent`].
pub type EventText = BoundedText<PAYLOAD_CAPACITY>;

/// Text of a display update.
pub type DisplayText = BoundedText<PAYLOAD_CAPACITY>;

impl<const N: usize> BoundedText<N> {
    /// Capacity in bytes.
    pub const CAPACITY: usize = N;

    /// Create empty text.
    #[must_use]
    pub fn new() -> Self {
        Self(ArrayString::new())
    }

    /// Keep the longest prefix of `text` that fits in `N` bytes.
    ///
    /// Truncation happens on a character boundary, so the result may be
    /// shorter than `N` bytes when a multi-byte character straddles the limit.
    #[must_use]
    pub fn truncating(text: &str) -> Self {
        let mut inner = ArrayString::new();
        for ch in text.chars() {
            if inner.try_push(ch).is_err() {
                break;
            }
        }
        Self(inner)
    }

    /// Copy `text` if it fits.
    ///
    /// # Errors
    /// Returns `Error::TextTooLong` when `text` is longer than `N` bytes.
    pub fn try_from_str(text: &str) -> Result<Self> {
        ArrayString::from(text)
            .map(Self)
            .map_err(|_| Error::TextTooLong {
                capacity: N,
                len: text.len(),
            })
    }

    /// Append a character. Returns `false` (and leaves the text untouched)
    /// when the character does not fit.
    pub fn push(&mut self, ch: char) -> bool {
        self.0.try_push(ch).is_ok()
    }

    /// Remove all text.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of characters (not bytes).
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> AsRef<str> for BoundedText<N> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> TryFrom<&str> for BoundedText<N> {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self> {
        Self::try_from_str(text)
    }
}

/// Lock state reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    Locked,
    Unlocked,
}

impl DoorState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Locked => "locked",
            DoorState::Unlocked => "unlocked",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator prompt raised while an enrollment session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPrompt {
    /// Put a finger on the sensor for the first capture.
    PlaceFinger,
    /// Lift the finger after the first capture.
    RemoveFinger,
    /// Put the same finger back for the second capture.
    PlaceAgain,
}

impl EnrollmentPrompt {
    /// Status string echoed to the host.
    #[must_use]
    pub fn as_status(&self) -> &'static str {
        match self {
            EnrollmentPrompt::PlaceFinger => "place_finger",
            EnrollmentPrompt::RemoveFinger => "remove_finger",
            EnrollmentPrompt::PlaceAgain => "place_again",
        }
    }

    /// Inverse of [`EnrollmentPrompt::as_status`].
    #[must_use]
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "place_finger" => Some(EnrollmentPrompt::PlaceFinger),
            "remove_finger" => Some(EnrollmentPrompt::RemoveFinger),
            "place_again" => Some(EnrollmentPrompt::PlaceAgain),
            _ => None,
        }
    }
}

/// Discriminant of an [`IdentificationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A fingerprint matched an enrolled slot. Payload: slot digits.
    BiometricMatch,
    /// An enrollment session ended. Payload: `ENROLL_OK:<slot>` or `ENROLL_FAIL:<code>`.
    EnrollmentOutcome,
    /// A contactless card was presented. Payload: uppercase hex UID.
    CardRead,
    /// A key was accepted by the keypad debouncer. Payload: the key.
    KeyPressed,
    /// The keypad buffer was submitted. Payload: the typed buffer.
    KeypadSubmit,
    /// Enrollment asks the operator to act. Payload: prompt status string.
    EnrollmentPrompt,
    /// A template was deleted. Payload: slot digits.
    FingerprintDeleted,
    /// Deleting a template failed. Payload: slot digits.
    DeleteFailed,
    /// Listing found an occupied slot. Payload: slot digits.
    FingerprintFound,
    /// Listing probed every candidate slot.
    ListingComplete,
    /// The sensor database was erased.
    AllCleared,
    /// Erasing the sensor database failed.
    ClearFailed,
    /// The lock changed state. Payload: `locked` or `unlocked`.
    DoorStatus,
}

/// Something the firmware observed that the host should learn about.
///
/// A discriminant plus a bounded text payload. Events are copied into and
/// out of queues; no unit keeps a reference to an event it has sent.
///
/// # Examples
///
/// ```
/// use doorlock_core::{EventKind, IdentificationEvent};
///
/// let event = IdentificationEvent::enrollment_succeeded(7);
/// assert_eq!(event.kind(), EventKind::EnrollmentOutcome);
/// assert_eq!(event.payload(), "ENROLL_OK:7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentificationEvent {
    kind: EventKind,
    payload: EventText,
}

impl IdentificationEvent {
    /// Build an event from raw parts; `payload` is truncated to capacity.
    #[must_use]
    pub fn new(kind: EventKind, payload: &str) -> Self {
        Self {
            kind,
            payload: EventText::truncating(payload),
        }
    }

    #[must_use]
    pub fn biometric_match(slot: SlotId) -> Self {
        Self::new(EventKind::BiometricMatch, &slot.to_string())
    }

    #[must_use]
    pub fn enrollment_succeeded(slot: SlotId) -> Self {
        Self::new(EventKind::EnrollmentOutcome, &format!("ENROLL_OK:{slot}"))
    }

    /// `code` is the raw sensor status byte that ended the session.
    #[must_use]
    pub fn enrollment_failed(code: u8) -> Self {
        Self::new(EventKind::EnrollmentOutcome, &format!("ENROLL_FAIL:{code}"))
    }

    #[must_use]
    pub fn card_read(uid_hex: &str) -> Self {
        Self::new(EventKind::CardRead, uid_hex)
    }

    #[must_use]
    pub fn key_pressed(key: char) -> Self {
        let mut buf = [0u8; 4];
        Self::new(EventKind::KeyPressed, key.encode_utf8(&mut buf))
    }

    #[must_use]
    pub fn keypad_submit(buffer: &EventText) -> Self {
        Self {
            kind: EventKind::KeypadSubmit,
            payload: *buffer,
        }
    }

    #[must_use]
    pub fn enrollment_prompt(prompt: EnrollmentPrompt) -> Self {
        Self::new(EventKind::EnrollmentPrompt, prompt.as_status())
    }

    #[must_use]
    pub fn fingerprint_deleted(slot: SlotId) -> Self {
        Self::new(EventKind::FingerprintDeleted, &slot.to_string())
    }

    #[must_use]
    pub fn delete_failed(slot: SlotId) -> Self {
        Self::new(EventKind::DeleteFailed, &slot.to_string())
    }

    #[must_use]
    pub fn fingerprint_found(slot: SlotId) -> Self {
        Self::new(EventKind::FingerprintFound, &slot.to_string())
    }

    #[must_use]
    pub fn listing_complete() -> Self {
        Self::new(EventKind::ListingComplete, "")
    }

    #[must_use]
    pub fn all_cleared() -> Self {
        Self::new(EventKind::AllCleared, "")
    }

    #[must_use]
    pub fn clear_failed() -> Self {
        Self::new(EventKind::ClearFailed, "")
    }

    #[must_use]
    pub fn door_status(state: DoorState) -> Self {
        Self::new(EventKind::DoorStatus, state.as_str())
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    /// Payload parsed as a slot number, for slot-carrying kinds.
    #[must_use]
    pub fn slot(&self) -> Option<SlotId> {
        self.payload.as_str().parse().ok()
    }
}

/// Buzzer cadence selected by the signed `times` parameter of a beep.
///
/// # Examples
///
/// ```
/// use doorlock_core::BeepPattern;
///
/// assert_eq!(BeepPattern::from_times(0), BeepPattern::Click);
/// assert_eq!(BeepPattern::from_times(3), BeepPattern::Confirm(3));
/// assert_eq!(BeepPattern::from_times(-2), BeepPattern::Alert(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeepPattern {
    /// One short key click.
    Click,
    /// N pulses of the confirmation cadence.
    Confirm(u32),
    /// N pulses of the slower alert cadence.
    Alert(u32),
}

impl BeepPattern {
    #[must_use]
    pub fn from_times(times: i32) -> Self {
        match times {
            0 => BeepPattern::Click,
            n if n > 0 => BeepPattern::Confirm(n.unsigned_abs()),
            n => BeepPattern::Alert(n.unsigned_abs()),
        }
    }

    /// Number of buzzer pulses this pattern produces.
    #[must_use]
    pub fn pulses(&self) -> u32 {
        match self {
            BeepPattern::Click => 1,
            BeepPattern::Confirm(n) | BeepPattern::Alert(n) => *n,
        }
    }
}

/// Status light behaviour, numbered as on the wire (0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightMode {
    Off,
    Solid,
    SlowBlink,
    FastBlink,
}

impl LightMode {
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            LightMode::Off => 0,
            LightMode::Solid => 1,
            LightMode::SlowBlink => 2,
            LightMode::FastBlink => 3,
        }
    }
}

impl TryFrom<i32> for LightMode {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(LightMode::Off),
            1 => Ok(LightMode::Solid),
            2 => Ok(LightMode::SlowBlink),
            3 => Ok(LightMode::FastBlink),
            other => Err(Error::InvalidLightMode(other)),
        }
    }
}

/// Action requested of the arbitration unit or the feedback unit.
///
/// Actuator variants go to the arbitration queue and `UpdateDisplay` goes to
/// the display queue; both queues carry this one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Energize the relay for `seconds`; a repeat refreshes the deadline.
    Unlock { seconds: i32 },
    /// De-energize the relay.
    Lock,
    /// Drive the buzzer; see [`BeepPattern::from_times`].
    Beep { times: i32 },
    /// Drive the status light.
    StatusLight(LightMode),
    /// Show text on the second display line.
    UpdateDisplay(DisplayText),
}

impl ControlCommand {
    /// Display update with `text` truncated to capacity.
    #[must_use]
    pub fn display(text: &str) -> Self {
        ControlCommand::UpdateDisplay(DisplayText::truncating(text))
    }

    #[must_use]
    pub fn is_display(&self) -> bool {
        matches!(self, ControlCommand::UpdateDisplay(_))
    }
}

/// Request from the host bridge to the unit that owns the biometric sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorRequest {
    /// Start an enrollment session targeting `slot`.
    Enroll { slot: SlotId },
    /// Delete the template stored at `slot`.
    Delete { slot: SlotId },
    /// Probe every candidate slot and report the occupied ones.
    List,
    /// Erase the whole template database.
    ClearAll,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_bounded_text_truncates_to_capacity() {
        let text = EventText::truncating("0123456789012345678901234567890123456789");
        assert_eq!(text.len(), PAYLOAD_CAPACITY);
        assert_eq!(text.as_str(), "0123456789012345678901234567890");
    }

    #[test]
    fn test_bounded_text_truncates_on_char_boundary() {
        // "é" is two bytes; the third byte would split it
        let text = BoundedText::<3>::truncating("aéé");
        assert_eq!(text.as_str(), "aé");

        let text = BoundedText::<2>::truncating("aé");
        assert_eq!(text.as_str(), "a");
    }

    #[test]
    fn test_bounded_text_try_from_rejects_oversize() {
        let err = BoundedText::<4>::try_from_str("12345").unwrap_err();
        assert!(matches!(err, Error::TextTooLong { capacity: 4, len: 5 }));

        let ok = BoundedText::<4>::try_from("1234").unwrap();
        assert_eq!(ok.as_str(), "1234");
    }

    #[test]
    fn test_bounded_text_push_stops_when_full() {
        let mut text = BoundedText::<2>::new();
        assert!(text.push('1'));
        assert!(text.push('2'));
        assert!(!text.push('3'));
        assert_eq!(text.as_str(), "12");

        text.clear();
        assert!(text.is_empty());
    }

    #[test]
    fn test_event_payloads() {
        assert_eq!(IdentificationEvent::biometric_match(12).payload(), "12");
        assert_eq!(
            IdentificationEvent::enrollment_failed(3).payload(),
            "ENROLL_FAIL:3"
        );
        assert_eq!(IdentificationEvent::card_read("0A1B2C3D").payload(), "0A1B2C3D");
        assert_eq!(IdentificationEvent::key_pressed('#').payload(), "#");
        assert_eq!(
            IdentificationEvent::enrollment_prompt(EnrollmentPrompt::PlaceAgain).payload(),
            "place_again"
        );
        assert_eq!(
            IdentificationEvent::door_status(DoorState::Unlocked).payload(),
            "unlocked"
        );
    }

    #[test]
    fn test_event_slot_parsing() {
        assert_eq!(IdentificationEvent::fingerprint_found(42).slot(), Some(42));
        assert_eq!(IdentificationEvent::listing_complete().slot(), None);
        assert_eq!(IdentificationEvent::enrollment_succeeded(7).slot(), None);
    }

    #[test]
    fn test_keypad_submit_copies_buffer() {
        let mut buffer = EventText::new();
        for ch in "1234".chars() {
            buffer.push(ch);
        }
        let event = IdentificationEvent::keypad_submit(&buffer);
        buffer.clear();

        assert_eq!(event.kind(), EventKind::KeypadSubmit);
        assert_eq!(event.payload(), "1234");
    }

    #[rstest]
    #[case(0, BeepPattern::Click, 1)]
    #[case(1, BeepPattern::Confirm(1), 1)]
    #[case(4, BeepPattern::Confirm(4), 4)]
    #[case(-1, BeepPattern::Alert(1), 1)]
    #[case(-2, BeepPattern::Alert(2), 2)]
    #[case(i32::MIN, BeepPattern::Alert(2_147_483_648), 2_147_483_648)]
    fn test_beep_pattern_from_times(
        #[case] times: i32,
        #[case] expected: BeepPattern,
        #[case] pulses: u32,
    ) {
        let pattern = BeepPattern::from_times(times);
        assert_eq!(pattern, expected);
        assert_eq!(pattern.pulses(), pulses);
    }

    #[rstest]
    #[case(0, LightMode::Off)]
    #[case(1, LightMode::Solid)]
    #[case(2, LightMode::SlowBlink)]
    #[case(3, LightMode::FastBlink)]
    fn test_light_mode_codes(#[case] code: i32, #[case] mode: LightMode) {
        assert_eq!(LightMode::try_from(code).unwrap(), mode);
        assert_eq!(mode.code(), code);
    }

    #[test]
    fn test_light_mode_rejects_unknown_code() {
        assert!(matches!(
            LightMode::try_from(4),
            Err(Error::InvalidLightMode(4))
        ));
        assert!(LightMode::try_from(-1).is_err());
    }

    #[test]
    fn test_enrollment_prompt_status_round_trip() {
        for prompt in [
            EnrollmentPrompt::PlaceFinger,
            EnrollmentPrompt::RemoveFinger,
            EnrollmentPrompt::PlaceAgain,
        ] {
            assert_eq!(EnrollmentPrompt::from_status(prompt.as_status()), Some(prompt));
        }
        assert_eq!(EnrollmentPrompt::from_status("bogus"), None);
    }

    #[test]
    fn test_display_command_truncates() {
        let cmd = ControlCommand::display("THIS MESSAGE IS FAR TOO LONG FOR THE PAYLOAD");
        match cmd {
            ControlCommand::UpdateDisplay(text) => assert_eq!(text.len(), PAYLOAD_CAPACITY),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(cmd.is_display());
        assert!(!ControlCommand::Lock.is_display());
    }
}
