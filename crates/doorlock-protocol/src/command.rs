//! Inbound host commands.
//!
//! Each line from the host is a JSON object whose `cmd` field selects the
//! command. Optional parameters fall back to their documented defaults;
//! unknown extra fields are ignored.

use doorlock_core::{
    LightMode, SlotId,
    constants::{DEFAULT_BEEP_TIMES, DEFAULT_ENROLL_SLOT, DEFAULT_UNLOCK_SECONDS},
};
use serde::{Deserialize, Serialize};

/// Command sent by the host.
///
/// # Examples
///
/// ```
/// use doorlock_protocol::HostCommand;
///
/// let cmd: HostCommand = serde_json::from_str(r#"{"cmd":"unlock"}"#).unwrap();
/// assert_eq!(cmd, HostCommand::Unlock { duration: 5 });
///
/// let cmd: HostCommand = serde_json::from_str(r#"{"cmd":"beep","times":-2}"#).unwrap();
/// assert_eq!(cmd, HostCommand::Beep { times: -2 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    /// Open the door for `duration` seconds.
    Unlock {
        #[serde(default = "default_unlock_seconds")]
        duration: i32,
    },

    Lock,

    /// Sound the buzzer; negative counts select the alert cadence.
    Beep {
        #[serde(default = "default_beep_times")]
        times: i32,
    },

    /// Start an enrollment session targeting slot `id`.
    EnrollFingerprint {
        #[serde(default = "default_enroll_slot")]
        id: SlotId,
    },

    DeleteFingerprint { id: SlotId },

    ListFingerprints,

    ClearAllFingerprints,

    /// Set the status light by color name.
    Led { color: LedColor },
}

impl HostCommand {
    /// Every `cmd` value this firmware understands.
    pub const NAMES: [&'static str; 8] = [
        "unlock",
        "lock",
        "beep",
        "enroll_fingerprint",
        "delete_fingerprint",
        "list_fingerprints",
        "clear_all_fingerprints",
        "led",
    ];

    /// The `cmd` value of this command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Unlock { .. } => "unlock",
            HostCommand::Lock => "lock",
            HostCommand::Beep { .. } => "beep",
            HostCommand::EnrollFingerprint { .. } => "enroll_fingerprint",
            HostCommand::DeleteFingerprint { .. } => "delete_fingerprint",
            HostCommand::ListFingerprints => "list_fingerprints",
            HostCommand::ClearAllFingerprints => "clear_all_fingerprints",
            HostCommand::Led { .. } => "led",
        }
    }
}

fn default_unlock_seconds() -> i32 {
    DEFAULT_UNLOCK_SECONDS
}

fn default_beep_times() -> i32 {
    DEFAULT_BEEP_TIMES
}

fn default_enroll_slot() -> SlotId {
    DEFAULT_ENROLL_SLOT
}

/// Status light color requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Green,
    Red,
    Blue,
    Off,
}

impl LedColor {
    /// Light pattern used to render this color on the single status light.
    #[must_use]
    pub fn light_mode(&self) -> LightMode {
        match self {
            LedColor::Green => LightMode::Solid,
            LedColor::Red => LightMode::FastBlink,
            LedColor::Blue => LightMode::SlowBlink,
            LedColor::Off => LightMode::Off,
        }
    }
}
