//! Host wire protocol for the door lock firmware.
//!
//! The host and the lock exchange newline-delimited JSON over a serial
//! link. This crate defines both directions:
//!
//! - [`HostCommand`]: what the host may ask for (`{"cmd": ...}`).
//! - [`OutboundMessage`]: what the lock reports (events, status echoes).
//! - [`HostLineCodec`]: framing for `tokio_util::codec::{FramedRead, FramedWrite}`.
//!
//! # Example
//!
//! ```
//! use doorlock_protocol::{HostCommand, LedColor};
//!
//! let cmd: HostCommand = serde_json::from_str(r#"{"cmd":"led","color":"green"}"#).unwrap();
//! assert_eq!(cmd, HostCommand::Led { color: LedColor::Green });
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod message;

pub use codec::{HostLineCodec, InboundLine, RejectReason};
pub use command::{HostCommand, LedColor};
pub use error::CodecError;
pub use message::{FingerprintFound, HostEvent, OutboundMessage, StatusReport};
