//! Tokio codec for newline-delimited JSON on the serial link.
//!
//! # Overview
//!
//! [`HostLineCodec`] implements:
//! - [`Decoder`]: splits the inbound byte stream at `\n` and parses each
//!   line into a [`HostCommand`].
//! - [`Encoder<OutboundMessage>`]: serializes a message as compact JSON
//!   followed by `\n`.
//!
//! ```text
//! Serial RX -> Decoder -> InboundLine (command or rejection)
//! OutboundMessage -> Encoder -> Serial TX (JSON + "\n")
//! ```
//!
//! # Rejections
//!
//! A line that is not valid JSON, names an unknown `cmd`, or carries a
//! parameter of the wrong type must never stop the link. The decoder yields
//! it as [`InboundLine::Rejected`] and carries on with the next line; the
//! caller decides whether to log it. Blank lines and `\r` before the
//! newline are skipped.
//!
//! # Overlong lines
//!
//! Bytes past `max_line_length` without a newline are discarded up to the
//! next newline, which is then reported once as
//! [`RejectReason::Overflow`]. The buffer never grows beyond the limit.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use doorlock_protocol::{HostCommand, HostLineCodec, InboundLine};
//!
//! let mut codec = HostLineCodec::new();
//! let mut buffer = BytesMut::from(&b"{\"cmd\":\"lock\"}\nnot json\n"[..]);
//!
//! assert_eq!(
//!     codec.decode(&mut buffer).unwrap(),
//!     Some(InboundLine::Command(HostCommand::Lock))
//! );
//! assert!(matches!(
//!     codec.decode(&mut buffer).unwrap(),
//!     Some(InboundLine::Rejected(_))
//! ));
//! assert_eq!(codec.decode(&mut buffer).unwrap(), None);
//! ```

use bytes::{Buf, BufMut, BytesMut};
use doorlock_core::constants::DEFAULT_MAX_LINE_LENGTH;
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};

use crate::{CodecError, HostCommand, OutboundMessage};

/// One decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    Command(HostCommand),
    Rejected(RejectReason),
}

/// Why an inbound line was not turned into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The line exceeded the configured length limit.
    Overflow { limit: usize },

    /// The line is a JSON object with a `cmd` this firmware does not know.
    UnknownCommand(String),

    /// Anything else: invalid JSON, missing `cmd`, bad parameter.
    Malformed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Overflow { limit } => write!(f, "line longer than {limit} bytes"),
            RejectReason::UnknownCommand(cmd) => write!(f, "unknown command '{cmd}'"),
            RejectReason::Malformed(detail) => write!(f, "malformed line: {detail}"),
        }
    }
}

/// Newline-delimited JSON codec for the host link.
#[derive(Debug)]
pub struct HostLineCodec {
    /// Maximum allowed line length in bytes, excluding the newline.
    max_line_length: usize,

    /// Where to resume scanning for a newline in the buffered bytes.
    next_index: usize,

    /// Set while the tail of an overlong line is being thrown away.
    discarding: bool,
}

impl HostLineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that rejects lines longer than `max_line_length` bytes.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn overflow(&self) -> InboundLine {
        InboundLine::Rejected(RejectReason::Overflow {
            limit: self.max_line_length,
        })
    }
}

impl Default for HostLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one line (newline removed) into an inbound item. `None` for blank
/// lines.
fn classify(line: &[u8]) -> Option<InboundLine> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }

    let item = match serde_json::from_slice::<HostCommand>(line) {
        Ok(command) => InboundLine::Command(command),
        Err(err) => InboundLine::Rejected(rejection(line, err)),
    };
    Some(item)
}

fn rejection(line: &[u8], err: serde_json::Error) -> RejectReason {
    let unknown = serde_json::from_slice::<serde_json::Value>(line)
        .ok()
        .and_then(|value| value.get("cmd")?.as_str().map(str::to_string))
        .filter(|cmd| !HostCommand::NAMES.contains(&cmd.as_str()));

    match unknown {
        Some(cmd) => RejectReason::UnknownCommand(cmd),
        None => RejectReason::Malformed(err.to_string()),
    }
}

impl Decoder for HostLineCodec {
    type Item = InboundLine;
    type Error = CodecError;

    /// Decode the next non-blank line.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(InboundLine))` - A line was consumed
    /// - `Ok(None)` - Need more data
    ///
    /// # Errors
    ///
    /// Never fails on content; the error type exists for the transport.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, CodecError> {
        loop {
            let read_to = src.len().min(self.max_line_length.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                    return Ok(Some(self.overflow()));
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(end + 1);
                    if let Some(item) = classify(&line[..end]) {
                        return Ok(Some(item));
                    }
                }
                (false, None) if src.len() > self.max_line_length => {
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    /// Flush a final unterminated line when the link closes.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<InboundLine>, CodecError> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }

        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            src.clear();
            return Ok(Some(self.overflow()));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let line = src.split();
        Ok(classify(&line))
    }
}

impl Encoder<OutboundMessage> for HostLineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutboundMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostEvent, StatusReport};

    fn decode_all(codec: &mut HostLineCodec, bytes: &[u8]) -> Vec<InboundLine> {
        let mut buffer = BytesMut::from(bytes);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buffer).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_codec_default_limit() {
        assert_eq!(HostLineCodec::default().max_line_length(), DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_decode_partial_line_waits() {
        let mut codec = HostLineCodec::new();
        let mut buffer = BytesMut::from(&b"{\"cmd\":\"lo"[..]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);

        buffer.extend_from_slice(b"ck\"}\n");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(InboundLine::Command(HostCommand::Lock))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_skips_blank_lines_and_carriage_returns() {
        let mut codec = HostLineCodec::new();
        let items = decode_all(&mut codec, b"\n\r\n  \n{\"cmd\":\"beep\",\"times\":2}\r\n");
        assert_eq!(items, vec![InboundLine::Command(HostCommand::Beep { times: 2 })]);
    }

    #[test]
    fn test_decode_rejections_do_not_stop_the_stream() {
        let mut codec = HostLineCodec::new();
        let items = decode_all(
            &mut codec,
            b"garbage\n{\"cmd\":\"fly\"}\n{\"cmd\":\"delete_fingerprint\"}\n{\"cmd\":\"lock\"}\n",
        );

        assert_eq!(items.len(), 4);
        assert!(matches!(&items[0], InboundLine::Rejected(RejectReason::Malformed(_))));
        assert_eq!(
            items[1],
            InboundLine::Rejected(RejectReason::UnknownCommand("fly".to_string()))
        );
        assert!(matches!(&items[2], InboundLine::Rejected(RejectReason::Malformed(_))));
        assert_eq!(items[3], InboundLine::Command(HostCommand::Lock));
    }

    #[test]
    fn test_decode_overlong_line_is_discarded() {
        let mut codec = HostLineCodec::with_max_line_length(16);
        let mut buffer = BytesMut::from(&b"{\"cmd\":\"unlock\",\"duration\":"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert!(buffer.len() <= 17);

        buffer.extend_from_slice(b"99999}\n{\"cmd\":\"lock\"}\n");
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(InboundLine::Rejected(RejectReason::Overflow { limit: 16 }))
        );
        assert_eq!(
            codec.decode(&mut buffer).unwrap(),
            Some(InboundLine::Command(HostCommand::Lock))
        );
    }

    #[test]
    fn test_decode_line_at_exact_limit() {
        let line = b"{\"cmd\":\"lock\"}";
        let mut codec = HostLineCodec::with_max_line_length(line.len());
        let mut bytes = line.to_vec();
        bytes.push(b'\n');

        assert_eq!(
            decode_all(&mut codec, &bytes),
            vec![InboundLine::Command(HostCommand::Lock)]
        );
    }

    #[test]
    fn test_decode_eof_flushes_unterminated_line() {
        let mut codec = HostLineCodec::new();
        let mut buffer = BytesMut::from(&b"{\"cmd\":\"lock\"}"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        assert_eq!(
            codec.decode_eof(&mut buffer).unwrap(),
            Some(InboundLine::Command(HostCommand::Lock))
        );
        assert_eq!(codec.decode_eof(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = HostLineCodec::new();
        let mut buffer = BytesMut::new();

        codec
            .encode(
                HostEvent::Keypad {
                    password: "1234".to_string(),
                }
                .into(),
                &mut buffer,
            )
            .unwrap();
        codec
            .encode(StatusReport::EnrollmentStarted.into(), &mut buffer)
            .unwrap();

        assert_eq!(
            &buffer[..],
            b"{\"type\":\"keypad\",\"password\":\"1234\"}\n{\"status\":\"enrollment_started\"}\n"
        );
    }
}
