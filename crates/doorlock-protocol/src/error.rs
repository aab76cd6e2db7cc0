use thiserror::Error;

/// Errors raised by [`HostLineCodec`](crate::HostLineCodec).
///
/// Malformed inbound content is never an error; it is reported as
/// [`InboundLine::Rejected`](crate::InboundLine::Rejected). Only the
/// transport and outbound serialization can fail.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CodecError> for doorlock_core::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(err) => doorlock_core::Error::Io(err),
            CodecError::Json(err) => doorlock_core::Error::Io(err.into()),
        }
    }
}
