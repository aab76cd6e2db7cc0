use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Assembly errors
    #[error("Required hardware not provided: {0}")]
    MissingHardware(&'static str),

    #[error("No identification modality wired (fingerprint sensor or card reader required)")]
    NoIdentificationModality,

    // Queue errors
    #[error("Queue closed: {0}")]
    QueueClosed(&'static str),

    // Payload errors
    #[error("Text exceeds capacity of {capacity} bytes: {len} bytes given")]
    TextTooLong { capacity: usize, len: usize },

    #[error("Invalid status light mode: {0}")]
    InvalidLightMode(i32),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
