//! Bus failures reported by the peripheral drivers.
//!
//! The display sits on I2C and the card reader on SPI. Either can stop
//! acknowledging, lose a transfer half way, or hand back bytes that make no
//! sense. The units log these and carry on; nothing here is fatal.
//!
//! Fingerprint sensor outcomes never show up as a [`HardwareError`]: the
//! sensor answers every command with a status byte, modelled as
//! [`SensorCode`](crate::types::SensorCode).

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// No acknowledge from the peripheral at all.
    #[error("{device} not responding")]
    NotResponding { device: String },

    /// A transfer started but did not complete (NACK mid-frame, bad CRC).
    #[error("bus transfer failed: {0}")]
    Bus(String),

    /// The peripheral replied, but the reply is unusable.
    #[error("unusable reply: {0}")]
    InvalidData(String),
}

impl HardwareError {
    pub fn not_responding(device: impl Into<String>) -> Self {
        Self::NotResponding {
            device: device.into(),
        }
    }

    pub fn bus(detail: impl Into<String>) -> Self {
        Self::Bus(detail.into())
    }

    pub fn invalid_data(detail: impl Into<String>) -> Self {
        Self::InvalidData(detail.into())
    }
}
