//! Value types exchanged with the device drivers.
//!
//! The biometric sensor speaks in one-byte confirmation codes. They are
//! modelled as [`SensorCode`] and returned as the error half of
//! [`SensorResult`], so a status such as "no finger" travels as plain data
//! and can be embedded verbatim in an enrollment failure report.

use crate::error::{HardwareError, Result};
use arrayvec::ArrayVec;
use doorlock_core::SlotId;
use std::fmt;

/// Result of a biometric sensor operation. `Err` carries the raw status code.
pub type SensorResult<T = ()> = std::result::Result<T, SensorCode>;

/// Raw confirmation code returned by the biometric sensor module.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::SensorCode;
///
/// assert!(SensorCode::OK.into_result().is_ok());
/// assert_eq!(SensorCode(0x02).into_result(), Err(SensorCode::NO_FINGER));
/// assert_eq!(SensorCode::NO_FINGER.to_string(), "NO_FINGER (0x02)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorCode(pub u8);

impl SensorCode {
    pub const OK: Self = Self(0x00);
    pub const PACKET_RECEIVE_ERR: Self = Self(0x01);
    pub const NO_FINGER: Self = Self(0x02);
    pub const IMAGE_FAIL: Self = Self(0x03);
    pub const IMAGE_MESS: Self = Self(0x06);
    pub const FEATURE_FAIL: Self = Self(0x07);
    pub const NO_MATCH: Self = Self(0x08);
    pub const NOT_FOUND: Self = Self(0x09);
    pub const ENROLL_MISMATCH: Self = Self(0x0A);
    pub const BAD_LOCATION: Self = Self(0x0B);
    pub const DB_READ_FAIL: Self = Self(0x0C);
    pub const DELETE_FAIL: Self = Self(0x10);
    pub const DB_CLEAR_FAIL: Self = Self(0x11);
    pub const PASSWORD_FAIL: Self = Self(0x13);
    pub const INVALID_IMAGE: Self = Self(0x15);
    pub const FLASH_ERR: Self = Self(0x18);

    /// Raw status byte.
    #[must_use]
    pub fn code(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Map `OK` to `Ok(())` and every other code to `Err(code)`.
    pub fn into_result(self) -> SensorResult {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }

    /// Symbolic name, if the code is a known one.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::OK => "OK",
            Self::PACKET_RECEIVE_ERR => "PACKET_RECEIVE_ERR",
            Self::NO_FINGER => "NO_FINGER",
            Self::IMAGE_FAIL => "IMAGE_FAIL",
            Self::IMAGE_MESS => "IMAGE_MESS",
            Self::FEATURE_FAIL => "FEATURE_FAIL",
            Self::NO_MATCH => "NO_MATCH",
            Self::NOT_FOUND => "NOT_FOUND",
            Self::ENROLL_MISMATCH => "ENROLL_MISMATCH",
            Self::BAD_LOCATION => "BAD_LOCATION",
            Self::DB_READ_FAIL => "DB_READ_FAIL",
            Self::DELETE_FAIL => "DELETE_FAIL",
            Self::DB_CLEAR_FAIL => "DB_CLEAR_FAIL",
            Self::PASSWORD_FAIL => "PASSWORD_FAIL",
            Self::INVALID_IMAGE => "INVALID_IMAGE",
            Self::FLASH_ERR => "FLASH_ERR",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for SensorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:02X})", name, self.0),
            None => write!(f, "UNKNOWN (0x{:02X})", self.0),
        }
    }
}

/// Character buffer inside the sensor that receives a converted image.
///
/// Enrollment converts the first capture into `One` and the second into
/// `Two`, then merges both into a model. Searching reads `One`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharBuffer {
    One,
    Two,
}

impl CharBuffer {
    /// Buffer id as sent to the sensor (1 or 2).
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            CharBuffer::One => 1,
            CharBuffer::Two => 2,
        }
    }
}

/// Successful database search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    /// Slot holding the matching template.
    pub slot: SlotId,

    /// Match score reported by the sensor (higher is better).
    pub confidence: u16,
}

/// Minimum UID length in bytes (per ISO 14443 specification).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (per ISO 14443 specification).
pub const MAX_UID_LENGTH: usize = 10;

/// Contactless card unique identifier (4-10 bytes).
///
/// # Examples
///
/// ```
/// use doorlock_hardware::CardUid;
///
/// let uid = CardUid::new(&[0x0A, 0x1B, 0x2C, 0x3D]).unwrap();
/// assert_eq!(uid.to_hex(), "0A1B2C3D");
///
/// assert!(CardUid::new(&[0x01, 0x02]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardUid(ArrayVec<u8, MAX_UID_LENGTH>);

impl CardUid {
    /// Create a UID, validating its length.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID length is not within the valid range
    /// of 4-10 bytes as specified by ISO 14443.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&bytes.len()) {
            return Err(HardwareError::invalid_data(format!(
                "Card UID length must be between {} and {} bytes, got {}",
                MIN_UID_LENGTH,
                MAX_UID_LENGTH,
                bytes.len()
            )));
        }

        let mut uid = ArrayVec::new();
        uid.extend(bytes.iter().copied());
        Ok(Self(uid))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hex, two digits per byte.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sensor_code_into_result() {
        assert_eq!(SensorCode(0x00).into_result(), Ok(()));
        assert_eq!(
            SensorCode(0x0B).into_result(),
            Err(SensorCode::BAD_LOCATION)
        );
    }

    #[test]
    fn test_sensor_code_display() {
        assert_eq!(SensorCode::IMAGE_MESS.to_string(), "IMAGE_MESS (0x06)");
        assert_eq!(SensorCode(0xEE).to_string(), "UNKNOWN (0xEE)");
        assert_eq!(SensorCode(0xEE).name(), None);
    }

    #[test]
    fn test_char_buffer_ids() {
        assert_eq!(CharBuffer::One.id(), 1);
        assert_eq!(CharBuffer::Two.id(), 2);
    }

    #[rstest]
    #[case(&[0x0A, 0x1B, 0x2C, 0x3D], "0A1B2C3D")]
    #[case(&[0x00, 0x01, 0x02, 0x03], "00010203")]
    #[case(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11, 0x22], "DEADBEEF001122")]
    fn test_card_uid_hex(#[case] bytes: &[u8], #[case] hex: &str) {
        let uid = CardUid::new(bytes).unwrap();
        assert_eq!(uid.to_hex(), hex);
        assert_eq!(uid.to_string(), hex);
        assert_eq!(uid.as_bytes(), bytes);
    }

    #[test]
    fn test_card_uid_length_bounds() {
        assert!(CardUid::new(&[0x01; 3]).is_err());
        assert!(CardUid::new(&[0x01; 4]).is_ok());
        assert!(CardUid::new(&[0x01; 10]).is_ok());
        assert!(CardUid::new(&[0x01; 11]).is_err());
    }
}
