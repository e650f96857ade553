//! Confirmation codes reported by the sensor in acknowledgement frames.

use std::fmt;

/// One-byte status carried as the first payload byte of every Ack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ConfirmationCode {
    /// Command executed successfully (0x00).
    Ok,
    /// The module failed to receive the packet (0x01).
    ReceiveError,
    /// No finger on the sensor (0x02).
    NoFinger,
    /// Failed to capture the finger image (0x03).
    EnrollFailed,
    /// Character file not generated: image too disorderly (0x06).
    ImageTooDisorderly,
    /// Character file not generated: too few feature points (0x07).
    TooFewFeatures,
    /// The two buffers do not match (0x08).
    NoMatch,
    /// No matching template in the searched range (0x09).
    NotFound,
    /// Character files could not be merged into a template (0x0A).
    MergeFailed,
    /// Page id is beyond the finger library (0x0B).
    BadLocation,
    /// Template read from the library is invalid (0x0C).
    InvalidTemplate,
    /// Error while uploading a template (0x0D).
    TemplateUploadFailed,
    /// The module cannot accept more data packets (0x0E).
    PacketAcceptFailed,
    /// Error while uploading an image (0x0F).
    ImageUploadFailed,
    /// Failed to delete templates (0x10).
    DeleteFailed,
    /// Failed to clear the finger library (0x11).
    ClearFailed,
    /// Wrong password (0x13).
    WrongPassword,
    /// No valid primary image in the buffer (0x15).
    NoValidImage,
    /// Error writing to flash (0x18).
    FlashWriteError,
    /// Undefined error (0x19).
    UndefinedError,
    /// Invalid register number (0x1A).
    InvalidRegister,
    /// Incorrect register configuration (0x1B).
    IncorrectRegisterConfig,
    /// Wrong notepad page number (0x1C).
    WrongNotepadPage,
    /// Failed to operate the communication port (0x1D).
    PortOperationFailed,
    /// Secondary scan found no finger (0x41).
    SecondScanNoFinger,
    /// Secondary enrollment failed (0x42).
    SecondEnrollFailed,
    /// Secondary character file has too few features (0x43).
    SecondTooFewFeatures,
    /// Secondary character file too disorderly (0x44).
    SecondImageTooDisorderly,
    /// The finger is already enrolled (0x45).
    DuplicateFingerprint,
    /// Any code without a documented meaning.
    Other(u8),
}

impl ConfirmationCode {
    /// Whether the device reported success.
    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    /// The raw wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::ReceiveError => 0x01,
            Self::NoFinger => 0x02,
            Self::EnrollFailed => 0x03,
            Self::ImageTooDisorderly => 0x06,
            Self::TooFewFeatures => 0x07,
            Self::NoMatch => 0x08,
            Self::NotFound => 0x09,
            Self::MergeFailed => 0x0A,
            Self::BadLocation => 0x0B,
            Self::InvalidTemplate => 0x0C,
            Self::TemplateUploadFailed => 0x0D,
            Self::PacketAcceptFailed => 0x0E,
            Self::ImageUploadFailed => 0x0F,
            Self::DeleteFailed => 0x10,
            Self::ClearFailed => 0x11,
            Self::WrongPassword => 0x13,
            Self::NoValidImage => 0x15,
            Self::FlashWriteError => 0x18,
            Self::UndefinedError => 0x19,
            Self::InvalidRegister => 0x1A,
            Self::IncorrectRegisterConfig => 0x1B,
            Self::WrongNotepadPage => 0x1C,
            Self::PortOperationFailed => 0x1D,
            Self::SecondScanNoFinger => 0x41,
            Self::SecondEnrollFailed => 0x42,
            Self::SecondTooFewFeatures => 0x43,
            Self::SecondImageTooDisorderly => 0x44,
            Self::DuplicateFingerprint => 0x45,
            Self::Other(code) => code,
        }
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "command executed successfully",
            Self::ReceiveError => "packet receive error",
            Self::NoFinger => "no finger detected",
            Self::EnrollFailed => "failed to capture finger image",
            Self::ImageTooDisorderly => "image too disorderly to generate character file",
            Self::TooFewFeatures => "too few feature points to generate character file",
            Self::NoMatch => "fingers do not match",
            Self::NotFound => "no matching template found",
            Self::MergeFailed => "failed to combine character files",
            Self::BadLocation => "location is beyond the finger library",
            Self::InvalidTemplate => "template is invalid or could not be read",
            Self::TemplateUploadFailed => "error uploading template",
            Self::PacketAcceptFailed => "module cannot accept more packets",
            Self::ImageUploadFailed => "error uploading image",
            Self::DeleteFailed => "failed to delete templates",
            Self::ClearFailed => "failed to clear finger library",
            Self::WrongPassword => "wrong password",
            Self::NoValidImage => "no valid primary image",
            Self::FlashWriteError => "error writing flash",
            Self::UndefinedError => "undefined error",
            Self::InvalidRegister => "invalid register number",
            Self::IncorrectRegisterConfig => "incorrect register configuration",
            Self::WrongNotepadPage => "wrong notepad page number",
            Self::PortOperationFailed => "failed to operate the communication port",
            Self::SecondScanNoFinger => "secondary scan found no finger",
            Self::SecondEnrollFailed => "secondary enrollment failed",
            Self::SecondTooFewFeatures => "secondary image has too few features",
            Self::SecondImageTooDisorderly => "secondary image too disorderly",
            Self::DuplicateFingerprint => "fingerprint already enrolled",
            Self::Other(_) => "unknown confirmation code",
        }
    }
}

impl From<u8> for ConfirmationCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Ok,
            0x01 => Self::ReceiveError,
            0x02 => Self::NoFinger,
            0x03 => Self::EnrollFailed,
            0x06 => Self::ImageTooDisorderly,
            0x07 => Self::TooFewFeatures,
            0x08 => Self::NoMatch,
            0x09 => Self::NotFound,
            0x0A => Self::MergeFailed,
            0x0B => Self::BadLocation,
            0x0C => Self::InvalidTemplate,
            0x0D => Self::TemplateUploadFailed,
            0x0E => Self::PacketAcceptFailed,
            0x0F => Self::ImageUploadFailed,
            0x10 => Self::DeleteFailed,
            0x11 => Self::ClearFailed,
            0x13 => Self::WrongPassword,
            0x15 => Self::NoValidImage,
            0x18 => Self::FlashWriteError,
            0x19 => Self::UndefinedError,
            0x1A => Self::InvalidRegister,
            0x1B => Self::IncorrectRegisterConfig,
            0x1C => Self::WrongNotepadPage,
            0x1D => Self::PortOperationFailed,
            0x41 => Self::SecondScanNoFinger,
            0x42 => Self::SecondEnrollFailed,
            0x43 => Self::SecondTooFewFeatures,
            0x44 => Self::SecondImageTooDisorderly,
            0x45 => Self::DuplicateFingerprint,
            other => Self::Other(other),
        }
    }
}

impl From<ConfirmationCode> for u8 {
    fn from(code: ConfirmationCode) -> Self {
        code.as_u8()
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_back_to_wire_value() {
        for raw in 0u8..=0xFF {
            assert_eq!(ConfirmationCode::from(raw).as_u8(), raw);
        }
    }

    #[test]
    fn test_success() {
        assert!(ConfirmationCode::from(0x00).is_success());
        assert!(!ConfirmationCode::from(0x02).is_success());
        assert_eq!(ConfirmationCode::from(0x13), ConfirmationCode::WrongPassword);
        assert_eq!(ConfirmationCode::from(0x7F), ConfirmationCode::Other(0x7F));
    }

    #[test]
    fn test_display() {
        let text = ConfirmationCode::NoFinger.to_string();
        assert!(text.contains("no finger"));
        assert!(text.contains("0x02"));
    }
}
