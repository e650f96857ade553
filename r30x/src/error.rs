//! Error types for r30x.

use std::io;
use thiserror::Error;

use crate::confirm::ConfirmationCode;

/// Result type for r30x operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for r30x operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Transport failure that is not an OS-level I/O error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The received byte stream did not form a valid frame.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The sensor answered with a non-success confirmation code.
    #[error("Device error: {0}")]
    Device(ConfirmationCode),

    /// A parameter is outside the range the protocol allows.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Whether the error came from the transport rather than the protocol
    /// or the device.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io(_) | Self::Transport(_) => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }

    /// The protocol failure, if this is one.
    pub fn protocol(&self) -> Option<ProtocolError> {
        match self {
            Self::Protocol(e) => Some(*e),
            _ => None,
        }
    }

    /// The device confirmation code, if the device rejected the command.
    pub fn confirmation_code(&self) -> Option<ConfirmationCode> {
        match self {
            Self::Device(code) => Some(*code),
            _ => None,
        }
    }
}

/// Reasons a frame could not be received, reassembled or decoded.
///
/// None of these are retried by the library; the caller decides whether to
/// issue the command again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not enough bytes arrived before the deadline.
    #[error("timed out waiting for the sensor")]
    Timeout,

    /// The start marker was wrong or the declared length cannot hold the trailer.
    #[error("malformed frame header")]
    BadHeader,

    /// A well-formed frame was addressed to another module.
    #[error("frame addressed to {actual:#010x}, expected {expected:#010x}")]
    WrongAddress {
        /// Address the session talks to.
        expected: u32,
        /// Address found in the frame.
        actual: u32,
    },

    /// The packet type is unknown or not allowed at this point of the exchange.
    #[error("unexpected packet type {0:#04x}")]
    UnexpectedType(u8),

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u16,
        /// Checksum found in the frame trailer.
        actual: u16,
    },

    /// A valid frame carried fewer data bytes than the command's reply needs.
    #[error("reply of {actual} bytes is shorter than the expected {needed} bytes")]
    ShortReply {
        /// Bytes the reply must hold.
        needed: usize,
        /// Bytes the reply actually held.
        actual: usize,
    },

    /// A streamed transfer produced more data than the caller allowed.
    #[error("stream of {needed} bytes exceeds buffer capacity of {capacity} bytes")]
    BufferOverflow {
        /// Maximum number of bytes the caller accepts.
        capacity: usize,
        /// Number of bytes that would have been stored.
        needed: usize,
    },
}
