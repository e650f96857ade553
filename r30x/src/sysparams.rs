//! System parameter dump.
//!
//! ```text
//! offset  size  field
//!      0     2  status register
//!      2     2  system identifier
//!      4     2  finger library size
//!      6     2  security level
//!      8     4  module address
//!     12     2  data packet size code (0..=3 -> 32..=256 bytes)
//!     14     2  baud rate multiplier (x 9600)
//!     28    32  product name (extended dump only)
//! ```
//!
//! All fields are big-endian.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ProtocolError, Result};

/// Unit of the baud rate multiplier.
pub const BAUD_UNIT: u32 = 9600;

/// System parameters reported by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemParameters {
    /// Raw status register.
    pub status_register: u16,
    /// System identifier.
    pub system_id: u16,
    /// Number of template slots.
    pub library_size: u16,
    /// Matching threshold.
    pub security_level: u16,
    /// Module address.
    pub address: u32,
    /// Data packet size code.
    pub packet_size_code: u16,
    /// Baud rate in units of 9600.
    pub baud_multiplier: u16,
    /// Product name, when the module reports one.
    pub device_name: Option<String>,
}

impl SystemParameters {
    /// Size of the basic parameter block.
    pub const MIN_LEN: usize = 16;

    const NAME_RANGE: std::ops::Range<usize> = 28..60;

    /// Parse a parameter dump.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_LEN {
            log::warn!(
                "System parameter dump too short: {} bytes",
                data.len()
            );
            return Err(ProtocolError::ShortReply {
                needed: Self::MIN_LEN,
                actual: data.len(),
            }
            .into());
        }

        let device_name = data
            .get(Self::NAME_RANGE)
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_end_matches(['\0', ' '])
                    .to_string()
            })
            .filter(|name| !name.is_empty());

        Ok(Self {
            status_register: BigEndian::read_u16(&data[0..2]),
            system_id: BigEndian::read_u16(&data[2..4]),
            library_size: BigEndian::read_u16(&data[4..6]),
            security_level: BigEndian::read_u16(&data[6..8]),
            address: BigEndian::read_u32(&data[8..12]),
            packet_size_code: BigEndian::read_u16(&data[12..14]),
            baud_multiplier: BigEndian::read_u16(&data[14..16]),
            device_name,
        })
    }

    /// Data packet size in bytes, if the code is valid.
    pub fn packet_size(&self) -> Option<u16> {
        match self.packet_size_code {
            code @ 0..=3 => Some(32 << code),
            _ => None,
        }
    }

    /// Baud rate in bits per second.
    pub fn baud_rate(&self) -> u32 {
        u32::from(self.baud_multiplier) * BAUD_UNIT
    }

    /// The module is executing a command.
    pub fn is_busy(&self) -> bool {
        self.status_register & 0x0001 != 0
    }

    /// A finger matched in the last search.
    pub fn has_match(&self) -> bool {
        self.status_register & 0x0002 != 0
    }

    /// The handshake password has been verified.
    pub fn is_password_verified(&self) -> bool {
        self.status_register & 0x0004 != 0
    }

    /// The image buffer holds a valid image.
    pub fn has_valid_image(&self) -> bool {
        self.status_register & 0x0008 != 0
    }
}
