//! R30x frame codec.
//!
//! Every exchange with the module, in both directions, uses the same frame:
//!
//! ```text
//! +------------+---------+------+--------+-------------------+----------+
//! | Start code | Address | Type | Length |      Payload      | Checksum |
//! +------------+---------+------+--------+-------------------+----------+
//! |  2 bytes   | 4 bytes |  1   |   2    |  Length - 2 bytes |  2 bytes |
//! +------------+---------+------+--------+-------------------+----------+
//! | 0xEF 0x01  |  BE u32 | 0x01 | BE u16 | opcode + params   |  BE u16  |
//! |            |         | 0x07 |        | confirm + data    |          |
//! +------------+---------+------+--------+-------------------+----------+
//! ```
//!
//! The length field counts the payload plus the two checksum bytes. The
//! checksum is the 16-bit sum of the type byte, both length bytes and the
//! payload (see [`checksum`](super::checksum)).
//!
//! Everything here is pure: the transport-facing receive loop lives in
//! [`receiver`](super::receiver).

use byteorder::{BigEndian, ByteOrder};

use crate::error::ProtocolError;
use crate::protocol::checksum::Checksum;

/// Fixed start code of every frame.
pub const START_CODE: [u8; 2] = [0xEF, 0x01];

/// Size of start code, address, packet type and length.
pub const HEADER_LEN: usize = 9;

/// Size of the trailing checksum.
pub const CHECKSUM_LEN: usize = 2;

/// Largest payload whose length still fits the 16-bit length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - CHECKSUM_LEN;

/// Broadcast address modules answer to out of the box.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

/// Packet identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Host-to-module command (0x01).
    Command = 0x01,
    /// Data chunk with more to follow (0x02).
    Data = 0x02,
    /// Acknowledgement carrying a confirmation code (0x07).
    Ack = 0x07,
    /// Last data chunk of a stream (0x08).
    EndData = 0x08,
}

impl PacketType {
    /// Map a raw byte to a packet type.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Data),
            0x07 => Some(Self::Ack),
            0x08 => Some(Self::EndData),
            _ => None,
        }
    }

    /// Whether the module may send this type to the host.
    pub fn is_inbound(self) -> bool {
        !matches!(self, Self::Command)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_byte(byte).ok_or(ProtocolError::UnexpectedType(byte))
    }
}

impl From<PacketType> for u8 {
    fn from(ty: PacketType) -> Self {
        ty as u8
    }
}

/// Decoded first nine bytes of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Module address found in the frame.
    pub address: u32,
    /// Packet type.
    pub packet_type: PacketType,
    /// Declared length: payload plus checksum.
    pub length: u16,
}

impl Header {
    /// Parse an inbound header.
    ///
    /// Checks the start code and that the type is one the module sends.
    /// The address is returned as found; matching it is up to the caller.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        if bytes[..2] != START_CODE {
            return Err(ProtocolError::BadHeader);
        }
        let packet_type = PacketType::try_from(bytes[6])?;
        if !packet_type.is_inbound() {
            return Err(ProtocolError::UnexpectedType(bytes[6]));
        }
        Ok(Self {
            address: BigEndian::read_u32(&bytes[2..6]),
            packet_type,
            length: BigEndian::read_u16(&bytes[7..9]),
        })
    }

    /// Parse an inbound header that must come from `expected_address`.
    ///
    /// Checks run in wire order: start code, address, then packet type.
    pub fn parse_from(bytes: &[u8; HEADER_LEN], expected_address: u32) -> Result<Self, ProtocolError> {
        if bytes[..2] != START_CODE {
            return Err(ProtocolError::BadHeader);
        }
        let actual = BigEndian::read_u32(&bytes[2..6]);
        if actual != expected_address {
            return Err(ProtocolError::WrongAddress {
                expected: expected_address,
                actual,
            });
        }
        Self::parse(bytes)
    }

    /// Checksum seeded with the type and length bytes.
    pub fn checksum_seed(&self) -> Checksum {
        let mut sum = Checksum::new();
        sum.push(self.packet_type.into());
        sum.update(&self.length.to_be_bytes());
        sum
    }
}

/// Parse the nine header bytes of an inbound frame.
pub fn parse_header(bytes: &[u8; HEADER_LEN]) -> Result<Header, ProtocolError> {
    Header::parse(bytes)
}

/// One complete frame.
///
/// For command frames the payload starts with the opcode, for
/// acknowledgements with the confirmation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Module address.
    pub address: u32,
    /// Packet type.
    pub packet_type: PacketType,
    /// Everything between the length field and the checksum.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame.
    pub fn new(address: u32, packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self {
            address,
            packet_type,
            payload,
        }
    }

    /// Create a command frame for `opcode` with the given parameters.
    pub fn command(address: u32, opcode: u8, params: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(1 + params.len());
        payload.push(opcode);
        payload.extend_from_slice(params);
        Self::new(address, PacketType::Command, payload)
    }

    /// Value of the length field.
    #[allow(clippy::cast_possible_truncation)]
    pub fn length(&self) -> u16 {
        // Callers keep payloads within MAX_PAYLOAD_LEN
        (self.payload.len() + CHECKSUM_LEN) as u16
    }

    /// Checksum over type, length and payload.
    pub fn checksum(&self) -> u16 {
        let mut sum = Checksum::new();
        sum.push(self.packet_type.into());
        sum.update(&self.length().to_be_bytes());
        sum.update(&self.payload);
        sum.value()
    }

    /// Opcode of a command frame.
    pub fn opcode(&self) -> Option<u8> {
        match self.packet_type {
            PacketType::Command => self.payload.first().copied(),
            _ => None,
        }
    }

    /// Confirmation code of an acknowledgement.
    pub fn confirmation(&self) -> Option<u8> {
        match self.packet_type {
            PacketType::Ack => self.payload.first().copied(),
            _ => None,
        }
    }

    /// Payload after the leading opcode or confirmation byte.
    ///
    /// Data frames have no leading byte, so this is the whole payload.
    pub fn body(&self) -> &[u8] {
        match self.packet_type {
            PacketType::Command | PacketType::Ack => self.payload.get(1..).unwrap_or_default(),
            PacketType::Data | PacketType::EndData => &self.payload,
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD_LEN);

        let mut header = [0u8; HEADER_LEN];
        header[..2].copy_from_slice(&START_CODE);
        BigEndian::write_u32(&mut header[2..6], self.address);
        header[6] = self.packet_type.into();
        BigEndian::write_u16(&mut header[7..9], self.length());

        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + CHECKSUM_LEN);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.payload);
        let mut trailer = [0u8; CHECKSUM_LEN];
        BigEndian::write_u16(&mut trailer, self.checksum());
        buf.extend_from_slice(&trailer);
        buf
    }

    /// Decode one complete frame of any type from `bytes`.
    ///
    /// The buffer must hold exactly one frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN || bytes[..2] != START_CODE {
            return Err(ProtocolError::BadHeader);
        }
        let packet_type = PacketType::try_from(bytes[6])?;
        let length = usize::from(BigEndian::read_u16(&bytes[7..9]));
        if length < CHECKSUM_LEN || bytes.len() != HEADER_LEN + length {
            return Err(ProtocolError::BadHeader);
        }

        let split = bytes.len() - CHECKSUM_LEN;
        let frame = Self::new(
            BigEndian::read_u32(&bytes[2..6]),
            packet_type,
            bytes[HEADER_LEN..split].to_vec(),
        );
        let expected = frame.checksum();
        let actual = BigEndian::read_u16(&bytes[split..]);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }
        Ok(frame)
    }
}

/// Encode a command frame.
pub fn encode_command(address: u32, opcode: u8, params: &[u8]) -> Vec<u8> {
    Frame::command(address, opcode, params).encode()
}

/// Encode a frame of any type.
pub fn encode_frame(address: u32, packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    Frame::new(address, packet_type, payload.to_vec()).encode()
}

/// Decode a complete frame from a contiguous buffer.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    Frame::decode(bytes)
}
