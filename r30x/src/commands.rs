//! Module commands.
//!
//! Each command validates its parameters, routes one round-trip through
//! [`Session::invoke`] and maps the reply. A non-success confirmation code
//! becomes [`Error::Device`]. Parameter errors are reported as
//! [`Error::InvalidArgument`] before anything is sent.
//!
//! Library locations are 1-based here and 0-based on the wire.

use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use log::{info, warn};

use crate::error::{Error, ProtocolError, Result};
use crate::port::Port;
use crate::session::{Session, SessionState};
use crate::sysparams::{BAUD_UNIT, SystemParameters};

/// Instruction codes.
pub mod opcode {
    /// Capture a finger image.
    pub const GEN_IMAGE: u8 = 0x01;
    /// Generate a character file from the image.
    pub const IMAGE_TO_CHAR: u8 = 0x02;
    /// Compare the two character buffers.
    pub const MATCH: u8 = 0x03;
    /// Combine both buffers into a template.
    pub const REG_MODEL: u8 = 0x05;
    /// Store a template in the library.
    pub const STORE: u8 = 0x06;
    /// Load a template into a buffer.
    pub const LOAD_CHAR: u8 = 0x07;
    /// Upload a character buffer to the host.
    pub const UP_CHAR: u8 = 0x08;
    /// Download a character file into a buffer.
    pub const DOWN_CHAR: u8 = 0x09;
    /// Upload the image buffer to the host.
    pub const UP_IMAGE: u8 = 0x0A;
    /// Download an image into the image buffer.
    pub const DOWN_IMAGE: u8 = 0x0B;
    /// Delete templates.
    pub const DELETE_CHAR: u8 = 0x0C;
    /// Clear the library.
    pub const EMPTY: u8 = 0x0D;
    /// Write a system register.
    pub const SET_SYS_PARA: u8 = 0x0E;
    /// Set the handshake password.
    pub const SET_PASSWORD: u8 = 0x12;
    /// Verify the handshake password.
    pub const VERIFY_PASSWORD: u8 = 0x13;
    /// Read a random number.
    pub const GET_RANDOM: u8 = 0x14;
    /// Set the module address.
    pub const SET_ADDRESS: u8 = 0x15;
    /// Stream the full system parameter block.
    pub const READ_ALL_SYS_PARA: u8 = 0x16;
    /// Enable or disable the communication port.
    pub const PORT_CONTROL: u8 = 0x17;
    /// Write a notepad page.
    pub const WRITE_NOTEPAD: u8 = 0x18;
    /// Read a notepad page.
    pub const READ_NOTEPAD: u8 = 0x19;
    /// Search the library quickly.
    pub const HIGH_SPEED_SEARCH: u8 = 0x1B;
    /// Count stored templates.
    pub const TEMPLATE_COUNT: u8 = 0x1D;
    /// Capture and search a range of the library.
    pub const CAPTURE_RANGE_SEARCH: u8 = 0x32;
    /// Capture and search the whole library.
    pub const CAPTURE_FULL_SEARCH: u8 = 0x34;
}

/// System register numbers written by [`opcode::SET_SYS_PARA`].
mod register {
    pub const BAUD_RATE: u8 = 4;
    pub const SECURITY_LEVEL: u8 = 5;
    pub const PACKET_SIZE: u8 = 6;
}

/// Largest image dump, 256 x 288 pixels at 4 bits each.
pub const IMAGE_CAPACITY: usize = 36_864;

/// Largest character file dump.
pub const CHARACTER_CAPACITY: usize = 2048;

/// Largest system parameter dump.
pub const SYSTEM_PARAMETERS_CAPACITY: usize = 512;

/// Longest finger capture timeout accepted by the module.
pub const MAX_CAPTURE_TIMEOUT_MS: u16 = 25_500;

/// Highest location reachable by a range search.
pub const MAX_LOCATION: u16 = 1000;

/// Number of notepad pages.
pub const NOTEPAD_PAGES: u8 = 16;

/// Size of one notepad page.
pub const NOTEPAD_PAGE_LEN: usize = 32;

const FULL_SEARCH_TIMEOUT: Duration = Duration::from_millis(3000);
const CAPTURE_MARGIN: Duration = Duration::from_millis(100);
const CAPTURE_TIMEOUT_UNIT_MS: u16 = 140;

/// Character buffer of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharBuffer {
    /// Buffer 1.
    One = 1,
    /// Buffer 2.
    Two = 2,
}

impl TryFrom<u8> for CharBuffer {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(Error::InvalidArgument(format!(
                "buffer id {other} must be 1 or 2"
            ))),
        }
    }
}

impl From<CharBuffer> for u8 {
    fn from(buffer: CharBuffer) -> Self {
        buffer as u8
    }
}

/// Outcome of a successful search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SearchMatch {
    /// Matching location, 1-based.
    pub location: u16,
    /// Match score.
    pub score: u16,
}

fn invalid(message: String) -> Error {
    Error::InvalidArgument(message)
}

fn short_reply(data: &[u8], needed: usize) -> Error {
    warn!("Reply too short: {} bytes, expected {needed}", data.len());
    ProtocolError::ShortReply {
        needed,
        actual: data.len(),
    }
    .into()
}

fn be_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(BigEndian::read_u16)
        .ok_or_else(|| short_reply(data, offset + 2))
}

/// Check that `start..start + count` lies inside a library of `size` slots.
fn check_range(start: u16, count: u16, size: u16) -> Result<()> {
    if start == 0 || start > size {
        return Err(invalid(format!(
            "start location {start} is outside 1..={size}"
        )));
    }
    if count == 0 || u32::from(start) + u32::from(count) > u32::from(size) + 1 {
        return Err(invalid(format!(
            "{count} locations from {start} exceed the library size {size}"
        )));
    }
    Ok(())
}

impl<P: Port + ?Sized> Session<'_, P> {
    /// Open the port, verify the password and read the system parameters.
    ///
    /// The session state is reset to defaults with `address` first, keeping
    /// only the configured baud rate. If the port cannot be opened or the
    /// password is rejected the port is closed again.
    pub fn initialize(&mut self, password: u32, address: u32) -> Result<SystemParameters> {
        self.state = SessionState {
            baud_rate: self.state.baud_rate,
            ..SessionState::with_address(address)
        };

        let baud_rate = self.state.baud_rate;
        if let Err(e) = self.port.open(baud_rate) {
            let _ = self.port.close();
            return Err(e);
        }
        if let Err(e) = self.verify_password(password) {
            let _ = self.port.close();
            return Err(e);
        }

        let params = self.read_system_parameters()?;
        info!(
            "Connected to module {address:#010X} on {} at {baud_rate} baud",
            self.port.name()
        );
        Ok(params)
    }

    /// Verify the handshake password.
    pub fn verify_password(&mut self, password: u32) -> Result<()> {
        self.execute_default(opcode::VERIFY_PASSWORD, &password.to_be_bytes())?;
        self.state.password = password;
        Ok(())
    }

    /// Change the handshake password.
    pub fn set_password(&mut self, password: u32) -> Result<()> {
        self.execute_default(opcode::SET_PASSWORD, &password.to_be_bytes())?;
        self.state.password = password;
        Ok(())
    }

    /// Change the module address.
    pub fn set_address(&mut self, address: u32) -> Result<()> {
        self.execute_default(opcode::SET_ADDRESS, &address.to_be_bytes())?;
        self.state.address = address;
        Ok(())
    }

    /// Change the baud rate and reopen the port at the new rate.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if !(9600..=115_200).contains(&baud_rate) || baud_rate % BAUD_UNIT != 0 {
            return Err(invalid(format!(
                "baud rate {baud_rate} must be a multiple of 9600 between 9600 and 115200"
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        let multiplier = (baud_rate / BAUD_UNIT) as u8;

        self.execute_default(opcode::SET_SYS_PARA, &[register::BAUD_RATE, multiplier])?;
        self.state.baud_rate = baud_rate;

        self.port.close()?;
        if let Err(e) = self.port.open(baud_rate) {
            warn!("Failed to reopen {} at {baud_rate} baud: {e}", self.port.name());
            return Err(e);
        }
        info!("Baud rate changed to {baud_rate}");
        Ok(())
    }

    /// Set the matching threshold, 1 (lenient) to 5 (strict).
    pub fn set_security_level(&mut self, level: u8) -> Result<()> {
        if !(1..=5).contains(&level) {
            return Err(invalid(format!("security level {level} must be between 1 and 5")));
        }
        self.execute_default(opcode::SET_SYS_PARA, &[register::SECURITY_LEVEL, level])?;
        self.state.security_level = u16::from(level);
        Ok(())
    }

    /// Set the data packet size: 32, 64, 128 or 256 bytes.
    pub fn set_payload_chunk_size(&mut self, size: u16) -> Result<()> {
        let code = match size {
            32 => 0,
            64 => 1,
            128 => 2,
            256 => 3,
            other => {
                return Err(invalid(format!(
                    "packet size {other} must be 32, 64, 128 or 256"
                )));
            },
        };
        self.execute_default(opcode::SET_SYS_PARA, &[register::PACKET_SIZE, code])?;
        self.state.payload_chunk_size = size;
        Ok(())
    }

    /// Enable or disable the module's communication port.
    pub fn set_port_enabled(&mut self, enabled: bool) -> Result<()> {
        self.execute_default(opcode::PORT_CONTROL, &[u8::from(enabled)])?;
        Ok(())
    }

    /// Read the full system parameter block and update the session.
    ///
    /// Library size, security level, packet size and baud rate are taken
    /// over. The session address is not: replies are already filtered by it,
    /// so a differing address in the dump is only logged.
    pub fn read_system_parameters(&mut self) -> Result<SystemParameters> {
        self.execute_default(opcode::READ_ALL_SYS_PARA, &[])?;
        let dump = self.receive_stream(SYSTEM_PARAMETERS_CAPACITY, |_| {})?;
        let params = SystemParameters::parse(&dump)?;

        if params.address != self.state.address {
            warn!(
                "Module reports address {:#010X}, session uses {:#010X}",
                params.address, self.state.address
            );
        }

        self.state.template_count = params.library_size;
        self.state.security_level = params.security_level;
        if let Some(size) = params.packet_size() {
            self.state.payload_chunk_size = size;
        }
        if params.baud_multiplier > 0 {
            self.state.baud_rate = params.baud_rate();
        }
        Ok(params)
    }

    /// Number of templates stored in the library.
    pub fn template_count(&mut self) -> Result<u16> {
        let data = self.execute_default(opcode::TEMPLATE_COUNT, &[])?;
        be_u16(&data, 0)
    }

    /// Capture a finger and search `count` locations from `start`.
    pub fn capture_and_range_search(&mut self, capture_timeout_ms: u16, start: u16, count: u16) -> Result<SearchMatch> {
        if capture_timeout_ms > MAX_CAPTURE_TIMEOUT_MS {
            return Err(invalid(format!(
                "capture timeout {capture_timeout_ms} ms exceeds {MAX_CAPTURE_TIMEOUT_MS} ms"
            )));
        }
        if start == 0 || start > self.state.template_count {
            return Err(invalid(format!(
                "start location {start} is outside 1..={}",
                self.state.template_count
            )));
        }
        if u32::from(start) + u32::from(count) > u32::from(MAX_LOCATION) + 1 {
            return Err(invalid(format!(
                "{count} locations from {start} exceed location {MAX_LOCATION}"
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let timeout_code = (capture_timeout_ms / CAPTURE_TIMEOUT_UNIT_MS) as u8;
        let mut params = [timeout_code, 0, 0, 0, 0];
        BigEndian::write_u16(&mut params[1..3], start - 1);
        BigEndian::write_u16(&mut params[3..5], count);

        let timeout = Duration::from_millis(u64::from(capture_timeout_ms)) + CAPTURE_MARGIN;
        self.search(opcode::CAPTURE_RANGE_SEARCH, &params, timeout)
    }

    /// Capture a finger and search the whole library.
    pub fn capture_and_full_search(&mut self) -> Result<SearchMatch> {
        self.search(opcode::CAPTURE_FULL_SEARCH, &[], FULL_SEARCH_TIMEOUT)
    }

    /// Search `count` locations from `start` for the character file in `buffer`.
    pub fn high_speed_search(&mut self, buffer: CharBuffer, start: u16, count: u16) -> Result<SearchMatch> {
        check_range(start, count, self.state.template_count)?;
        let mut params = [buffer.into(), 0, 0, 0, 0];
        BigEndian::write_u16(&mut params[1..3], start - 1);
        BigEndian::write_u16(&mut params[3..5], count);
        self.search(opcode::HIGH_SPEED_SEARCH, &params, self.timeout())
    }

    fn search(&mut self, opcode: u8, params: &[u8], timeout: Duration) -> Result<SearchMatch> {
        let response = self.invoke(opcode, params, timeout)?;
        if !response.is_success() {
            self.state.last_finger_id = 0;
            self.state.last_match_score = 0;
            return Err(Error::Device(response.code));
        }

        let page = be_u16(&response.data, 0)?;
        let score = be_u16(&response.data, 2)?;
        let found = SearchMatch {
            location: page.saturating_add(1),
            score,
        };
        self.state.last_finger_id = found.location;
        self.state.last_match_score = found.score;
        Ok(found)
    }

    /// Capture a finger image into the image buffer.
    pub fn capture_image(&mut self) -> Result<()> {
        self.execute_default(opcode::GEN_IMAGE, &[])?;
        Ok(())
    }

    /// Download the image buffer.
    pub fn export_image(&mut self) -> Result<Vec<u8>> {
        self.export_image_with_progress(|_| {})
    }

    /// Download the image buffer, reporting the bytes received so far.
    pub fn export_image_with_progress<F>(&mut self, progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize),
    {
        self.execute_default(opcode::UP_IMAGE, &[])?;
        self.receive_stream(IMAGE_CAPACITY, progress)
    }

    /// Upload an image into the image buffer.
    pub fn import_image(&mut self, image: &[u8]) -> Result<()> {
        if image.len() > IMAGE_CAPACITY {
            return Err(invalid(format!(
                "image of {} bytes exceeds {IMAGE_CAPACITY} bytes",
                image.len()
            )));
        }
        self.execute_default(opcode::DOWN_IMAGE, &[])?;
        self.send_stream(image)
    }

    /// Turn the image buffer into a character file in `buffer`.
    pub fn image_to_character(&mut self, buffer: CharBuffer) -> Result<()> {
        self.execute_default(opcode::IMAGE_TO_CHAR, &[buffer.into()])?;
        Ok(())
    }

    /// Merge both character buffers into a template.
    pub fn generate_template(&mut self) -> Result<()> {
        self.execute_default(opcode::REG_MODEL, &[])?;
        Ok(())
    }

    /// Download the character file in `buffer`.
    pub fn export_character(&mut self, buffer: CharBuffer) -> Result<Vec<u8>> {
        self.execute_default(opcode::UP_CHAR, &[buffer.into()])?;
        self.receive_stream(CHARACTER_CAPACITY, |_| {})
    }

    /// Upload a character file into `buffer`.
    pub fn import_character(&mut self, buffer: CharBuffer, data: &[u8]) -> Result<()> {
        if data.len() > CHARACTER_CAPACITY {
            return Err(invalid(format!(
                "character file of {} bytes exceeds {CHARACTER_CAPACITY} bytes",
                data.len()
            )));
        }
        self.execute_default(opcode::DOWN_CHAR, &[buffer.into()])?;
        self.send_stream(data)
    }

    /// Store the template in `buffer` at `location`.
    pub fn save_template(&mut self, buffer: CharBuffer, location: u16) -> Result<()> {
        let page = self.page_of(location)?;
        let mut params = [buffer.into(), 0, 0];
        BigEndian::write_u16(&mut params[1..], page);
        self.execute_default(opcode::STORE, &params)?;
        Ok(())
    }

    /// Load the template at `location` into `buffer`.
    pub fn load_template(&mut self, buffer: CharBuffer, location: u16) -> Result<()> {
        let page = self.page_of(location)?;
        let mut params = [buffer.into(), 0, 0];
        BigEndian::write_u16(&mut params[1..], page);
        self.execute_default(opcode::LOAD_CHAR, &params)?;
        Ok(())
    }

    fn page_of(&self, location: u16) -> Result<u16> {
        let size = self.state.template_count;
        if location == 0 || location > size {
            return Err(invalid(format!("location {location} is outside 1..={size}")));
        }
        Ok(location - 1)
    }

    /// Delete `count` templates starting at `start`.
    pub fn delete_templates(&mut self, start: u16, count: u16) -> Result<()> {
        check_range(start, count, self.state.template_count)?;
        let mut params = [0u8; 4];
        BigEndian::write_u16(&mut params[..2], start - 1);
        BigEndian::write_u16(&mut params[2..], count);
        self.execute_default(opcode::DELETE_CHAR, &params)?;
        Ok(())
    }

    /// Delete every template.
    pub fn clear_library(&mut self) -> Result<()> {
        self.execute_default(opcode::EMPTY, &[])?;
        Ok(())
    }

    /// Compare the two character buffers, returning the match score.
    pub fn match_buffers(&mut self) -> Result<u16> {
        let data = self.execute_default(opcode::MATCH, &[])?;
        let score = be_u16(&data, 0)?;
        self.state.last_match_score = score;
        Ok(score)
    }

    /// Read a random number generated by the module.
    pub fn random_number(&mut self) -> Result<u32> {
        let data = self.execute_default(opcode::GET_RANDOM, &[])?;
        data.get(..4)
            .map(BigEndian::read_u32)
            .ok_or_else(|| short_reply(&data, 4))
    }

    /// Read one 32-byte notepad page.
    pub fn read_notepad(&mut self, page: u8) -> Result<[u8; NOTEPAD_PAGE_LEN]> {
        Self::check_notepad_page(page)?;
        let data = self.execute_default(opcode::READ_NOTEPAD, &[page])?;
        let mut out = [0u8; NOTEPAD_PAGE_LEN];
        let n = data.len().min(NOTEPAD_PAGE_LEN);
        out[..n].copy_from_slice(&data[..n]);
        Ok(out)
    }

    /// Write up to 32 bytes to a notepad page; the rest is zero filled.
    pub fn write_notepad(&mut self, page: u8, data: &[u8]) -> Result<()> {
        Self::check_notepad_page(page)?;
        if data.len() > NOTEPAD_PAGE_LEN {
            return Err(invalid(format!(
                "notepad data of {} bytes exceeds {NOTEPAD_PAGE_LEN} bytes",
                data.len()
            )));
        }
        let mut params = [0u8; 1 + NOTEPAD_PAGE_LEN];
        params[0] = page;
        params[1..=data.len()].copy_from_slice(data);
        self.execute_default(opcode::WRITE_NOTEPAD, &params)?;
        Ok(())
    }

    fn check_notepad_page(page: u8) -> Result<()> {
        if page >= NOTEPAD_PAGES {
            return Err(invalid(format!(
                "notepad page {page} must be below {NOTEPAD_PAGES}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ConfirmationCode;
    use crate::port::ScriptedPort;
    use crate::protocol::packet::{DEFAULT_ADDRESS, PacketType, decode_frame, encode_frame};
    use crate::protocol::receiver::ReceiverConfig;

    fn fast() -> ReceiverConfig {
        ReceiverConfig {
            retry_sleep: Duration::ZERO,
            ..ReceiverConfig::default()
        }
    }

    fn ack(payload: &[u8]) -> Vec<u8> {
        encode_frame(DEFAULT_ADDRESS, PacketType::Ack, payload)
    }

    fn with_library(port: &mut ScriptedPort, size: u16) -> Session<'_, ScriptedPort> {
        let state = SessionState {
            template_count: size,
            ..SessionState::default()
        };
        Session::with_state(port, state).with_receiver_config(fast())
    }

    fn sent(port: &ScriptedPort) -> (u8, Vec<u8>) {
        let frame = decode_frame(port.written()).unwrap();
        (
            frame.opcode().unwrap(),
            frame.body().to_vec(),
        )
    }

    #[test]
    fn test_verify_password_updates_state() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session.verify_password(0x0102_0304).unwrap();
        assert_eq!(session.state().password, 0x0102_0304);
        assert_eq!(sent(&port), (0x13, vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_wrong_password_keeps_state() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x13]));
        let mut session = with_library(&mut port, 0);
        let err = session
            .set_password(7)
            .unwrap_err();
        assert_eq!(err.confirmation_code(), Some(ConfirmationCode::WrongPassword));
        assert_eq!(session.state().password, 0);
    }

    #[test]
    fn test_set_password_updates_state() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session.set_password(0x0000_1234).unwrap();
        assert_eq!(session.state().password, 0x0000_1234);
        assert_eq!(sent(&port), (0x12, vec![0x00, 0x00, 0x12, 0x34]));
    }

    #[test]
    fn test_set_address_switches_following_frames() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&encode_frame(7, PacketType::Ack, &[0x00, 0x00, 0x05]));
        port.push_incoming(&ack(&[0x00, 0x00, 0x05]));
        let mut session = with_library(&mut port, 0);

        session.set_address(7).unwrap();
        assert_eq!(session.state().address, 7);
        assert_eq!(session.template_count().unwrap(), 5);

        // a reply from the old address is no longer accepted
        let err = session.template_count().unwrap_err();
        assert_eq!(
            err.protocol(),
            Some(ProtocolError::WrongAddress {
                expected: 7,
                actual: DEFAULT_ADDRESS
            })
        );

        let written = port.written();
        let command = decode_frame(&written[..16]).unwrap();
        assert_eq!(command.address, DEFAULT_ADDRESS);
        assert_eq!(command.opcode(), Some(0x15));
        assert_eq!(command.body(), &[0, 0, 0, 7]);
        assert_eq!(&written[18..22], &[0, 0, 0, 7]);
        assert_eq!(&written[30..34], &[0, 0, 0, 7]);
    }

    #[test]
    fn test_rejected_set_address_keeps_old_address() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x01]));
        port.push_incoming(&ack(&[0x00, 0x00, 0x02]));
        let mut session = with_library(&mut port, 0);

        let err = session.set_address(7).unwrap_err();
        assert_eq!(err.confirmation_code(), Some(ConfirmationCode::ReceiveError));
        assert_eq!(session.state().address, DEFAULT_ADDRESS);
        assert_eq!(session.template_count().unwrap(), 2);
        assert_eq!(&port.written()[18..22], &[0xFF; 4]);
    }

    #[test]
    fn test_set_port_enabled_payload() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session.set_port_enabled(true).unwrap();
        session.set_port_enabled(false).unwrap();

        let written = port.written();
        let on = decode_frame(&written[..13]).unwrap();
        let off = decode_frame(&written[13..]).unwrap();
        assert_eq!((on.opcode(), on.body()), (Some(0x17), &[1u8][..]));
        assert_eq!((off.opcode(), off.body()), (Some(0x17), &[0u8][..]));
    }

    #[test]
    fn test_read_system_parameters_keeps_session_address() {
        let mut dump = vec![0u8; 16];
        dump[4..6].copy_from_slice(&300u16.to_be_bytes());
        dump[6..8].copy_from_slice(&3u16.to_be_bytes());
        dump[8..12].copy_from_slice(&7u32.to_be_bytes());
        dump[12..14].copy_from_slice(&2u16.to_be_bytes());
        dump[14..16].copy_from_slice(&6u16.to_be_bytes());

        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&encode_frame(DEFAULT_ADDRESS, PacketType::EndData, &dump));
        let mut session = with_library(&mut port, 0);
        let params = session.read_system_parameters().unwrap();

        assert_eq!(params.address, 7);
        assert_eq!(session.state().address, DEFAULT_ADDRESS);
        assert_eq!(session.state().template_count, 300);
        assert_eq!(session.state().security_level, 3);
        assert_eq!(session.state().payload_chunk_size, 128);
        assert_eq!(session.state().baud_rate, 57_600);
    }

    #[test]
    fn test_short_reply_is_a_protocol_error() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&ack(&[0x00, 0x01, 0x02]));
        let mut session = with_library(&mut port, 0);

        let err = session.template_count().unwrap_err();
        assert_eq!(
            err.protocol(),
            Some(ProtocolError::ShortReply {
                needed: 2,
                actual: 0
            })
        );
        assert_eq!(err.confirmation_code(), None);

        let err = session.random_number().unwrap_err();
        assert_eq!(
            err.protocol(),
            Some(ProtocolError::ShortReply {
                needed: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn test_set_baud_rate_validation() {
        let mut port = ScriptedPort::new();
        let mut session = with_library(&mut port, 0);
        for bad in [0, 4800, 10_000, 124_800, 230_400] {
            assert!(matches!(
                session.set_baud_rate(bad),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(port.written().is_empty());
    }

    #[test]
    fn test_set_baud_rate_reopens_at_new_rate() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session.set_baud_rate(115_200).unwrap();
        assert_eq!(session.state().baud_rate, 115_200);
        assert_eq!(sent(&port), (0x0E, vec![4, 12]));
        assert_eq!(port.close_calls(), 1);
        assert_eq!(port.open_history(), &[115_200]);
    }

    #[test]
    fn test_security_level_and_packet_size() {
        let mut port = ScriptedPort::new();
        let mut session = with_library(&mut port, 0);
        assert!(session.set_security_level(0).is_err());
        assert!(session.set_security_level(6).is_err());
        assert!(session.set_payload_chunk_size(100).is_err());
        assert!(port.written().is_empty());

        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session.set_security_level(5).unwrap();
        session.set_payload_chunk_size(256).unwrap();
        assert_eq!(session.state().security_level, 5);
        assert_eq!(session.state().payload_chunk_size, 256);
    }

    #[test]
    fn test_range_search_payload_and_result() {
        let mut port = ScriptedPort::new();
        // page 4, score 0x0123
        port.push_incoming(&ack(&[0x00, 0x00, 0x04, 0x01, 0x23]));
        let mut session = with_library(&mut port, 1000);
        let found = session
            .capture_and_range_search(2800, 1, 1000)
            .unwrap();
        assert_eq!(found, SearchMatch {
            location: 5,
            score: 0x0123
        });
        assert_eq!(session.state().last_finger_id, 5);
        assert_eq!(sent(&port), (0x32, vec![20, 0x00, 0x00, 0x03, 0xE8]));
    }

    #[test]
    fn test_range_search_validation() {
        let mut port = ScriptedPort::new();
        let mut session = with_library(&mut port, 1000);
        assert!(session.capture_and_range_search(25_501, 1, 10).is_err());
        assert!(session.capture_and_range_search(1000, 0, 10).is_err());
        assert!(session.capture_and_range_search(1000, 1001, 1).is_err());
        assert!(session.capture_and_range_search(1000, 500, 502).is_err());
        assert!(port.written().is_empty());
    }

    #[test]
    fn test_failed_search_clears_match() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00, 0x00, 0x01, 0x00, 0x50]));
        port.push_incoming(&ack(&[0x09]));
        let mut session = with_library(&mut port, 100);
        session.capture_and_full_search().unwrap();
        assert_eq!(session.state().last_finger_id, 2);

        let err = session
            .capture_and_full_search()
            .unwrap_err();
        assert_eq!(err.confirmation_code(), Some(ConfirmationCode::NotFound));
        assert_eq!(session.state().last_finger_id, 0);
        assert_eq!(session.state().last_match_score, 0);
    }

    #[test]
    fn test_delete_range_rules() {
        let mut port = ScriptedPort::new();
        let mut session = with_library(&mut port, 10);
        assert!(session.delete_templates(0, 1).is_err());
        assert!(session.delete_templates(11, 1).is_err());
        assert!(session.delete_templates(5, 0).is_err());
        assert!(session.delete_templates(5, 7).is_err());
        assert!(port.written().is_empty());

        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 10);
        session.delete_templates(5, 6).unwrap();
        assert_eq!(sent(&port), (0x0C, vec![0x00, 0x04, 0x00, 0x06]));
    }

    #[test]
    fn test_save_template_uses_zero_based_page() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 200);
        assert!(session.save_template(CharBuffer::One, 201).is_err());
        session.save_template(CharBuffer::Two, 200).unwrap();
        assert_eq!(sent(&port), (0x06, vec![2, 0x00, 199]));
    }

    #[test]
    fn test_load_template_uses_zero_based_page() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 300);
        assert!(session.load_template(CharBuffer::One, 0).is_err());
        assert!(session.load_template(CharBuffer::One, 301).is_err());
        session.load_template(CharBuffer::Two, 300).unwrap();
        assert_eq!(sent(&port), (0x07, vec![2, 0x01, 0x2B]));
    }

    #[test]
    fn test_char_buffer_from_id() {
        assert_eq!(CharBuffer::try_from(1).unwrap(), CharBuffer::One);
        assert_eq!(CharBuffer::try_from(2).unwrap(), CharBuffer::Two);
        assert!(CharBuffer::try_from(3).is_err());
    }

    #[test]
    fn test_random_number_and_match_score() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00, 0xDE, 0xAD, 0xBE, 0xEF]));
        port.push_incoming(&ack(&[0x00, 0x00, 0x64]));
        let mut session = with_library(&mut port, 0);
        assert_eq!(session.random_number().unwrap(), 0xDEAD_BEEF);
        assert_eq!(session.match_buffers().unwrap(), 100);
        assert_eq!(session.state().last_match_score, 100);
    }

    #[test]
    fn test_notepad() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        assert!(session.write_notepad(16, &[]).is_err());
        assert!(session.write_notepad(0, &[0; 33]).is_err());
        session.write_notepad(3, b"hello").unwrap();

        let (op, body) = sent(&port);
        assert_eq!(op, 0x18);
        assert_eq!(body.len(), 33);
        assert_eq!(body[0], 3);
        assert_eq!(&body[1..6], b"hello");
        assert!(body[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_export_character_streams_reply() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        port.push_incoming(&encode_frame(DEFAULT_ADDRESS, PacketType::Data, &[1; 128]));
        port.push_incoming(&encode_frame(DEFAULT_ADDRESS, PacketType::EndData, &[2; 128]));
        let mut session = with_library(&mut port, 0);
        let data = session
            .export_character(CharBuffer::One)
            .unwrap();
        assert_eq!(data.len(), 256);
        assert_eq!(data[127], 1);
        assert_eq!(data[128], 2);
    }

    #[test]
    fn test_notepad_read_pads_short_page() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00, b'a', b'b']));
        let mut session = with_library(&mut port, 0);
        assert!(session.read_notepad(NOTEPAD_PAGES).is_err());
        let page = session.read_notepad(5).unwrap();

        assert_eq!(&page[..2], b"ab");
        assert!(page[2..].iter().all(|&b| b == 0));
        assert_eq!(sent(&port), (0x19, vec![5]));
    }

    #[test]
    fn test_import_character_sends_command_then_stream() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        assert!(matches!(
            session.import_character(CharBuffer::One, &[0; CHARACTER_CAPACITY + 1]),
            Err(Error::InvalidArgument(_))
        ));
        session
            .import_character(CharBuffer::Two, &[0xAB; 200])
            .unwrap();

        let written = port.written();
        let command = decode_frame(&written[..13]).unwrap();
        assert_eq!(command.opcode(), Some(0x09));
        assert_eq!(command.body(), &[2]);

        // 128 bytes of data, then the last 72 bytes as the end of the stream
        let data = decode_frame(&written[13..13 + 11 + 128]).unwrap();
        let end = decode_frame(&written[13 + 11 + 128..]).unwrap();
        assert_eq!(data.packet_type, PacketType::Data);
        assert_eq!(data.payload, vec![0xAB; 128]);
        assert_eq!(end.packet_type, PacketType::EndData);
        assert_eq!(end.payload, vec![0xAB; 72]);
    }

    #[test]
    fn test_import_image_sends_command_then_stream() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&ack(&[0x00]));
        let mut session = with_library(&mut port, 0);
        session
            .import_image(&[0x55; 300])
            .unwrap();

        let written = port.written();
        let command = decode_frame(&written[..12]).unwrap();
        assert_eq!(command.opcode(), Some(0x0B));
        // 128 + 128 + 44 bytes of data after the command frame
        let data_frames = &written[12..];
        assert_eq!(data_frames.len(), 3 * 11 + 300);
        assert_eq!(data_frames[6], 0x02);
        assert_eq!(data_frames[11 + 128 + 6], 0x02);
        assert_eq!(data_frames[2 * (11 + 128) + 6], 0x08);
    }
}
