//! Time-bounded frame receiver.
//!
//! The transport may hand back any number of bytes per read, including none.
//! [`FrameReceiver`] keeps polling until each part of the frame is complete
//! or the phase runs out of time:
//!
//! ```text
//!   header (9) ──> [confirmation (1)] ──> payload (N) ──> checksum (2)
//!    1 ms polls        1 ms polls          10 ms polls      1 ms polls
//! ```
//!
//! Each phase counts its own elapsed time against the same timeout. Every
//! failed attempt advances the counter by the phase quantum and sleeps
//! briefly before the next read. A phase that stalls reports
//! [`ProtocolError::Timeout`]; nothing is ever returned half-filled.

use std::thread;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::error::{ProtocolError, Result};
use crate::port::Port;
use crate::protocol::packet::{CHECKSUM_LEN, Frame, HEADER_LEN, Header};

/// How the trailer of an inbound frame is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Command response: a confirmation byte is read on its own, then the
    /// data and the checksum.
    Response,
    /// Stream chunk: the whole payload is data, followed by the checksum.
    StreamChunk,
}

impl ReceiveMode {
    /// Bytes of the declared length that are not data.
    pub fn trailer_len(self) -> usize {
        match self {
            Self::Response => 1 + CHECKSUM_LEN,
            Self::StreamChunk => CHECKSUM_LEN,
        }
    }
}

/// Polling parameters of the receive loop.
///
/// Timeouts count polling attempts, not wall time: each attempt charges one
/// quantum no matter how long the read blocked or how long `retry_sleep`
/// lasted. With the defaults on a real port a phase may take about twice
/// its nominal timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Time charged per attempt while reading header, confirmation and
    /// checksum bytes. Also the read timeout passed to the port.
    pub poll_quantum: Duration,
    /// Time charged per attempt while reading payload bytes.
    pub payload_quantum: Duration,
    /// Pause between attempts.
    pub retry_sleep: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            poll_quantum: Duration::from_millis(1),
            payload_quantum: Duration::from_millis(10),
            retry_sleep: Duration::from_millis(1),
        }
    }
}

/// Assembles validated frames from a [`Port`].
pub struct FrameReceiver<'a, P: Port + ?Sized> {
    port: &'a mut P,
    config: ReceiverConfig,
}

impl<'a, P: Port + ?Sized> FrameReceiver<'a, P> {
    /// Create a receiver with the default polling parameters.
    pub fn new(port: &'a mut P) -> Self {
        Self {
            port,
            config: ReceiverConfig::default(),
        }
    }

    /// Create a receiver with custom polling parameters.
    pub fn with_config(port: &'a mut P, config: ReceiverConfig) -> Self {
        Self { port, config }
    }

    /// Receive one frame addressed to `expected_address`.
    ///
    /// In [`ReceiveMode::Response`] the returned payload starts with the
    /// confirmation byte, exactly as on the wire.
    pub fn receive(&mut self, expected_address: u32, mode: ReceiveMode, timeout: Duration) -> Result<Frame> {
        let mut raw = [0u8; HEADER_LEN];
        self.fill(&mut raw, self.config.poll_quantum, timeout, "header")?;

        let header = Header::parse_from(&raw, expected_address)?;

        let declared = usize::from(header.length);
        let data_len = declared
            .checked_sub(mode.trailer_len())
            .ok_or(ProtocolError::BadHeader)?;
        trace!(
            "Header: type {:?}, length {declared}, {data_len} data bytes",
            header.packet_type
        );

        let mut sum = header.checksum_seed();
        let mut payload = Vec::with_capacity(declared - CHECKSUM_LEN);

        if mode == ReceiveMode::Response {
            let mut confirmation = [0u8; 1];
            self.fill(&mut confirmation, self.config.poll_quantum, timeout, "confirmation")?;
            payload.push(confirmation[0]);
        }

        if data_len > 0 {
            let start = payload.len();
            payload.resize(start + data_len, 0);
            self.fill(&mut payload[start..], self.config.payload_quantum, timeout, "payload")?;
        }
        sum.update(&payload);

        let mut trailer = [0u8; CHECKSUM_LEN];
        self.fill(&mut trailer, self.config.poll_quantum, timeout, "checksum")?;

        let expected = sum.value();
        let actual = BigEndian::read_u16(&trailer);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual }.into());
        }

        Ok(Frame::new(header.address, header.packet_type, payload))
    }

    /// Fill `buf` completely, polling the port in `quantum` steps.
    fn fill(&mut self, buf: &mut [u8], quantum: Duration, timeout: Duration, phase: &str) -> Result<()> {
        let mut filled = 0;
        let mut elapsed = Duration::ZERO;

        loop {
            filled += self
                .port
                .read(&mut buf[filled..], quantum)?;
            if filled >= buf.len() {
                return Ok(());
            }

            elapsed += quantum;
            if elapsed >= timeout {
                trace!(
                    "Timed out in {phase} phase with {filled}/{} bytes",
                    buf.len()
                );
                return Err(ProtocolError::Timeout.into());
            }
            if !self.config.retry_sleep.is_zero() {
                thread::sleep(self.config.retry_sleep);
            }
        }
    }
}

/// Receive one frame with the default polling parameters.
pub fn receive_frame<P: Port + ?Sized>(
    port: &mut P,
    expected_address: u32,
    mode: ReceiveMode,
    timeout: Duration,
) -> Result<Frame> {
    FrameReceiver::new(port).receive(expected_address, mode, timeout)
}
