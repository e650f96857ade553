//! Session state and the command round-trip.
//!
//! A [`Session`] borrows a [`Port`] exclusively and owns the
//! [`SessionState`] of the module behind it. Every command goes through
//! [`Session::invoke`]:
//!
//! ```text
//! Idle ──> Sending ──> AwaitingResponse ──┬──> Done    (Ack received)
//!                 │                       └──> Failed  (timeout, bad frame)
//!                 └──────────────────────────> Failed  (transport error)
//! ```
//!
//! A failed round-trip is never re-sent automatically.

use std::time::Duration;

use log::{debug, trace};

use crate::confirm::ConfirmationCode;
use crate::error::{Error, ProtocolError, Result};
use crate::port::{DEFAULT_BAUD, Port};
use crate::protocol::packet::{DEFAULT_ADDRESS, MAX_PAYLOAD_LEN, PacketType, encode_command};
use crate::protocol::receiver::{FrameReceiver, ReceiveMode, ReceiverConfig};
use crate::protocol::stream;

/// Receive timeout used by commands without a specific one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Factory password.
pub const DEFAULT_PASSWORD: u32 = 0x0000_0000;

/// Factory security level.
pub const DEFAULT_SECURITY_LEVEL: u16 = 3;

/// Factory data packet size in bytes.
pub const DEFAULT_CHUNK_SIZE: u16 = 128;

/// What the host knows about the module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionState {
    /// Module address.
    pub address: u32,
    /// Password last verified or set.
    pub password: u32,
    /// Baud rate of the link.
    pub baud_rate: u32,
    /// Matching threshold, 1 to 5.
    pub security_level: u16,
    /// Data packet size: 32, 64, 128 or 256.
    pub payload_chunk_size: u16,
    /// Size of the finger library as reported by the module.
    pub template_count: u16,
    /// Confirmation code of the last acknowledgement.
    pub last_confirmation_code: u8,
    /// Location reported by the last search, 1-based; 0 when nothing matched.
    pub last_finger_id: u16,
    /// Score reported by the last match or search.
    pub last_match_score: u16,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            password: DEFAULT_PASSWORD,
            baud_rate: DEFAULT_BAUD,
            security_level: DEFAULT_SECURITY_LEVEL,
            payload_chunk_size: DEFAULT_CHUNK_SIZE,
            template_count: 0,
            last_confirmation_code: 0,
            last_finger_id: 0,
            last_match_score: 0,
        }
    }
}

impl SessionState {
    /// Factory defaults with a specific module address.
    pub fn with_address(address: u32) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Progress of the most recent round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No command has been issued yet.
    #[default]
    Idle,
    /// Writing the command frame.
    Sending,
    /// Waiting for the acknowledgement.
    AwaitingResponse,
    /// An acknowledgement was received.
    Done,
    /// The round-trip ended with an error.
    Failed,
}

/// Decoded acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Confirmation code.
    pub code: ConfirmationCode,
    /// Data following the confirmation code.
    pub data: Vec<u8>,
}

impl Response {
    /// Whether the module reported success.
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// The data on success, [`Error::Device`] otherwise.
    pub fn into_result(self) -> Result<Vec<u8>> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(Error::Device(self.code))
        }
    }
}

/// Command session with one module.
pub struct Session<'a, P: Port + ?Sized> {
    pub(crate) port: &'a mut P,
    pub(crate) state: SessionState,
    receiver: ReceiverConfig,
    timeout: Duration,
    phase: Phase,
}

impl<'a, P: Port + ?Sized> Session<'a, P> {
    /// Create a session with factory defaults.
    pub fn new(port: &'a mut P) -> Self {
        Self::with_state(port, SessionState::default())
    }

    /// Create a session with a known state.
    pub fn with_state(port: &'a mut P, state: SessionState) -> Self {
        Self {
            port,
            state,
            receiver: ReceiverConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            phase: Phase::Idle,
        }
    }

    /// Use custom polling parameters for every receive.
    #[must_use]
    pub fn with_receiver_config(mut self, config: ReceiverConfig) -> Self {
        self.receiver = config;
        self
    }

    /// Change the default receive timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Consume the session, returning its state.
    pub fn into_state(self) -> SessionState {
        self.state
    }

    /// Phase of the most recent round-trip.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Confirmation code of the last acknowledgement.
    pub fn last_confirmation_code(&self) -> ConfirmationCode {
        ConfirmationCode::from(self.state.last_confirmation_code)
    }

    /// Default receive timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Name of the underlying port.
    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    /// Send one command and wait for its acknowledgement.
    ///
    /// A non-zero confirmation code is not an error here; it is returned in
    /// the [`Response`] for the caller to interpret.
    pub fn invoke(&mut self, opcode: u8, params: &[u8], timeout: Duration) -> Result<Response> {
        if params.len() >= MAX_PAYLOAD_LEN {
            return Err(Error::InvalidArgument(format!(
                "{} parameter bytes do not fit in one frame",
                params.len()
            )));
        }

        let result = self.round_trip(opcode, params, timeout);
        self.phase = match result {
            Ok(_) => Phase::Done,
            Err(_) => Phase::Failed,
        };
        result
    }

    fn round_trip(&mut self, opcode: u8, params: &[u8], timeout: Duration) -> Result<Response> {
        let address = self.state.address;

        self.phase = Phase::Sending;
        let frame = encode_command(address, opcode, params);
        trace!("-> {frame:02X?}");
        self.port
            .write_all(&frame, timeout)?;

        self.phase = Phase::AwaitingResponse;
        let reply = FrameReceiver::with_config(&mut *self.port, self.receiver).receive(
            address,
            ReceiveMode::Response,
            timeout,
        )?;
        if reply.packet_type != PacketType::Ack {
            return Err(ProtocolError::UnexpectedType(reply.packet_type.into()).into());
        }

        let code = reply
            .confirmation()
            .unwrap_or_default();
        self.state.last_confirmation_code = code;
        let code = ConfirmationCode::from(code);
        debug!("Command 0x{opcode:02X}: {code}");

        Ok(Response {
            code,
            data: reply.body().to_vec(),
        })
    }

    /// Invoke a command and turn a non-success code into [`Error::Device`].
    pub(crate) fn execute(&mut self, opcode: u8, params: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        self.invoke(opcode, params, timeout)?
            .into_result()
    }

    /// Invoke with the session timeout.
    pub(crate) fn execute_default(&mut self, opcode: u8, params: &[u8]) -> Result<Vec<u8>> {
        self.execute(opcode, params, self.timeout)
    }

    /// Collect a Data/EndData run sent by the module.
    pub(crate) fn receive_stream<F>(&mut self, capacity: usize, progress: F) -> Result<Vec<u8>>
    where
        F: FnMut(usize),
    {
        let mut receiver = FrameReceiver::with_config(&mut *self.port, self.receiver);
        stream::receive_stream(&mut receiver, self.state.address, capacity, self.timeout, progress)
    }

    /// Upload data to the module in session-sized chunks.
    pub(crate) fn send_stream(&mut self, data: &[u8]) -> Result<()> {
        stream::send_stream(
            &mut *self.port,
            self.state.address,
            data,
            usize::from(self.state.payload_chunk_size),
            self.timeout,
        )
    }
}
