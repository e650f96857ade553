//! # r30x
//!
//! Host-side driver for R30x-family UART fingerprint sensor modules
//! (R303, R305, R307 and compatible).
//!
//! The crate is layered:
//!
//! - [`protocol`]: the frame codec, a time-bounded frame receiver and the
//!   multi-frame stream reassembler
//! - [`session`]: session state and the single `invoke` round-trip every
//!   command goes through
//! - [`commands`]: the module's command set on top of `invoke`
//! - [`port`]: the byte transport the protocol runs over, with a
//!   `serialport` backend and an in-memory scripted port
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use r30x::{NativePort, SerialConfig, Session};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut port = NativePort::new(SerialConfig::new("/dev/ttyUSB0", 57600));
//!     let mut session = Session::new(&mut port);
//!     let params = session.initialize(0x0000_0000, 0xFFFF_FFFF)?;
//!     println!("Library size: {}", params.library_size);
//!
//!     session.capture_image()?;
//!     let image = session.export_image()?;
//!     println!("Image: {} bytes", image.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commands;
pub mod confirm;
pub mod device;
pub mod error;
pub mod port;
pub mod protocol;
pub mod session;
pub mod sysparams;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    commands::{CharBuffer, SearchMatch},
    confirm::ConfirmationCode,
    device::{DetectedPort, DeviceKind, UsbId, auto_detect_port, detect_ports, format_port_list},
    error::{Error, ProtocolError, Result},
    port::{Port, ScriptedPort, SerialConfig},
    protocol::{Frame, PacketType, ReceiveMode, ReceiverConfig},
    session::{Phase, Response, Session, SessionState},
    sysparams::SystemParameters,
};
