//! Transport abstraction for talking to the sensor.
//!
//! The protocol layer never touches a serial device directly. It drives a
//! [`Port`], which only has to offer four primitives:
//!
//! - a read that waits at most a short timeout and may return fewer bytes
//!   than requested (including zero),
//! - a write with a timeout that reports how many bytes went out,
//! - opening the link at a baud rate,
//! - closing it.
//!
//! ```text
//! +----------------------+
//! |  Session / commands  |
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+
//! |  Receiver / stream   |
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+     +----------------------+
//! |      Port trait      | <-- |  NativePort          |
//! +----------------------+     |  (serialport crate)  |
//!                              +----------------------+
//!                              |  ScriptedPort        |
//!                              |  (in-memory, tests)  |
//!                              +----------------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use r30x::port::{Port, ScriptedPort};
//! use std::time::Duration;
//!
//! fn probe<P: Port>(port: &mut P) -> r30x::Result<usize> {
//!     let mut buf = [0u8; 9];
//!     port.read(&mut buf, Duration::from_millis(1))
//! }
//!
//! let mut port = ScriptedPort::new();
//! port.push_incoming(&[0xEF, 0x01]);
//! assert_eq!(probe(&mut port).unwrap(), 2);
//! ```

pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use std::time::Duration;

use crate::error::{Error, Result};

pub use mock::ScriptedPort;
#[cfg(feature = "native")]
pub use native::NativePort;

/// Default baud rate of R30x modules (9600 x 6).
pub const DEFAULT_BAUD: u32 = 57600;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate used when the port is opened without an explicit rate.
    pub baud_rate: u32,
    /// Initial read/write timeout.
    pub timeout: Duration,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_millis(1),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
}

/// Byte transport used by the protocol layer.
///
/// Implementations must treat "no data yet" as a successful zero-byte read;
/// errors are reserved for failures of the link itself.
pub trait Port {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write up to `buf.len()` bytes, waiting at most `timeout`.
    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize>;

    /// Open (or reopen) the link at the given baud rate.
    fn open(&mut self, baud_rate: u32) -> Result<()>;

    /// Close the link. Closing a closed port is not an error.
    fn close(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str {
        "port"
    }

    /// Write every byte of `buf`, looping over short writes.
    fn write_all(&mut self, mut buf: &[u8], timeout: Duration) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf, timeout)?;
            if n == 0 {
                return Err(Error::Transport(format!(
                    "{}: write stalled with {} bytes pending",
                    self.name(),
                    buf.len()
                )));
            }
            buf = &buf[n.min(buf.len())..];
        }
        Ok(())
    }
}

impl<P: Port + ?Sized> Port for &mut P {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(buf, timeout)
    }

    fn open(&mut self, baud_rate: u32) -> Result<()> {
        (**self).open(baud_rate)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).read(buf, timeout)
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        (**self).write(buf, timeout)
    }

    fn open(&mut self, baud_rate: u32) -> Result<()> {
        (**self).open(baud_rate)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 115200).with_timeout(Duration::from_secs(5));

        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_write_all_loops_over_short_writes() {
        let mut port = ScriptedPort::new().with_write_limit(3);
        port.write_all(&[1, 2, 3, 4, 5, 6, 7], Duration::from_millis(1))
            .unwrap();
        assert_eq!(port.written(), &[1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_write_all_fails_when_nothing_is_written() {
        let mut port = ScriptedPort::new().with_write_limit(0);
        let err = port
            .write_all(&[1, 2], Duration::from_millis(1))
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_mut_ref_forwards() {
        let mut port = ScriptedPort::new();
        port.push_incoming(&[9, 8]);
        let mut borrowed = &mut port;
        let mut buf = [0u8; 4];
        assert_eq!(
            Port::read(&mut borrowed, &mut buf, Duration::ZERO).unwrap(),
            2
        );
        assert_eq!(&buf[..2], &[9, 8]);
    }
}
