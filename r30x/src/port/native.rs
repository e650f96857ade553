//! Native serial port implementation using the `serialport` crate.
//!
//! This module provides the serial port implementation for native platforms
//! (Linux, macOS, Windows, FreeBSD, etc.).

use {
    crate::{
        error::{Error, Result},
        port::{DataBits, FlowControl, Parity, Port, SerialConfig, StopBits},
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::{
        io::{self, Read, Write},
        time::Duration,
    },
};

/// Native serial port implementation.
///
/// The port is created closed; [`Port::open`] connects it at the requested
/// baud rate and [`Port::close`] releases the device again.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    config: SerialConfig,
    timeout: Duration,
}

impl NativePort {
    /// Create a closed port for the given configuration.
    pub fn new(config: SerialConfig) -> Self {
        let timeout = config.timeout;
        Self {
            port: None,
            config,
            timeout,
        }
    }

    /// Create and open a serial port at the configured baud rate.
    pub fn open_with(config: SerialConfig) -> Result<Self> {
        let baud_rate = config.baud_rate;
        let mut port = Self::new(config);
        port.open(baud_rate)?;
        Ok(port)
    }

    /// Current baud rate, if the port is open.
    pub fn baud_rate(&self) -> Option<u32> {
        self.port
            .as_ref()
            .map(|_| self.config.baud_rate)
    }

    /// Discard anything buffered in either direction.
    pub fn clear_buffers(&mut self) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn inner(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        let name = &self.config.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| Error::Transport(format!("{name}: port is closed")))
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout != self.timeout {
            self.inner()?
                .set_timeout(timeout)?;
            self.timeout = timeout;
        }
        Ok(())
    }
}

impl Port for NativePort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.apply_timeout(timeout)?;
        match self.inner()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            },
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        self.apply_timeout(timeout)?;
        let port = self.inner()?;
        match port.write(buf) {
            Ok(n) => {
                port.flush()?;
                Ok(n)
            },
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn open(&mut self, baud_rate: u32) -> Result<()> {
        // Reopening replaces any previous handle
        self.port
            .take();

        let port = serialport::new(&self.config.port_name, baud_rate)
            .timeout(self.timeout)
            .data_bits(
                self.config
                    .data_bits
                    .into(),
            )
            .parity(
                self.config
                    .parity
                    .into(),
            )
            .stop_bits(
                self.config
                    .stop_bits
                    .into(),
            )
            .flow_control(
                self.config
                    .flow_control
                    .into(),
            )
            .open()?;

        debug!("Opened {} at {baud_rate} baud", self.config.port_name);
        self.port = Some(port);
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port
            .take()
            .is_some()
        {
            trace!("Closed {}", self.config.port_name);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.port_name
    }
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
        }
    }
}
