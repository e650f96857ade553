//! Command implementations.
//!
//! Each subcommand group lives in its own module. Commands that talk to the
//! sensor go through [`with_session`], which resolves connection settings,
//! picks a port and runs the handshake.

pub(crate) mod completions;
pub(crate) mod image;
pub(crate) mod info;
pub(crate) mod library;
pub(crate) mod system;

use {
    crate::{Cli, config::Config, get_port},
    anyhow::{Context, Result},
    console::style,
    r30x::{
        ConfirmationCode, Error as SensorError, NativePort, Port, SerialConfig, Session, SessionState,
        SystemParameters, port::DEFAULT_BAUD, protocol::DEFAULT_ADDRESS,
        session::{DEFAULT_PASSWORD, DEFAULT_TIMEOUT},
    },
    std::{
        thread,
        time::{Duration, Instant},
    },
};

/// How long to wait for a finger before giving up.
const FINGER_WAIT: Duration = Duration::from_secs(10);

/// Pause between capture attempts.
const FINGER_POLL: Duration = Duration::from_millis(100);

/// Connection settings after merging flags, environment and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub baud: u32,
    pub address: u32,
    pub password: u32,
    pub timeout: Duration,
}

impl Settings {
    pub(crate) fn resolve(cli: &Cli, config: &Config) -> Self {
        let conn = &config.connection;
        Self {
            baud: cli.baud.or(conn.baud).unwrap_or(DEFAULT_BAUD),
            address: cli
                .address
                .or(conn.address)
                .unwrap_or(DEFAULT_ADDRESS),
            password: cli
                .password
                .or(conn.password)
                .unwrap_or(DEFAULT_PASSWORD),
            timeout: cli
                .timeout
                .or(conn.timeout_ms)
                .map_or(DEFAULT_TIMEOUT, Duration::from_millis),
        }
    }
}

/// Print a status line to stderr unless quiet.
pub(crate) fn status(cli: &Cli, symbol: console::StyledObject<&str>, message: &str) {
    if !cli.quiet {
        eprintln!("{symbol} {message}");
    }
}

/// Connect to the sensor and run `f` on an initialized session.
///
/// The port is closed afterwards whether `f` succeeds or not.
pub(crate) fn with_session<T, F>(cli: &Cli, config: &Config, f: F) -> Result<T>
where
    F: FnOnce(&mut Session<'_, NativePort>, &SystemParameters) -> Result<T>,
{
    let settings = Settings::resolve(cli, config);
    let port_name = get_port(cli, config)?;
    status(
        cli,
        style("→").cyan(),
        &format!("Using {port_name} at {} baud", settings.baud),
    );

    let mut port = NativePort::new(SerialConfig::new(port_name.as_str(), settings.baud));
    let result = {
        let state = SessionState {
            baud_rate: settings.baud,
            ..SessionState::with_address(settings.address)
        };
        let mut session = Session::with_state(&mut port, state).with_timeout(settings.timeout);
        match session.initialize(settings.password, settings.address) {
            Ok(params) => f(&mut session, &params),
            Err(e) => Err(anyhow::Error::from(e).context(format!("Failed to connect to sensor on {port_name}"))),
        }
    };
    let _ = port.close();
    result
}

/// Capture an image, retrying while no finger is on the sensor.
pub(crate) fn wait_for_finger(cli: &Cli, session: &mut Session<'_, NativePort>) -> Result<()> {
    status(cli, style("☝").yellow(), "Place a finger on the sensor");
    let deadline = Instant::now() + FINGER_WAIT;
    loop {
        match session.capture_image() {
            Ok(()) => return Ok(()),
            Err(SensorError::Device(ConfirmationCode::NoFinger)) if Instant::now() < deadline => {
                thread::sleep(FINGER_POLL);
            },
            Err(e) => return Err(e).context("Failed to capture finger image"),
        }
    }
}

/// Wait until the finger is lifted off the sensor.
pub(crate) fn wait_for_removal(cli: &Cli, session: &mut Session<'_, NativePort>) -> Result<()> {
    status(cli, style("☝").yellow(), "Remove the finger");
    let deadline = Instant::now() + FINGER_WAIT;
    loop {
        match session.capture_image() {
            Err(SensorError::Device(ConfirmationCode::NoFinger)) => return Ok(()),
            Ok(()) if Instant::now() < deadline => thread::sleep(FINGER_POLL),
            Ok(()) => anyhow::bail!("Finger was not removed within {} s", FINGER_WAIT.as_secs()),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    #[test]
    fn test_settings_defaults() {
        let cli = Cli::try_parse_from(["r30x", "count"]).unwrap();
        let settings = Settings::resolve(&cli, &Config::default());
        assert_eq!(settings, Settings {
            baud: 57600,
            address: 0xFFFF_FFFF,
            password: 0,
            timeout: Duration::from_millis(1000),
        });
    }

    #[test]
    fn test_settings_config_then_flags() {
        let mut config = Config::default();
        config.connection.baud = Some(115_200);
        config.connection.address = Some(0x0000_0001);
        config.connection.timeout_ms = Some(3000);

        let cli = Cli::try_parse_from(["r30x", "count"]).unwrap();
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.baud, 115_200);
        assert_eq!(settings.address, 1);
        assert_eq!(settings.timeout, Duration::from_secs(3));

        let cli = Cli::try_parse_from(["r30x", "-b", "9600", "--address", "2", "count"]).unwrap();
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.baud, 9600);
        assert_eq!(settings.address, 2);
        assert_eq!(settings.timeout, Duration::from_secs(3));
    }
}
