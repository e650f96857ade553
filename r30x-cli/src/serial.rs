//! Interactive serial port selection.
//!
//! A port is chosen from, in order: the `--port` flag, the config file and
//! discovery. Discovery prefers known USB-UART bridges; several candidates
//! are offered in a `dialoguer` prompt unless running non-interactively.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, info},
    r30x::{DetectedPort, detect_ports, format_port_list},
    std::io::IsTerminal,
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail if several ports match).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Select a serial port interactively or automatically.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<DetectedPort> {
    if let Some(port_name) = &options.port {
        return Ok(DetectedPort::new(port_name.as_str()));
    }

    if let Some(port_name) = &config.connection.serial {
        debug!("Using port from config: {port_name}");
        return Ok(DetectedPort::new(port_name.as_str()));
    }

    let candidates = candidate_ports(detect_ports(&config.usb_device));
    if options.non_interactive {
        return select_non_interactive_port(candidates);
    }

    match candidates.len() {
        0 => Err(usage_err("no serial ports found; connect the sensor or pass --port")),
        1 => {
            let port = candidates
                .into_iter()
                .next()
                .ok_or_else(|| usage_err("no serial ports found"))?;
            info!("Auto-selected port: {} [{}]", port.name, port.device.name());
            Ok(port)
        },
        _ => {
            ensure_interactive_terminal()?;
            select_port_interactive(candidates)
        },
    }
}

/// Known bridges if any were found, otherwise every port.
fn candidate_ports(ports: Vec<DetectedPort>) -> Vec<DetectedPort> {
    if ports.iter().any(DetectedPort::is_likely_sensor) {
        ports
            .into_iter()
            .filter(DetectedPort::is_likely_sensor)
            .collect()
    } else {
        ports
    }
}

fn select_non_interactive_port(candidates: Vec<DetectedPort>) -> Result<DetectedPort> {
    let mut candidates = candidates.into_iter();
    match (candidates.next(), candidates.next()) {
        (Some(port), None) => Ok(port),
        (Some(_), Some(_)) => Err(usage_err(
            "multiple serial ports found; select one with --port",
        )),
        (None, _) => Err(usage_err("no serial ports found; connect the sensor or pass --port")),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "several serial ports found and no terminal to prompt; select one with --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("port selection cancelled".to_string()).into()
            } else {
                usage_err("port selection prompt failed")
            }
        },
    }
}

fn select_port_interactive(ports: Vec<DetectedPort>) -> Result<DetectedPort> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    let term_width = usize::from(console::Term::stderr().size().1);
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = format_port_list(&ports)
        .into_iter()
        .map(|label| console::truncate_str(&label, max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the sensor's serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("port selection cancelled".to_string()).into()),
    }
}
