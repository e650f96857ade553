//! r30x CLI - Command-line tool for R30x fingerprint sensor modules.
//!
//! ## Features
//!
//! - Read system parameters and the template count
//! - Enroll, search and delete fingerprints
//! - Export the captured finger image
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable and config file support

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    clap_complete::Shell,
    console::style,
    env_logger::Env,
    log::debug,
    std::{
        env,
        path::PathBuf,
        sync::atomic::{AtomicBool, Ordering},
    },
};

mod commands;
mod config;
mod serial;

use config::Config;
use serial::{SerialOptions, select_serial_port};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if progress bars and symbols should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing setup (exit code 2).
    #[error("{0}")]
    Usage(String),
    /// The user aborted an operation (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => 2,
            CliError::Cancelled(_) => 130,
        };
    }
    if let Some(r30x::Error::InvalidArgument(_)) = err.downcast_ref::<r30x::Error>() {
        return 2;
    }
    1
}

/// r30x - talk to R30x-family fingerprint sensors over a serial port.
///
/// Environment variables:
///   R30X_PORT              - Default serial port
///   R30X_BAUD              - Default baud rate (default: 57600)
///   R30X_ADDRESS           - Module address in hex (default: FFFFFFFF)
///   R30X_PASSWORD          - Handshake password in hex (default: 0)
///   R30X_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "r30x")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(
    after_help = "Examples:\n  r30x info\n  r30x -p /dev/ttyUSB0 enroll --location 1\n  r30x search"
)]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "R30X_PORT")]
    port: Option<String>,

    /// Baud rate of the module [default: 57600].
    #[arg(short, long, global = true, env = "R30X_BAUD")]
    baud: Option<u32>,

    /// Module address in hex [default: FFFFFFFF].
    #[arg(long, global = true, env = "R30X_ADDRESS", value_parser = parse_hex_u32)]
    address: Option<u32>,

    /// Handshake password in hex [default: 0].
    #[arg(long, global = true, env = "R30X_PASSWORD", value_parser = parse_hex_u32)]
    password: Option<u32>,

    /// Reply timeout in milliseconds [default: 1000].
    #[arg(long, global = true, value_name = "MS")]
    timeout: Option<u64>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "R30X_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the module's system parameters.
    Info {
        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print the number of stored templates.
    Count,

    /// Enroll a finger into the library.
    Enroll {
        /// Library location to store the template at (1-based).
        #[arg(short, long)]
        location: u16,
    },

    /// Capture a finger and search the whole library.
    Search,

    /// Delete templates from the library.
    Delete {
        /// First location to delete (1-based).
        #[arg(short, long)]
        start: u16,

        /// Number of templates to delete.
        #[arg(short, long, default_value = "1")]
        count: u16,
    },

    /// Delete every template in the library.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Capture a finger and save the raw image.
    ExportImage {
        /// File to write the image data to.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print a random number generated by the module.
    Random,

    /// Set the matching threshold (1 lenient to 5 strict).
    SetSecurity {
        /// Security level.
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        level: u8,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a hexadecimal value (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    let s: String = s
        .chars()
        .filter(|c| *c != '_')
        .collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex value: {e}"))
}

fn main() {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "r30x v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    if let Err(err) = run(&cli, &config) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Info { json } => commands::info::cmd_info(cli, config, *json),
        Commands::Count => commands::library::cmd_count(cli, config),
        Commands::Enroll { location } => commands::library::cmd_enroll(cli, config, *location),
        Commands::Search => commands::library::cmd_search(cli, config),
        Commands::Delete { start, count } => commands::library::cmd_delete(cli, config, *start, *count),
        Commands::Clear { yes } => commands::library::cmd_clear(cli, config, *yes),
        Commands::ExportImage { output } => commands::image::cmd_export_image(cli, config, output),
        Commands::Random => commands::system::cmd_random(cli, config),
        Commands::SetSecurity { level } => commands::system::cmd_set_security(cli, config, *level),
        Commands::ListPorts { json } => commands::info::cmd_list_ports(config, *json),
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Get serial port from CLI args, config or discovery.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };
    let selected = select_serial_port(&options, config)?;
    Ok(selected.name)
}
