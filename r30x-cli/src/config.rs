//! Configuration file support for r30x.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (R30X_*)
//! 3. Local config file (./r30x.toml)
//! 4. Global config file (~/.config/r30x/config.toml)

use {
    directories::ProjectDirs,
    log::{debug, warn},
    r30x::UsbId,
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Local configuration file name.
const LOCAL_CONFIG: &str = "r30x.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Baud rate the module is configured for.
    pub baud: Option<u32>,
    /// Module address.
    pub address: Option<u32>,
    /// Handshake password.
    pub password: Option<u32>,
    /// Reply timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// USB adapters to treat as known sensor bridges.
    #[serde(default)]
    pub usb_device: Vec<UsbId>,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "r30x").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        let conn = other.connection;
        if conn.serial.is_some() {
            self.connection.serial = conn.serial;
        }
        if conn.baud.is_some() {
            self.connection.baud = conn.baud;
        }
        if conn.address.is_some() {
            self.connection.address = conn.address;
        }
        if conn.password.is_some() {
            self.connection.password = conn.password;
        }
        if conn.timeout_ms.is_some() {
            self.connection.timeout_ms = conn.timeout_ms;
        }
        for device in other.usb_device {
            if !self.usb_device.contains(&device) {
                self.usb_device.push(device);
            }
        }
    }
}
