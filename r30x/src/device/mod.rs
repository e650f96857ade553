//! Serial port discovery.
//!
//! R30x modules have no USB interface of their own; they are wired to the
//! host through a USB-UART bridge. Discovery therefore lists serial ports
//! and classifies the bridge behind each one by USB VID/PID.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, info, trace};

/// USB vendor/product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsbId {
    /// Vendor ID.
    pub vid: u16,
    /// Product ID.
    pub pid: u16,
}

/// USB-UART bridge behind a serial port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DeviceKind {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Adapter listed in the user configuration.
    Configured,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs for common USB-to-UART bridges.
const KNOWN_BRIDGES: &[(u16, &[u16], DeviceKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        DeviceKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], DeviceKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        DeviceKind::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], DeviceKind::Prolific),
];

impl DeviceKind {
    /// Classify a VID/PID pair, checking `extra` after the built-in table.
    #[must_use]
    pub fn classify(id: UsbId, extra: &[UsbId]) -> Self {
        for (vid, pids, kind) in KNOWN_BRIDGES {
            if id.vid == *vid && pids.contains(&id.pid) {
                return *kind;
            }
        }
        if extra.contains(&id) {
            return Self::Configured;
        }
        Self::Unknown
    }

    /// Get a human-readable name for the device kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Configured => "configured adapter",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected device kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Classified bridge.
    pub device: DeviceKind,
    /// USB IDs, for USB ports.
    pub usb: Option<UsbId>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// A plain port with no USB metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: DeviceKind::Unknown,
            usb: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }

    /// Whether a sensor is likely attached through this port.
    pub fn is_likely_sensor(&self) -> bool {
        self.device.is_known()
    }
}

/// List serial ports, classifying USB bridges.
#[cfg(feature = "native")]
pub fn detect_ports(extra: &[UsbId]) -> Vec<DetectedPort> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    ports
        .into_iter()
        .map(|info| {
            let mut detected = DetectedPort::new(info.port_name);
            if let serialport::SerialPortType::UsbPort(usb) = info.port_type {
                let id = UsbId {
                    vid: usb.vid,
                    pid: usb.pid,
                };
                detected.device = DeviceKind::classify(id, extra);
                detected.usb = Some(id);
                detected.manufacturer = usb.manufacturer;
                detected.product = usb.product;
                detected.serial = usb.serial_number;
                trace!(
                    "Found USB port: {} (VID: {:04X}, PID: {:04X}, Device: {:?})",
                    detected.name, id.vid, id.pid, detected.device
                );
            }
            detected
        })
        .collect()
}

/// List serial ports (no native backend: always empty).
#[cfg(not(feature = "native"))]
pub fn detect_ports(_extra: &[UsbId]) -> Vec<DetectedPort> {
    Vec::new()
}

/// Choose one port from `ports`.
///
/// Known bridges win over unclassified ports; otherwise the first port is
/// used.
pub fn select_port(ports: Vec<DetectedPort>) -> Result<DetectedPort> {
    let mut fallback = None;
    for port in ports {
        if port.is_likely_sensor() {
            #[cfg(feature = "native")]
            info!("Auto-detected {} bridge: {}", port.device.name(), port.name);
            return Ok(port);
        }
        if fallback.is_none() {
            fallback = Some(port);
        }
    }
    fallback.ok_or_else(|| Error::Transport("no serial ports found".to_string()))
}

/// Detect the most likely sensor port.
pub fn auto_detect_port(extra: &[UsbId]) -> Result<DetectedPort> {
    select_port(detect_ports(extra))
}

/// Format a list of detected ports for display.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let device_info = match (port.device, port.usb) {
                (kind, _) if kind.is_known() => format!(" [{}]", kind.name()),
                (_, Some(id)) => format!(" [VID:{:04X} PID:{:04X}]", id.vid, id.pid),
                _ => String::new(),
            };
            let product_info = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();
            format!("{}{device_info}{product_info}", port.name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb(name: &str, vid: u16, pid: u16) -> DetectedPort {
        let id = UsbId { vid, pid };
        DetectedPort {
            device: DeviceKind::classify(id, &[]),
            usb: Some(id),
            ..DetectedPort::new(name)
        }
    }

    #[test]
    fn test_classify_builtin_bridges() {
        let id = |vid, pid| UsbId { vid, pid };
        assert_eq!(DeviceKind::classify(id(0x1A86, 0x7523), &[]), DeviceKind::Ch340);
        assert_eq!(DeviceKind::classify(id(0x10C4, 0xEA60), &[]), DeviceKind::Cp210x);
        assert_eq!(DeviceKind::classify(id(0x0403, 0x6001), &[]), DeviceKind::Ftdi);
        assert_eq!(DeviceKind::classify(id(0x067B, 0x2303), &[]), DeviceKind::Prolific);
        assert_eq!(DeviceKind::classify(id(0x1A86, 0x0001), &[]), DeviceKind::Unknown);
    }

    #[test]
    fn test_classify_configured_adapter() {
        let custom = UsbId {
            vid: 0x1234,
            pid: 0x5678,
        };
        assert_eq!(DeviceKind::classify(custom, &[custom]), DeviceKind::Configured);
        assert_eq!(DeviceKind::classify(custom, &[]), DeviceKind::Unknown);
    }

    #[test]
    fn test_select_prefers_known_bridge() {
        let ports = vec![DetectedPort::new("/dev/ttyS0"), usb("/dev/ttyUSB0", 0x10C4, 0xEA60)];
        assert_eq!(select_port(ports).unwrap().name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let ports = vec![DetectedPort::new("/dev/ttyS0"), DetectedPort::new("/dev/ttyS1")];
        assert_eq!(select_port(ports).unwrap().name, "/dev/ttyS0");
        assert!(select_port(Vec::new()).unwrap_err().is_transport());
    }

    #[test]
    fn test_format_port_list() {
        let mut bridge = usb("/dev/ttyUSB0", 0x1A86, 0x7523);
        bridge.product = Some("USB-Serial".to_string());
        let ports = vec![bridge, usb("/dev/ttyACM0", 0x2E8A, 0x000A), DetectedPort::new("/dev/ttyS0")];

        let formatted = format_port_list(&ports);
        assert_eq!(formatted[0], "/dev/ttyUSB0 [CH340/CH341] - USB-Serial");
        assert_eq!(formatted[1], "/dev/ttyACM0 [VID:2E8A PID:000A]");
        assert_eq!(formatted[2], "/dev/ttyS0");
    }
}
