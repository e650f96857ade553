//! System parameter and port listing command implementations.

use {
    super::with_session,
    crate::{Cli, config::Config},
    anyhow::Result,
    console::style,
    r30x::{DetectedPort, SystemParameters, auto_detect_port, detect_ports},
};

/// Info command implementation.
pub(crate) fn cmd_info(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let (port, params) = with_session(cli, config, |session, params| {
        Ok((session.port_name().to_string(), params.clone()))
    })?;

    if json {
        let output = serde_json::json!({
            "port": port,
            "baud_rate": params.baud_rate(),
            "packet_size": params.packet_size(),
            "busy": params.is_busy(),
            "password_verified": params.is_password_verified(),
            "parameters": params,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_parameters(&port, &params);
    Ok(())
}

fn print_parameters(port: &str, params: &SystemParameters) {
    println!("{}", style("Sensor").bold().underlined());
    println!("  Port:           {port}");
    if let Some(name) = &params.device_name {
        println!("  Product:        {name}");
    }
    println!("  Address:        {:08X}", params.address);
    println!("  System ID:      {:04X}", params.system_id);
    println!("  Library size:   {}", params.library_size);
    println!("  Security level: {}", params.security_level);
    match params.packet_size() {
        Some(size) => println!("  Packet size:    {size} bytes"),
        None => println!(
            "  Packet size:    unknown (code {})",
            params.packet_size_code
        ),
    }
    println!("  Baud rate:      {}", params.baud_rate());
    println!(
        "  Status:         {:04X}{}",
        params.status_register,
        if params.is_busy() { " (busy)" } else { "" }
    );
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(config: &Config, json: bool) -> Result<()> {
    let detected = detect_ports(&config.usb_device);

    if json {
        println!("{}", serde_json::to_string_pretty(&detected)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &detected {
        eprintln!("  {} {}", style("•").green(), port_label(port));
    }

    if let Ok(auto_port) = auto_detect_port(&config.usb_device) {
        eprintln!(
            "\n{} Auto-detected: {}",
            style("→").green().bold(),
            style(&auto_port.name).cyan().bold()
        );
    }
    Ok(())
}

fn port_label(port: &DetectedPort) -> String {
    let device = if port.device.is_known() {
        format!(" [{}]", style(port.device.name()).yellow())
    } else {
        String::new()
    };
    let usb = port
        .usb
        .map(|id| format!(" ({:04X}:{:04X})", id.vid, id.pid))
        .unwrap_or_default();
    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();
    format!("{}{device}{usb}{product}", style(&port.name).cyan())
}
