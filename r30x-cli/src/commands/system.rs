//! Module settings and utility commands.

use {
    super::{status, with_session},
    crate::{Cli, config::Config},
    anyhow::Result,
    console::style,
};

/// Random command implementation.
pub(crate) fn cmd_random(cli: &Cli, config: &Config) -> Result<()> {
    let value = with_session(cli, config, |session, _| Ok(session.random_number()?))?;
    println!("{value:08X}");
    Ok(())
}

/// Set-security command implementation.
pub(crate) fn cmd_set_security(cli: &Cli, config: &Config, level: u8) -> Result<()> {
    let previous = with_session(cli, config, |session, params| {
        session.set_security_level(level)?;
        Ok(params.security_level)
    })?;
    status(
        cli,
        style("✓").green().bold(),
        &format!("Security level changed from {previous} to {level}"),
    );
    Ok(())
}
