//! Template library commands: count, enroll, search, delete and clear.

use {
    super::{status, wait_for_finger, wait_for_removal, with_session},
    crate::{Cli, CliError, config::Config},
    anyhow::{Context, Result, bail},
    console::style,
    dialoguer::{Confirm, theme::ColorfulTheme},
    r30x::{CharBuffer, ConfirmationCode, Error as SensorError},
    std::io::IsTerminal,
};

/// Count command implementation.
pub(crate) fn cmd_count(cli: &Cli, config: &Config) -> Result<()> {
    let (count, size) = with_session(cli, config, |session, params| {
        Ok((session.template_count()?, params.library_size))
    })?;
    status(cli, style("ℹ").blue(), &format!("{count} of {size} locations used"));
    println!("{count}");
    Ok(())
}

/// Enroll command implementation.
pub(crate) fn cmd_enroll(cli: &Cli, config: &Config, location: u16) -> Result<()> {
    with_session(cli, config, |session, params| {
        if location == 0 || location > params.library_size {
            return Err(CliError::Usage(format!(
                "location {location} is outside 1..={}",
                params.library_size
            ))
            .into());
        }

        wait_for_finger(cli, session)?;
        session
            .image_to_character(CharBuffer::One)
            .context("Failed to extract features from the first image")?;
        wait_for_removal(cli, session)?;

        wait_for_finger(cli, session)?;
        session
            .image_to_character(CharBuffer::Two)
            .context("Failed to extract features from the second image")?;

        match session.generate_template() {
            Err(SensorError::Device(ConfirmationCode::MergeFailed)) => {
                bail!("The two captures do not belong to the same finger")
            },
            other => other.context("Failed to build the template")?,
        }
        session
            .save_template(CharBuffer::One, location)
            .with_context(|| format!("Failed to store the template at location {location}"))?;
        Ok(())
    })?;

    status(
        cli,
        style("✓").green().bold(),
        &format!("Enrolled finger at location {location}"),
    );
    Ok(())
}

/// Search command implementation.
pub(crate) fn cmd_search(cli: &Cli, config: &Config) -> Result<()> {
    let found = with_session(cli, config, |session, _| {
        wait_for_finger(cli, session)?;
        session
            .image_to_character(CharBuffer::One)
            .context("Failed to extract features")?;
        let size = session.state().template_count;
        match session.high_speed_search(CharBuffer::One, 1, size) {
            Ok(found) => Ok(Some(found)),
            Err(SensorError::Device(ConfirmationCode::NotFound)) => Ok(None),
            Err(e) => Err(e).context("Search failed"),
        }
    })?;

    match found {
        Some(found) => {
            status(
                cli,
                style("✓").green().bold(),
                &format!("Match at location {} (score {})", found.location, found.score),
            );
            println!("{} {}", found.location, found.score);
            Ok(())
        },
        None => bail!("No matching fingerprint"),
    }
}

/// Delete command implementation.
pub(crate) fn cmd_delete(cli: &Cli, config: &Config, start: u16, count: u16) -> Result<()> {
    with_session(cli, config, |session, _| {
        session.delete_templates(start, count)?;
        Ok(())
    })?;
    status(
        cli,
        style("✓").green().bold(),
        &format!("Deleted {count} template(s) from location {start}"),
    );
    Ok(())
}

/// Clear command implementation.
pub(crate) fn cmd_clear(cli: &Cli, config: &Config, yes: bool) -> Result<()> {
    if !yes {
        confirm_clear(cli)?;
    }
    with_session(cli, config, |session, _| {
        session.clear_library()?;
        Ok(())
    })?;
    status(cli, style("✓").green().bold(), "Library cleared");
    Ok(())
}

fn confirm_clear(cli: &Cli) -> Result<()> {
    if cli.non_interactive || !std::io::stdin().is_terminal() {
        return Err(CliError::Usage("refusing to clear the library without --yes".to_string()).into());
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Delete every stored fingerprint?")
        .default(false)
        .interact_opt()
        .map_err(|e| CliError::Cancelled(e.to_string()))?
        .unwrap_or(false);
    if confirmed {
        Ok(())
    } else {
        Err(CliError::Cancelled("clear cancelled".to_string()).into())
    }
}
