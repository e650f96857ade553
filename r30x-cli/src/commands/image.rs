//! Finger image export.

use {
    super::{status, wait_for_finger, with_session},
    crate::{Cli, config::Config, use_fancy_output},
    anyhow::{Context, Result},
    console::style,
    indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle},
    r30x::commands::IMAGE_CAPACITY,
    std::{fs, path::Path},
};

fn progress_bar(cli: &Cli) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(IMAGE_CAPACITY as u64);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb
}

/// Export image command implementation.
pub(crate) fn cmd_export_image(cli: &Cli, config: &Config, output: &Path) -> Result<()> {
    let image = with_session(cli, config, |session, _| {
        wait_for_finger(cli, session)?;

        let pb = progress_bar(cli);
        pb.set_message("Downloading image");
        let image = session.export_image_with_progress(|received| pb.set_position(received as u64));
        match &image {
            Ok(_) => pb.finish_with_message("done"),
            Err(_) => pb.abandon(),
        }
        Ok(image?)
    })?;

    fs::write(output, &image).with_context(|| format!("Failed to write {}", output.display()))?;
    status(
        cli,
        style("✓").green().bold(),
        &format!("Wrote {} bytes to {}", image.len(), output.display()),
    );
    Ok(())
}
