//! Subcommand handlers.

use std::path::Path;
use std::time::Duration;

use super::args::ConfigAction;
use crate::app::{AppError, ScreenTest};
use crate::capture::{self, CaptureConstraints, DeviceError, DeviceInfo, FfmpegHost};
use crate::config::Config;
use crate::controller::CaptureController;
use crate::preview::AsciiPreview;
use crate::status::CaptureStatus;
use crate::store::{FileStatusStore, StatusStore, StoreError};

/// Errors surfaced to `main`, which prints them and exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to render configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Run the interactive screen test on a single-threaded runtime.
pub fn run_screen_test(config: &Config) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let host = FfmpegHost::detect(config.ffmpeg_settings());
    let store = FileStatusStore::new(config.status_file());
    let constraints = CaptureConstraints::default().with_frame_rate(config.capture.frame_rate);
    let controller = CaptureController::new(host, store).with_constraints(constraints);

    let mut session = ScreenTest::new(controller)
        .with_refresh(Duration::from_millis(1000 / u64::from(config.preview.fps.max(1))));
    if config.preview.enabled {
        session = session.with_preview(
            AsciiPreview::new(config.preview.width, config.preview.height)
                .with_charset(config.charset())
                .with_invert(config.preview.invert),
        );
    }

    log::info!(
        "Screen test on screen {} at {} fps",
        config.capture.screen,
        config.capture.frame_rate
    );
    runtime.block_on(session.run())?;
    Ok(())
}

/// Print the last recorded status.
pub fn print_status(config: &Config) -> Result<(), CliError> {
    let store = FileStatusStore::new(config.status_file());
    match store.read_raw()? {
        Some(_) => println!("Last status: {}", store.load()),
        None => println!("Last status: {} (nothing recorded)", CaptureStatus::Idle),
    }
    println!("Status file: {}", store.path().display());
    Ok(())
}

/// Record `idle` as the last status.
pub fn reset_status(config: &Config) -> Result<(), CliError> {
    let store = FileStatusStore::new(config.status_file());
    store.write_raw(CaptureStatus::Idle.as_str())?;
    println!("Status reset to {}", CaptureStatus::Idle);
    Ok(())
}

/// List capturable screens and print them to stdout.
pub fn list_screens(config: &Config) -> Result<(), CliError> {
    let screens = capture::list_screens(&config.capture.ffmpeg)?;
    if screens.is_empty() {
        println!("No screens found.");
        println!();
        println!("Make sure screen recording permission is granted to your terminal.");
        println!("On macOS, grant access in {}.", capture::SCREEN_RECORDING_SETTINGS);
    } else {
        println!("Available screens:");
        for line in screen_lines(&screens) {
            println!("  {}", line);
        }
        println!();
        println!("Use --screen <number> to select a screen.");
    }
    Ok(())
}

/// One line per screen, numbered the way `--screen` counts them.
pub fn screen_lines(screens: &[DeviceInfo]) -> Vec<String> {
    screens
        .iter()
        .enumerate()
        .map(|(position, screen)| format!("[{}] {}", position, screen.name))
        .collect()
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    config_path: &Path,
) -> Result<(), CliError> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Show => {
            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found, defaults)", config_path.display());
            }
            println!("# Status file: {}", config.status_file().display());
            println!();
            print!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}
