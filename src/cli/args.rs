//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::CharacterSet;
use crate::config::Config;

/// Parse and validate frame rate (1-120 fps)
fn parse_frame_rate(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid frame rate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!("Frame rate must be between 1 and 120 fps, got {}", fps));
    }
    Ok(fps)
}

/// Request a screen capture, preview it in the terminal and report what was granted
#[derive(Parser, Debug)]
#[command(name = "screenshare-probe")]
#[command(version, about = "Screen-sharing capture tester for the terminal", long_about = None)]
#[command(after_help = "COMMANDS IN THE TEST SCREEN:
    s   Start / retry the screen test
    x   Stop sharing
    h   Back to home
    q   Quit

EXAMPLES:
    screenshare-probe                      # Interactive test on screen 0
    screenshare-probe --screen 1 --no-preview
    screenshare-probe status               # Last recorded status
    screenshare-probe list-screens")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Screen number to capture, as printed by list-screens
    #[arg(long)]
    pub screen: Option<usize>,

    /// Ideal capture frame rate
    #[arg(long, value_parser = parse_frame_rate)]
    pub frame_rate: Option<u32>,

    /// Do not render the ASCII preview
    #[arg(long)]
    pub no_preview: bool,

    /// ASCII character set for the preview
    #[arg(long)]
    pub charset: Option<CharacterSet>,

    /// Invert brightness (for light terminals)
    #[arg(long)]
    pub invert: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the interactive screen test (default)
    Run,
    /// Print the last recorded capture status
    Status,
    /// Reset the recorded status to idle
    Reset,
    /// List capturable screens
    ListScreens,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Show the effective configuration
    Show,
}

impl Args {
    /// Merge settings: CLI args > config file > built-in defaults.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(screen) = self.screen {
            config.capture.screen = screen;
        }
        if let Some(fps) = self.frame_rate {
            config.capture.frame_rate = fps;
        }
        if self.no_preview {
            config.preview.enabled = false;
        }
        if let Some(charset) = self.charset {
            config.preview.charset = Some(charset.config_name().to_string());
        }
        if self.invert {
            config.preview.invert = true;
        }
    }

    /// The subcommand to run; `run` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::CharSet;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["screenshare-probe"]);
        assert!(args.command.is_none());
        assert_eq!(args.command(), Command::Run);
        assert!(args.config.is_none());
        assert!(args.screen.is_none());
        assert!(args.frame_rate.is_none());
        assert!(!args.no_preview);
        assert!(args.charset.is_none());
        assert!(!args.invert);
    }

    #[test]
    fn test_args_subcommands() {
        let args = Args::parse_from(["screenshare-probe", "status"]);
        assert_eq!(args.command(), Command::Status);

        let args = Args::parse_from(["screenshare-probe", "reset"]);
        assert_eq!(args.command(), Command::Reset);

        let args = Args::parse_from(["screenshare-probe", "list-screens"]);
        assert_eq!(args.command(), Command::ListScreens);

        let args = Args::parse_from(["screenshare-probe", "config", "path"]);
        assert_eq!(
            args.command(),
            Command::Config {
                action: ConfigAction::Path
            }
        );
    }

    #[test]
    fn test_args_config_is_global() {
        let args = Args::parse_from(["screenshare-probe", "status", "--config", "/tmp/c.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));

        let args = Args::parse_from(["screenshare-probe", "-c", "/tmp/d.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/d.toml")));
    }

    #[test]
    fn test_frame_rate_validation() {
        assert!(Args::try_parse_from(["screenshare-probe", "--frame-rate", "0"]).is_err());
        assert!(Args::try_parse_from(["screenshare-probe", "--frame-rate", "121"]).is_err());
        assert!(Args::try_parse_from(["screenshare-probe", "--frame-rate", "fast"]).is_err());
        let args = Args::parse_from(["screenshare-probe", "--frame-rate", "60"]);
        assert_eq!(args.frame_rate, Some(60));
    }

    #[test]
    fn test_overrides_beat_config() {
        let args = Args::parse_from([
            "screenshare-probe",
            "--screen",
            "2",
            "--frame-rate",
            "15",
            "--no-preview",
            "--charset",
            "blocks",
            "--invert",
        ]);
        let mut config = Config::default();
        config.capture.screen = 1;
        args.apply_overrides(&mut config);

        assert_eq!(config.capture.screen, 2);
        assert_eq!(config.capture.frame_rate, 15);
        assert!(!config.preview.enabled);
        assert!(config.preview.invert);
        assert_eq!(config.charset(), CharSet::Blocks);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = Args::parse_from(["screenshare-probe"]);
        let mut config = Config::default();
        config.capture.screen = 3;
        config.preview.invert = true;
        args.apply_overrides(&mut config);
        assert_eq!(config.capture.screen, 3);
        assert!(config.preview.invert);
        assert!(config.preview.enabled);
    }
}
