//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, ConfigAction};
pub use commands::{
    handle_config_action, list_screens, print_status, reset_status, run_screen_test, screen_lines,
    CliError,
};
pub use enums::CharacterSet;
