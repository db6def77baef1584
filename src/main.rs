use clap::Parser;

use screenshare_probe::cli::{self, Args, CliError, Command};
use screenshare_probe::config::{self, Config, ConfigError};

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cli(#[from] CliError),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), MainError> {
    let config_path = args.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = Config::load(Some(&config_path))?;
    args.apply_overrides(&mut cfg);
    cfg.validate()?;

    match args.command() {
        Command::Run => cli::run_screen_test(&cfg)?,
        Command::Status => cli::print_status(&cfg)?,
        Command::Reset => cli::reset_status(&cfg)?,
        Command::ListScreens => cli::list_screens(&cfg)?,
        Command::Config { action } => cli::handle_config_action(action, &cfg, &config_path)?,
    }
    Ok(())
}
