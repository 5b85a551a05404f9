//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use clap::Subcommand;
use geoanchor::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show,

    /// Write a default configuration file if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
        println!();
    }

    println!("[accuracy]");
    println!("horizontal_m = {}", config.accuracy.horizontal_m);
    println!("vertical_m = {}", config.accuracy.vertical_m);
    println!("heading_deg = {}", config.accuracy.heading_deg);
    println!(
        "localization_timeout_secs = {}",
        config.accuracy.localization_timeout_secs
    );
    println!();
    println!("[placement]");
    println!(
        "max_creation_attempts = {}",
        config.placement.max_creation_attempts
    );
    println!("base_delay_ms = {}", config.placement.base_delay_ms);
    println!("max_delay_ms = {}", config.placement.max_delay_ms);
    println!();
    println!("[resolution]");
    println!("timeout_secs = {}", config.resolution.timeout_secs);
    println!("pacing_ms = {}", config.resolution.pacing_ms);
    println!();
    println!("[logging]");
    println!("file = {}", config.logging.file.display());

    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if ConfigFile::ensure_exists_at(&path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists, leaving it unchanged", path.display());
    }
    Ok(())
}
