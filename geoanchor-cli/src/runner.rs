//! CLI runner for common setup.
//!
//! Encapsulates config loading, logging initialization and runtime creation
//! to reduce duplication across command handlers.

use tokio::runtime::{Builder, Runtime};
use tracing::info;

use geoanchor::config::ConfigFile;
use geoanchor::logging::{init_logging, split_log_path, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    /// * `log_stdout` - Mirror log output to the terminal
    pub fn with_debug(debug_mode: bool, log_stdout: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, log_stdout, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("geoanchor v{}", geoanchor::VERSION);
        info!("geoanchor CLI: {} command", command);
    }

    /// Build the multi-threaded runtime the engine runs on.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        Builder::new_multi_thread()
            .enable_all()
            .thread_name("geoanchor-worker")
            .build()
            .map_err(CliError::Runtime)
    }
}
