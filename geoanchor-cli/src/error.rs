//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use geoanchor::config::ConfigFileError;
use geoanchor::coord::CoordError;
use geoanchor::reconciler::PlacementError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Invalid coordinate on the command line
    Coordinate(CoordError),
    /// Anchor placement failed
    Placement(PlacementError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Placement(e) = self {
            if e.is_retryable_later() {
                eprintln!();
                eprintln!("Positioning or the anchor service was not ready. Try:");
                eprintln!("  1. More positioning steps: --steps 20");
                eprintln!("  2. A better final accuracy: --end-accuracy 2");
            }
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Coordinate(e) => write!(f, "Invalid coordinate: {}", e),
            CliError::Placement(e) => write!(f, "Anchor placement failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Coordinate(e) => Some(e),
            CliError::Placement(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coordinate(e)
    }
}

impl From<PlacementError> for CliError {
    fn from(e: PlacementError) -> Self {
        CliError::Placement(e)
    }
}
