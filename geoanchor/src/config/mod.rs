//! User configuration.
//!
//! Settings are read from `~/.geoanchor/config.ini` and converted into the
//! runtime configs the engine components take:
//!
//! ```
//! use geoanchor::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let thresholds = config.to_thresholds();
//! let reconciler_config = config.to_reconciler_config();
//!
//! assert_eq!(thresholds.max_horizontal_m, 10.0);
//! assert_eq!(reconciler_config.max_creation_attempts, 3);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_CREATION_ATTEMPTS, DEFAULT_HEADING_ACCURACY_DEG,
    DEFAULT_HORIZONTAL_ACCURACY_M, DEFAULT_LOCALIZATION_TIMEOUT_SECS, DEFAULT_LOG_FILE_NAME,
    DEFAULT_MAX_DELAY_MS, DEFAULT_PACING_MS, DEFAULT_RESOLUTION_TIMEOUT_SECS,
    DEFAULT_VERTICAL_ACCURACY_M, MAX_ACCURACY_THRESHOLD, MAX_CREATION_ATTEMPTS,
    MIN_CREATION_ATTEMPTS, MIN_RESOLUTION_TIMEOUT_SECS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AccuracySettings, ConfigFile, LoggingSettings, PlacementSettings, ResolutionSettings,
};
