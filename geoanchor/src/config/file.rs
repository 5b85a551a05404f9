//! Reading and writing `~/.geoanchor/config.ini`.
//!
//! A missing file is not an error: every setting has a default, and the file
//! only needs the keys a user wants to change.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::parser::parse_ini;
use super::settings::ConfigFile;
use super::writer::to_config_string;

/// File name inside [`config_directory`].
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but is not valid INI
    #[error("cannot read configuration: {0}")]
    ReadError(#[from] ini::Error),

    /// The file could not be written
    #[error("cannot write configuration: {0}")]
    WriteError(String),

    /// A key holds a value that cannot be used
    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// The directory holding the file could not be created
    #[error("cannot create configuration directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load `~/.geoanchor/config.ini`, or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load `path`, or defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        match path.try_exists() {
            Ok(true) => parse_ini(&Ini::load_from_file(path)?),
            _ => Ok(Self::default()),
        }
    }

    /// Write to `~/.geoanchor/config.ini`.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(ConfigFileError::DirectoryError)?;
        }

        fs::write(path, to_config_string(self))
            .map_err(|e| ConfigFileError::WriteError(format!("{}: {}", path.display(), e)))
    }

    /// Write a default file to the standard location unless one exists.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        Self::ensure_exists_at(&path)?;
        Ok(path)
    }

    /// Write a default file to `path` unless one exists.
    ///
    /// Returns true if a file was written.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }
}

/// `~/.geoanchor`, or `./.geoanchor` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".geoanchor")
}

/// `~/.geoanchor/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
