//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::defaults::{clamp_accuracy, clamp_creation_attempts, clamp_resolution_timeout};
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [accuracy] section
    if let Some(section) = ini.section(Some("accuracy")) {
        if let Some(v) = parse_accuracy(section, "horizontal_m")? {
            config.accuracy.horizontal_m = v;
        }
        if let Some(v) = parse_accuracy(section, "vertical_m")? {
            config.accuracy.vertical_m = v;
        }
        if let Some(v) = parse_accuracy(section, "heading_deg")? {
            config.accuracy.heading_deg = v;
        }
        if let Some(v) = parse_value(
            section,
            "accuracy",
            "localization_timeout_secs",
            "must be a non-negative integer (seconds)",
        )? {
            config.accuracy.localization_timeout_secs = v;
        }
    }

    // [placement] section
    if let Some(section) = ini.section(Some("placement")) {
        if let Some(v) = parse_value(
            section,
            "placement",
            "max_creation_attempts",
            "must be a positive integer",
        )? {
            config.placement.max_creation_attempts = clamp_creation_attempts(v);
        }
        if let Some(v) = parse_value(
            section,
            "placement",
            "base_delay_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.placement.base_delay_ms = v;
        }
        if let Some(v) = parse_value(
            section,
            "placement",
            "max_delay_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.placement.max_delay_ms = v;
        }
        if config.placement.max_delay_ms < config.placement.base_delay_ms {
            tracing::warn!(
                base_delay_ms = config.placement.base_delay_ms,
                max_delay_ms = config.placement.max_delay_ms,
                "max_delay_ms below base_delay_ms, raising to {}",
                config.placement.base_delay_ms
            );
            config.placement.max_delay_ms = config.placement.base_delay_ms;
        }
    }

    // [resolution] section
    if let Some(section) = ini.section(Some("resolution")) {
        if let Some(v) = parse_value(
            section,
            "resolution",
            "timeout_secs",
            "must be a positive integer (seconds)",
        )? {
            config.resolution.timeout_secs = clamp_resolution_timeout(v);
        }
        if let Some(v) = parse_value(
            section,
            "resolution",
            "pacing_ms",
            "must be a non-negative integer (milliseconds)",
        )? {
            config.resolution.pacing_ms = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse an optional value, mapping parse failures to `InvalidValue`.
fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
    }
}

/// Parse an accuracy threshold in `[accuracy]`.
fn parse_accuracy(section: &Properties, key: &str) -> Result<Option<f32>, ConfigFileError> {
    const REASON: &str = "must be a positive number";

    let Some(value) = parse_value::<f32>(section, "accuracy", key, REASON)? else {
        return Ok(None);
    };
    match clamp_accuracy(key, value) {
        Some(v) => Ok(Some(v)),
        None => Err(invalid("accuracy", key, &value.to_string(), REASON)),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
