//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[accuracy]
; A fix is trusted for placement only when all three accuracies are within
; these limits and local tracking is healthy. Values above 100 are clamped.
; Maximum horizontal accuracy in meters (default: 10)
horizontal_m = {}
; Maximum vertical accuracy in meters (default: 10)
vertical_m = {}
; Maximum heading accuracy in degrees (default: 15)
heading_deg = {}
; Seconds to keep reporting "localizing" before reporting low accuracy (default: 60)
localization_timeout_secs = {}

[placement]
; Attempts per anchor creation or resolution, including the first (1-10, default: 3)
max_creation_attempts = {}
; Delay before the first retry in milliseconds; doubles on each retry (default: 500)
base_delay_ms = {}
; Upper bound for a single retry delay in milliseconds (default: 4000)
max_delay_ms = {}

[resolution]
; Wall-clock budget for resolving one shared anchor, retries included (default: 30)
timeout_secs = {}
; Delay between resolutions when resolving many anchors in an area (default: 100)
pacing_ms = {}

[logging]
; Log file path
file = {}
"#,
        config.accuracy.horizontal_m,
        config.accuracy.vertical_m,
        config.accuracy.heading_deg,
        config.accuracy.localization_timeout_secs,
        config.placement.max_creation_attempts,
        config.placement.base_delay_ms,
        config.placement.max_delay_ms,
        config.resolution.timeout_secs,
        config.resolution.pacing_ms,
        path_to_string(&config.logging.file),
    )
}

/// Convert a path to a string, using ~ for home directory.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
