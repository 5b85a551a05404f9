//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, range limits with their clamping
//! helpers, and the `ConfigFile::default()` implementation.

use super::file::config_directory;
use super::settings::*;
use crate::positioning::{
    DEFAULT_LOCALIZATION_TIMEOUT, DEFAULT_MAX_HEADING_ACCURACY_DEG,
    DEFAULT_MAX_HORIZONTAL_ACCURACY_M, DEFAULT_MAX_VERTICAL_ACCURACY_M,
};
use crate::reconciler::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_CREATION_ATTEMPTS, DEFAULT_MAX_DELAY, DEFAULT_PACING_DELAY,
    DEFAULT_RESOLUTION_TIMEOUT,
};

// =============================================================================
// Accuracy
// =============================================================================

/// Default maximum horizontal accuracy (meters).
pub const DEFAULT_HORIZONTAL_ACCURACY_M: f32 = DEFAULT_MAX_HORIZONTAL_ACCURACY_M;

/// Default maximum vertical accuracy (meters).
pub const DEFAULT_VERTICAL_ACCURACY_M: f32 = DEFAULT_MAX_VERTICAL_ACCURACY_M;

/// Default maximum heading accuracy (degrees).
pub const DEFAULT_HEADING_ACCURACY_DEG: f32 = DEFAULT_MAX_HEADING_ACCURACY_DEG;

/// Default localization timeout (seconds).
pub const DEFAULT_LOCALIZATION_TIMEOUT_SECS: u64 = DEFAULT_LOCALIZATION_TIMEOUT.as_secs();

/// Upper bound for any accuracy threshold. Anything looser is not a
/// meaningful gate for placing objects in the world.
pub const MAX_ACCURACY_THRESHOLD: f32 = 100.0;

// =============================================================================
// Placement
// =============================================================================

/// Default attempts per creation/resolution request.
pub const DEFAULT_CREATION_ATTEMPTS: u32 = DEFAULT_MAX_CREATION_ATTEMPTS;

/// Minimum attempts per request.
pub const MIN_CREATION_ATTEMPTS: u32 = 1;

/// Maximum attempts per request.
pub const MAX_CREATION_ATTEMPTS: u32 = 10;

/// Default delay before the first retry (milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = DEFAULT_BASE_DELAY.as_millis() as u64;

/// Default cap on a single retry delay (milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = DEFAULT_MAX_DELAY.as_millis() as u64;

// =============================================================================
// Resolution
// =============================================================================

/// Default resolution timeout (seconds).
pub const DEFAULT_RESOLUTION_TIMEOUT_SECS: u64 = DEFAULT_RESOLUTION_TIMEOUT.as_secs();

/// Minimum resolution timeout (seconds).
pub const MIN_RESOLUTION_TIMEOUT_SECS: u64 = 1;

/// Default pacing between batch resolutions (milliseconds).
pub const DEFAULT_PACING_MS: u64 = DEFAULT_PACING_DELAY.as_millis() as u64;

// =============================================================================
// Logging
// =============================================================================

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "geoanchor.log";

/// Clamps an accuracy threshold to `(0, MAX_ACCURACY_THRESHOLD]`, logging a
/// warning when clamped. Returns `None` for values that cannot be a threshold.
pub(super) fn clamp_accuracy(key: &str, value: f32) -> Option<f32> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    if value > MAX_ACCURACY_THRESHOLD {
        tracing::warn!(
            key,
            requested = value,
            max = MAX_ACCURACY_THRESHOLD,
            "{} above maximum, clamping to {}",
            key,
            MAX_ACCURACY_THRESHOLD
        );
        return Some(MAX_ACCURACY_THRESHOLD);
    }
    Some(value)
}

/// Clamps the attempt count to valid range and logs a warning if clamped.
pub(super) fn clamp_creation_attempts(value: u32) -> u32 {
    if value < MIN_CREATION_ATTEMPTS {
        tracing::warn!(
            requested = value,
            min = MIN_CREATION_ATTEMPTS,
            max = MAX_CREATION_ATTEMPTS,
            "max_creation_attempts below minimum, clamping to {}",
            MIN_CREATION_ATTEMPTS
        );
        MIN_CREATION_ATTEMPTS
    } else if value > MAX_CREATION_ATTEMPTS {
        tracing::warn!(
            requested = value,
            min = MIN_CREATION_ATTEMPTS,
            max = MAX_CREATION_ATTEMPTS,
            "max_creation_attempts above maximum, clamping to {}",
            MAX_CREATION_ATTEMPTS
        );
        MAX_CREATION_ATTEMPTS
    } else {
        value
    }
}

/// Raises the resolution timeout to the minimum and logs a warning if clamped.
pub(super) fn clamp_resolution_timeout(value: u64) -> u64 {
    if value < MIN_RESOLUTION_TIMEOUT_SECS {
        tracing::warn!(
            requested = value,
            min = MIN_RESOLUTION_TIMEOUT_SECS,
            "resolution timeout below minimum, clamping to {}",
            MIN_RESOLUTION_TIMEOUT_SECS
        );
        MIN_RESOLUTION_TIMEOUT_SECS
    } else {
        value
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            accuracy: AccuracySettings {
                horizontal_m: DEFAULT_HORIZONTAL_ACCURACY_M,
                vertical_m: DEFAULT_VERTICAL_ACCURACY_M,
                heading_deg: DEFAULT_HEADING_ACCURACY_DEG,
                localization_timeout_secs: DEFAULT_LOCALIZATION_TIMEOUT_SECS,
            },
            placement: PlacementSettings {
                max_creation_attempts: DEFAULT_CREATION_ATTEMPTS,
                base_delay_ms: DEFAULT_BASE_DELAY_MS,
                max_delay_ms: DEFAULT_MAX_DELAY_MS,
            },
            resolution: ResolutionSettings {
                timeout_secs: DEFAULT_RESOLUTION_TIMEOUT_SECS,
                pacing_ms: DEFAULT_PACING_MS,
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
