//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;
use std::time::Duration;

use crate::positioning::AccuracyThresholds;
use crate::reconciler::ReconcilerConfig;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Positioning accuracy gate
    pub accuracy: AccuracySettings,
    /// Anchor creation retry behavior
    pub placement: PlacementSettings,
    /// Shared anchor resolution behavior
    pub resolution: ResolutionSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Accuracy thresholds a fix must meet before placement.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracySettings {
    /// Maximum horizontal accuracy in meters.
    pub horizontal_m: f32,
    /// Maximum vertical accuracy in meters.
    pub vertical_m: f32,
    /// Maximum heading accuracy in degrees.
    pub heading_deg: f32,
    /// Seconds of `Localizing` before reporting `LowAccuracy`.
    pub localization_timeout_secs: u64,
}

/// Anchor creation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSettings {
    /// Attempts per request, including the first.
    pub max_creation_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on a single retry delay, in milliseconds.
    pub max_delay_ms: u64,
}

/// Shared anchor resolution configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionSettings {
    /// Wall-clock budget per resolution, in seconds.
    pub timeout_secs: u64,
    /// Delay between resolutions in a batch, in milliseconds.
    pub pacing_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Accuracy thresholds for the position quality tracker.
    pub fn to_thresholds(&self) -> AccuracyThresholds {
        AccuracyThresholds {
            max_horizontal_m: self.accuracy.horizontal_m,
            max_vertical_m: self.accuracy.vertical_m,
            max_heading_deg: self.accuracy.heading_deg,
            localization_timeout: Duration::from_secs(self.accuracy.localization_timeout_secs),
        }
    }

    /// Retry and timeout settings for the anchor reconciler.
    pub fn to_reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            max_creation_attempts: self.placement.max_creation_attempts,
            base_delay: Duration::from_millis(self.placement.base_delay_ms),
            max_delay: Duration::from_millis(self.placement.max_delay_ms),
            resolution_timeout: Duration::from_secs(self.resolution.timeout_secs),
            pacing_delay: Duration::from_millis(self.resolution.pacing_ms),
        }
    }
}
