//! Core state types for positioning quality.
//!
//! - [`GeospatialFix`] - One device position sample with accuracy bounds
//! - [`LocalTrackingState`] - Health of the local (visual-inertial) tracking
//! - [`PositioningState`] - Derived classification used to gate placement
//! - [`AccuracyThresholds`] - Maximum uncertainty trusted for placement

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::coord::{validate_lat_lon, CoordError};

/// Default maximum horizontal accuracy (meters, 1-sigma).
pub const DEFAULT_MAX_HORIZONTAL_ACCURACY_M: f32 = 10.0;

/// Default maximum vertical accuracy (meters, 1-sigma).
pub const DEFAULT_MAX_VERTICAL_ACCURACY_M: f32 = 10.0;

/// Default maximum heading accuracy (degrees).
pub const DEFAULT_MAX_HEADING_ACCURACY_DEG: f32 = 15.0;

/// Default time allowed for localization before quality is reported as low.
pub const DEFAULT_LOCALIZATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors for fixes that cannot be ingested.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixError {
    /// Latitude or longitude out of range.
    #[error("invalid fix coordinate: {0}")]
    Coordinate(CoordError),

    /// An accuracy value is negative or not a number.
    #[error("invalid {field} accuracy: {value}")]
    Accuracy { field: &'static str, value: f32 },

    /// Altitude is not finite.
    #[error("invalid fix altitude: {0}")]
    Altitude(f64),
}

/// A single sample of device position from the positioning provider.
///
/// Immutable once produced; superseded by the next fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeospatialFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters (datum consistent for the session).
    pub altitude: f64,
    /// Horizontal accuracy in meters (1-sigma radius).
    pub horizontal_accuracy: f32,
    /// Vertical accuracy in meters.
    pub vertical_accuracy: f32,
    /// Heading accuracy in degrees.
    pub heading_accuracy: f32,
    /// Compass heading in degrees, if the provider reports one.
    pub heading: Option<f32>,
    /// When this fix was captured.
    pub timestamp: Instant,
}

impl GeospatialFix {
    /// Create a fix captured now, without heading.
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        horizontal_accuracy: f32,
        vertical_accuracy: f32,
        heading_accuracy: f32,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            horizontal_accuracy,
            vertical_accuracy,
            heading_accuracy,
            heading: None,
            timestamp: Instant::now(),
        }
    }

    /// Attach a compass heading.
    pub fn with_heading(mut self, heading: f32) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Override the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check coordinate ranges and that all accuracies are non-negative.
    pub fn validate(&self) -> Result<(), FixError> {
        validate_lat_lon(self.latitude, self.longitude).map_err(FixError::Coordinate)?;
        if !self.altitude.is_finite() {
            return Err(FixError::Altitude(self.altitude));
        }
        for (field, value) in [
            ("horizontal", self.horizontal_accuracy),
            ("vertical", self.vertical_accuracy),
            ("heading", self.heading_accuracy),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(FixError::Accuracy { field, value });
            }
        }
        Ok(())
    }

    /// Age of this fix.
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Health of the device's local tracking, supplied by the AR session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalTrackingState {
    /// Full six-degree-of-freedom tracking.
    Tracking,
    /// Tracking with reduced quality (fast motion, poor features).
    Limited,
    /// No tracking.
    #[default]
    NotTracking,
}

impl LocalTrackingState {
    /// Only full tracking is trusted for anchor operations.
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Tracking)
    }
}

impl fmt::Display for LocalTrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracking => write!(f, "Tracking"),
            Self::Limited => write!(f, "Limited"),
            Self::NotTracking => write!(f, "NotTracking"),
        }
    }
}

/// Positioning quality classification.
///
/// Recomputed on every fix. Only `Ready` permits geospatial placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositioningState {
    /// No fix received yet.
    #[default]
    Initializing,
    /// Fixes arriving but accuracy not yet within thresholds.
    Localizing,
    /// Accuracy within thresholds and local tracking healthy.
    Ready,
    /// Accuracy outside thresholds after localization timed out or degraded.
    LowAccuracy,
    /// Local tracking lost.
    NotTracking,
}

impl PositioningState {
    /// Returns true when geospatial anchor operations may run.
    #[inline]
    pub fn allows_placement(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for PositioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::Localizing => write!(f, "Localizing"),
            Self::Ready => write!(f, "Ready"),
            Self::LowAccuracy => write!(f, "LowAccuracy"),
            Self::NotTracking => write!(f, "NotTracking"),
        }
    }
}

/// Accuracy limits a fix must meet before it is trusted for placement.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyThresholds {
    /// Maximum horizontal accuracy in meters.
    pub max_horizontal_m: f32,
    /// Maximum vertical accuracy in meters.
    pub max_vertical_m: f32,
    /// Maximum heading accuracy in degrees.
    pub max_heading_deg: f32,
    /// Time allowed for localization before reporting low accuracy.
    pub localization_timeout: Duration,
}

impl Default for AccuracyThresholds {
    fn default() -> Self {
        Self {
            max_horizontal_m: DEFAULT_MAX_HORIZONTAL_ACCURACY_M,
            max_vertical_m: DEFAULT_MAX_VERTICAL_ACCURACY_M,
            max_heading_deg: DEFAULT_MAX_HEADING_ACCURACY_DEG,
            localization_timeout: DEFAULT_LOCALIZATION_TIMEOUT,
        }
    }
}

impl AccuracyThresholds {
    /// Returns true if all three accuracies are within limits.
    pub fn accepts(&self, fix: &GeospatialFix) -> bool {
        fix.horizontal_accuracy <= self.max_horizontal_m
            && fix.vertical_accuracy <= self.max_vertical_m
            && fix.heading_accuracy <= self.max_heading_deg
    }
}
