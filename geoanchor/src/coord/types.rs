//! Coordinate type definitions

use std::fmt;

/// Valid latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Mean earth radius in meters, used for great-circle distances.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// A geospatial target: where an anchor lives in the real world.
///
/// Altitude must use the same datum as the fixes produced by the
/// positioning provider for the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPose {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Rotation about the up axis, degrees clockwise from true north.
    pub heading: f64,
}

impl GeoPose {
    /// Create a validated geospatial pose.
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        heading: f64,
    ) -> Result<Self, CoordError> {
        let pose = Self {
            latitude,
            longitude,
            altitude,
            heading,
        };
        pose.validate()?;
        Ok(pose)
    }

    /// Create a pose facing north.
    pub fn facing_north(latitude: f64, longitude: f64, altitude: f64) -> Result<Self, CoordError> {
        Self::new(latitude, longitude, altitude, 0.0)
    }

    /// Check ranges and finiteness of every component.
    pub fn validate(&self) -> Result<(), CoordError> {
        validate_lat_lon(self.latitude, self.longitude)?;
        if !self.altitude.is_finite() {
            return Err(CoordError::InvalidAltitude(self.altitude));
        }
        if !self.heading.is_finite() {
            return Err(CoordError::InvalidHeading(self.heading));
        }
        Ok(())
    }
}

impl fmt::Display for GeoPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.1}m, hdg {:.0})",
            self.latitude, self.longitude, self.altitude, self.heading
        )
    }
}

/// Validate a latitude/longitude pair.
pub fn validate_lat_lon(latitude: f64, longitude: f64) -> Result<(), CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&latitude) {
        return Err(CoordError::InvalidLatitude(latitude));
    }
    if !(MIN_LON..=MAX_LON).contains(&longitude) {
        return Err(CoordError::InvalidLongitude(longitude));
    }
    Ok(())
}

/// Errors that can occur during coordinate validation and conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-90 to 90) or not a number
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180 to 180) or not a number
    InvalidLongitude(f64),
    /// Altitude is not finite
    InvalidAltitude(f64),
    /// Heading is not finite
    InvalidHeading(f64),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidAltitude(alt) => write!(f, "Invalid altitude: {}", alt),
            CoordError::InvalidHeading(hdg) => write!(f, "Invalid heading: {}", hdg),
        }
    }
}

impl std::error::Error for CoordError {}
