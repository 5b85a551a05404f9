//! Coordinate conversion module
//!
//! Converts geodetic coordinates (WGS84 latitude/longitude/altitude) into the
//! local tracking frame used by anchors. The local frame is y-up with x
//! pointing east and z pointing north, anchored at a reference geodetic pose.

mod types;

pub use types::{
    validate_lat_lon, CoordError, GeoPose, EARTH_MEAN_RADIUS_M, MAX_LAT, MAX_LON, MIN_LAT,
    MIN_LON, WGS84_A, WGS84_F,
};

use nalgebra::{UnitQuaternion, Vector3};

/// Converts geodetic coordinates to earth-centered earth-fixed meters.
#[inline]
pub fn geodetic_to_ecef(latitude: f64, longitude: f64, altitude: f64) -> Vector3<f64> {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();

    // Prime vertical radius of curvature
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();

    Vector3::new(
        (n + altitude) * cos_lat * cos_lon,
        (n + altitude) * cos_lat * sin_lon,
        (n * (1.0 - e2) + altitude) * sin_lat,
    )
}

/// East/north/up offset in meters of `target` as seen from `reference`.
pub fn enu_offset(reference: &GeoPose, target: &GeoPose) -> Vector3<f64> {
    let origin = geodetic_to_ecef(reference.latitude, reference.longitude, reference.altitude);
    let point = geodetic_to_ecef(target.latitude, target.longitude, target.altitude);
    let d = point - origin;

    let (sin_lat, cos_lat) = reference.latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = reference.longitude.to_radians().sin_cos();

    let east = -sin_lon * d.x + cos_lon * d.y;
    let north = -sin_lat * cos_lon * d.x - sin_lat * sin_lon * d.y + cos_lat * d.z;
    let up = cos_lat * cos_lon * d.x + cos_lat * sin_lon * d.y + sin_lat * d.z;

    Vector3::new(east, north, up)
}

/// Position of `target` in the y-up local frame rooted at `reference`.
#[inline]
pub fn to_local_position(reference: &GeoPose, target: &GeoPose) -> Vector3<f64> {
    let enu = enu_offset(reference, target);
    Vector3::new(enu.x, enu.z, enu.y)
}

/// Rotation about the local up axis for a heading in degrees clockwise from north.
#[inline]
pub fn heading_to_rotation(heading: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), heading.to_radians())
}

/// Great-circle distance in meters between two points (haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_MEAN_RADIUS_M * a.sqrt().asin()
}
