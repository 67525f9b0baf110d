//! Great-circle distance and flat-earth offset conversion

use crate::geo::coordinate::Coordinate;

/// Mean Earth radius used by the haversine formula, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude. Also applied to longitude without
/// latitude correction, so east/west offsets shrink away from the equator.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two coordinates in meters
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude_deg.to_radians();
    let phi2 = b.latitude_deg.to_radians();
    let d_phi = (b.latitude_deg - a.latitude_deg).to_radians();
    let d_lambda = (b.longitude_deg - a.longitude_deg).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h slightly outside [0, 1] near antipodes
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Shifts `origin` by `d_lat_m` meters north and `d_lon_m` meters east
pub fn offset_to_coordinate(origin: Coordinate, d_lat_m: f64, d_lon_m: f64) -> Coordinate {
    Coordinate::new(
        origin.latitude_deg + d_lat_m / METERS_PER_DEGREE,
        origin.longitude_deg + d_lon_m / METERS_PER_DEGREE,
    )
}
