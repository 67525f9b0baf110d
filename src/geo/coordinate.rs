use serde::{Deserialize, Serialize};

use crate::geo::haversine;

/// A point on the Earth's surface in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude/longitude in degrees
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self { latitude_deg, longitude_deg }
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine::distance(*self, *other)
    }

    /// Returns the coordinate shifted by a linear offset in meters
    pub fn offset(&self, d_lat_m: f64, d_lon_m: f64) -> Coordinate {
        haversine::offset_to_coordinate(*self, d_lat_m, d_lon_m)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.7}, {:.7})", self.latitude_deg, self.longitude_deg)
    }
}

/// Position telemetry: a coordinate plus altitude above mean sea level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    pub absolute_altitude_m: f64,
}

impl Position {
    pub fn new(coordinate: Coordinate, absolute_altitude_m: f64) -> Self {
        Self { coordinate, absolute_altitude_m }
    }
}
