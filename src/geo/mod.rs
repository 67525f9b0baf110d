//! Geodesy helpers for survey planning
//!
//! Distances use the haversine formula on a spherical Earth. Offsets use a
//! fixed meters-per-degree factor on both axes.

pub mod coordinate;
pub mod haversine;

pub use coordinate::{Coordinate, Position};
pub use haversine::{distance, offset_to_coordinate, EARTH_RADIUS_M, METERS_PER_DEGREE};
