//! Linear battery model for survey flights
//!
//! Battery use is proportional to distance flown. The conversion factor is
//! configuration (`MissionConfig::energy_per_meter_percent`), 1% per meter by
//! default.

use serde::Serialize;

use crate::geo::{self, Coordinate};

/// Default battery percent consumed per meter flown
pub const DEFAULT_ENERGY_PER_METER_PERCENT: f64 = 1.0;

/// Converts distance into battery percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    energy_per_meter_percent: f64,
}

impl EnergyModel {
    /// Creates a model with the given percent-per-meter factor
    pub fn new(energy_per_meter_percent: f64) -> Self {
        Self { energy_per_meter_percent }
    }

    /// Returns the percent-per-meter factor
    pub fn energy_per_meter_percent(&self) -> f64 {
        self.energy_per_meter_percent
    }

    /// Battery percent used to fly `d_meters`
    pub fn consume_for_distance(&self, d_meters: f64) -> f64 {
        d_meters * self.energy_per_meter_percent
    }

    /// Battery percent needed to fly straight from `current` back to `home`
    pub fn required_to_return(&self, current: Coordinate, home: Coordinate) -> f64 {
        self.consume_for_distance(geo::distance(current, home))
    }
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self::new(DEFAULT_ENERGY_PER_METER_PERCENT)
    }
}

/// Remaining battery estimate tracked during a mission
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyState {
    remaining_percent: f64,
}

impl EnergyState {
    /// Starts from a battery telemetry reading
    pub fn new(remaining_percent: f64) -> Self {
        Self { remaining_percent }
    }

    pub fn remaining_percent(&self) -> f64 {
        self.remaining_percent
    }

    /// Deducts `percent` from the estimate. Negative amounts are ignored so the
    /// estimate never goes up.
    pub fn consume(&mut self, percent: f64) {
        if percent > 0.0 {
            self.remaining_percent -= percent;
        }
    }

    /// Whether the remaining estimate still covers `required_percent`.
    /// Only a strictly smaller remainder fails the check.
    pub fn can_return(&self, required_percent: f64) -> bool {
        !(self.remaining_percent < required_percent)
    }

    /// Remaining minus required; negative when the vehicle cannot make it home
    pub fn margin(&self, required_percent: f64) -> f64 {
        self.remaining_percent - required_percent
    }
}
