//! Mission configuration
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::energy::{EnergyModel, DEFAULT_ENERGY_PER_METER_PERCENT};
use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// Tunable parameters of a survey mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Flight controller address, e.g. `udpin:0.0.0.0:14540`
    pub connection_address: String,
    /// Distance between neighbouring grid cells in meters
    pub step_size_m: f64,
    /// Mission altitude above the home position's absolute altitude
    pub altitude_offset_m: f64,
    /// Heading sent with every goto command, degrees
    pub heading_deg: f64,
    /// Battery percent consumed per meter flown
    pub energy_per_meter_percent: f64,
    /// Pause after the takeoff command before the sweep starts
    pub takeoff_settle_ms: u64,
    /// Pause at each waypoint for the seed drop
    pub waypoint_dwell_ms: u64,
    /// Time bound for establishing the vehicle link
    pub connect_timeout_ms: u64,
    /// Time bound for each command and telemetry read
    pub command_timeout_ms: u64,
    /// Extra attempts for arm, takeoff, goto and return-to-launch
    pub command_retries: u32,
    /// Pause before each retry
    pub retry_backoff_ms: u64,
    /// Attempts allowed when prompting for the area size
    pub max_input_attempts: u32,
    /// Home position of the built-in simulated vehicle
    pub sim_home: Coordinate,
    /// Absolute altitude of the simulated vehicle's home
    pub sim_home_altitude_m: f64,
    /// Starting battery of the simulated vehicle
    pub sim_battery_percent: f64,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            connection_address: "udpin:0.0.0.0:14540".to_string(),
            step_size_m: 3.0,
            altitude_offset_m: 4.0,
            heading_deg: 0.0,
            energy_per_meter_percent: DEFAULT_ENERGY_PER_METER_PERCENT,
            takeoff_settle_ms: 10_000,
            waypoint_dwell_ms: 3_000,
            connect_timeout_ms: 30_000,
            command_timeout_ms: 10_000,
            command_retries: 1,
            retry_backoff_ms: 500,
            max_input_attempts: 3,
            sim_home: Coordinate::new(47.397742, 8.545594),
            sim_home_altitude_m: 488.0,
            sim_battery_percent: 100.0,
        }
    }
}

impl MissionConfig {
    /// Loads and validates a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parses and validates a JSON config document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: MissionConfig = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.step_size_m.is_finite() && self.step_size_m > 0.0) {
            return Err(Error::Config(format!("step_size_m must be positive, got {}", self.step_size_m)));
        }
        if !(self.energy_per_meter_percent.is_finite() && self.energy_per_meter_percent > 0.0) {
            return Err(Error::Config(format!(
                "energy_per_meter_percent must be positive, got {}",
                self.energy_per_meter_percent
            )));
        }
        if !self.altitude_offset_m.is_finite() {
            return Err(Error::Config("altitude_offset_m must be finite".to_string()));
        }
        if self.command_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        if self.max_input_attempts == 0 {
            return Err(Error::Config("max_input_attempts must be at least 1".to_string()));
        }
        if self.connection_address.trim().is_empty() {
            return Err(Error::Config("connection_address must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn energy_model(&self) -> EnergyModel {
        EnergyModel::new(self.energy_per_meter_percent)
    }

    pub fn takeoff_settle(&self) -> Duration {
        Duration::from_millis(self.takeoff_settle_ms)
    }

    pub fn waypoint_dwell(&self) -> Duration {
        Duration::from_millis(self.waypoint_dwell_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
