//! Mission progress records and the CSV flight log

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::Position;
use crate::types::{MissionOutcome, MissionState};

/// Progress after one waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointReport {
    /// Position in the sweep order, starting at 0
    pub index: u64,
    pub row: u32,
    pub column: u32,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    /// Distance from the previous position to this waypoint
    pub leg_distance_m: f64,
    pub total_distance_m: f64,
    /// Battery estimate after flying the leg
    pub remaining_percent: f64,
    pub distance_to_home_m: f64,
    pub required_to_return_percent: f64,
}

/// Summary of a mission that ended without a vehicle failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionReport {
    pub outcome: MissionOutcome,
    /// Home position; `None` when the mission stopped before takeoff
    pub home: Option<Position>,
    pub starting_battery_percent: Option<f64>,
    pub final_remaining_percent: Option<f64>,
    pub total_distance_m: f64,
    pub waypoints_planned: u64,
    pub waypoints: Vec<WaypointReport>,
}

impl MissionReport {
    pub fn waypoints_visited(&self) -> u64 {
        self.waypoints.len() as u64
    }

    /// Share of planned waypoints that were visited, 0.0 to 1.0
    pub fn coverage(&self) -> f64 {
        if self.waypoints_planned == 0 {
            return 1.0;
        }
        self.waypoints_visited() as f64 / self.waypoints_planned as f64
    }

    /// Writes a statistics header followed by one CSV row per waypoint
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "# Statistics")?;
        writeln!(writer, "# Outcome: {}", self.outcome)?;
        writeln!(
            writer,
            "# Waypoints visited: {}/{}",
            self.waypoints_visited(),
            self.waypoints_planned
        )?;
        writeln!(writer, "# Total distance: {:.2} m", self.total_distance_m)?;
        if let Some(start) = self.starting_battery_percent {
            writeln!(writer, "# Starting battery: {:.2}%", start)?;
        }
        if let Some(remaining) = self.final_remaining_percent {
            writeln!(writer, "# Final battery estimate: {:.2}%", remaining)?;
        }

        let mut csv_writer = csv::Writer::from_writer(writer);
        if self.waypoints.is_empty() {
            csv_writer.write_record(WAYPOINT_COLUMNS)?;
        }
        for waypoint in &self.waypoints {
            csv_writer.serialize(waypoint)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the flight log to `path`
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_csv(BufWriter::new(file))
    }
}

const WAYPOINT_COLUMNS: [&str; 11] = [
    "index",
    "row",
    "column",
    "latitude_deg",
    "longitude_deg",
    "altitude_m",
    "leg_distance_m",
    "total_distance_m",
    "remaining_percent",
    "distance_to_home_m",
    "required_to_return_percent",
];

/// Observer view of a running mission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionSnapshot {
    pub state: MissionState,
    pub waypoints_visited: u64,
    pub waypoints_total: u64,
    pub remaining_percent: Option<f64>,
    pub distance_to_home_m: Option<f64>,
    pub total_distance_m: f64,
    pub outcome: Option<MissionOutcome>,
    /// Error text once the mission has failed
    pub failure: Option<String>,
}

impl MissionSnapshot {
    pub fn idle(waypoints_total: u64) -> Self {
        Self {
            state: MissionState::Idle,
            waypoints_visited: 0,
            waypoints_total,
            remaining_percent: None,
            distance_to_home_m: None,
            total_distance_m: 0.0,
            outcome: None,
            failure: None,
        }
    }
}
