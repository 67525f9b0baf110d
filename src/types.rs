//! Core data types for seed-sweep

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// Survey area size in whole grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionArea {
    /// Number of rows, swept along the latitude axis
    pub width: u32,
    /// Number of columns per row, swept along the longitude axis
    pub height: u32,
}

impl MissionArea {
    /// Creates a validated mission area; both dimensions must be at least 1
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidMissionArea("width must be at least 1".to_string()));
        }
        if height == 0 {
            return Err(Error::InvalidMissionArea("height must be at least 1".to_string()));
        }

        Ok(Self { width, height })
    }

    /// Returns the total number of cells, i.e. the number of waypoints
    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns whether the area has no cells to visit
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Row/column index of a waypoint inside the survey grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub row: u32,
    pub column: u32,
}

/// A single target the vehicle is commanded to reach
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    pub target: Coordinate,
    pub altitude_m: f64,
    pub cell: GridCell,
}

/// Mission state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionState {
    Idle,
    Connecting,
    Armed,
    TakingOff,
    Scanning,
    Aborting,
    ReturningHome,
    Complete,
    /// Terminal state after a vehicle failure
    Failed,
}

impl MissionState {
    /// Returns whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: MissionState) -> bool {
        use MissionState::*;

        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Armed) => true,
            (Armed, TakingOff) => true,
            (TakingOff, Scanning) => true,
            // Empty area, or operator abort while settling
            (TakingOff, Aborting) | (TakingOff, ReturningHome) => true,
            (Scanning, Aborting) | (Scanning, ReturningHome) => true,
            (Aborting, ReturningHome) => true,
            (ReturningHome, Complete) => true,
            // Operator abort before the vehicle left the ground
            (Connecting, Complete) | (Armed, Complete) => true,
            (Complete, _) | (Failed, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    /// Returns whether the mission has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, MissionState::Complete | MissionState::Failed)
    }

    /// Returns whether the vehicle may be airborne and committed to the mission
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            MissionState::Scanning | MissionState::Aborting | MissionState::ReturningHome
        )
    }

    /// Returns the name of this state
    pub fn name(self) -> &'static str {
        match self {
            MissionState::Idle => "idle",
            MissionState::Connecting => "connecting",
            MissionState::Armed => "armed",
            MissionState::TakingOff => "taking_off",
            MissionState::Scanning => "scanning",
            MissionState::Aborting => "aborting",
            MissionState::ReturningHome => "returning_home",
            MissionState::Complete => "complete",
            MissionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a mission stopped before covering the whole area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Remaining battery fell below the energy needed to fly home
    LowBattery,
    /// Cancelled from outside the mission
    Operator,
}

/// How a mission that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum MissionOutcome {
    /// Every waypoint was visited
    Completed,
    /// Partial coverage, vehicle sent home early
    Aborted(AbortReason),
}

impl MissionOutcome {
    pub fn is_full_coverage(&self) -> bool {
        matches!(self, MissionOutcome::Completed)
    }
}

impl std::fmt::Display for MissionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionOutcome::Completed => write!(f, "full coverage completed"),
            MissionOutcome::Aborted(AbortReason::LowBattery) => {
                write!(f, "aborted early for battery safety")
            }
            MissionOutcome::Aborted(AbortReason::Operator) => {
                write!(f, "aborted early by operator")
            }
        }
    }
}
