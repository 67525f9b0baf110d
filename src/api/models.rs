use serde::{Deserialize, Serialize};

use crate::planner::PlanEstimate;
use crate::types::Waypoint;

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanRequest {
    pub width: u32,
    pub height: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Overrides the configured cell size
    #[serde(default)]
    pub step_size_m: Option<f64>,
    /// Home altitude used for the waypoint altitudes
    #[serde(default)]
    pub altitude_m: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub estimate: PlanEstimate,
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartMissionRequest {
    pub width: u32,
    pub height: u32,
    /// Fly the built-in simulated vehicle instead of a MAVLink autopilot
    #[serde(default = "default_simulate")]
    pub simulate: bool,
    /// Overrides the configured MAVLink address
    #[serde(default)]
    pub address: Option<String>,
}

fn default_simulate() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartMissionResponse {
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AbortResponse {
    pub id: u64,
    pub abort_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
