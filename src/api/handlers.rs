use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::MissionConfig;
use crate::geo::Coordinate;
use crate::mission::{AbortHandle, MissionController, MissionSnapshot};
use crate::planner::GridPlanner;
use crate::types::MissionArea;
use crate::vehicle::{MavlinkVehicle, SimulatedVehicle, Vehicle};
use super::models::*;

/// Largest grid the plan preview will enumerate
pub const MAX_PLAN_WAYPOINTS: u64 = 10_000;

/// How long a finished mission stays readable
pub const DEFAULT_MISSION_RETENTION: Duration = Duration::from_secs(600);

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// Missions started through the API
struct MissionEntry {
    snapshots: watch::Receiver<MissionSnapshot>,
    abort: AbortHandle,
}

/// Shared server state
///
/// Finished missions are dropped from the registry once the retention
/// window has passed.
pub struct AppState {
    config: MissionConfig,
    missions: Arc<DashMap<u64, MissionEntry>>,
    next_id: AtomicU64,
    retention: Duration,
}

impl AppState {
    pub fn new(config: MissionConfig) -> Self {
        Self {
            config,
            missions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            retention: DEFAULT_MISSION_RETENTION,
        }
    }

    /// Sets how long a finished mission stays readable
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Number of running missions plus finished ones still retained
    pub fn mission_count(&self) -> usize {
        self.missions.len()
    }

    /// Registers a mission and runs it as its own task
    fn launch<V: Vehicle + 'static>(&self, mut mission: MissionController<V>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.missions.insert(
            id,
            MissionEntry {
                snapshots: mission.subscribe(),
                abort: mission.abort_handle(),
            },
        );

        let missions = Arc::clone(&self.missions);
        let retention = self.retention;
        tokio::spawn(async move {
            match mission.run().await {
                Ok(report) => info!(mission = id, outcome = %report.outcome, "API mission finished"),
                Err(err) => warn!(mission = id, error = %err, "API mission failed"),
            }
            drop(mission);

            tokio::time::sleep(retention).await;
            missions.remove(&id);
            debug!(mission = id, "Finished mission evicted");
        });

        id
    }
}

pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Query(req): Query<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let area = MissionArea::new(req.width, req.height)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    if area.cell_count() > MAX_PLAN_WAYPOINTS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Plan preview is limited to {} waypoints", MAX_PLAN_WAYPOINTS),
        ));
    }

    let step_size_m = req.step_size_m.unwrap_or(state.config.step_size_m);
    if !(step_size_m.is_finite() && step_size_m > 0.0) {
        return Err(api_error(StatusCode::BAD_REQUEST, "step_size_m must be positive"));
    }

    let altitude_m = req.altitude_m.unwrap_or(0.0) + state.config.altitude_offset_m;
    let planner = GridPlanner::new(Coordinate::new(req.latitude, req.longitude), area, step_size_m, altitude_m);

    Ok(Json(PlanResponse {
        estimate: planner.estimate(&state.config.energy_model()),
        waypoints: planner.generate().collect(),
    }))
}

pub async fn start_mission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartMissionRequest>,
) -> Result<(StatusCode, Json<StartMissionResponse>), ApiError> {
    let area = MissionArea::new(req.width, req.height)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut config = state.config.clone();
    if let Some(address) = req.address {
        config.connection_address = address;
    }

    let id = if req.simulate {
        let vehicle = SimulatedVehicle::from_config(&config);
        state.launch(MissionController::new(vehicle, area, config))
    } else {
        state.launch(MissionController::new(MavlinkVehicle::new(), area, config))
    };

    info!(mission = id, width = area.width, height = area.height, simulate = req.simulate, "Mission started");
    Ok((StatusCode::CREATED, Json(StartMissionResponse { id })))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<MissionSnapshot>, ApiError> {
    let entry = state
        .missions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown mission {}", id)))?;

    let snapshot = entry.snapshots.borrow().clone();
    Ok(Json(snapshot))
}

pub async fn abort_mission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<AbortResponse>, ApiError> {
    let entry = state
        .missions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown mission {}", id)))?;

    entry.abort.abort();
    info!(mission = id, "Operator abort requested");

    Ok(Json(AbortResponse {
        id,
        abort_requested: true,
    }))
}
