//! Survey mission execution
//!
//! [`MissionController`] drives a [`Vehicle`] through connect, arm, takeoff and
//! a serpentine sweep, deducting the energy of every leg from the battery
//! reading taken after takeoff. After each waypoint it compares the remaining
//! estimate with the energy needed to fly home and sends the vehicle home
//! early when the estimate falls short.
//!
//! ```no_run
//! use seed_sweep::{MissionArea, MissionConfig, MissionController, SimulatedVehicle};
//!
//! # async fn demo() -> seed_sweep::Result<()> {
//! let config = MissionConfig::default();
//! let area = MissionArea::new(4, 3)?;
//! let mut mission = MissionController::new(SimulatedVehicle::from_config(&config), area, config);
//!
//! let report = mission.run().await?;
//! println!("{} ({} waypoints)", report.outcome, report.waypoints_visited());
//! # Ok(())
//! # }
//! ```

pub mod report;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::MissionConfig;
use crate::energy::{EnergyModel, EnergyState};
use crate::error::{Error, Result};
use crate::geo::{self, Coordinate, Position};
use crate::planner::GridPlanner;
use crate::types::{AbortReason, MissionArea, MissionOutcome, MissionState, Waypoint};
use crate::vehicle::{GuardedVehicle, LinkPolicy, Vehicle};

pub use self::report::{MissionReport, MissionSnapshot, WaypointReport};

/// Requests an operator abort of a running mission
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Signals the mission to return home at its next suspension point
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Runs one survey mission against a vehicle
///
/// The controller is the only writer of the mission state and the energy
/// estimate. It runs once; calling [`run`](Self::run) again is an error.
pub struct MissionController<V> {
    vehicle: GuardedVehicle<V>,
    config: MissionConfig,
    area: MissionArea,
    energy_model: EnergyModel,
    state: MissionState,
    history: Vec<MissionState>,
    energy: Option<EnergyState>,
    home: Option<Position>,
    starting_battery_percent: Option<f64>,
    total_distance_m: f64,
    distance_to_home_m: Option<f64>,
    visited: Vec<WaypointReport>,
    outcome: Option<MissionOutcome>,
    abort_tx: Arc<watch::Sender<bool>>,
    abort_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<MissionSnapshot>,
}

impl<V: Vehicle> MissionController<V> {
    /// Creates a mission over `area`. Vehicle calls are bounded by the
    /// timeouts and retries in `config`.
    pub fn new(vehicle: V, area: MissionArea, config: MissionConfig) -> Self {
        let (abort_tx, abort_rx) = watch::channel(false);
        let (snapshot_tx, _) = watch::channel(MissionSnapshot::idle(area.cell_count()));

        Self {
            vehicle: GuardedVehicle::new(vehicle, LinkPolicy::from_config(&config)),
            energy_model: config.energy_model(),
            config,
            area,
            state: MissionState::Idle,
            history: vec![MissionState::Idle],
            energy: None,
            home: None,
            starting_battery_percent: None,
            total_distance_m: 0.0,
            distance_to_home_m: None,
            visited: Vec::new(),
            outcome: None,
            abort_tx: Arc::new(abort_tx),
            abort_rx,
            snapshot_tx,
        }
    }

    pub fn state(&self) -> MissionState {
        self.state
    }

    /// Every state the mission has entered, in order
    pub fn history(&self) -> &[MissionState] {
        &self.history
    }

    pub fn area(&self) -> MissionArea {
        self.area
    }

    /// Remaining battery estimate, once the starting level has been read
    pub fn remaining_percent(&self) -> Option<f64> {
        self.energy.map(|e| e.remaining_percent())
    }

    pub fn vehicle(&self) -> &V {
        self.vehicle.inner()
    }

    pub fn into_vehicle(self) -> V {
        self.vehicle.into_inner()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: Arc::clone(&self.abort_tx),
        }
    }

    /// Subscribes to progress snapshots
    pub fn subscribe(&self) -> watch::Receiver<MissionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Flies the mission
    ///
    /// Returns the report for full coverage and for early aborts. Vehicle
    /// failures are returned as errors; if the vehicle was already sweeping, a
    /// return-to-launch is attempted first.
    pub async fn run(&mut self) -> Result<MissionReport> {
        if self.state != MissionState::Idle {
            return Err(Error::InvalidState(format!(
                "mission already ran (state: {})",
                self.state
            )));
        }

        match self.execute().await {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.publish();
                info!(%outcome, visited = self.visited.len(), "Mission finished");
                Ok(self.report(outcome))
            }
            Err(err) => {
                if matches!(self.state, MissionState::Scanning | MissionState::Aborting) {
                    warn!(error = %err, "Vehicle failure in flight, attempting return-to-launch");
                    if let Err(rtl_err) = self.vehicle.return_to_launch().await {
                        error!(error = %rtl_err, "Best-effort return-to-launch failed");
                    }
                }
                error!(state = %self.state, error = %err, "Mission failed");
                self.state = MissionState::Failed;
                self.history.push(MissionState::Failed);
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> Result<MissionOutcome> {
        let address = self.config.connection_address.clone();

        self.transition(MissionState::Connecting)?;
        info!(vehicle = self.vehicle.name(), %address, "Connecting to vehicle");
        self.vehicle.connect(&address).await?;
        info!("Vehicle connected");
        if self.abort_requested() {
            return self.finish_on_ground().await;
        }

        self.vehicle.arm().await?;
        self.transition(MissionState::Armed)?;
        info!("Armed");
        if self.abort_requested() {
            return self.finish_on_ground().await;
        }

        self.transition(MissionState::TakingOff)?;
        info!("Taking off");
        self.vehicle.takeoff().await?;
        if self.settle(self.config.takeoff_settle()).await {
            return self.return_home(MissionOutcome::Aborted(AbortReason::Operator)).await;
        }

        let home = self.vehicle.read_position().await?;
        let battery = self.vehicle.read_battery().await?;
        self.home = Some(home);
        self.starting_battery_percent = Some(battery);
        self.energy = Some(EnergyState::new(battery));
        self.distance_to_home_m = Some(0.0);

        let altitude_m = home.absolute_altitude_m + self.config.altitude_offset_m;
        let planner = GridPlanner::new(home.coordinate, self.area, self.config.step_size_m, altitude_m);

        let estimate = planner.estimate(&self.energy_model);
        if estimate.required_percent > battery {
            warn!(
                required = estimate.required_percent,
                battery,
                "Battery will not cover the whole area, expect an early return"
            );
        }

        if self.area.is_empty() {
            info!("Empty survey area, returning home");
            self.transition(MissionState::ReturningHome)?;
            self.vehicle.return_to_launch().await?;
            self.transition(MissionState::Complete)?;
            return Ok(MissionOutcome::Completed);
        }

        self.transition(MissionState::Scanning)?;
        info!(
            waypoints = estimate.waypoint_count,
            step_m = self.config.step_size_m,
            altitude_m,
            "Starting area scan"
        );

        let mut previous = home.coordinate;
        for (index, waypoint) in planner.generate().enumerate() {
            if self.abort_requested() {
                return self.return_home(MissionOutcome::Aborted(AbortReason::Operator)).await;
            }

            let (progress, cancelled) = self.visit(index as u64, previous, home.coordinate, waypoint).await?;

            if !self.can_return(progress.required_to_return_percent) {
                warn!(
                    remaining = progress.remaining_percent,
                    required = progress.required_to_return_percent,
                    "Battery too low to return home"
                );
                return self.return_home(MissionOutcome::Aborted(AbortReason::LowBattery)).await;
            }
            if cancelled {
                return self.return_home(MissionOutcome::Aborted(AbortReason::Operator)).await;
            }

            previous = waypoint.target;
        }

        info!("Scan complete, returning home");
        self.transition(MissionState::ReturningHome)?;
        self.vehicle.return_to_launch().await?;
        self.transition(MissionState::Complete)?;
        Ok(MissionOutcome::Completed)
    }

    /// Flies one leg, drops a seed and records progress.
    /// The flag is set when an abort was requested during the dwell.
    async fn visit(
        &mut self,
        index: u64,
        previous: Coordinate,
        home: Coordinate,
        waypoint: Waypoint,
    ) -> Result<(WaypointReport, bool)> {
        let leg_distance_m = geo::distance(previous, waypoint.target);
        self.total_distance_m += leg_distance_m;

        let energy = self
            .energy
            .as_mut()
            .ok_or_else(|| Error::InvalidState("battery level not read before scanning".to_string()))?;
        energy.consume(self.energy_model.consume_for_distance(leg_distance_m));
        let remaining_percent = energy.remaining_percent();

        self.vehicle
            .goto_location(waypoint.target, waypoint.altitude_m, self.config.heading_deg)
            .await?;
        info!(
            latitude = waypoint.target.latitude_deg,
            longitude = waypoint.target.longitude_deg,
            altitude = waypoint.altitude_m,
            "Flying to point"
        );
        info!(row = waypoint.cell.row, column = waypoint.cell.column, "Dropping seed");
        let cancelled = self.settle(self.config.waypoint_dwell()).await;

        let distance_to_home_m = geo::distance(waypoint.target, home);
        let required_to_return_percent = self.energy_model.required_to_return(waypoint.target, home);

        info!(
            battery = %format!("{:.2}%", remaining_percent),
            distance_to_home = %format!("{:.2} m", distance_to_home_m),
            "Waypoint {} done",
            index
        );

        let progress = WaypointReport {
            index,
            row: waypoint.cell.row,
            column: waypoint.cell.column,
            latitude_deg: waypoint.target.latitude_deg,
            longitude_deg: waypoint.target.longitude_deg,
            altitude_m: waypoint.altitude_m,
            leg_distance_m,
            total_distance_m: self.total_distance_m,
            remaining_percent,
            distance_to_home_m,
            required_to_return_percent,
        };

        self.distance_to_home_m = Some(distance_to_home_m);
        self.visited.push(progress.clone());
        self.publish();

        Ok((progress, cancelled))
    }

    /// Aborts the sweep: Aborting, ReturningHome, return-to-launch, Complete
    async fn return_home(&mut self, outcome: MissionOutcome) -> Result<MissionOutcome> {
        self.transition(MissionState::Aborting)?;
        self.transition(MissionState::ReturningHome)?;
        self.vehicle.return_to_launch().await?;
        self.transition(MissionState::Complete)?;
        Ok(outcome)
    }

    /// Operator abort before the vehicle left the ground; an armed vehicle is disarmed
    async fn finish_on_ground(&mut self) -> Result<MissionOutcome> {
        info!(state = %self.state, "Mission aborted before takeoff");
        if self.state == MissionState::Armed {
            self.vehicle.disarm().await?;
            info!("Disarmed");
        }
        self.transition(MissionState::Complete)?;
        Ok(MissionOutcome::Aborted(AbortReason::Operator))
    }

    /// Suspends for `duration`; returns true if an abort was requested
    async fn settle(&mut self, duration: Duration) -> bool {
        if self.abort_requested() {
            return true;
        }

        let mut abort_rx = self.abort_rx.clone();
        let aborted = async move { abort_rx.wait_for(|aborted| *aborted).await.is_ok() };

        tokio::select! {
            _ = tokio::time::sleep(duration) => self.abort_requested(),
            aborted = aborted => aborted,
        }
    }

    /// Abort check: strictly less energy than needed to fly home fails it
    fn can_return(&self, required_percent: f64) -> bool {
        self.energy.map_or(false, |energy| energy.can_return(required_percent))
    }

    fn abort_requested(&self) -> bool {
        *self.abort_rx.borrow()
    }

    fn transition(&mut self, next: MissionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "illegal transition {} -> {}",
                self.state, next
            )));
        }

        info!(from = %self.state, to = %next, "Mission state change");
        self.state = next;
        self.history.push(next);
        self.publish();
        Ok(())
    }

    fn snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            state: self.state,
            waypoints_visited: self.visited.len() as u64,
            waypoints_total: self.area.cell_count(),
            remaining_percent: self.remaining_percent(),
            distance_to_home_m: self.distance_to_home_m,
            total_distance_m: self.total_distance_m,
            outcome: self.outcome,
            failure: None,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn publish_failure(&self, err: &Error) {
        let mut snapshot = self.snapshot();
        snapshot.failure = Some(err.to_string());
        self.snapshot_tx.send_replace(snapshot);
    }

    fn report(&self, outcome: MissionOutcome) -> MissionReport {
        MissionReport {
            outcome,
            home: self.home,
            starting_battery_percent: self.starting_battery_percent,
            final_remaining_percent: self.remaining_percent(),
            total_distance_m: self.total_distance_m,
            waypoints_planned: self.area.cell_count(),
            waypoints: self.visited.clone(),
        }
    }
}
