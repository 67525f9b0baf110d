//! seed-sweep - Boustrophedon seed-dropping survey missions for multirotor UAVs
//!
//! seed-sweep plans a serpentine grid over a rectangular area anchored at the
//! vehicle's home position, flies it waypoint by waypoint while tracking an
//! estimated battery level, and returns home early when the estimate no longer
//! covers the flight back.
//!
//! # Examples
//!
//! ## Planning a sweep
//!
//! ```
//! use seed_sweep::{Coordinate, GridPlanner, MissionArea};
//!
//! let area = MissionArea::new(3, 2)?;
//! let planner = GridPlanner::new(Coordinate::new(0.0, 0.0), area, 3.0, 10.0);
//!
//! for waypoint in planner.generate() {
//!     println!("{:?} -> {}", waypoint.cell, waypoint.target);
//! }
//! # Ok::<(), seed_sweep::Error>(())
//! ```
//!
//! ## Flying against the simulator
//!
//! ```no_run
//! use seed_sweep::{MissionArea, MissionConfig, MissionController, SimulatedVehicle};
//!
//! # async fn demo() -> seed_sweep::Result<()> {
//! let config = MissionConfig::default();
//! let vehicle = SimulatedVehicle::from_config(&config);
//! let mut mission = MissionController::new(vehicle, MissionArea::new(5, 5)?, config);
//!
//! let report = mission.run().await?;
//! println!("Outcome: {}", report.outcome);
//! report.save_csv("flight.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod energy;
pub mod error;
pub mod geo;
pub mod input;
pub mod mission;
pub mod planner;
pub mod types;
pub mod vehicle;

pub use config::MissionConfig;
pub use energy::{EnergyModel, EnergyState};
pub use error::{Error, Result};
pub use geo::{Coordinate, Position};
pub use mission::{AbortHandle, MissionController, MissionReport, MissionSnapshot};
pub use planner::{GridPlanner, PlanEstimate};
pub use types::{AbortReason, GridCell, MissionArea, MissionOutcome, MissionState, Waypoint};
pub use vehicle::{GuardedVehicle, MavlinkVehicle, SimulatedVehicle, Vehicle};
