//! Vehicle control interface
//!
//! The mission only talks to the flight controller through the [`Vehicle`]
//! trait. Adapters:
//!
//! - [`SimulatedVehicle`]: in-process vehicle with scripted faults
//! - [`MavlinkVehicle`]: MAVLink link to a real or SITL autopilot
//! - [`GuardedVehicle`]: wraps either one with timeouts and retries

pub mod guarded;
pub mod mav;
pub mod sim;

use async_trait::async_trait;

use crate::error::Result;
use crate::geo::{Coordinate, Position};

pub use self::guarded::{GuardedVehicle, LinkPolicy};
pub use self::mav::MavlinkVehicle;
pub use self::sim::{Fault, Operation, SimulatedVehicle, VehicleCommand};

/// Commands and single-shot telemetry reads a mission needs from a vehicle.
///
/// Implementations must be `Send` so a mission can run as a spawned task.
/// The connected adapter itself plays the role of the connection handle.
#[async_trait]
pub trait Vehicle: Send {
    /// Human-readable adapter name for logs.
    fn name(&self) -> &str;

    /// Establish the link to the flight controller.
    async fn connect(&mut self, address: &str) -> Result<()>;

    /// Arm the motors.
    async fn arm(&mut self) -> Result<()>;

    /// Disarm the motors. Only valid on the ground.
    async fn disarm(&mut self) -> Result<()>;

    /// Take off to the autopilot's default takeoff altitude.
    async fn takeoff(&mut self) -> Result<()>;

    /// Fly to `target` at an absolute altitude with the given heading.
    async fn goto_location(&mut self, target: Coordinate, altitude_m: f64, heading_deg: f64) -> Result<()>;

    /// Hand control to the autopilot's return-to-launch behaviour.
    async fn return_to_launch(&mut self) -> Result<()>;

    /// Read the current position once.
    async fn read_position(&mut self) -> Result<Position>;

    /// Read the remaining battery percentage once.
    async fn read_battery(&mut self) -> Result<f64>;
}
