//! In-process simulated vehicle
//!
//! Moves instantly to commanded targets and reports a fixed battery level.
//! Faults can be scripted per operation to exercise the mission's failure
//! paths without a flight controller.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use crate::config::MissionConfig;
use crate::error::{Error, Result};
use crate::geo::{Coordinate, Position};
use crate::vehicle::Vehicle;

/// Height gained by the takeoff command, in meters
pub const SIM_TAKEOFF_ALTITUDE_M: f64 = 2.5;

/// Vehicle call kinds, used to script faults and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Arm,
    Disarm,
    Takeoff,
    Goto,
    ReturnToLaunch,
    ReadPosition,
    ReadBattery,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Arm => "arm",
            Operation::Disarm => "disarm",
            Operation::Takeoff => "takeoff",
            Operation::Goto => "goto_location",
            Operation::ReturnToLaunch => "return_to_launch",
            Operation::ReadPosition => "read_position",
            Operation::ReadBattery => "read_battery",
        }
    }
}

/// Scripted misbehaviour for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail immediately with the error kind matching the operation
    Reject,
    /// Never answer
    Hang,
}

/// A command the simulated vehicle accepted
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleCommand {
    Connect(String),
    Arm,
    Disarm,
    Takeoff,
    Goto {
        target: Coordinate,
        altitude_m: f64,
        heading_deg: f64,
    },
    ReturnToLaunch,
}

/// Deterministic stand-in for a flight controller
#[derive(Debug, Clone)]
pub struct SimulatedVehicle {
    home: Position,
    position: Position,
    battery_percent: f64,
    connected: bool,
    armed: bool,
    airborne: bool,
    faults: HashMap<(Operation, u32), Fault>,
    persistent_faults: HashMap<Operation, Fault>,
    calls: HashMap<Operation, u32>,
    commands: Vec<VehicleCommand>,
}

impl SimulatedVehicle {
    /// Creates a grounded vehicle at `home` with the given battery level
    pub fn new(home: Position, battery_percent: f64) -> Self {
        Self {
            home,
            position: home,
            battery_percent,
            connected: false,
            armed: false,
            airborne: false,
            faults: HashMap::new(),
            persistent_faults: HashMap::new(),
            calls: HashMap::new(),
            commands: Vec::new(),
        }
    }

    /// Creates the vehicle described by the `sim_*` config fields
    pub fn from_config(config: &MissionConfig) -> Self {
        Self::new(
            Position::new(config.sim_home, config.sim_home_altitude_m),
            config.sim_battery_percent,
        )
    }

    /// Makes the `call_number`-th call (1-based) of `operation` misbehave
    pub fn inject(mut self, operation: Operation, call_number: u32, fault: Fault) -> Self {
        self.faults.insert((operation, call_number), fault);
        self
    }

    /// Makes every call of `operation` misbehave
    pub fn inject_always(mut self, operation: Operation, fault: Fault) -> Self {
        self.persistent_faults.insert(operation, fault);
        self
    }

    /// Commands accepted so far, in order
    pub fn commands(&self) -> &[VehicleCommand] {
        &self.commands
    }

    /// Targets of accepted goto commands, in order
    pub fn goto_targets(&self) -> Vec<Coordinate> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                VehicleCommand::Goto { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    /// Number of calls of `operation`, including failed ones
    pub fn call_count(&self, operation: Operation) -> u32 {
        self.calls.get(&operation).copied().unwrap_or(0)
    }

    /// Distinct operations that have been called at least once
    pub fn operations_called(&self) -> HashSet<Operation> {
        self.calls.keys().copied().collect()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    /// Counts the call and applies any scripted fault
    async fn enter(&mut self, operation: Operation) -> Result<()> {
        let count = self.calls.entry(operation).or_insert(0);
        *count += 1;
        let call_number = *count;

        let fault = self
            .faults
            .get(&(operation, call_number))
            .or_else(|| self.persistent_faults.get(&operation))
            .copied();

        match fault {
            None => Ok(()),
            Some(Fault::Hang) => {
                debug!(operation = operation.name(), call_number, "Simulated vehicle hanging");
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(Fault::Reject) => Err(rejection(operation)),
        }
    }

    fn require_connected(&self, operation: Operation) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::ConnectionFailure(format!("{} before connect", operation.name())))
        }
    }
}

impl Default for SimulatedVehicle {
    fn default() -> Self {
        Self::from_config(&MissionConfig::default())
    }
}

fn rejection(operation: Operation) -> Error {
    match operation {
        Operation::Connect => Error::ConnectionFailure("simulated link down".to_string()),
        Operation::ReadPosition | Operation::ReadBattery => {
            Error::TelemetryUnavailable(format!("simulated {} dropout", operation.name()))
        }
        _ => Error::CommandRejected {
            command: operation.name(),
            reason: "simulated rejection".to_string(),
        },
    }
}

#[async_trait]
impl Vehicle for SimulatedVehicle {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn connect(&mut self, address: &str) -> Result<()> {
        self.enter(Operation::Connect).await?;
        self.connected = true;
        self.commands.push(VehicleCommand::Connect(address.to_string()));
        Ok(())
    }

    async fn arm(&mut self) -> Result<()> {
        self.enter(Operation::Arm).await?;
        self.require_connected(Operation::Arm)?;
        self.armed = true;
        self.commands.push(VehicleCommand::Arm);
        Ok(())
    }

    async fn disarm(&mut self) -> Result<()> {
        self.enter(Operation::Disarm).await?;
        self.require_connected(Operation::Disarm)?;
        if self.airborne {
            return Err(Error::CommandRejected {
                command: "disarm",
                reason: "vehicle is airborne".to_string(),
            });
        }
        self.armed = false;
        self.commands.push(VehicleCommand::Disarm);
        Ok(())
    }

    async fn takeoff(&mut self) -> Result<()> {
        self.enter(Operation::Takeoff).await?;
        self.require_connected(Operation::Takeoff)?;
        if !self.armed {
            return Err(Error::CommandRejected {
                command: "takeoff",
                reason: "vehicle not armed".to_string(),
            });
        }
        self.airborne = true;
        self.position.absolute_altitude_m = self.home.absolute_altitude_m + SIM_TAKEOFF_ALTITUDE_M;
        self.commands.push(VehicleCommand::Takeoff);
        Ok(())
    }

    async fn goto_location(&mut self, target: Coordinate, altitude_m: f64, heading_deg: f64) -> Result<()> {
        self.enter(Operation::Goto).await?;
        self.require_connected(Operation::Goto)?;
        if !self.airborne {
            return Err(Error::CommandRejected {
                command: "goto_location",
                reason: "vehicle not airborne".to_string(),
            });
        }
        self.position = Position::new(target, altitude_m);
        self.commands.push(VehicleCommand::Goto {
            target,
            altitude_m,
            heading_deg,
        });
        Ok(())
    }

    async fn return_to_launch(&mut self) -> Result<()> {
        self.enter(Operation::ReturnToLaunch).await?;
        self.require_connected(Operation::ReturnToLaunch)?;
        self.position = self.home;
        self.airborne = false;
        self.armed = false;
        self.commands.push(VehicleCommand::ReturnToLaunch);
        Ok(())
    }

    async fn read_position(&mut self) -> Result<Position> {
        self.enter(Operation::ReadPosition).await?;
        self.require_connected(Operation::ReadPosition)?;
        Ok(self.position)
    }

    async fn read_battery(&mut self) -> Result<f64> {
        self.enter(Operation::ReadBattery).await?;
        self.require_connected(Operation::ReadBattery)?;
        Ok(self.battery_percent)
    }
}
