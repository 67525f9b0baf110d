//! Error types for seed-sweep

use std::io;

/// Result type for seed-sweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while planning or flying a mission
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The vehicle link could not be established
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// The flight controller refused a command (arm, takeoff, goto, RTL)
    #[error("Command rejected: {command}: {reason}")]
    CommandRejected {
        command: &'static str,
        reason: String,
    },

    /// Position or battery telemetry could not be read
    #[error("Telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    /// Width or height of the survey area is not a positive integer
    #[error("Invalid mission area: {0}")]
    InvalidMissionArea(String),

    /// A vehicle call did not answer within its time bound
    #[error("Communication timeout during {0}")]
    CommunicationTimeout(&'static str),

    /// The mission state machine was driven out of order
    #[error("Invalid mission state: {0}")]
    InvalidState(String),

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Flight log could not be written
    #[error("Report error: {0}")]
    Report(#[from] csv::Error),
}

impl Error {
    /// Whether this error came from the vehicle link rather than from local input
    pub fn is_vehicle_failure(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailure(_)
                | Error::CommandRejected { .. }
                | Error::TelemetryUnavailable(_)
                | Error::CommunicationTimeout(_)
        )
    }
}
