//! # Vehicle driver contract
//!
//! The driver is the component which talks to the flight control firmware, normally over a
//! MAVLink-style RPC transport. The guidance software never speaks to the firmware itself, it
//! drives one of these trait objects. All calls are asynchronous as each one may wait on the
//! firmware's acknowledgement.
//!
//! Two independent execution units converge on the same driver at runtime, the setpoint publisher
//! and the command dispatch worker. The driver implementation is responsible for making
//! concurrent calls from those two sources safe; the guidance software does not impose mutual
//! exclusion between them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use async_trait::async_trait;
use thiserror::Error;

use crate::cmd::ControlCommand;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Errors raised by a vehicle driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Could not establish the connection to the vehicle. Fatal when raised during worker
    /// startup.
    #[error("Could not connect to the vehicle: {0}")]
    ConnectionFailed(String),

    /// The driver is not connected, so the call cannot be made.
    #[error("The driver is not connected to the vehicle")]
    NotConnected,

    /// The vehicle rejected or failed to execute a command. Transient, the caller should retry
    /// at its next tick.
    #[error("The vehicle rejected or failed to execute the command: {0}")]
    CommandFailed(String)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The contract a vehicle driver must implement.
///
/// Command failures are retryable at the caller's next tick, with one exception: a
/// [`DriverError::ConnectionFailed`] from [`VehicleDriver::connect`] is fatal to the worker that
/// owns the connection.
#[async_trait]
pub trait VehicleDriver: Send + Sync {
    /// Establish the connection to the vehicle.
    async fn connect(&self) -> Result<(), DriverError>;

    /// Release the connection to the vehicle.
    async fn disconnect(&self) -> Result<(), DriverError>;

    /// Put the firmware into offboard mode, so that it accepts streamed commands.
    async fn start_offboard_mode(&self) -> Result<(), DriverError>;

    /// Take the firmware out of offboard mode, returning control to the normal flight modes.
    async fn stop_offboard_mode(&self) -> Result<(), DriverError>;

    /// Send a body-frame velocity demand to the vehicle.
    async fn send_velocity_commands(
        &self,
        vx_ms: f64,
        vy_ms: f64,
        vz_ms: f64
    ) -> Result<(), DriverError>;

    /// Send a body attitude-rate and thrust demand to the vehicle.
    async fn send_attitude_rate_commands(
        &self,
        roll_rate_rads: f64,
        pitch_rate_rads: f64,
        yaw_rate_rads: f64,
        thrust: f64
    ) -> Result<(), DriverError>;

    /// Send a [`ControlCommand`], dispatching to the matching entry point for its variant.
    async fn send_control_command(&self, cmd: &ControlCommand) -> Result<(), DriverError> {
        match *cmd {
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms } => {
                self.send_velocity_commands(vx_ms, vy_ms, vz_ms).await
            }
            ControlCommand::AttitudeRate {
                roll_rate_rads,
                pitch_rate_rads,
                yaw_rate_rads,
                thrust
            } => {
                self.send_attitude_rate_commands(
                    roll_rate_rads,
                    pitch_rate_rads,
                    yaw_rate_rads,
                    thrust
                )
                .await
            }
        }
    }
}
