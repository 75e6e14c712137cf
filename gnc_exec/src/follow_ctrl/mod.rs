//! # Follow control module
//!
//! This module implements the follower strategies, one per supported flight behaviour. A
//! follower converts the tracked target's coordinates into a vehicle command each guidance
//! cycle:
//!
//! - `mc_velocity_chase` - multicopter body-velocity chase of the image offset
//! - `mc_velocity_ground` - multicopter ground-view guidance with a downward camera
//! - `mc_velocity_distance` - multicopter chase holding a measured range to the target
//! - `mc_velocity_position` - multicopter constant-position hold relative to the target
//! - `mc_attitude_rate` - multicopter attitude-rate guidance
//! - `fw_attitude_rate` - fixed-wing attitude-rate guidance
//! - `gm_velocity_chase` - gimbal-angle guided multicopter chase
//! - `gm_velocity_vector` - gimbal line-of-sight velocity-vector guidance
//!
//! Each follower owns its PID controllers and a [`SetpointStore`], committing every computed
//! command into the store as one atomic cycle. The setpoint publisher reads the store
//! independently of the compute cadence.
//!
//! Sign conventions shared by all strategies: a positive axis error means the vehicle must
//! command positive motion on that axis. Controllers run with a zero setpoint and are stepped
//! with the negated error as their measurement, so a positive error produces a positive
//! command.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod fw_attitude_rate;
mod gm_velocity_chase;
mod gm_velocity_vector;
mod mc_attitude_rate;
mod mc_velocity_chase;
mod mc_velocity_distance;
mod mc_velocity_ground;
mod mc_velocity_position;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use async_trait::async_trait;
use log::warn;
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

// Internal
use crate::setpoint::{FieldValue, SchemaError, SetpointStore, StoreError};
use vehicle_if::{
    driver::{DriverError, VehicleDriver},
    limit::{self, CommandLimiter},
    target::TargetCoordinates
};

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use fw_attitude_rate::FwAttitudeRate;
pub use gm_velocity_chase::GmVelocityChase;
pub use gm_velocity_vector::GmVelocityVector;
pub use mc_attitude_rate::McAttitudeRate;
pub use mc_velocity_chase::McVelocityChase;
pub use mc_velocity_distance::McVelocityDistance;
pub use mc_velocity_ground::McVelocityGround;
pub use mc_velocity_position::McVelocityPosition;
pub use params::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The flight behaviours a follower can implement.
///
/// The name encodes the platform (`mc` multicopter, `fw` fixed-wing, `gm` gimbal guided
/// multicopter) and the control domain (body velocity or attitude rate). The set is closed,
/// every variant is matched in [`make_follower`] so adding a behaviour without a construction
/// arm is a compile error.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerType {
    McVelocityChase,
    McVelocityGround,
    McVelocityDistance,
    McVelocityPosition,
    McAttitudeRate,
    FwAttitudeRate,
    GmVelocityChase,
    GmVelocityVector
}

/// Possible errors that can occur during follower operation.
#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    /// The supplied target coordinates cannot drive a guidance cycle. The previous command is
    /// retained.
    #[error("Invalid target coordinates: {0}")]
    InvalidTarget(String),

    #[error("Setpoint store error: {0}")]
    StoreError(StoreError),

    #[error("Setpoint profile error: {0}")]
    SchemaError(SchemaError),

    #[error("Vehicle driver error: {0}")]
    DriverError(DriverError),

    #[error("No command has been computed yet")]
    NoCommand,

    #[error("Unknown follower type: {0:?}")]
    UnknownFollowerType(String)
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The contract every follower strategy implements.
#[async_trait]
pub trait Follower: Send {
    /// The behaviour this follower implements.
    fn follower_type(&self) -> FollowerType;

    /// The setpoint store owned by this follower.
    fn setpoint_store(&self) -> &Arc<SetpointStore>;

    /// The vehicle driver this follower dispatches to.
    fn driver(&self) -> &Arc<dyn VehicleDriver>;

    /// The optional limit collaborator outgoing commands are routed through.
    fn limiter(&self) -> &Option<Arc<dyn CommandLimiter>>;

    /// Compute a new command from the target and commit it to the setpoint store.
    ///
    /// Pure computation, never blocks and never touches the vehicle. On any error the store
    /// retains the previous command, a malformed target never propagates downstream.
    fn calculate_velocity_commands(
        &mut self,
        target: &TargetCoordinates
    ) -> Result<(), FollowError>;

    /// Recompute from the target and immediately dispatch the committed command to the vehicle
    /// driver.
    ///
    /// The only suspension point is the driver call itself, the PID maths runs synchronously
    /// before it.
    async fn follow_target(&mut self, target: &TargetCoordinates) -> Result<(), FollowError> {
        self.calculate_velocity_commands(target)?;

        let cmd = self
            .setpoint_store()
            .last_command()?
            .ok_or(FollowError::NoCommand)?;

        if let Some(cmd) = limit::apply(self.limiter(), cmd) {
            self.driver().send_control_command(&cmd).await?;
        }

        Ok(())
    }

    /// Snapshot of the follower's telemetry fields.
    ///
    /// Safe to call concurrently with an in-progress compute, the snapshot is always a whole
    /// cycle, never a mix of two.
    fn get_follower_telemetry(&self) -> HashMap<String, FieldValue> {
        match self.setpoint_store().get_fields() {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Could not snapshot follower telemetry: {}", e);
                HashMap::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Timestep source for a follower's controllers.
///
/// Measures the wall clock gap between compute cycles, falling back to the nominal timestep on
/// the first cycle or always when configured for deterministic stepping.
pub(crate) struct CycleClock {
    nominal_dt_s: f64,
    use_nominal: bool,
    last_step: Option<Instant>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CycleClock {
    pub(crate) fn new(nominal_dt_s: f64, use_nominal: bool) -> Self {
        Self {
            nominal_dt_s,
            use_nominal,
            last_step: None
        }
    }

    /// Get the timestep to step the controllers with this cycle.
    pub(crate) fn dt_s(&mut self) -> f64 {
        let now = Instant::now();

        let dt_s = match (self.use_nominal, self.last_step) {
            (false, Some(last)) => (now - last).as_secs_f64(),
            _ => self.nominal_dt_s
        };

        self.last_step = Some(now);

        dt_s
    }
}

impl FollowerType {
    /// All supported follower types.
    pub const ALL: [FollowerType; 8] = [
        FollowerType::McVelocityChase,
        FollowerType::McVelocityGround,
        FollowerType::McVelocityDistance,
        FollowerType::McVelocityPosition,
        FollowerType::McAttitudeRate,
        FollowerType::FwAttitudeRate,
        FollowerType::GmVelocityChase,
        FollowerType::GmVelocityVector
    ];

    /// The canonical snake_case name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowerType::McVelocityChase => "mc_velocity_chase",
            FollowerType::McVelocityGround => "mc_velocity_ground",
            FollowerType::McVelocityDistance => "mc_velocity_distance",
            FollowerType::McVelocityPosition => "mc_velocity_position",
            FollowerType::McAttitudeRate => "mc_attitude_rate",
            FollowerType::FwAttitudeRate => "fw_attitude_rate",
            FollowerType::GmVelocityChase => "gm_velocity_chase",
            FollowerType::GmVelocityVector => "gm_velocity_vector"
        }
    }
}

impl fmt::Display for FollowerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FollowerType {
    type Err = FollowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FollowerType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| FollowError::UnknownFollowerType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the follower implementing the given behaviour.
pub fn make_follower(
    follower_type: FollowerType,
    params: &FollowCtrlParams,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
) -> Result<Box<dyn Follower>, FollowError> {
    Ok(match follower_type {
        FollowerType::McVelocityChase => {
            Box::new(McVelocityChase::new(params, driver, limiter)?)
        }
        FollowerType::McVelocityGround => {
            Box::new(McVelocityGround::new(params, driver, limiter)?)
        }
        FollowerType::McVelocityDistance => {
            Box::new(McVelocityDistance::new(params, driver, limiter)?)
        }
        FollowerType::McVelocityPosition => {
            Box::new(McVelocityPosition::new(params, driver, limiter)?)
        }
        FollowerType::McAttitudeRate => {
            Box::new(McAttitudeRate::new(params, driver, limiter)?)
        }
        FollowerType::FwAttitudeRate => {
            Box::new(FwAttitudeRate::new(params, driver, limiter)?)
        }
        FollowerType::GmVelocityChase => {
            Box::new(GmVelocityChase::new(params, driver, limiter)?)
        }
        FollowerType::GmVelocityVector => {
            Box::new(GmVelocityVector::new(params, driver, limiter)?)
        }
    })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Reject targets which cannot drive a guidance cycle.
pub(crate) fn check_target(target: &TargetCoordinates) -> Result<(), FollowError> {
    if !target.is_valid() {
        return Err(FollowError::InvalidTarget(format!(
            "non-finite coordinates: {:?}",
            target
        )));
    }

    Ok(())
}

/// Normalised image offsets of the target from the frame centre.
///
/// X+ right, Y+ down, each in [-1, 1]. Out of frame targets are clamped to the frame edge
/// rather than rejected.
pub(crate) fn norm_offsets(
    frame_width_px: f64,
    frame_height_px: f64,
    target: &TargetCoordinates
) -> (f64, f64) {
    let x = util::maths::lin_map((0.0, frame_width_px), (-1.0, 1.0), target.position_px.x);
    let y = util::maths::lin_map((0.0, frame_height_px), (-1.0, 1.0), target.position_px.y);

    (
        util::maths::clamp(&x, &-1.0, &1.0),
        util::maths::clamp(&y, &-1.0, &1.0)
    )
}

impl From<StoreError> for FollowError {
    fn from(e: StoreError) -> Self {
        FollowError::StoreError(e)
    }
}

impl From<SchemaError> for FollowError {
    fn from(e: SchemaError) -> Self {
        FollowError::SchemaError(e)
    }
}

impl From<DriverError> for FollowError {
    fn from(e: DriverError) -> Self {
        FollowError::DriverError(e)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
