//! # Fixed-wing attitude-rate follower
//!
//! Attitude-rate guidance for fixed-wing platforms. Banks towards a target off centre
//! laterally and pitches towards one off centre vertically, turns are coordinated by the
//! autopilot downstream so the yaw rate demand is zero. Thrust is held at a constant cruise
//! value, fixed-wing platforms hold airspeed rather than trimming thrust against the image.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;

use crate::pid::ExtendedPid;
use crate::setpoint::{FieldValue, SetpointStore};
use vehicle_if::{
    cmd::ControlCommand,
    driver::VehicleDriver,
    limit::CommandLimiter,
    target::TargetCoordinates
};

use super::{
    check_target, norm_offsets, CycleClock, FollowCtrlParams, FollowError, Follower, FollowerType
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fixed-wing attitude-rate guidance.
pub struct FwAttitudeRate {
    cruise_thrust: f64,
    pid_roll: ExtendedPid,
    pid_pitch: ExtendedPid,
    frame_width_px: f64,
    frame_height_px: f64,
    clock: CycleClock,
    store: Arc<SetpointStore>,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FwAttitudeRate {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "attitude_view";

    /// Create a new fixed-wing follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            cruise_thrust: params.fw_attitude_rate.cruise_thrust,
            pid_roll: ExtendedPid::new(&params.fw_attitude_rate.pid_roll),
            pid_pitch: ExtendedPid::new(&params.fw_attitude_rate.pid_pitch),
            frame_width_px: params.frame_width_px,
            frame_height_px: params.frame_height_px,
            clock: CycleClock::new(params.nominal_dt_s, params.use_nominal_dt),
            store: Arc::new(SetpointStore::new(Self::PROFILE)?),
            driver,
            limiter
        })
    }
}

#[async_trait]
impl Follower for FwAttitudeRate {
    fn follower_type(&self) -> FollowerType {
        FollowerType::FwAttitudeRate
    }

    fn setpoint_store(&self) -> &Arc<SetpointStore> {
        &self.store
    }

    fn driver(&self) -> &Arc<dyn VehicleDriver> {
        &self.driver
    }

    fn limiter(&self) -> &Option<Arc<dyn CommandLimiter>> {
        &self.limiter
    }

    fn calculate_velocity_commands(
        &mut self,
        target: &TargetCoordinates
    ) -> Result<(), FollowError> {
        check_target(target)?;

        let (offset_x, offset_y) =
            norm_offsets(self.frame_width_px, self.frame_height_px, target);
        let dt_s = self.clock.dt_s();

        // Bank towards a target off centre laterally
        let roll_rate_rads = self.pid_roll.step(-offset_x, dt_s);

        // Negative Y offset means the target is above centre, demand a nose up pitch
        let pitch_rate_rads = self.pid_pitch.step(offset_y, dt_s);

        let yaw_rate_rads = 0.0;
        let thrust = self.cruise_thrust;

        self.store.commit_cycle(
            &[
                ("roll_rate_rads", FieldValue::Float(roll_rate_rads)),
                ("pitch_rate_rads", FieldValue::Float(pitch_rate_rads)),
                ("yaw_rate_rads", FieldValue::Float(yaw_rate_rads)),
                ("thrust", FieldValue::Float(thrust))
            ],
            ControlCommand::AttitudeRate {
                roll_rate_rads,
                pitch_rate_rads,
                yaw_rate_rads,
                thrust
            }
        )?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
