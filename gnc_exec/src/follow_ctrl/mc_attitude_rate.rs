//! # Multicopter attitude-rate follower
//!
//! Steers the target to the frame centre with body attitude rates rather than velocities, for
//! vehicles flown in rate mode. A target right of centre demands a positive (right wing down)
//! roll rate, a target above centre demands a positive (nose up) pitch rate and extra thrust.
//! Thrust is trimmed about the hover value and always kept in [0, 1]. Multicopters strafe
//! rather than yaw, so the yaw rate demand is always zero.

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

/// Multicopter attitude-rate guidance.
pub struct McAttitudeRate {
    hover_thrust: f64,
    pid_roll: ExtendedPid,
    pid_pitch: ExtendedPid,
    pid_thrust: ExtendedPid,
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

impl McAttitudeRate {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "attitude_view";

    /// Create a new attitude-rate follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            hover_thrust: params.mc_attitude_rate.hover_thrust,
            pid_roll: ExtendedPid::new(&params.mc_attitude_rate.pid_roll),
            pid_pitch: ExtendedPid::new(&params.mc_attitude_rate.pid_pitch),
            pid_thrust: ExtendedPid::new(&params.mc_attitude_rate.pid_thrust),
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
impl Follower for McAttitudeRate {
    fn follower_type(&self) -> FollowerType {
        FollowerType::McAttitudeRate
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

        // Positive X offset means the target is right of centre, demand a roll towards it
        let roll_rate_rads = self.pid_roll.step(-offset_x, dt_s);

        // Negative Y offset means the target is above centre, demand a nose up pitch
        let pitch_rate_rads = self.pid_pitch.step(offset_y, dt_s);

        // Thrust trims about hover on the same axis, a target above centre demands a climb
        let thrust = util::maths::clamp(
            &(self.hover_thrust + self.pid_thrust.step(offset_y, dt_s)),
            &0.0,
            &1.0
        );

        let yaw_rate_rads = 0.0;

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

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{follow_params, RecordingDriver};

    #[test]
    fn test_target_above_centre_demands_climb() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = McAttitudeRate::new(&params, driver, None).unwrap();

        let target = TargetCoordinates::new(320.0, 100.0);
        follower.calculate_velocity_commands(&target).unwrap();

        match follower.setpoint_store().last_command().unwrap() {
            Some(ControlCommand::AttitudeRate {
                roll_rate_rads,
                pitch_rate_rads,
                yaw_rate_rads,
                thrust
            }) => {
                assert!(roll_rate_rads.abs() < 1e-9);
                assert!(pitch_rate_rads > 0.0, "Expected nose up, got {}", pitch_rate_rads);
                assert_eq!(yaw_rate_rads, 0.0);
                assert!(thrust > params.mc_attitude_rate.hover_thrust);
                assert!(thrust <= 1.0);
            }
            other => panic!("Expected an attitude rate command, got {:?}", other)
        }
    }

    #[test]
    fn test_thrust_stays_normalised_under_saturation() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = McAttitudeRate::new(&params, driver, None).unwrap();

        // Hammer the thrust axis with the target pinned at the frame top
        let target = TargetCoordinates::new(320.0, 0.0);
        for _ in 0..100 {
            follower.calculate_velocity_commands(&target).unwrap();

            match follower.setpoint_store().last_command().unwrap() {
                Some(ControlCommand::AttitudeRate { thrust, .. }) => {
                    assert!((0.0..=1.0).contains(&thrust));
                }
                other => panic!("Expected an attitude rate command, got {:?}", other)
            }
        }
    }
}
