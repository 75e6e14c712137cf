//! # Gimbal-angle chase follower
//!
//! A chase steered by the gimbal angles rather than the raw image offset, for vehicles whose
//! camera tracks the target on a stabilised mount. The gimbal keeps the target centred in the
//! frame, so the pan and tilt angles themselves are the pointing error. A positive pan (target
//! right of the nose) demands a rightwards velocity, a positive tilt (target below the
//! horizon) demands a descent.
//!
//! Requires gimbal angles on every cycle, a target without them is rejected. A yaw rate demand
//! for the downstream gimbal loop is recorded in the setpoint store alongside the velocities,
//! it is not part of the dispatched command.

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

use super::{check_target, CycleClock, FollowCtrlParams, FollowError, Follower, FollowerType};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gimbal-angle guided multicopter chase.
pub struct GmVelocityChase {
    forward_speed_ms: f64,
    pid_lateral: ExtendedPid,
    pid_vertical: ExtendedPid,
    pid_yaw: ExtendedPid,
    clock: CycleClock,
    store: Arc<SetpointStore>,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GmVelocityChase {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "gimbal_view";

    /// Create a new gimbal chase follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            forward_speed_ms: params.gm_velocity_chase.forward_speed_ms,
            pid_lateral: ExtendedPid::new(&params.gm_velocity_chase.pid_lateral),
            pid_vertical: ExtendedPid::new(&params.gm_velocity_chase.pid_vertical),
            pid_yaw: ExtendedPid::new(&params.gm_velocity_chase.pid_yaw),
            clock: CycleClock::new(params.nominal_dt_s, params.use_nominal_dt),
            store: Arc::new(SetpointStore::new(Self::PROFILE)?),
            driver,
            limiter
        })
    }
}

#[async_trait]
impl Follower for GmVelocityChase {
    fn follower_type(&self) -> FollowerType {
        FollowerType::GmVelocityChase
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

        let angles = target.gimbal_angles.ok_or_else(|| {
            FollowError::InvalidTarget("gimbal chase requires gimbal angles".to_string())
        })?;

        let dt_s = self.clock.dt_s();

        // Positive pan means the target is right of the nose, demand a rightwards velocity
        let vy_ms = self.pid_lateral.step(-angles.pan_rad, dt_s);

        // Positive tilt means the target is below the horizon, demand a descent
        let vz_ms = self.pid_vertical.step(-angles.tilt_rad, dt_s);

        let vx_ms = self.forward_speed_ms;

        // Yaw demand turns the nose towards the target so the gimbal can stay centred
        let yaw_rate_rads = self.pid_yaw.step(-angles.pan_rad, dt_s);

        self.store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(vx_ms)),
                ("vy_ms", FieldValue::Float(vy_ms)),
                ("vz_ms", FieldValue::Float(vz_ms)),
                ("yaw_rate_rads", FieldValue::Float(yaw_rate_rads))
            ],
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms }
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
    fn test_pan_drives_lateral_and_yaw_demands() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = GmVelocityChase::new(&params, driver, None).unwrap();

        // Gimbal panned right, level tilt
        let target = TargetCoordinates::new(320.0, 240.0).with_gimbal_angles(0.4, 0.0);
        follower.calculate_velocity_commands(&target).unwrap();

        match follower.setpoint_store().last_command().unwrap() {
            Some(ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms }) => {
                assert_eq!(vx_ms, params.gm_velocity_chase.forward_speed_ms);
                assert!(vy_ms > 0.0, "Expected a rightwards demand, got {}", vy_ms);
                assert!(vz_ms.abs() < 1e-9);
            }
            other => panic!("Expected a velocity command, got {:?}", other)
        }

        // The yaw demand is telemetry for the gimbal loop, not part of the command
        let fields = follower.get_follower_telemetry();
        match fields.get("yaw_rate_rads") {
            Some(FieldValue::Float(yaw_rate_rads)) => assert!(*yaw_rate_rads > 0.0),
            other => panic!("Expected a float yaw rate, got {:?}", other)
        }
    }

    #[test]
    fn test_missing_gimbal_angles_are_rejected() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = GmVelocityChase::new(&params, driver, None).unwrap();

        let target = TargetCoordinates::new(320.0, 240.0);
        assert!(matches!(
            follower.calculate_velocity_commands(&target),
            Err(FollowError::InvalidTarget(_))
        ));
        assert!(follower.setpoint_store().last_command().unwrap().is_none());
    }
}
