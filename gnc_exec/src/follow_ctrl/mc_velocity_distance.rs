//! # Multicopter distance-hold follower
//!
//! A chase which holds a measured range to the target instead of flying a constant forward
//! speed. Requires a range measurement on every cycle, a target without one is rejected. Being
//! further away than the hold range demands a positive (approaching) forward velocity.

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

/// Multicopter chase holding a measured range to the target.
pub struct McVelocityDistance {
    hold_range_m: f64,
    pid_range: ExtendedPid,
    pid_lateral: ExtendedPid,
    pid_vertical: ExtendedPid,
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

impl McVelocityDistance {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "distance_hold";

    /// Create a new distance-hold follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            hold_range_m: params.mc_velocity_distance.hold_range_m,
            pid_range: ExtendedPid::new(&params.mc_velocity_distance.pid_range),
            pid_lateral: ExtendedPid::new(&params.mc_velocity_distance.pid_lateral),
            pid_vertical: ExtendedPid::new(&params.mc_velocity_distance.pid_vertical),
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
impl Follower for McVelocityDistance {
    fn follower_type(&self) -> FollowerType {
        FollowerType::McVelocityDistance
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

        let range_m = target.range_m.ok_or_else(|| {
            FollowError::InvalidTarget("distance hold requires a range measurement".to_string())
        })?;

        let (offset_x, offset_y) =
            norm_offsets(self.frame_width_px, self.frame_height_px, target);
        let dt_s = self.clock.dt_s();

        // Further away than the hold range demands an approach
        let vx_ms = self.pid_range.step(-(range_m - self.hold_range_m), dt_s);

        let vy_ms = self.pid_lateral.step(-offset_x, dt_s);
        let vz_ms = self.pid_vertical.step(-offset_y, dt_s);

        self.store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(vx_ms)),
                ("vy_ms", FieldValue::Float(vy_ms)),
                ("vz_ms", FieldValue::Float(vz_ms)),
                ("range_m", FieldValue::Float(range_m))
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
    use crate::setpoint::STATUS_FIELD;
    use crate::test_util::{follow_params, RecordingDriver};

    #[test]
    fn test_range_error_drives_forward_axis() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = McVelocityDistance::new(&params, driver, None).unwrap();

        // Centred target 4 m beyond the hold range
        let target = TargetCoordinates::new(320.0, 240.0)
            .with_range(params.mc_velocity_distance.hold_range_m + 4.0);
        follower.calculate_velocity_commands(&target).unwrap();

        match follower.setpoint_store().last_command().unwrap() {
            Some(ControlCommand::VelocityBody { vx_ms, .. }) => {
                assert!(vx_ms > 0.0, "Expected an approach demand, got {}", vx_ms);
            }
            other => panic!("Expected a velocity command, got {:?}", other)
        }

        let fields = follower.get_follower_telemetry();
        assert_eq!(
            fields.get("range_m"),
            Some(&FieldValue::Float(params.mc_velocity_distance.hold_range_m + 4.0))
        );
    }

    #[test]
    fn test_missing_range_is_rejected() {
        let mut params = follow_params();
        params.use_nominal_dt = true;

        let driver: Arc<dyn VehicleDriver> = Arc::new(RecordingDriver::new());
        let mut follower = McVelocityDistance::new(&params, driver, None).unwrap();

        let target = TargetCoordinates::new(320.0, 240.0);
        assert!(matches!(
            follower.calculate_velocity_commands(&target),
            Err(FollowError::InvalidTarget(_))
        ));

        // No cycle committed, the store is still in its initial idle state
        assert!(follower.setpoint_store().last_command().unwrap().is_none());
        let fields = follower.get_follower_telemetry();
        assert_eq!(
            fields.get(STATUS_FIELD),
            Some(&FieldValue::Text("idle".to_string()))
        );
    }
}
