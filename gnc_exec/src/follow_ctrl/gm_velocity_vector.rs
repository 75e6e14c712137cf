//! # Gimbal line-of-sight vector follower
//!
//! Flies the velocity vector straight along the gimbal's line of sight to the target. The
//! gimbal angles define the body-frame line of sight unit vector, the closure speed along it
//! comes from the range controller when a range measurement is available and falls back to a
//! constant closure speed when it is not. Beyond the hold range the speed is positive
//! (approach), inside it the speed goes negative and the vehicle backs away along the same
//! line.
//!
//! Requires gimbal angles on every cycle, a target without them is rejected.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use nalgebra::Vector3;

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

/// Gimbal line-of-sight velocity-vector guidance.
pub struct GmVelocityVector {
    closure_speed_ms: f64,
    hold_range_m: f64,
    pid_closure: ExtendedPid,
    clock: CycleClock,
    store: Arc<SetpointStore>,
    driver: Arc<dyn VehicleDriver>,
    limiter: Option<Arc<dyn CommandLimiter>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GmVelocityVector {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "gimbal_view";

    /// Create a new line-of-sight follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            closure_speed_ms: params.gm_velocity_vector.closure_speed_ms,
            hold_range_m: params.gm_velocity_vector.hold_range_m,
            pid_closure: ExtendedPid::new(&params.gm_velocity_vector.pid_closure),
            clock: CycleClock::new(params.nominal_dt_s, params.use_nominal_dt),
            store: Arc::new(SetpointStore::new(Self::PROFILE)?),
            driver,
            limiter
        })
    }

    /// Body-frame line of sight unit vector from the gimbal angles, Z+ down.
    fn line_of_sight(pan_rad: f64, tilt_rad: f64) -> Vector3<f64> {
        Vector3::new(
            tilt_rad.cos() * pan_rad.cos(),
            tilt_rad.cos() * pan_rad.sin(),
            tilt_rad.sin()
        )
    }
}

#[async_trait]
impl Follower for GmVelocityVector {
    fn follower_type(&self) -> FollowerType {
        FollowerType::GmVelocityVector
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
            FollowError::InvalidTarget("line of sight guidance requires gimbal angles".to_string())
        })?;

        let dt_s = self.clock.dt_s();

        // Beyond the hold range demands an approach along the line of sight
        let speed_ms = match target.range_m {
            Some(range_m) => self.pid_closure.step(-(range_m - self.hold_range_m), dt_s),
            None => self.closure_speed_ms
        };

        let velocity_ms = Self::line_of_sight(angles.pan_rad, angles.tilt_rad) * speed_ms;

        let (vx_ms, vy_ms, vz_ms) = (velocity_ms.x, velocity_ms.y, velocity_ms.z);

        self.store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(vx_ms)),
                ("vy_ms", FieldValue::Float(vy_ms)),
                ("vz_ms", FieldValue::Float(vz_ms)),
                ("yaw_rate_rads", FieldValue::Float(0.0))
            ],
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms }
        )?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
