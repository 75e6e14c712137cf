//! # Multicopter position-hold follower
//!
//! Holds a constant position relative to the target by driving both image offsets to zero
//! with no forward motion of its own. Used for hovering observation of a stationary or slow
//! target. The radial pixel offset is recorded alongside the velocity demands.

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

/// Multicopter constant-position hold relative to the target.
pub struct McVelocityPosition {
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

impl McVelocityPosition {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "constant_position";

    /// Create a new position-hold follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            pid_lateral: ExtendedPid::new(&params.mc_velocity_position.pid_lateral),
            pid_vertical: ExtendedPid::new(&params.mc_velocity_position.pid_vertical),
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
impl Follower for McVelocityPosition {
    fn follower_type(&self) -> FollowerType {
        FollowerType::McVelocityPosition
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

        let vy_ms = self.pid_lateral.step(-offset_x, dt_s);
        let vz_ms = self.pid_vertical.step(-offset_y, dt_s);

        // Position hold never advances on the target
        let vx_ms = 0.0;

        let offset_px = util::maths::norm(
            &[target.position_px.x, target.position_px.y],
            &[self.frame_width_px / 2.0, self.frame_height_px / 2.0]
        )
        .unwrap_or(0.0);

        self.store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(vx_ms)),
                ("vy_ms", FieldValue::Float(vy_ms)),
                ("vz_ms", FieldValue::Float(vz_ms)),
                ("offset_px", FieldValue::Float(offset_px))
            ],
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms }
        )?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
