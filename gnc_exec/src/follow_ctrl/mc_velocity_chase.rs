//! # Multicopter velocity chase follower
//!
//! Chases the target by flying a constant forward speed while steering the lateral and
//! vertical body velocities to centre the target in the frame. A target sitting right of the
//! frame centre demands a rightwards (body Y+) velocity, a target sitting below the centre
//! demands a descent (body Z+, Z is down).

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

/// Multicopter body-velocity chase of the image offset.
pub struct McVelocityChase {
    forward_speed_ms: f64,
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

impl McVelocityChase {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "chase_view";

    /// Create a new chase follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            forward_speed_ms: params.mc_velocity_chase.forward_speed_ms,
            pid_lateral: ExtendedPid::new(&params.mc_velocity_chase.pid_lateral),
            pid_vertical: ExtendedPid::new(&params.mc_velocity_chase.pid_vertical),
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
impl Follower for McVelocityChase {
    fn follower_type(&self) -> FollowerType {
        FollowerType::McVelocityChase
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

        // Positive X offset means the target is right of centre, demand a rightwards velocity
        let vy_ms = self.pid_lateral.step(-offset_x, dt_s);

        // Positive Y offset means the target is below centre, demand a descent
        let vz_ms = self.pid_vertical.step(-offset_y, dt_s);

        let vx_ms = self.forward_speed_ms;

        self.store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(vx_ms)),
                ("vy_ms", FieldValue::Float(vy_ms)),
                ("vz_ms", FieldValue::Float(vz_ms))
            ],
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms }
        )?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
