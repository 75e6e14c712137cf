//! # Multicopter ground-view follower
//!
//! Follows a target seen through a camera looking straight down, with the frame top towards
//! the vehicle nose. A target towards the frame top is ahead of the vehicle and demands a
//! forward velocity, a target right of centre demands a rightwards velocity. Altitude is held
//! by steering the apparent bounding box height towards the size it has at the desired
//! altitude, a box smaller than desired means the vehicle is too high and demands a descent.

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

/// Multicopter ground-view guidance with a downward camera.
pub struct McVelocityGround {
    desired_box_height_px: f64,
    pid_forward: ExtendedPid,
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

impl McVelocityGround {
    /// The setpoint profile this follower populates.
    pub const PROFILE: &'static str = "ground_view";

    /// Create a new ground-view follower from the follow control parameters.
    pub fn new(
        params: &FollowCtrlParams,
        driver: Arc<dyn VehicleDriver>,
        limiter: Option<Arc<dyn CommandLimiter>>
    ) -> Result<Self, FollowError> {
        Ok(Self {
            desired_box_height_px: params.mc_velocity_ground.desired_box_height_px,
            pid_forward: ExtendedPid::new(&params.mc_velocity_ground.pid_forward),
            pid_lateral: ExtendedPid::new(&params.mc_velocity_ground.pid_lateral),
            pid_vertical: ExtendedPid::new(&params.mc_velocity_ground.pid_vertical),
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
impl Follower for McVelocityGround {
    fn follower_type(&self) -> FollowerType {
        FollowerType::McVelocityGround
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

        // Negative Y offset means the target is towards the frame top, ahead of the vehicle
        let vx_ms = self.pid_forward.step(offset_y, dt_s);

        let vy_ms = self.pid_lateral.step(-offset_x, dt_s);

        // A box smaller than desired means the vehicle is too high, demand a descent. With no
        // box measurement the altitude axis is left alone.
        let vz_ms = match target.bounding_box {
            Some(bounding_box) => {
                let size_error = (self.desired_box_height_px - bounding_box.height_px)
                    / self.desired_box_height_px;
                self.pid_vertical.step(-size_error, dt_s)
            }
            None => 0.0
        };

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
