//! Shared test fixtures for the guidance crate.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::follow_ctrl::{
    FollowCtrlParams, FwAttitudeRateParams, GmVelocityChaseParams, GmVelocityVectorParams,
    McAttitudeRateParams, McVelocityChaseParams, McVelocityDistanceParams,
    McVelocityGroundParams, McVelocityPositionParams
};
use crate::pid::PidConfig;
use vehicle_if::driver::{DriverError, VehicleDriver};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// One recorded call into a [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Connect,
    Disconnect,
    StartOffboard,
    StopOffboard,
    Velocity(f64, f64, f64),
    AttitudeRate(f64, f64, f64, f64)
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A vehicle driver which records every call made into it, optionally failing them.
pub struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
    fail_connect: AtomicBool,
    fail_sends: AtomicBool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_connect: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false)
        }
    }

    /// A driver whose `connect` always fails.
    pub fn failing_connect() -> Self {
        let driver = Self::new();
        driver.fail_connect.store(true, Ordering::SeqCst);
        driver
    }

    /// Make every subsequent send call fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The number of successful send calls recorded so far.
    pub fn send_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                matches!(c, DriverCall::Velocity(..) | DriverCall::AttitudeRate(..))
            })
            .count()
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VehicleDriver for RecordingDriver {
    async fn connect(&self) -> Result<(), DriverError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::ConnectionFailed(
                "recording driver told to fail".to_string()
            ));
        }

        self.record(DriverCall::Connect);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Disconnect);
        Ok(())
    }

    async fn start_offboard_mode(&self) -> Result<(), DriverError> {
        self.record(DriverCall::StartOffboard);
        Ok(())
    }

    async fn stop_offboard_mode(&self) -> Result<(), DriverError> {
        self.record(DriverCall::StopOffboard);
        Ok(())
    }

    async fn send_velocity_commands(
        &self,
        vx_ms: f64,
        vy_ms: f64,
        vz_ms: f64
    ) -> Result<(), DriverError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(DriverError::CommandFailed(
                "recording driver told to fail".to_string()
            ));
        }

        self.record(DriverCall::Velocity(vx_ms, vy_ms, vz_ms));
        Ok(())
    }

    async fn send_attitude_rate_commands(
        &self,
        roll_rate_rads: f64,
        pitch_rate_rads: f64,
        yaw_rate_rads: f64,
        thrust: f64
    ) -> Result<(), DriverError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(DriverError::CommandFailed(
                "recording driver told to fail".to_string()
            ));
        }

        self.record(DriverCall::AttitudeRate(
            roll_rate_rads,
            pitch_rate_rads,
            yaw_rate_rads,
            thrust
        ));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// A PID configuration with the given gains and limits, anti-windup on.
pub fn pid(k_p: f64, k_i: f64, k_d: f64, limits: (f64, f64)) -> PidConfig {
    PidConfig {
        k_p,
        k_i,
        k_d,
        output_limits: Some(limits),
        anti_windup: true,
        ..PidConfig::default()
    }
}

/// Follow control parameters shared across the strategy tests.
///
/// A 640x480 frame stepped at 10 Hz. The chase lateral axis is tuned hot on purpose so a
/// drifting target saturates it within a handful of cycles.
pub fn follow_params() -> FollowCtrlParams {
    FollowCtrlParams {
        frame_width_px: 640.0,
        frame_height_px: 480.0,
        nominal_dt_s: 0.1,
        use_nominal_dt: false,
        mc_velocity_chase: McVelocityChaseParams {
            forward_speed_ms: 2.0,
            pid_lateral: pid(40.0, 1.0, 0.0, (-5.0, 5.0)),
            pid_vertical: pid(8.0, 0.5, 0.0, (-2.5, 2.5))
        },
        mc_velocity_ground: McVelocityGroundParams {
            desired_box_height_px: 120.0,
            pid_forward: pid(3.0, 0.2, 0.0, (-4.0, 4.0)),
            pid_lateral: pid(3.0, 0.2, 0.0, (-4.0, 4.0)),
            pid_vertical: pid(1.0, 0.1, 0.0, (-1.5, 1.5))
        },
        mc_velocity_distance: McVelocityDistanceParams {
            hold_range_m: 8.0,
            pid_range: pid(0.8, 0.1, 0.0, (-5.0, 5.0)),
            pid_lateral: pid(3.0, 0.2, 0.0, (-5.0, 5.0)),
            pid_vertical: pid(2.0, 0.2, 0.0, (-2.5, 2.5))
        },
        mc_velocity_position: McVelocityPositionParams {
            pid_lateral: pid(4.0, 0.4, 0.05, (-3.0, 3.0)),
            pid_vertical: pid(2.0, 0.2, 0.0, (-2.0, 2.0))
        },
        mc_attitude_rate: McAttitudeRateParams {
            hover_thrust: 0.5,
            pid_roll: pid(0.6, 0.05, 0.0, (-0.8, 0.8)),
            pid_pitch: pid(0.6, 0.05, 0.0, (-0.8, 0.8)),
            pid_thrust: pid(0.25, 0.02, 0.0, (-0.25, 0.25))
        },
        fw_attitude_rate: FwAttitudeRateParams {
            cruise_thrust: 0.6,
            pid_roll: pid(0.5, 0.02, 0.0, (-0.6, 0.6)),
            pid_pitch: pid(0.4, 0.02, 0.0, (-0.5, 0.5))
        },
        gm_velocity_chase: GmVelocityChaseParams {
            forward_speed_ms: 2.0,
            pid_lateral: pid(2.5, 0.1, 0.0, (-5.0, 5.0)),
            pid_vertical: pid(1.5, 0.1, 0.0, (-2.5, 2.5)),
            pid_yaw: pid(1.2, 0.0, 0.0, (-1.5, 1.5))
        },
        gm_velocity_vector: GmVelocityVectorParams {
            closure_speed_ms: 1.5,
            hold_range_m: 6.0,
            pid_closure: pid(0.6, 0.05, 0.0, (-4.0, 4.0))
        }
    }
}
