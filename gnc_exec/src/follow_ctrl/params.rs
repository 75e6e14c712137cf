//! Parameters structures for the follow control module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::pid::PidConfig;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the follow control module.
///
/// Frame geometry and the timestep policy are shared by all strategies, each strategy then
/// carries its own gain set.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowCtrlParams {
    // ---- FRAME GEOMETRY ----

    /// Width of the camera frame.
    ///
    /// Units: pixels
    pub frame_width_px: f64,

    /// Height of the camera frame.
    ///
    /// Units: pixels
    pub frame_height_px: f64,

    // ---- TIMESTEP ----

    /// Nominal timestep between guidance cycles. Used on the first cycle, before a wall clock
    /// gap exists, and on every cycle when `use_nominal_dt` is set.
    ///
    /// Units: seconds
    pub nominal_dt_s: f64,

    /// Always step the controllers with `nominal_dt_s` instead of the measured cycle gap.
    /// Gives deterministic stepping for simulation runs.
    #[serde(default)]
    pub use_nominal_dt: bool,

    // ---- STRATEGIES ----

    /// Parameters for the multicopter velocity chase follower.
    pub mc_velocity_chase: McVelocityChaseParams,

    /// Parameters for the multicopter ground-view follower.
    pub mc_velocity_ground: McVelocityGroundParams,

    /// Parameters for the multicopter distance-hold follower.
    pub mc_velocity_distance: McVelocityDistanceParams,

    /// Parameters for the multicopter position-hold follower.
    pub mc_velocity_position: McVelocityPositionParams,

    /// Parameters for the multicopter attitude-rate follower.
    pub mc_attitude_rate: McAttitudeRateParams,

    /// Parameters for the fixed-wing attitude-rate follower.
    pub fw_attitude_rate: FwAttitudeRateParams,

    /// Parameters for the gimbal-angle chase follower.
    pub gm_velocity_chase: GmVelocityChaseParams,

    /// Parameters for the gimbal line-of-sight vector follower.
    pub gm_velocity_vector: GmVelocityVectorParams
}

/// Parameters for the multicopter velocity chase follower.
#[derive(Debug, Clone, Deserialize)]
pub struct McVelocityChaseParams {
    /// Constant forward speed flown while chasing.
    ///
    /// Units: meters/second
    pub forward_speed_ms: f64,

    /// Lateral velocity controller, driven by the horizontal image offset.
    pub pid_lateral: PidConfig,

    /// Vertical velocity controller, driven by the vertical image offset.
    pub pid_vertical: PidConfig
}

/// Parameters for the multicopter ground-view follower.
///
/// The camera looks straight down with the frame top towards the vehicle nose.
#[derive(Debug, Clone, Deserialize)]
pub struct McVelocityGroundParams {
    /// Apparent bounding box height of the target at the desired altitude. The vertical
    /// controller holds this size.
    ///
    /// Units: pixels
    pub desired_box_height_px: f64,

    /// Forward velocity controller, driven by the vertical image offset.
    pub pid_forward: PidConfig,

    /// Lateral velocity controller, driven by the horizontal image offset.
    pub pid_lateral: PidConfig,

    /// Vertical velocity controller, driven by the bounding box height error.
    pub pid_vertical: PidConfig
}

/// Parameters for the multicopter distance-hold follower.
#[derive(Debug, Clone, Deserialize)]
pub struct McVelocityDistanceParams {
    /// Range to hold to the target.
    ///
    /// Units: meters
    pub hold_range_m: f64,

    /// Forward velocity controller, driven by the range error.
    pub pid_range: PidConfig,

    /// Lateral velocity controller, driven by the horizontal image offset.
    pub pid_lateral: PidConfig,

    /// Vertical velocity controller, driven by the vertical image offset.
    pub pid_vertical: PidConfig
}

/// Parameters for the multicopter position-hold follower.
#[derive(Debug, Clone, Deserialize)]
pub struct McVelocityPositionParams {
    /// Lateral velocity controller, driven by the horizontal image offset.
    pub pid_lateral: PidConfig,

    /// Vertical velocity controller, driven by the vertical image offset.
    pub pid_vertical: PidConfig
}

/// Parameters for the multicopter attitude-rate follower.
#[derive(Debug, Clone, Deserialize)]
pub struct McAttitudeRateParams {
    /// Thrust which holds the vehicle in hover. The thrust controller trims about this value.
    ///
    /// Units: normalised [0, 1]
    pub hover_thrust: f64,

    /// Roll rate controller, driven by the horizontal image offset.
    pub pid_roll: PidConfig,

    /// Pitch rate controller, driven by the vertical image offset.
    pub pid_pitch: PidConfig,

    /// Thrust trim controller, driven by the vertical image offset.
    pub pid_thrust: PidConfig
}

/// Parameters for the fixed-wing attitude-rate follower.
#[derive(Debug, Clone, Deserialize)]
pub struct FwAttitudeRateParams {
    /// Constant cruise thrust, fixed-wing platforms hold airspeed rather than trimming thrust
    /// against the image offset.
    ///
    /// Units: normalised [0, 1]
    pub cruise_thrust: f64,

    /// Roll rate controller, driven by the horizontal image offset.
    pub pid_roll: PidConfig,

    /// Pitch rate controller, driven by the vertical image offset.
    pub pid_pitch: PidConfig
}

/// Parameters for the gimbal-angle chase follower.
#[derive(Debug, Clone, Deserialize)]
pub struct GmVelocityChaseParams {
    /// Constant forward speed flown while chasing.
    ///
    /// Units: meters/second
    pub forward_speed_ms: f64,

    /// Lateral velocity controller, driven by the gimbal pan angle.
    pub pid_lateral: PidConfig,

    /// Vertical velocity controller, driven by the gimbal tilt angle.
    pub pid_vertical: PidConfig,

    /// Yaw rate controller, driven by the gimbal pan angle. The yaw rate is recorded in the
    /// setpoint store for the downstream gimbal loop, it is not part of the velocity command.
    pub pid_yaw: PidConfig
}

/// Parameters for the gimbal line-of-sight vector follower.
#[derive(Debug, Clone, Deserialize)]
pub struct GmVelocityVectorParams {
    /// Closure speed flown along the line of sight when no range measurement is available.
    ///
    /// Units: meters/second
    pub closure_speed_ms: f64,

    /// Range to hold when a range measurement is available.
    ///
    /// Units: meters
    pub hold_range_m: f64,

    /// Closure speed controller, driven by the range error.
    pub pid_closure: PidConfig
}
