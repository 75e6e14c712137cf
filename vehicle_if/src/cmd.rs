//! # Offboard control commands

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// A command that can be streamed to the vehicle while it is in offboard mode.
///
/// Exactly one command is active at a time. The publisher re-sends the active command at a fixed
/// rate to keep the firmware's offboard watchdog satisfied, so a command must always represent a
/// complete demand, not a delta.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// A body-frame velocity demand.
    VelocityBody {
        /// The demanded velocity along the body X+ (forward) axis in meters/second.
        vx_ms: f64,

        /// The demanded velocity along the body Y+ (right) axis in meters/second.
        vy_ms: f64,

        /// The demanded velocity along the body Z+ (down) axis in meters/second.
        ///
        /// Positive velocities descend, negative velocities climb.
        vz_ms: f64
    },

    /// A body attitude-rate and thrust demand.
    AttitudeRate {
        /// The demanded roll rate in radians/second.
        ///
        /// Follows the right hand grip rule about the body X+ (forward) axis, so that a positive
        /// roll rate banks the vehicle to the right.
        roll_rate_rads: f64,

        /// The demanded pitch rate in radians/second.
        ///
        /// Follows the right hand grip rule about the body Y+ (right) axis, so that a positive
        /// pitch rate raises the nose.
        pitch_rate_rads: f64,

        /// The demanded yaw rate in radians/second.
        ///
        /// Follows the right hand grip rule about the body Z+ (down) axis, so that a positive
        /// yaw rate turns the nose to the right.
        yaw_rate_rads: f64,

        /// The demanded collective thrust, normalised to [0, 1].
        thrust: f64
    }
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl ControlCommand {
    /// A zero body-velocity demand, used to hold the vehicle stationary.
    pub fn zero_velocity() -> Self {
        ControlCommand::VelocityBody {
            vx_ms: 0.0,
            vy_ms: 0.0,
            vz_ms: 0.0
        }
    }

    /// True if every element of the command is finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms } => {
                vx_ms.is_finite() && vy_ms.is_finite() && vz_ms.is_finite()
            }
            ControlCommand::AttitudeRate {
                roll_rate_rads,
                pitch_rate_rads,
                yaw_rate_rads,
                thrust
            } => {
                roll_rate_rads.is_finite()
                    && pitch_rate_rads.is_finite()
                    && yaw_rate_rads.is_finite()
                    && thrust.is_finite()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
