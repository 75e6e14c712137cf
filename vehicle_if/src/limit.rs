//! # Command limit contract
//!
//! A safety collaborator may sit between the guidance software and the vehicle driver. When one
//! is configured, every outgoing command is routed through its check; when none is configured
//! commands pass straight through. The guidance software is functionally identical either way.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use log::warn;
use serde::Deserialize;

use crate::cmd::ControlCommand;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// The outcome of a limit check on a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitResponse {
    /// The command is within limits and may be sent as-is.
    Pass,

    /// The command exceeded a limit and has been clamped to the contained value.
    Clamp(ControlCommand),

    /// The command must not be sent at all.
    Veto
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The contract a command limit collaborator must implement.
pub trait CommandLimiter: Send + Sync {
    /// Check a single outgoing command.
    fn check(&self, cmd: &ControlCommand) -> LimitResponse;
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// A reference limiter which clamps body velocity demands to a simple envelope.
///
/// Attitude-rate commands pass through unchecked. Non-finite commands of either variant are
/// vetoed.
#[derive(Debug, Clone, Deserialize)]
pub struct VelocityEnvelope {
    /// Maximum magnitude of the horizontal (X/Y) velocity demands.
    ///
    /// Units: meters/second
    pub max_horiz_ms: f64,

    /// Maximum magnitude of the vertical (Z) velocity demand.
    ///
    /// Units: meters/second
    pub max_vert_ms: f64
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl CommandLimiter for VelocityEnvelope {
    fn check(&self, cmd: &ControlCommand) -> LimitResponse {
        if !cmd.is_finite() {
            return LimitResponse::Veto;
        }

        match *cmd {
            ControlCommand::VelocityBody { vx_ms, vy_ms, vz_ms } => {
                let clamped = ControlCommand::VelocityBody {
                    vx_ms: vx_ms.max(-self.max_horiz_ms).min(self.max_horiz_ms),
                    vy_ms: vy_ms.max(-self.max_horiz_ms).min(self.max_horiz_ms),
                    vz_ms: vz_ms.max(-self.max_vert_ms).min(self.max_vert_ms)
                };

                if clamped == *cmd {
                    LimitResponse::Pass
                }
                else {
                    LimitResponse::Clamp(clamped)
                }
            }
            ControlCommand::AttitudeRate { .. } => LimitResponse::Pass
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Route a command through an optional limiter.
///
/// Returns the command to actually send, or `None` if it was vetoed. With no limiter configured
/// this is a straight pass-through.
pub fn apply(
    limiter: &Option<Arc<dyn CommandLimiter>>,
    cmd: ControlCommand
) -> Option<ControlCommand> {
    match limiter {
        Some(l) => match l.check(&cmd) {
            LimitResponse::Pass => Some(cmd),
            LimitResponse::Clamp(clamped) => {
                warn!("Command {:?} clamped to {:?} by the limiter", cmd, clamped);
                Some(clamped)
            }
            LimitResponse::Veto => {
                warn!("Command {:?} vetoed by the limiter", cmd);
                None
            }
        },
        None => Some(cmd)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn envelope() -> VelocityEnvelope {
        VelocityEnvelope {
            max_horiz_ms: 5.0,
            max_vert_ms: 2.0
        }
    }

    #[test]
    fn test_pass_within_envelope() {
        let cmd = ControlCommand::VelocityBody {
            vx_ms: 1.0,
            vy_ms: -2.0,
            vz_ms: 0.5
        };
        assert_eq!(envelope().check(&cmd), LimitResponse::Pass);
    }

    #[test]
    fn test_clamp_exceeding_command() {
        let cmd = ControlCommand::VelocityBody {
            vx_ms: 10.0,
            vy_ms: 0.0,
            vz_ms: -4.0
        };
        let expected = ControlCommand::VelocityBody {
            vx_ms: 5.0,
            vy_ms: 0.0,
            vz_ms: -2.0
        };
        assert_eq!(envelope().check(&cmd), LimitResponse::Clamp(expected));
    }

    #[test]
    fn test_veto_non_finite() {
        let cmd = ControlCommand::VelocityBody {
            vx_ms: f64::NAN,
            vy_ms: 0.0,
            vz_ms: 0.0
        };
        assert_eq!(envelope().check(&cmd), LimitResponse::Veto);
    }

    #[test]
    fn test_apply_without_limiter_passes_through() {
        let cmd = ControlCommand::zero_velocity();
        assert_eq!(apply(&None, cmd), Some(cmd));
    }

    #[test]
    fn test_apply_with_limiter() {
        let limiter: Option<Arc<dyn CommandLimiter>> = Some(Arc::new(envelope()));

        let ok = ControlCommand::VelocityBody {
            vx_ms: 1.0,
            vy_ms: 0.0,
            vz_ms: 0.0
        };
        assert_eq!(apply(&limiter, ok), Some(ok));

        let bad = ControlCommand::VelocityBody {
            vx_ms: f64::NAN,
            vy_ms: 0.0,
            vz_ms: 0.0
        };
        assert_eq!(apply(&limiter, bad), None);
    }
}
