//! # Guidance executable library.
//!
//! This library exposes the guidance modules so that other crates (and the executable itself)
//! can access items inside `gnc_exec`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Command dispatch worker - serialises mode transitions and velocity injections onto the
/// vehicle driver through one FIFO queue
pub mod cmd_dispatch;

/// Follow control module - the follower strategies converting target coordinates into commands
pub mod follow_ctrl;

/// Extended PID controller used by the follower strategies
pub mod pid;

/// Setpoint module - the schema validated stores holding each follower's latest command
pub mod setpoint;

/// Setpoint publisher - fixed rate republisher keeping the offboard stream alive
pub mod setpoint_pub;

/// Simulation vehicle driver - logging stand-in for a real driver
pub mod sim_driver;

#[cfg(test)]
pub(crate) mod test_util;
