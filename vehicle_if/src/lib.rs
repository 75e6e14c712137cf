//! # Vehicle interface crate.
//!
//! Provides the common interfaces between the guidance software and the
//! vehicle's flight control firmware: the offboard command types, the async
//! driver contract, the target coordinate input type, and the command limit
//! contract used by safety collaborators.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Offboard control command definitions
pub mod cmd;

/// The vehicle driver contract
pub mod driver;

/// Command limit (safety collaborator) contract
pub mod limit;

/// Tracked target input definitions
pub mod target;
