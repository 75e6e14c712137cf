//! # Setpoint module
//!
//! Each follower strategy owns a [`SetpointStore`], a schema validated register of named fields
//! holding the latest computed command and its telemetry snapshot. The schema comes from a
//! [`SetpointProfile`] resolved by name through a process wide registry, so a store can only
//! ever hold fields its profile declares, with numeric writes clamped into the profile's
//! declared ranges.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod schema;
mod store;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use schema::{
    get_profile, load_profile_overrides, FieldKind, SchemaError, SetpointProfile
};
pub use store::{
    FieldValue, SetpointStore, StoreError, LAST_UPDATE_FIELD, STATUS_ACTIVE, STATUS_FIELD,
    STATUS_IDLE
};
