//! # Setpoint profile schemas
//!
//! A [`SetpointProfile`] names the fields a follower exposes through its store and declares
//! their types and valid numeric ranges. Profiles are resolved by name through a process wide
//! registry which starts out holding the builtin profiles and may be extended or overridden
//! from a parameter file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use conquer_once::Lazy;
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static REGISTRY: Lazy<RwLock<HashMap<String, SetpointProfile>>> =
    Lazy::new(|| RwLock::new(builtin_profiles()));

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A named schema describing the fields a follower's setpoint store exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetpointProfile {
    /// The name the profile is registered under.
    pub name: String,

    /// The fields a store built from this profile will hold.
    pub fields: HashMap<String, FieldKind>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The type and valid range of a single profile field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A numeric field. Writes outside `[min, max]` are clamped to the nearest bound.
    Float {
        min: f64,
        max: f64
    },

    /// A free text field.
    Text
}

/// Errors raised when resolving or loading profiles.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("No setpoint profile named {0:?} is registered")]
    UnknownProfile(String),

    #[error("Could not load the profile override file: {0}")]
    OverrideLoadError(util::params::LoadError),

    #[error("The profile registry lock was poisoned")]
    RegistryPoisoned
}

// ---------------------------------------------------------------------------
// PARAMETER STRUCTURES
// ---------------------------------------------------------------------------

/// Shape of the profile override parameter file.
#[derive(Debug, Deserialize)]
struct ProfileOverrides {
    #[serde(default)]
    profiles: Vec<SetpointProfile>
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Resolve a profile by name from the registry.
pub fn get_profile(name: &str) -> Result<SetpointProfile, SchemaError> {
    let registry = REGISTRY.read().map_err(|_| SchemaError::RegistryPoisoned)?;

    registry
        .get(name)
        .cloned()
        .ok_or_else(|| SchemaError::UnknownProfile(name.to_string()))
}

/// Merge profiles from the given parameter file into the registry, replacing any builtin of the
/// same name. Returns the number of profiles merged.
///
/// A missing file is not an error, the builtin profiles are simply used unchanged. A present
/// but invalid file is an error.
pub fn load_profile_overrides(param_file: &str) -> Result<usize, SchemaError> {
    let overrides: ProfileOverrides = match util::params::load_optional(param_file) {
        Ok(Some(o)) => o,
        Ok(None) => return Ok(0),
        Err(e) => return Err(SchemaError::OverrideLoadError(e))
    };

    let mut registry = REGISTRY.write().map_err(|_| SchemaError::RegistryPoisoned)?;

    let count = overrides.profiles.len();

    for profile in overrides.profiles {
        registry.insert(profile.name.clone(), profile);
    }

    Ok(count)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn float(min: f64, max: f64) -> FieldKind {
    FieldKind::Float { min, max }
}

fn profile(name: &str, fields: Vec<(&str, FieldKind)>) -> (String, SetpointProfile) {
    (
        name.to_string(),
        SetpointProfile {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(n, k)| (n.to_string(), k))
                .collect()
        }
    )
}

/// Build the builtin profile set.
///
/// Velocity ranges here are a wide schema level net, the per strategy PID output limits are the
/// operative speed limits and sit well inside these.
fn builtin_profiles() -> HashMap<String, SetpointProfile> {
    vec![
        profile(
            "chase_view",
            vec![
                ("vx_ms", float(-10.0, 10.0)),
                ("vy_ms", float(-10.0, 10.0)),
                ("vz_ms", float(-5.0, 5.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        ),
        profile(
            "ground_view",
            vec![
                ("vx_ms", float(-10.0, 10.0)),
                ("vy_ms", float(-10.0, 10.0)),
                ("vz_ms", float(-5.0, 5.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        ),
        profile(
            "distance_hold",
            vec![
                ("vx_ms", float(-10.0, 10.0)),
                ("vy_ms", float(-10.0, 10.0)),
                ("vz_ms", float(-5.0, 5.0)),
                ("range_m", float(0.0, 500.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        ),
        profile(
            "constant_position",
            vec![
                ("vx_ms", float(-10.0, 10.0)),
                ("vy_ms", float(-10.0, 10.0)),
                ("vz_ms", float(-5.0, 5.0)),
                ("offset_px", float(0.0, 10000.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        ),
        profile(
            "attitude_view",
            vec![
                ("roll_rate_rads", float(-3.0, 3.0)),
                ("pitch_rate_rads", float(-3.0, 3.0)),
                ("yaw_rate_rads", float(-3.0, 3.0)),
                ("thrust", float(0.0, 1.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        ),
        profile(
            "gimbal_view",
            vec![
                ("vx_ms", float(-10.0, 10.0)),
                ("vy_ms", float(-10.0, 10.0)),
                ("vz_ms", float(-5.0, 5.0)),
                ("yaw_rate_rads", float(-3.0, 3.0)),
                ("status", FieldKind::Text),
                ("last_update_s", float(0.0, f64::MAX))
            ]
        )
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builtin_profiles_resolve() {
        for name in [
            "chase_view",
            "ground_view",
            "distance_hold",
            "constant_position",
            "attitude_view",
            "gimbal_view"
        ]
        .iter()
        {
            let profile = get_profile(name).unwrap();
            assert_eq!(profile.name, *name);
            assert_eq!(profile.fields.get("status"), Some(&FieldKind::Text));
            assert!(matches!(
                profile.fields.get("last_update_s"),
                Some(FieldKind::Float { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_profile_errors() {
        assert!(matches!(
            get_profile("no_such_profile"),
            Err(SchemaError::UnknownProfile(_))
        ));
    }
}
