//! # Setpoint store
//!
//! The store is the hand-off point between a follower's compute cycle and the setpoint
//! publisher: the follower commits each cycle's command and telemetry fields as one atomic
//! update, the publisher and telemetry readers take consistent snapshots. The lock protecting
//! the state is held only for the copy, never across PID computation or vehicle I/O.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;
use thiserror::Error;

// Internal
use super::schema::{self, FieldKind, SchemaError, SetpointProfile};
use vehicle_if::cmd::ControlCommand;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the status telemetry field.
pub const STATUS_FIELD: &str = "status";

/// Name of the last-update-time telemetry field.
pub const LAST_UPDATE_FIELD: &str = "last_update_s";

/// Status value held before the first successful cycle.
pub const STATUS_IDLE: &str = "idle";

/// Status value held once cycles are being committed.
pub const STATUS_ACTIVE: &str = "active";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A value held in one field of a setpoint store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Text(String)
}

/// Schema violations and lock failures raised by store operations.
///
/// On any error the store retains its previous contents, a failed write never lands partially.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No field named {field:?} in profile {profile:?}")]
    UnknownField {
        profile: String,
        field: String
    },

    #[error("Field {field:?} expects a {expected} value")]
    WrongType {
        field: String,
        expected: &'static str
    },

    #[error("A lock on the store was poisoned")]
    LockPoisoned
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Profile scoped, schema validated register of named setpoint fields.
pub struct SetpointStore {
    profile: SetpointProfile,

    /// Store creation time, the epoch for the last-update telemetry field.
    epoch: Instant,

    inner: RwLock<StoreInner>
}

struct StoreInner {
    fields: HashMap<String, FieldValue>,
    last_cmd: Option<ControlCommand>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SetpointStore {
    /// Create a store for the named profile, resolved through the profile registry.
    pub fn new(profile_name: &str) -> Result<Self, SchemaError> {
        Ok(Self::with_profile(schema::get_profile(profile_name)?))
    }

    /// Create a store directly from a profile, bypassing the registry.
    pub fn with_profile(profile: SetpointProfile) -> Self {
        let mut fields = HashMap::new();

        for (name, kind) in &profile.fields {
            let value = match kind {
                FieldKind::Float { min, max } => {
                    FieldValue::Float(util::maths::clamp(&0.0, min, max))
                }
                FieldKind::Text => {
                    if name == STATUS_FIELD {
                        FieldValue::Text(STATUS_IDLE.to_string())
                    }
                    else {
                        FieldValue::Text(String::new())
                    }
                }
            };

            fields.insert(name.clone(), value);
        }

        Self {
            profile,
            epoch: Instant::now(),
            inner: RwLock::new(StoreInner {
                fields,
                last_cmd: None
            })
        }
    }

    /// Write a single field.
    ///
    /// Numeric values outside the schema's declared range are clamped to the nearest bound, not
    /// rejected. An unknown field name or a type mismatch fails the write and leaves the store
    /// unchanged.
    pub fn set_field(&self, name: &str, value: FieldValue) -> Result<(), StoreError> {
        let value = self.validate(name, value)?;

        let mut inner = self.inner.write()?;
        inner.fields.insert(name.to_string(), value);

        Ok(())
    }

    /// Commit one guidance cycle.
    ///
    /// All given fields, the computed command, and the status and last-update telemetry fields
    /// land as a single atomic update. If any field fails validation nothing at all is written.
    pub fn commit_cycle(
        &self,
        fields: &[(&str, FieldValue)],
        cmd: ControlCommand
    ) -> Result<(), StoreError> {
        // Validate everything up front so a late violation cannot leave a half written cycle
        let mut validated = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            validated.push((*name, self.validate(name, value.clone())?));
        }

        let mut inner = self.inner.write()?;

        for (name, value) in validated {
            inner.fields.insert(name.to_string(), value);
        }

        if self.profile.fields.contains_key(STATUS_FIELD) {
            inner.fields.insert(
                STATUS_FIELD.to_string(),
                FieldValue::Text(STATUS_ACTIVE.to_string())
            );
        }

        if let Some(FieldKind::Float { min, max }) = self.profile.fields.get(LAST_UPDATE_FIELD) {
            let elapsed = self.epoch.elapsed().as_secs_f64();
            inner.fields.insert(
                LAST_UPDATE_FIELD.to_string(),
                FieldValue::Float(util::maths::clamp(&elapsed, min, max))
            );
        }

        inner.last_cmd = Some(cmd);

        Ok(())
    }

    /// Snapshot of all fields.
    ///
    /// Safe to call concurrently with a commit, the result is always a whole cycle, never a
    /// mix of two.
    pub fn get_fields(&self) -> Result<HashMap<String, FieldValue>, StoreError> {
        let inner = self.inner.read()?;
        Ok(inner.fields.clone())
    }

    /// The most recently committed command, or `None` before the first successful cycle.
    pub fn last_command(&self) -> Result<Option<ControlCommand>, StoreError> {
        let inner = self.inner.read()?;
        Ok(inner.last_cmd)
    }

    /// The name of the profile this store was built from.
    pub fn profile_name(&self) -> &str {
        &self.profile.name
    }

    /// Seconds elapsed since this store was created.
    pub fn elapsed_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Check a value against the schema, returning the value to actually store.
    fn validate(&self, name: &str, value: FieldValue) -> Result<FieldValue, StoreError> {
        match self.profile.fields.get(name) {
            Some(FieldKind::Float { min, max }) => match value {
                FieldValue::Float(v) => Ok(FieldValue::Float(util::maths::clamp(&v, min, max))),
                FieldValue::Text(_) => Err(StoreError::WrongType {
                    field: name.to_string(),
                    expected: "float"
                })
            },
            Some(FieldKind::Text) => match value {
                FieldValue::Text(_) => Ok(value),
                FieldValue::Float(_) => Err(StoreError::WrongType {
                    field: name.to_string(),
                    expected: "text"
                })
            },
            None => Err(StoreError::UnknownField {
                profile: self.profile.name.clone(),
                field: name.to_string()
            })
        }
    }
}

impl<G> From<PoisonError<G>> for StoreError {
    fn from(_: PoisonError<G>) -> Self {
        StoreError::LockPoisoned
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    fn test_profile() -> SetpointProfile {
        SetpointProfile {
            name: "test_profile".to_string(),
            fields: vec![
                ("val".to_string(), FieldKind::Float { min: -5.0, max: 5.0 }),
                ("vx_ms".to_string(), FieldKind::Float { min: -10.0, max: 10.0 }),
                ("vy_ms".to_string(), FieldKind::Float { min: -10.0, max: 10.0 }),
                ("status".to_string(), FieldKind::Text),
                (
                    "last_update_s".to_string(),
                    FieldKind::Float { min: 0.0, max: f64::MAX }
                )
            ]
            .into_iter()
            .collect()
        }
    }

    #[test]
    fn test_initial_state() {
        let store = SetpointStore::with_profile(test_profile());

        let fields = store.get_fields().unwrap();
        assert_eq!(fields.get("val"), Some(&FieldValue::Float(0.0)));
        assert_eq!(
            fields.get("status"),
            Some(&FieldValue::Text(STATUS_IDLE.to_string()))
        );
        assert_eq!(store.last_command().unwrap(), None);
    }

    #[test]
    fn test_set_field_clamps_to_range() {
        let store = SetpointStore::with_profile(test_profile());

        store.set_field("val", FieldValue::Float(12.0)).unwrap();
        assert_eq!(
            store.get_fields().unwrap().get("val"),
            Some(&FieldValue::Float(5.0))
        );

        store.set_field("val", FieldValue::Float(-7.2)).unwrap();
        assert_eq!(
            store.get_fields().unwrap().get("val"),
            Some(&FieldValue::Float(-5.0))
        );

        store.set_field("val", FieldValue::Float(3.0)).unwrap();
        assert_eq!(
            store.get_fields().unwrap().get("val"),
            Some(&FieldValue::Float(3.0))
        );
    }

    #[test]
    fn test_schema_violation_retains_previous_value() {
        let store = SetpointStore::with_profile(test_profile());

        store
            .set_field("status", FieldValue::Text("armed".to_string()))
            .unwrap();

        // Wrong type for a text field
        assert!(matches!(
            store.set_field("status", FieldValue::Float(1.0)),
            Err(StoreError::WrongType { .. })
        ));
        assert_eq!(
            store.get_fields().unwrap().get("status"),
            Some(&FieldValue::Text("armed".to_string()))
        );

        // Wrong type for a float field
        assert!(matches!(
            store.set_field("val", FieldValue::Text("fast".to_string())),
            Err(StoreError::WrongType { .. })
        ));

        // Unknown field name
        assert!(matches!(
            store.set_field("no_such_field", FieldValue::Float(1.0)),
            Err(StoreError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_commit_cycle_all_or_nothing() {
        let store = SetpointStore::with_profile(test_profile());

        // A commit containing an invalid field writes nothing at all
        let result = store.commit_cycle(
            &[
                ("vx_ms", FieldValue::Float(1.0)),
                ("no_such_field", FieldValue::Float(2.0))
            ],
            ControlCommand::zero_velocity()
        );
        assert!(matches!(result, Err(StoreError::UnknownField { .. })));

        let fields = store.get_fields().unwrap();
        assert_eq!(fields.get("vx_ms"), Some(&FieldValue::Float(0.0)));
        assert_eq!(
            fields.get("status"),
            Some(&FieldValue::Text(STATUS_IDLE.to_string()))
        );
        assert_eq!(store.last_command().unwrap(), None);

        // A good commit lands fields, command, and telemetry together
        let cmd = ControlCommand::VelocityBody {
            vx_ms: 1.5,
            vy_ms: 0.0,
            vz_ms: 0.0
        };
        store
            .commit_cycle(&[("vx_ms", FieldValue::Float(1.5))], cmd)
            .unwrap();

        let fields = store.get_fields().unwrap();
        assert_eq!(fields.get("vx_ms"), Some(&FieldValue::Float(1.5)));
        assert_eq!(
            fields.get("status"),
            Some(&FieldValue::Text(STATUS_ACTIVE.to_string()))
        );
        match fields.get("last_update_s") {
            Some(FieldValue::Float(s)) => assert!(*s >= 0.0),
            other => panic!("bad last_update_s: {:?}", other)
        }
        assert_eq!(store.last_command().unwrap(), Some(cmd));
    }

    #[test]
    fn test_snapshots_never_tear() {
        let store = Arc::new(SetpointStore::with_profile(test_profile()));

        // Writer commits pairs which are always equal, reader asserts it never sees a mix of
        // two cycles
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let v = (i % 10) as f64;
                    store
                        .commit_cycle(
                            &[
                                ("vx_ms", FieldValue::Float(v)),
                                ("vy_ms", FieldValue::Float(v))
                            ],
                            ControlCommand::VelocityBody {
                                vx_ms: v,
                                vy_ms: v,
                                vz_ms: 0.0
                            }
                        )
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let fields = store.get_fields().unwrap();
                    let vx = fields.get("vx_ms").cloned();
                    let vy = fields.get("vy_ms").cloned();
                    assert_eq!(vx, vy);
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
