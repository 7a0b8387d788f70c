//! Safe, diagnosable access to one declared entity field.

use std::fmt;

use serde_json::Value;

use crate::error::AccessError;
use crate::key::TypeKey;
use crate::markers::{FieldRole, FieldSpec, Instance};

/// Reads one declared field of an entity type.
///
/// Built once per field when the owning descriptor is built. Reading never
/// mutates the instance; a mismatched instance or an unrenderable value is
/// reported as an [`AccessError`] carrying the field name and the instance's
/// runtime type.
#[derive(Clone, Copy)]
pub struct FieldAccessor {
    owner: TypeKey,
    spec: &'static FieldSpec,
}

impl FieldAccessor {
    pub fn new(owner: TypeKey, spec: &'static FieldSpec) -> Self {
        Self { owner, spec }
    }

    /// Declared field name.
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn role(&self) -> Option<FieldRole> {
        self.spec.role
    }

    /// The entity type that declares this field.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Read the field's current value from `instance`.
    pub fn read(&self, instance: &dyn Instance) -> Result<Value, AccessError> {
        match (self.spec.read)(instance.as_any()) {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(self.error(instance, e.to_string())),
            None => Err(self.error(
                instance,
                format!("instance is not a `{}`", self.owner.name()),
            )),
        }
    }

    fn error(&self, instance: &dyn Instance, reason: String) -> AccessError {
        AccessError {
            field: self.spec.name,
            instance_type: instance.type_name(),
            reason,
        }
    }
}

impl PartialEq for FieldAccessor {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.spec.name == other.spec.name
    }
}

impl Eq for FieldAccessor {}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("owner", &self.owner)
            .field("name", &self.spec.name)
            .field("role", &self.spec.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::Entity;
    use serde::{Serialize, Serializer};
    use serde_json::json;

    #[derive(Serialize)]
    struct Sensor {
        serial: u64,
        label: String,
        reading: Reading,
    }

    /// Refuses to serialize negative readings.
    struct Reading(f64);

    impl Serialize for Reading {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.0 < 0.0 {
                return Err(serde::ser::Error::custom("negative reading"));
            }
            serializer.serialize_f64(self.0)
        }
    }

    crate::entity!(Sensor { #[id] serial, #[column] label, #[column] reading });

    fn accessor(name: &str) -> FieldAccessor {
        let shape = Sensor::shape();
        let spec = shape
            .fields
            .iter()
            .find(|f| f.name == name)
            .expect("field declared");
        FieldAccessor::new(shape.key, spec)
    }

    fn sensor(reading: f64) -> Sensor {
        Sensor {
            serial: 42,
            label: "boiler".into(),
            reading: Reading(reading),
        }
    }

    #[test]
    fn name_comes_from_declaration() {
        let label = accessor("label");
        assert_eq!(label.name(), "label");
        assert_eq!(label.role(), Some(FieldRole::Column));
        assert_eq!(label.owner().name(), "Sensor");
    }

    #[test]
    fn read_returns_current_value() {
        let mut s = sensor(1.5);
        assert_eq!(accessor("serial").read(&s).unwrap(), json!(42));
        assert_eq!(accessor("label").read(&s).unwrap(), json!("boiler"));

        s.label = "furnace".into();
        assert_eq!(accessor("label").read(&s).unwrap(), json!("furnace"));
    }

    #[test]
    fn read_on_wrong_type_is_access_error() {
        let err = accessor("label").read(&"not a sensor").unwrap_err();
        assert_eq!(err.field, "label");
        assert_eq!(err.instance_type, std::any::type_name::<&str>());
        assert!(err.reason.contains("Sensor"));
    }

    #[test]
    fn unrenderable_value_is_access_error() {
        let err = accessor("reading").read(&sensor(-3.0)).unwrap_err();
        assert_eq!(err.field, "reading");
        assert!(err.instance_type.ends_with("Sensor"));
        assert!(err.reason.contains("negative reading"));
    }

    #[test]
    fn accessors_compare_by_owner_and_name() {
        assert_eq!(accessor("label"), accessor("label"));
        assert_ne!(accessor("label"), accessor("serial"));
    }
}
