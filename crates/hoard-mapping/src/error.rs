//! Error types for entity mapping and type discovery.

use thiserror::Error;

use crate::markers::MarkerKind;

/// A field could not be read from an instance.
///
/// Raised when the instance is not of the field's owning type or when the
/// field value cannot be rendered as a document value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot read field `{field}` from instance of `{instance_type}`: {reason}")]
pub struct AccessError {
    /// Name of the field being read.
    pub field: &'static str,
    /// Runtime type name of the instance that was passed in.
    pub instance_type: &'static str,
    /// What went wrong.
    pub reason: String,
}

/// An entity type violates the mapping rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The entity declares no `#[id]` field.
    #[error("entity `{entity}` declares no #[id] field")]
    MissingId { entity: &'static str },

    /// The entity declares more than one `#[id]` field.
    #[error("entity `{entity}` declares {} #[id] fields: {}", .fields.len(), .fields.join(", "))]
    DuplicateId {
        entity: &'static str,
        fields: Vec<&'static str>,
    },

    /// The same field name is listed twice.
    #[error("entity `{entity}` lists field `{field}` more than once")]
    DuplicateField {
        entity: &'static str,
        field: &'static str,
    },

    /// A descriptor was requested for a type that is not a registered entity.
    #[error("type `{0}` is not a registered entity")]
    UnknownEntity(&'static str),
}

/// Result alias for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// The one-time type scan failed. There is no partially built registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// A type was registered twice under the same marker.
    #[error("type `{name}` carries the {marker} marker more than once")]
    DuplicateType {
        marker: MarkerKind,
        name: &'static str,
    },

    /// A custom scanner could not enumerate its types.
    #[error("type scan failed: {0}")]
    Scanner(String),
}
