use hoard_mapping::{AccessError, MappingError, ScanError};
use hoard_store::StoreError;

/// Errors from template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The entity type violates the mapping rules or is not registered.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// A field could not be read off an entity.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// The underlying committed map refused the change.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The type registry could not be built.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// An entity or identity could not be converted to or from a document.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The entity's identity field is null.
    #[error("entity `{entity}` has a null identity")]
    NullId { entity: &'static str },
}

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
