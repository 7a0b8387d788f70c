//! Entity metadata for Hoard.
//!
//! This crate answers two questions for generic persistence code: which types
//! in the process are entities or repository contracts, and how to read the
//! identity and stored fields off an entity whose concrete type is not known
//! at the call site.
//!
//! # Markers
//!
//! Types opt in with declarative macros that register themselves at link
//! time through [`inventory`]:
//!
//! - [`entity!`] -- marks a struct as an entity and lists its `#[id]` and
//!   `#[column]` fields (unmarked fields are ignored)
//! - [`embeddable!`] -- marks a value type that is stored inside entities
//! - [`repository!`] -- marks a trait as a repository contract and records the
//!   supertraits it declares
//!
//! # Modules
//!
//! - [`key`] -- [`TypeKey`], a `static`-friendly type identifier
//! - [`markers`] -- marker records, base contracts and the registration macros
//! - [`field`] -- [`FieldAccessor`], a typed-error reader for one field
//! - [`descriptor`] -- [`EntityDescriptor`] and the [`DescriptorCache`]
//! - [`scanner`] -- the [`TypeScanner`] seam and its two implementations
//! - [`registry`] -- the process-wide [`TypeRegistry`]
//!
//! # Design Rules
//!
//! 1. Registration is declarative; the core never hardcodes type names.
//! 2. Descriptors are validated once, when built, and immutable afterwards.
//! 3. The registry scans at most once per process and never changes after.
//! 4. Every failure is a typed error returned to the caller.

pub mod descriptor;
pub mod error;
pub mod field;
pub mod key;
pub mod markers;
pub mod registry;
pub mod scanner;

pub use descriptor::{DescriptorCache, EntityDescriptor};
pub use error::{AccessError, MappingError, MappingResult, ScanError};
pub use field::FieldAccessor;
pub use key::TypeKey;
pub use markers::{
    Contract, CrudRepository, DataRepository, EmbeddableMarker, Entity, EntityMarker,
    EntityShape, FieldReader, FieldRole, FieldSpec, Instance, MarkerKind, PageableRepository,
    RepositoryMarker, Supertype,
};
pub use registry::{RepositoryInfo, TypeRegistry};
pub use scanner::{InventoryScanner, ScanOutput, StaticScanner, TypeScanner};

// Used by the registration macros.
#[doc(hidden)]
pub use inventory;

#[doc(hidden)]
pub mod __private {
    pub use crate::markers::{BaseCheck, MissesBase, ReachesBase};
    pub use serde_json;
}
