//! Entity-level facade for Hoard.
//!
//! A [`Template`] stores entities as JSON documents in a shared
//! [`CommittedMap`](hoard_store::CommittedMap), keyed by entity type path and
//! identity. It reads the identity through the entity's
//! [`EntityDescriptor`](hoard_mapping::EntityDescriptor), so any type marked
//! with [`entity!`](hoard_mapping::entity) can be stored without further glue.
//!
//! ```ignore
//! let template = Template::open(&StoreConfig::new("data/books.snapshot"))?;
//! template.insert(&book)?;
//! let found: Option<Book> = template.find("1231")?;
//! ```
//!
//! # Design Rules
//!
//! 1. One template call is one commit of the underlying map.
//! 2. Identities are compared in canonical JSON form, not by Rust type.
//! 3. A null identity is an error, never a key.

pub mod error;
pub mod key;
pub mod template;

pub use error::{TemplateError, TemplateResult};
pub use key::{entity_path, EntityKey, IdKey};
pub use template::{DocumentMap, Template};
