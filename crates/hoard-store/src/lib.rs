//! Commit-on-write key/value storage for Hoard.
//!
//! A [`CommittedMap`] is an in-memory map whose full entry set is handed to a
//! durable [`CommitSink`] after every mutation. Callers see each mutation as
//! all-or-nothing: either the change is in memory and committed, or the map
//! is unchanged and the commit error is returned.
//!
//! # Sinks
//!
//! All sinks implement the [`CommitSink`] trait:
//!
//! - [`InMemorySink`] -- keeps the last commit in memory, for tests and embedding
//! - [`FileSink`] -- writes a checksummed snapshot file, replaced atomically
//!
//! # Design Rules
//!
//! 1. One writer at a time; the write lock covers the mutation and its commit.
//! 2. Readers never observe an uncommitted state.
//! 3. A failed commit rolls the in-memory change back before the lock is released.
//! 4. Bulk operations commit exactly once.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod commit;
pub mod config;
pub mod error;
pub mod file;
pub mod map;
pub mod memory;

// Re-export primary types at crate root for ergonomic imports.
pub use commit::{CommitSink, CommitUnit};
pub use config::{Encoding, StoreConfig, SyncMode};
pub use error::{CommitError, CommitResult, StoreError, StoreResult};
pub use file::FileSink;
pub use map::CommittedMap;
pub use memory::InMemorySink;
