//! The durable-commit seam.
//!
//! A [`CommittedMap`](crate::CommittedMap) drives its sink through three
//! steps per mutation: [`CommitSink::begin`] opens a unit,
//! [`CommitUnit::store`] registers the full entry set as the root to
//! persist, and [`CommitUnit::commit`] finalizes it. A unit that is dropped
//! without `commit` persists nothing.

use indexmap::IndexMap;

use crate::error::CommitResult;

/// Durable storage for a map's entry set.
///
/// Implementations must be thread-safe (`Send + Sync`). The map serializes
/// its own calls, so a sink never sees two units in flight for one map.
/// Failures must be returned, never swallowed: the map rolls back its
/// in-memory change when `commit` fails.
pub trait CommitSink<K, V>: Send + Sync {
    /// Open a commit unit.
    fn begin(&self) -> CommitResult<Box<dyn CommitUnit<K, V> + '_>>;

    /// Load the last committed entry set, in insertion order.
    ///
    /// Sinks without persistent state return nothing.
    fn restore(&self) -> CommitResult<Vec<(K, V)>> {
        Ok(Vec::new())
    }
}

/// One in-flight commit.
pub trait CommitUnit<K, V> {
    /// Register `root` as the state to persist.
    fn store(&mut self, root: &IndexMap<K, V>) -> CommitResult<()>;

    /// Durably persist the registered root as one atomic unit.
    fn commit(self: Box<Self>) -> CommitResult<()>;
}
