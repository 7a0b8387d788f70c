use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::{Equivalent, IndexMap};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::commit::CommitSink;
use crate::error::{CommitResult, StoreError, StoreResult};

/// A thread-safe key/value map that durably commits its full entry set after
/// every mutation.
///
/// Each mutating call changes the in-memory entries and commits the result to
/// the sink while holding the write lock, so no reader observes a state that
/// has not been committed. If the commit fails the change is undone before
/// the lock is released and the error is returned.
///
/// Entries keep insertion order. Overwriting a key keeps its position.
pub struct CommittedMap<K, V> {
    entries: RwLock<IndexMap<K, V>>,
    sink: Arc<dyn CommitSink<K, V>>,
}

/// What to apply to bring the entries back to their pre-mutation state.
enum Undo<K, V> {
    /// Keys written, with the value each had before (`None` if newly added).
    Put(Vec<(K, Option<V>)>),
    /// Entries removed, with their former index.
    Removed(Vec<(usize, K, V)>),
    /// The full entry set before a clear.
    Cleared(IndexMap<K, V>),
}

impl<K: Eq + Hash, V> Undo<K, V> {
    fn apply(self, entries: &mut IndexMap<K, V>) {
        match self {
            Undo::Put(written) => {
                for (key, previous) in written.into_iter().rev() {
                    match previous {
                        Some(value) => {
                            entries.insert(key, value);
                        }
                        None => {
                            entries.shift_remove(&key);
                        }
                    }
                }
            }
            Undo::Removed(removed) => {
                for (index, key, value) in removed.into_iter().rev() {
                    entries.shift_insert(index, key, value);
                }
            }
            Undo::Cleared(previous) => *entries = previous,
        }
    }
}

impl<K, V> CommittedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty map committing to `sink`.
    ///
    /// Nothing is read from the sink; use [`open`](Self::open) to resume
    /// from its last committed state.
    pub fn new(sink: Arc<dyn CommitSink<K, V>>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            sink,
        }
    }

    /// Create a map holding the sink's last committed entries.
    pub fn open(sink: Arc<dyn CommitSink<K, V>>) -> StoreResult<Self> {
        let entries: IndexMap<K, V> = sink.restore()?.into_iter().collect();
        debug!(len = entries.len(), "committed map opened");
        Ok(Self {
            entries: RwLock::new(entries),
            sink,
        })
    }

    /// Insert or replace the value for `key`, then commit.
    pub fn put(&self, key: K, value: V) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key.clone(), value);
        self.commit_or_undo(&mut entries, Undo::Put(vec![(key, previous)]))
    }

    /// Insert or replace every entry of the batch, then commit once.
    ///
    /// A batch that names the same key twice is rejected with
    /// [`StoreError::InvalidArgument`] and leaves the map untouched.
    pub fn put_all(&self, batch: impl IntoIterator<Item = (K, V)>) -> StoreResult<()> {
        let batch: Vec<(K, V)> = batch.into_iter().collect();
        let mut seen = HashSet::with_capacity(batch.len());
        if let Some(position) = batch.iter().position(|(key, _)| !seen.insert(key)) {
            return Err(StoreError::InvalidArgument(format!(
                "batch repeats a key at position {position}"
            )));
        }

        let mut entries = self.entries.write();
        let mut written = Vec::with_capacity(batch.len());
        for (key, value) in batch {
            let previous = entries.insert(key.clone(), value);
            written.push((key, previous));
        }
        self.commit_or_undo(&mut entries, Undo::Put(written))
    }

    /// A copy of the current value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.entries.read().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.entries.read().contains_key(key)
    }

    /// Remove `key` if present, then commit.
    ///
    /// The commit happens even when the key was absent.
    pub fn remove<Q>(&self, key: &Q) -> StoreResult<()>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let mut entries = self.entries.write();
        let removed = entries.shift_remove_full(key).into_iter().collect();
        self.commit_or_undo(&mut entries, Undo::Removed(removed))
    }

    /// Remove every listed key that is present, then commit once.
    pub fn remove_all<'a, Q>(&self, keys: impl IntoIterator<Item = &'a Q>) -> StoreResult<()>
    where
        Q: ?Sized + Hash + Equivalent<K> + 'a,
    {
        let mut entries = self.entries.write();
        let removed = keys
            .into_iter()
            .filter_map(|key| entries.shift_remove_full(key))
            .collect();
        self.commit_or_undo(&mut entries, Undo::Removed(removed))
    }

    /// Remove every entry, then commit the empty state.
    pub fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.write();
        let previous = std::mem::take(&mut *entries);
        self.commit_or_undo(&mut entries, Undo::Cleared(previous))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// The values at this moment, in insertion order.
    ///
    /// Later mutations do not affect the returned iterator.
    pub fn values(&self) -> impl Iterator<Item = V> {
        let snapshot: Vec<V> = self.entries.read().values().cloned().collect();
        snapshot.into_iter()
    }

    /// The keys at this moment, in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    /// The entries at this moment, in insertion order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The sink this map commits to.
    pub fn sink(&self) -> &Arc<dyn CommitSink<K, V>> {
        &self.sink
    }

    fn commit_or_undo(&self, entries: &mut IndexMap<K, V>, undo: Undo<K, V>) -> StoreResult<()> {
        match self.commit(entries) {
            Ok(()) => {
                debug!(len = entries.len(), "entries committed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "commit failed, rolling back");
                undo.apply(entries);
                Err(e.into())
            }
        }
    }

    fn commit(&self, entries: &IndexMap<K, V>) -> CommitResult<()> {
        let mut unit = self.sink.begin()?;
        unit.store(entries)?;
        unit.commit()
    }
}

impl<K, V> PartialEq for CommittedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Two maps are equal when they hold the same entries, in any order.
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let theirs = other.entries();
        let mine = self.entries.read();
        mine.len() == theirs.len() && theirs.iter().all(|(k, v)| mine.get(k) == Some(v))
    }
}

impl<K, V> fmt::Debug for CommittedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommittedMap")
            .field("len", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
