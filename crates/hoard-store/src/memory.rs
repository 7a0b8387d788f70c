use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::commit::{CommitSink, CommitUnit};
use crate::error::{CommitError, CommitResult};

/// In-memory commit sink.
///
/// Keeps the last committed entry set and counts commits. Intended for tests
/// and embedding: data is lost when the sink is dropped. Failures can be
/// injected with [`fail_next`](Self::fail_next).
pub struct InMemorySink<K, V> {
    state: Mutex<SinkState<K, V>>,
}

struct SinkState<K, V> {
    committed: IndexMap<K, V>,
    commits: u64,
    failures: usize,
}

impl<K, V> InMemorySink<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a sink with nothing committed.
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Create a sink that reports `entries` as previously committed state.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                committed: entries.into_iter().collect(),
                commits: 0,
                failures: 0,
            }),
        }
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.state.lock().commits
    }

    /// The last committed entry set.
    pub fn committed(&self) -> IndexMap<K, V> {
        self.state.lock().committed.clone()
    }

    /// Reject the next `count` commits.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures = count;
    }
}

impl<K, V> Default for InMemorySink<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CommitSink<K, V> for InMemorySink<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn begin(&self) -> CommitResult<Box<dyn CommitUnit<K, V> + '_>> {
        Ok(Box::new(InMemoryUnit {
            sink: self,
            staged: None,
        }))
    }

    fn restore(&self) -> CommitResult<Vec<(K, V)>> {
        let state = self.state.lock();
        Ok(state
            .committed
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

impl<K, V> fmt::Debug for InMemorySink<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemorySink")
            .field("entry_count", &state.committed.len())
            .field("commits", &state.commits)
            .finish()
    }
}

struct InMemoryUnit<'a, K, V> {
    sink: &'a InMemorySink<K, V>,
    staged: Option<IndexMap<K, V>>,
}

impl<K, V> CommitUnit<K, V> for InMemoryUnit<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn store(&mut self, root: &IndexMap<K, V>) -> CommitResult<()> {
        self.staged = Some(root.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> CommitResult<()> {
        let mut state = self.sink.state.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(CommitError::Rejected("injected failure".into()));
        }
        if let Some(staged) = self.staged {
            state.committed = staged;
        }
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(
        sink: &InMemorySink<&'static str, i32>,
        root: &IndexMap<&'static str, i32>,
    ) -> CommitResult<()> {
        let mut unit = sink.begin()?;
        unit.store(root)?;
        unit.commit()
    }

    #[test]
    fn commit_replaces_committed_state() {
        let sink = InMemorySink::new();
        let root: IndexMap<_, _> = [("a", 1), ("b", 2)].into_iter().collect();
        commit(&sink, &root).unwrap();

        assert_eq!(sink.committed(), root);
        assert_eq!(sink.commit_count(), 1);
    }

    #[test]
    fn dropped_unit_persists_nothing() {
        let sink: InMemorySink<&str, i32> = InMemorySink::new();
        {
            let mut unit = sink.begin().unwrap();
            unit.store(&[("a", 1)].into_iter().collect()).unwrap();
        }
        assert!(sink.committed().is_empty());
        assert_eq!(sink.commit_count(), 0);
    }

    #[test]
    fn injected_failures_are_consumed() {
        let sink = InMemorySink::new();
        let root: IndexMap<_, _> = [("a", 1)].into_iter().collect();
        sink.fail_next(1);

        let err = commit(&sink, &root).unwrap_err();
        assert!(matches!(err, CommitError::Rejected(_)));
        assert!(sink.committed().is_empty());

        commit(&sink, &root).unwrap();
        assert_eq!(sink.committed(), root);
        assert_eq!(sink.commit_count(), 1);
    }

    #[test]
    fn restore_returns_seeded_entries_in_order() {
        let sink = InMemorySink::with_entries([("z", 26), ("a", 1)]);
        assert_eq!(sink.restore().unwrap(), vec![("z", 26), ("a", 1)]);
    }

    #[test]
    fn debug_format() {
        let sink: InMemorySink<&str, i32> = InMemorySink::with_entries([("a", 1)]);
        let debug = format!("{sink:?}");
        assert!(debug.contains("InMemorySink"));
        assert!(debug.contains("entry_count"));
    }
}
