use crate::engine::outcome::{InvocationId, Outcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

struct Stamped<T> {
    completed: usize,
    outcome: Outcome<T>,
}

/// Concurrently writable sink for the outcomes of one dispatch run.
///
/// Keyed by invocation slot, so a slot is recorded at most once no matter
/// how many completions race for it. Each entry is stamped with its
/// completion order on insert.
pub struct ResultCollector<T> {
    entries: DashMap<InvocationId, Stamped<T>>,
    completions: AtomicUsize,
}

impl<T> Default for ResultCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultCollector<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            completions: AtomicUsize::new(0),
        }
    }

    /// Records an outcome. Returns `false` if the slot already holds one;
    /// the existing entry is kept.
    pub fn insert(&self, outcome: Outcome<T>) -> bool {
        let id = outcome.id;
        match self.entries.entry(id) {
            Entry::Occupied(_) => {
                warn!(invocation = %id, "Duplicate outcome ignored");
                false
            }
            Entry::Vacant(slot) => {
                let completed = self.completions.fetch_add(1, Ordering::SeqCst);
                slot.insert(Stamped { completed, outcome });
                true
            }
        }
    }

    pub fn contains(&self, id: &InvocationId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every outcome in completion order.
    ///
    /// Only meaningful once all writers are done; the dispatcher calls it
    /// after its join step.
    pub fn drain(&self) -> Vec<Outcome<T>> {
        let ids: Vec<InvocationId> = self.entries.iter().map(|e| *e.key()).collect();
        let mut drained: Vec<Stamped<T>> = ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|(_, entry)| entry))
            .collect();
        drained.sort_by_key(|entry| entry.completed);
        drained.into_iter().map(|entry| entry.outcome).collect()
    }
}
