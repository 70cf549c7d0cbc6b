use dashmap::DashMap;
use std::collections::BTreeMap;

/// A page whose index write was deferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub site_id: i64,
    pub path: String,
    pub lemmas: BTreeMap<String, u32>,
}

/// Index writes waiting for their site's crawl to finish, keyed by page ID
#[derive(Debug, Default)]
pub struct PendingFinalization {
    entries: DashMap<i64, PendingEntry>,
}

impl PendingFinalization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a page; a later deferral of the same page replaces the earlier one
    pub fn defer(&self, page_id: i64, entry: PendingEntry) {
        self.entries.insert(page_id, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every queued page, ordered by page ID
    pub fn drain(&self) -> Vec<(i64, PendingEntry)> {
        let mut keys: Vec<i64> = self.entries.iter().map(|entry| *entry.key()).collect();
        keys.sort_unstable();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }
}
