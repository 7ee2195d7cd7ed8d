//! Scheduled-task index — a set of cron task ids used purely for
//! deduplication on admission (spec §4.C).

use std::collections::HashSet;

use tokio::sync::Mutex;

#[derive(Default)]
pub struct ScheduledIndex {
    ids: Mutex<HashSet<String>>,
}

impl ScheduledIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` was already present.
    pub async fn insert(&self, id: &str) -> bool {
        !self.ids.lock().await.insert(id.to_string())
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.ids.lock().await.contains(id)
    }

    /// Cleared wholesale on the "reload" operation (§4.H `reload_cron`).
    pub async fn clear(&self) {
        self.ids.lock().await.clear();
    }
}
