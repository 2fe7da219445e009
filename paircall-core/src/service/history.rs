use std::sync::Arc;

use crate::models::{SessionHistoryEntry, UserId};
use crate::store::{collections, DocumentStore};
use crate::Result;

/// Persists and queries completed-call audit records.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for HistoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryService").finish()
    }
}

impl HistoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write one audit record. The caller (the session orchestrator) is
    /// responsible for invoking this exactly once per termination.
    pub async fn record(&self, entry: &SessionHistoryEntry) -> Result<()> {
        self.store
            .insert(collections::HISTORY, serde_json::to_value(entry)?)
            .await?;
        tracing::info!(
            owner = %entry.owner_id,
            partner = %entry.partner_id,
            duration_seconds = entry.duration_seconds,
            recorded = entry.recorded,
            "session history written"
        );
        Ok(())
    }

    /// All history entries owned by `owner`, most recent first.
    pub async fn list_for(&self, owner: &UserId) -> Result<Vec<SessionHistoryEntry>> {
        let mut entries: Vec<SessionHistoryEntry> = self
            .store
            .list(collections::HISTORY)
            .await?
            .into_iter()
            .filter_map(|doc| serde_json::from_value::<SessionHistoryEntry>(doc).ok())
            .filter(|entry| entry.owner_id == *owner)
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}
