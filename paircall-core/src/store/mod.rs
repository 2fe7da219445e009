//! Document store collaborator interface
//!
//! Durable storage with live-query subscriptions, consumed by the
//! signaling service and for history/artifact persistence. The store is
//! an external collaborator; [`MemoryStore`] is the in-process
//! realization used for single-node deployments and tests.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use crate::Result;

/// Collection names used by the services.
pub mod collections {
    pub const CALLS: &str = "calls";
    pub const HISTORY: &str = "session_history";
    pub const RECORDINGS: &str = "recordings";
}

/// Change event emitted by a live collection subscription.
///
/// Delivery of `Added` events is at-least-once per live query; consumers
/// deduplicate by document id.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Added { id: String, doc: JsonValue },
    Modified { id: String, doc: JsonValue },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document (a JSON object). If the document carries an `id`
    /// string field it is used as the document id, otherwise one is
    /// generated. Returns the document id.
    async fn insert(&self, collection: &str, doc: JsonValue) -> Result<String>;

    /// Shallow-merge `patch` into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: JsonValue) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>>;

    async fn list(&self, collection: &str) -> Result<Vec<JsonValue>>;

    /// Subscribe to the collection's change feed.
    fn subscribe(&self, collection: &str) -> broadcast::Receiver<ChangeEvent>;
}
