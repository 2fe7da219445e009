//! In-memory document store
//!
//! DashMap-backed collections with a broadcast channel per collection for
//! live-query change delivery.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value as JsonValue};
use tokio::sync::broadcast;

use super::{ChangeEvent, DocumentStore};
use crate::models::generate_id;
use crate::{Error, Result};

/// Broadcast channel capacity per collection. Subscribers that lag behind
/// this many events observe `Lagged` and must resync from `list`.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, DashMap<String, JsonValue>>,
    channels: DashMap<String, broadcast::Sender<ChangeEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<ChangeEvent> {
        self.channels
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("collections", &self.collections.len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, mut doc: JsonValue) -> Result<String> {
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| Error::InvalidInput("document must be a JSON object".to_string()))?;

        let id = match obj.get("id").and_then(JsonValue::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = generate_id();
                obj.insert("id".to_string(), json!(id));
                id
            }
        };

        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc.clone());

        // Receiver-less channels are fine: nobody is listening yet.
        let _ = self.sender(collection).send(ChangeEvent::Added {
            id: id.clone(),
            doc,
        });

        tracing::trace!(collection, id = %id, "document inserted");
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: JsonValue) -> Result<()> {
        let patch_obj = patch
            .as_object()
            .ok_or_else(|| Error::InvalidInput("patch must be a JSON object".to_string()))?;

        let coll = self
            .collections
            .get(collection)
            .ok_or_else(|| Error::NotFound(format!("collection {collection}")))?;

        let updated = {
            let mut entry = coll
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("{collection}/{id}")))?;

            let doc_obj = entry
                .as_object_mut()
                .ok_or_else(|| Error::Internal(format!("{collection}/{id} is not an object")))?;
            for (key, value) in patch_obj {
                doc_obj.insert(key.clone(), value.clone());
            }
            entry.clone()
        };
        drop(coll);

        let _ = self.sender(collection).send(ChangeEvent::Modified {
            id: id.to_string(),
            doc: updated,
        });

        tracing::trace!(collection, id, "document updated");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|coll| coll.get(id).map(|doc| doc.clone())))
    }

    async fn list(&self, collection: &str) -> Result<Vec<JsonValue>> {
        Ok(self
            .collections
            .get(collection)
            .map(|coll| coll.iter().map(|entry| entry.value().clone()).collect())
            .unwrap_or_default())
    }

    fn subscribe(&self, collection: &str) -> broadcast::Receiver<ChangeEvent> {
        self.sender(collection).subscribe()
    }
}
