//! # ww-store-memory
//!
//! In-process implementation of `DocumentStore`.
//! Each collection lives behind one dashmap shard lock, so a write and the
//! snapshot it publishes are a single critical section: subscribers see
//! snapshots in exactly the order writes were applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;
use ww_core::subscription::{Snapshot, Subscription, SNAPSHOT_CHANNEL_CAPACITY};
use ww_core::traits::DocumentStore;
use ww_core::Document;

struct Collection {
    /// Keyed by id; v7 ids keep this in creation order.
    docs: BTreeMap<String, Value>,
    tx: broadcast::Sender<Snapshot>,
}

impl Default for Collection {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            docs: BTreeMap::new(),
            tx,
        }
    }
}

impl Collection {
    fn snapshot(&self) -> Snapshot {
        Arc::new(
            self.docs
                .iter()
                .map(|(id, data)| Document::new(id.clone(), data.clone()))
                .collect(),
        )
    }

    fn publish(&self) {
        // No receivers is fine; nobody is watching this collection.
        let _ = self.tx.send(self.snapshot());
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on a collection.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.tx.receiver_count())
            .unwrap_or(0)
    }
}

fn as_object_mut<'a>(id: &str, data: &'a mut Value) -> anyhow::Result<&'a mut Map<String, Value>> {
    data.as_object_mut()
        .ok_or_else(|| anyhow!("document {id} is not a JSON object"))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, data: Value) -> anyhow::Result<String> {
        if !data.is_object() {
            bail!("refusing to store non-object document in '{collection}'");
        }
        let id = Uuid::now_v7().to_string();
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        coll.docs.insert(id.clone(), data);
        coll.publish();
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<()> {
        if !data.is_object() {
            bail!("refusing to store non-object document {collection}/{id}");
        }
        let mut coll = self.collections.entry(collection.to_string()).or_default();
        coll.docs.insert(id.to_string(), data);
        coll.publish();
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.docs.get(id).map(|data| Document::new(id, data.clone()))))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> anyhow::Result<bool> {
        let Some(mut coll) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(data) = coll.docs.get_mut(id) else {
            return Ok(false);
        };
        let object = as_object_mut(id, data)?;
        for (key, value) in fields {
            object.insert(key, value);
        }
        coll.publish();
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let Some(mut coll) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        if coll.docs.remove(id).is_none() {
            return Ok(false);
        }
        coll.publish();
        Ok(true)
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.snapshot().as_ref().clone())
            .unwrap_or_default())
    }

    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> anyhow::Result<Vec<Document>> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| {
                c.docs
                    .iter()
                    .filter(|(_, data)| data.get(field) == Some(value))
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> anyhow::Result<bool> {
        let Some(mut coll) = self.collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(data) = coll.docs.get_mut(id) else {
            return Ok(false);
        };
        let object = as_object_mut(id, data)?;
        let current = match object.get(field) {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| anyhow!("field '{field}' of {collection}/{id} is not an integer"))?,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| anyhow!("increment overflow on {collection}/{id}.{field}"))?;
        object.insert(field.to_string(), Value::from(next));
        coll.publish();
        Ok(true)
    }

    async fn subscribe(&self, collection: &str) -> anyhow::Result<Subscription> {
        // Take the snapshot and the receiver under the same shard lock so no
        // write can slip between them.
        let coll = self.collections.entry(collection.to_string()).or_default();
        let rx = coll.tx.subscribe();
        log::debug!(
            "new subscriber on '{}', total {}",
            collection,
            coll.tx.receiver_count()
        );
        Ok(Subscription::new(collection, coll.snapshot(), rx))
    }
}
