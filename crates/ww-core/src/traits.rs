//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be wired in by the binary.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{Document, Prediction, PreparedImage};
use crate::subscription::Subscription;

/// Document persistence contract.
///
/// Collections are created lazily on first write. Every committed write
/// (`create`, `set`, `update`, `delete`, `increment`) that changes a collection
/// publishes exactly one snapshot to that collection's subscribers.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document under a store-generated id and returns that id.
    async fn create(&self, collection: &str, data: Value) -> anyhow::Result<String>;

    /// Inserts or replaces a document under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<()>;

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// Merges top-level fields into an existing document.
    /// Returns `false` if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> anyhow::Result<bool>;

    /// Returns `false` if there was nothing to delete.
    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool>;

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>>;

    /// Documents whose top-level `field` equals `value`.
    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> anyhow::Result<Vec<Document>>;

    /// Atomically adds `delta` to a numeric top-level field (a missing field
    /// counts as 0). Returns `false` if the document does not exist.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> anyhow::Result<bool>;

    /// Live view of a collection. See [`Subscription`].
    async fn subscribe(&self, collection: &str) -> anyhow::Result<Subscription>;
}

/// Opaque accept/reject predicate for captured bin photos.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ClassificationGate: Send + Sync {
    /// `true` if the base64 image shows a bin or garbage-related object.
    async fn classify(&self, image_base64: &str) -> anyhow::Result<bool>;
}

/// Raw label predictions for waste identification.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ImageLabeler: Send + Sync {
    async fn labels(&self, image_base64: &str) -> anyhow::Result<Vec<Prediction>>;
}

/// Normalizes captured photos before they are stored.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn prepare(&self, data: Vec<u8>) -> anyhow::Result<PreparedImage>;
}
