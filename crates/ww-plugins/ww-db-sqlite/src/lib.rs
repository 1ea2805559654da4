//! # ww-db-sqlite Implementation
//!
//! Maps the document-store port onto a single SQLite table of JSON documents.
//! Field-level writes (`update`, `increment`) are single SQL statements using
//! SQLite's JSON1 functions, so concurrent voters never lose an increment.
//!
//! Snapshots are published in-process: every write takes `write_lock`, commits,
//! then re-reads the collection and broadcasts it before releasing the lock.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;
use ww_core::subscription::{Snapshot, Subscription, SNAPSHOT_CHANNEL_CAPACITY};
use ww_core::traits::DocumentStore;
use ww_core::Document;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    senders: DashMap<String, broadcast::Sender<Snapshot>>,
    write_lock: Mutex<()>,
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// `sqlite::memory:` is pinned to a single long-lived connection, since
    /// every new connection would otherwise see its own empty database.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url {url}"))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new();
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        log::info!("sqlite document store ready at {}", url);

        Ok(Self {
            pool,
            senders: DashMap::new(),
            write_lock: Mutex::new(()),
        })
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<Snapshot> {
        self.senders
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY).0)
            .clone()
    }

    async fn load(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(collection, &rows))
    }

    /// Must be called with `write_lock` held, after the write committed.
    /// Failures are logged, never returned to the writer.
    async fn publish(&self, collection: &str) {
        let Some(tx) = self.senders.get(collection).map(|s| s.clone()) else {
            return;
        };
        if tx.receiver_count() == 0 {
            return;
        }
        match self.load(collection).await {
            Ok(docs) => {
                let _ = tx.send(Arc::new(docs));
            }
            Err(e) => log::warn!("could not publish snapshot of '{}': {:#}", collection, e),
        }
    }
}

/// Decodes every row that holds valid JSON; the rest are logged and skipped.
fn decode_rows(collection: &str, rows: &[SqliteRow]) -> Vec<Document> {
    rows.iter()
        .filter_map(|row| match row_to_document(row) {
            Ok(doc) => Some(doc),
            Err(e) => {
                log::warn!("skipping malformed document in '{}': {:#}", collection, e);
                None
            }
        })
        .collect()
}

fn row_to_document(row: &SqliteRow) -> anyhow::Result<Document> {
    let id: String = row.get("id");
    let raw: String = row.get("data");
    let data = serde_json::from_str(&raw).with_context(|| format!("corrupt JSON in document {id}"))?;
    Ok(Document::new(id, data))
}

/// Builds a JSON path for a top-level field, rejecting anything that could
/// escape into a nested or quoted path.
fn field_path(field: &str) -> anyhow::Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("unsupported field name '{field}'");
    }
    Ok(format!("$.{field}"))
}

fn ensure_object(collection: &str, data: &Value) -> anyhow::Result<()> {
    if !data.is_object() {
        bail!("refusing to store non-object document in '{collection}'");
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, data: Value) -> anyhow::Result<String> {
        ensure_object(collection, &data)?;
        let id = Uuid::now_v7().to_string();

        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id.as_str())
            .bind(serde_json::to_string(&data)?)
            .execute(&self.pool)
            .await?;
        self.publish(collection).await;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> anyhow::Result<()> {
        ensure_object(collection, &data)?;

        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT OR REPLACE INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(serde_json::to_string(&data)?)
            .execute(&self.pool)
            .await?;
        self.publish(collection).await;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    /// One `json_set` call per update keeps the merge a single statement.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> anyhow::Result<bool> {
        let mut paths = Vec::with_capacity(fields.len());
        for key in fields.keys() {
            paths.push(field_path(key)?);
        }
        let setters = vec!["?, json(?)"; paths.len()].join(", ");
        let sql = if paths.is_empty() {
            "UPDATE documents SET data = data WHERE collection = ? AND id = ?".to_string()
        } else {
            format!("UPDATE documents SET data = json_set(data, {setters}) WHERE collection = ? AND id = ?")
        };

        let mut query = sqlx::query(&sql);
        for (path, value) in paths.iter().zip(fields.values()) {
            query = query.bind(path.as_str()).bind(serde_json::to_string(value)?);
        }

        let _guard = self.write_lock.lock().await;
        let result = query.bind(collection).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.publish(collection).await;
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        self.publish(collection).await;
        Ok(true)
    }

    async fn list(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        self.load(collection).await
    }

    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> anyhow::Result<Vec<Document>> {
        let path = field_path(field)?;
        let rows = sqlx::query(
            "SELECT id, data FROM documents
             WHERE collection = ? AND json_extract(data, ?) = json_extract(?, '$')
             ORDER BY id",
        )
        .bind(collection)
        .bind(path)
        .bind(serde_json::to_string(value)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(collection, &rows))
    }

    /// The read and the write happen inside one UPDATE, so SQLite's write
    /// serialization makes the increment atomic across connections.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> anyhow::Result<bool> {
        let path = field_path(field)?;

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "UPDATE documents
             SET data = json_set(data, ?, COALESCE(json_extract(data, ?), 0) + ?)
             WHERE collection = ? AND id = ?
               AND COALESCE(json_type(data, ?), 'null') IN ('integer', 'null')",
        )
        .bind(path.as_str())
        .bind(path.as_str())
        .bind(delta)
        .bind(collection)
        .bind(id)
        .bind(path.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if exists {
                return Err(anyhow!("field '{field}' of {collection}/{id} is not an integer"));
            }
            return Ok(false);
        }
        self.publish(collection).await;
        Ok(true)
    }

    async fn subscribe(&self, collection: &str) -> anyhow::Result<Subscription> {
        // Holding the write lock pins the snapshot to the receiver's start.
        let _guard = self.write_lock.lock().await;
        let rx = self.sender(collection).subscribe();
        let initial = Arc::new(self.load(collection).await?);
        Ok(Subscription::new(collection, initial, rx))
    }
}
