//! # BinRegistry
//!
//! Owns bin records and their images: duplicate-proximity checks, creation,
//! lookup, idempotent deletion, and the live map feed that joins bins with
//! their reports and image data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::task::AbortHandle;
use uuid::Uuid;
use ww_core::geo::DEFAULT_DUPLICATE_RADIUS_M;
use ww_core::models::collections::{BINS, BIN_IMAGES, REPORTS};
use ww_core::{
    AppError, ApprovalState, Bin, BinDraft, BinId, BinImage, BinView, Coordinate, Document,
    DocumentStore, ImageId, PreparedImage, Report, Result, Snapshot, Stored, Subscription,
    WasteType,
};

use crate::reports::sort_reports;

/// `true` iff any of `existing` lies within `radius_m` of `candidate`.
pub fn is_duplicate(candidate: Coordinate, existing: &[Coordinate], radius_m: f64) -> bool {
    existing
        .iter()
        .any(|other| candidate.distance_to(other) <= radius_m)
}

/// Closest bin to a point, with the distance to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestBin {
    pub bin: Stored<Bin>,
    pub distance_m: f64,
}

pub struct BinRegistry {
    store: Arc<dyn DocumentStore>,
    duplicate_radius_m: f64,
}

impl BinRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            duplicate_radius_m: DEFAULT_DUPLICATE_RADIUS_M,
        }
    }

    pub fn with_duplicate_radius(mut self, radius_m: f64) -> Self {
        self.duplicate_radius_m = radius_m;
        self
    }

    /// Checks `candidate` against every persisted bin.
    pub async fn check_duplicate(&self, candidate: Coordinate) -> Result<bool> {
        let existing: Vec<Coordinate> = self
            .list()
            .await?
            .into_iter()
            .map(|bin| bin.record.location)
            .collect();
        Ok(is_duplicate(candidate, &existing, self.duplicate_radius_m))
    }

    /// Persists a new bin. The caller has already run the duplicate check and
    /// uploaded the image via [`BinRegistry::store_image`].
    pub async fn create(&self, draft: BinDraft) -> Result<BinId> {
        if draft.added_by.trim().is_empty() {
            return Err(AppError::Unauthorized(
                "a signed-in user is required to add a bin".into(),
            ));
        }
        if !draft.location.is_valid() {
            return Err(AppError::Validation(format!(
                "location ({}, {}) is out of range",
                draft.location.latitude, draft.location.longitude
            )));
        }
        let image = self
            .store
            .get(BIN_IMAGES, &draft.image_id)
            .await
            .map_err(AppError::persistence)?;
        if image.is_none() {
            return Err(AppError::Validation(format!(
                "image {} has not been uploaded",
                draft.image_id
            )));
        }

        let bin = Bin {
            location: draft.location,
            description: draft.description,
            image_id: draft.image_id,
            types: draft.types,
            added_by: draft.added_by,
            approval: ApprovalState::Pending,
            created_at: Utc::now(),
        };
        let data = serde_json::to_value(&bin).map_err(AppError::persistence)?;
        let id = self
            .store
            .create(BINS, data)
            .await
            .map_err(AppError::persistence)?;

        info!(
            "bin {} added by {} at ({}, {})",
            id, bin.added_by, bin.location.latitude, bin.location.longitude
        );
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Stored<Bin>>> {
        let doc = self.store.get(BINS, id).await.map_err(AppError::persistence)?;
        doc.map(|d| d.decode::<Bin>())
            .transpose()
            .map_err(|e| AppError::Persistence(format!("malformed bin {id}: {e}")))
    }

    /// All well-formed bins. Malformed documents are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<Stored<Bin>>> {
        let docs = self.store.list(BINS).await.map_err(AppError::persistence)?;
        Ok(decode_all(&docs))
    }

    /// Removes the bin, then its image. Deleting a bin that is already gone is
    /// a no-op. An image that fails to delete is logged and left orphaned.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let Some(doc) = self.store.get(BINS, id).await.map_err(AppError::persistence)? else {
            debug!("bin {} already deleted", id);
            return Ok(());
        };
        let image_id = doc
            .data
            .get("binImageId")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let removed = self
            .store
            .delete(BINS, id)
            .await
            .map_err(AppError::persistence)?;
        if !removed {
            debug!("bin {} removed concurrently", id);
        }

        if let Some(image_id) = image_id {
            if let Err(e) = self.store.delete(BIN_IMAGES, &image_id).await {
                warn!("bin {} deleted but image {} was not: {:#}", id, image_id, e);
            }
        }
        info!("bin {} deleted", id);
        Ok(())
    }

    /// Stores a prepared photo as a `BinImage` and returns its id.
    pub async fn store_image(&self, image: PreparedImage) -> Result<ImageId> {
        use base64::Engine;

        let id = format!("bin_image_{}", Uuid::now_v7().simple());
        let record = BinImage {
            filename: image.filename,
            encoded_data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            uploaded_at: Utc::now(),
        };
        let data = serde_json::to_value(&record).map_err(AppError::persistence)?;
        self.store
            .set(BIN_IMAGES, &id, data)
            .await
            .map_err(AppError::persistence)?;
        debug!("stored image {} ({})", id, record.filename);
        Ok(id)
    }

    pub async fn get_image(&self, id: &str) -> Result<Option<Stored<BinImage>>> {
        let doc = self
            .store
            .get(BIN_IMAGES, id)
            .await
            .map_err(AppError::persistence)?;
        doc.map(|d| d.decode::<BinImage>())
            .transpose()
            .map_err(|e| AppError::Persistence(format!("malformed image {id}: {e}")))
    }

    /// Best-effort removal of an image that no bin references.
    pub async fn discard_image(&self, id: &str) {
        if let Err(e) = self.store.delete(BIN_IMAGES, id).await {
            warn!("failed to discard image {}: {:#}", id, e);
        }
    }

    /// The closest bin to `from`, restricted to bins accepting `waste_type`.
    pub async fn nearest(
        &self,
        from: Coordinate,
        waste_type: Option<WasteType>,
    ) -> Result<Option<NearestBin>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|bin| waste_type.map_or(true, |t| bin.record.accepts(t)))
            .map(|bin| NearestBin {
                distance_m: from.distance_to(&bin.record.location),
                bin,
            })
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m)))
    }

    /// One-off join of every bin with its reports and image.
    pub async fn views(&self) -> Result<Vec<BinView>> {
        let bins = self.store.list(BINS).await.map_err(AppError::persistence)?;
        let reports = self.store.list(REPORTS).await.map_err(AppError::persistence)?;
        let mut feed = BinFeed {
            store: self.store.clone(),
            images: HashMap::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        Ok(feed.join(&Arc::new(bins), &Arc::new(reports)).await)
    }

    /// Starts a live feed of every bin joined with its reports and image.
    ///
    /// `on_change` runs once with the current state, then once per write to
    /// either the bins or the reports collection. Each call gets a fresh join
    /// of the latest snapshot of both. Delivery stops when the returned handle
    /// is cancelled or dropped.
    pub async fn subscribe<F>(&self, on_change: F) -> Result<Unsubscribe>
    where
        F: Fn(Vec<BinView>) + Send + Sync + 'static,
    {
        let bins = self
            .store
            .subscribe(BINS)
            .await
            .map_err(AppError::persistence)?;
        let reports = self
            .store
            .subscribe(REPORTS)
            .await
            .map_err(AppError::persistence)?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let feed = BinFeed {
            store: self.store.clone(),
            images: HashMap::new(),
            cancelled: cancelled.clone(),
        };
        let task = tokio::spawn(feed.run(bins, reports, on_change));

        Ok(Unsubscribe {
            cancelled,
            task: task.abort_handle(),
        })
    }
}

/// Handle returned by [`BinRegistry::subscribe`].
pub struct Unsubscribe {
    cancelled: Arc<AtomicBool>,
    task: AbortHandle,
}

impl Unsubscribe {
    /// Stops delivery and releases both collection subscriptions.
    /// Calling it again does nothing.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("bin feed cancelled");
        }
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct BinFeed {
    store: Arc<dyn DocumentStore>,
    /// Resolved image data by id. Images never change once stored.
    images: HashMap<ImageId, String>,
    cancelled: Arc<AtomicBool>,
}

impl BinFeed {
    async fn run<F>(mut self, mut bins_sub: Subscription, mut reports_sub: Subscription, on_change: F)
    where
        F: Fn(Vec<BinView>) + Send + Sync + 'static,
    {
        let (Some(mut bins), Some(mut reports)) = (bins_sub.next().await, reports_sub.next().await)
        else {
            return;
        };
        self.deliver(&bins, &reports, &on_change).await;

        loop {
            tokio::select! {
                next = bins_sub.next() => match next {
                    Some(snapshot) => bins = snapshot,
                    None => break,
                },
                next = reports_sub.next() => match next {
                    Some(snapshot) => reports = snapshot,
                    None => break,
                },
            }
            self.deliver(&bins, &reports, &on_change).await;
        }
        debug!("bin feed closed by store");
    }

    async fn deliver<F>(&mut self, bins: &Snapshot, reports: &Snapshot, on_change: &F)
    where
        F: Fn(Vec<BinView>),
    {
        let views = self.join(bins, reports).await;
        if !self.cancelled.load(Ordering::SeqCst) {
            on_change(views);
        }
    }

    async fn join(&mut self, bins: &Snapshot, reports: &Snapshot) -> Vec<BinView> {
        let mut by_bin: HashMap<String, Vec<Stored<Report>>> = HashMap::new();
        for report in decode_all::<Report>(reports) {
            by_bin
                .entry(report.record.bin_id.clone())
                .or_default()
                .push(report);
        }

        let bins = decode_all::<Bin>(bins);
        self.images
            .retain(|image_id, _| bins.iter().any(|b| &b.record.image_id == image_id));

        let mut views = Vec::with_capacity(bins.len());
        for bin in bins {
            let base64_image = self.resolve_image(&bin.record.image_id).await;
            let mut related = by_bin.remove(&bin.id).unwrap_or_default();
            sort_reports(&mut related);
            views.push(BinView {
                id: bin.id,
                latitude: bin.record.location.latitude,
                longitude: bin.record.location.longitude,
                description: bin.record.description,
                types: bin.record.types,
                bin_image_id: bin.record.image_id,
                base64_image,
                reports: related,
            });
        }
        views
    }

    async fn resolve_image(&mut self, image_id: &str) -> Option<String> {
        if let Some(data) = self.images.get(image_id) {
            return Some(data.clone());
        }
        match self.store.get(BIN_IMAGES, image_id).await {
            Ok(Some(doc)) => match doc.decode::<BinImage>() {
                Ok(image) => {
                    self.images
                        .insert(image_id.to_string(), image.record.encoded_data.clone());
                    Some(image.record.encoded_data)
                }
                Err(e) => {
                    warn!("malformed image {}: {}", image_id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("failed to load image {}: {:#}", image_id, e);
                None
            }
        }
    }
}

pub(crate) fn decode_all<T: serde::de::DeserializeOwned>(docs: &[Document]) -> Vec<Stored<T>> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping malformed document {}: {}", doc.id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;
    use ww_core::MockDocumentStore;
    use ww_store_memory::MemoryDocumentStore;

    const DELHI: Coordinate = Coordinate::new(28.6936, 77.2146);

    fn registry() -> (Arc<MemoryDocumentStore>, BinRegistry) {
        let store = Arc::new(MemoryDocumentStore::new());
        let registry = BinRegistry::new(store.clone());
        (store, registry)
    }

    async fn add_bin(registry: &BinRegistry, at: Coordinate, types: Vec<WasteType>) -> BinId {
        let image_id = registry
            .store_image(PreparedImage {
                filename: "bin.jpg".into(),
                bytes: vec![0xff, 0xd8, 0xff],
            })
            .await
            .unwrap();
        registry
            .create(BinDraft {
                location: at,
                description: Some("by the gate".into()),
                image_id,
                types,
                added_by: "user-1".into(),
            })
            .await
            .unwrap()
    }

    /// ~`meters` north of `from`.
    fn north_of(from: Coordinate, meters: f64) -> Coordinate {
        Coordinate::new(from.latitude + meters / 111_195.0, from.longitude)
    }

    #[test]
    fn duplicate_at_same_point_but_not_fifty_meters_away() {
        let existing = [DELHI];
        assert!(is_duplicate(DELHI, &existing, DEFAULT_DUPLICATE_RADIUS_M));
        assert!(!is_duplicate(north_of(DELHI, 50.0), &existing, DEFAULT_DUPLICATE_RADIUS_M));
    }

    #[test]
    fn duplicate_radius_is_inclusive_and_empty_list_never_matches() {
        let near = north_of(DELHI, 5.0);
        assert!(is_duplicate(near, &[DELHI], DEFAULT_DUPLICATE_RADIUS_M));
        assert!(!is_duplicate(near, &[DELHI], 4.0));
        assert!(!is_duplicate(DELHI, &[], DEFAULT_DUPLICATE_RADIUS_M));
    }

    #[tokio::test]
    async fn check_duplicate_reads_persisted_bins() {
        let (_, registry) = registry();
        assert!(!registry.check_duplicate(DELHI).await.unwrap());

        add_bin(&registry, DELHI, vec![WasteType::GeneralTrash]).await;
        assert!(registry.check_duplicate(DELHI).await.unwrap());
        assert!(!registry.check_duplicate(north_of(DELHI, 50.0)).await.unwrap());
    }

    #[tokio::test]
    async fn configured_radius_widens_duplicate_check() {
        let store = Arc::new(MemoryDocumentStore::new());
        let registry = BinRegistry::new(store).with_duplicate_radius(100.0);
        add_bin(&registry, DELHI, vec![WasteType::GeneralTrash]).await;

        assert!(registry.check_duplicate(north_of(DELHI, 50.0)).await.unwrap());
        assert!(!registry.check_duplicate(north_of(DELHI, 150.0)).await.unwrap());
    }

    #[tokio::test]
    async fn create_persists_stored_shape() {
        let (store, registry) = registry();
        let id = add_bin(&registry, DELHI, vec![WasteType::EWaste]).await;

        let raw = store.get(BINS, &id).await.unwrap().unwrap();
        assert_eq!(raw.data["binLocation"]["latitude"], 28.6936);
        assert_eq!(raw.data["binType"], json!(["E-waste"]));
        assert_eq!(raw.data["binApproval"], Value::Null);
        assert_eq!(raw.data["addedBy"], "user-1");

        let bin = registry.get(&id).await.unwrap().unwrap();
        assert_eq!(bin.record.location, DELHI);
    }

    #[tokio::test]
    async fn create_requires_user_and_uploaded_image() {
        let (_, registry) = registry();
        let draft = BinDraft {
            location: DELHI,
            description: None,
            image_id: "bin_image_missing".into(),
            types: vec![],
            added_by: "user-1".into(),
        };

        let err = registry
            .create(BinDraft { added_by: " ".into(), ..draft.clone() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = registry.create(draft.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = registry
            .create(BinDraft { location: Coordinate::new(120.0, 0.0), ..draft })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_surfaces_store_failure() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get()
            .returning(|_, id| Ok(Some(Document::new(id, json!({})))));
        store
            .expect_create()
            .returning(|_, _| Err(anyhow::anyhow!("disk full")));
        let registry = BinRegistry::new(Arc::new(store));

        let err = registry
            .create(BinDraft {
                location: DELHI,
                description: None,
                image_id: "img".into(),
                types: vec![],
                added_by: "user-1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(ref m) if m.contains("disk full")));
    }

    #[tokio::test]
    async fn delete_removes_bin_and_image_and_is_idempotent() {
        let (store, registry) = registry();
        let id = add_bin(&registry, DELHI, vec![]).await;
        let image_id = registry.get(&id).await.unwrap().unwrap().record.image_id;
        let image = registry.get_image(&image_id).await.unwrap().unwrap();
        assert_eq!(image.record.encoded_data, "/9j/");

        registry.delete(&id).await.unwrap();
        registry.delete(&id).await.unwrap();

        assert!(registry.get(&id).await.unwrap().is_none());
        assert!(store.get(BIN_IMAGES, &image_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn image_delete_failure_does_not_fail_bin_delete() {
        let mut store = MockDocumentStore::new();
        store.expect_get().returning(|_, id| {
            Ok(Some(Document::new(id, json!({ "binImageId": "img-1" }))))
        });
        store
            .expect_delete()
            .withf(|collection, _| collection.to_string() == BINS)
            .times(1)
            .returning(|_, _| Ok(true));
        store
            .expect_delete()
            .withf(|collection, _| collection.to_string() == BIN_IMAGES)
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("storage offline")));
        let registry = BinRegistry::new(Arc::new(store));

        registry.delete("bin-1").await.unwrap();
    }

    #[tokio::test]
    async fn nearest_respects_waste_type() {
        let (_, registry) = registry();
        let close = add_bin(&registry, north_of(DELHI, 20.0), vec![WasteType::GeneralTrash]).await;
        let far = add_bin(&registry, north_of(DELHI, 400.0), vec![WasteType::EWaste]).await;

        let any = registry.nearest(DELHI, None).await.unwrap().unwrap();
        assert_eq!(any.bin.id, close);
        assert!((any.distance_m - 20.0).abs() < 0.5);

        let ewaste = registry.nearest(DELHI, Some(WasteType::EWaste)).await.unwrap().unwrap();
        assert_eq!(ewaste.bin.id, far);

        assert!(registry
            .nearest(DELHI, Some(WasteType::HazardousWaste))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_skips_malformed_documents() {
        let (store, registry) = registry();
        add_bin(&registry, DELHI, vec![]).await;
        store.create(BINS, json!({ "binLocation": "nowhere" })).await.unwrap();

        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn views_join_reports_oldest_first() {
        let (store, registry) = registry();
        let id = add_bin(&registry, DELHI, vec![]).await;
        for (text, ts) in [("later", "2024-05-02T00:00:00Z"), ("earlier", "2024-05-01T00:00:00Z")] {
            store
                .create(
                    REPORTS,
                    json!({
                        "binId": id, "reportText": text, "uid": null,
                        "trueCount": 0, "falseCount": 0, "timestamp": ts
                    }),
                )
                .await
                .unwrap();
        }

        let views = registry.views().await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].reports[0].record.text, "earlier");
        assert_eq!(views[0].reports[1].record.text, "later");
        assert_eq!(views[0].base64_image.as_deref(), Some("/9j/"));
    }

    async fn recv(rx:&mut mpsc::UnboundedReceiver<Vec<BinView>>) -> Vec<BinView> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("feed delivered nothing")
            .expect("feed closed")
    }

    async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Vec<BinView>>) {
        let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(extra.is_err(), "unexpected extra snapshot");
    }

    #[tokio::test]
    async fn feed_delivers_initial_state_then_one_snapshot_per_write() {
        let (store, registry) = registry();
        let existing = add_bin(&registry, DELHI, vec![WasteType::GeneralTrash]).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = registry
            .subscribe(move |views| {
                let _ = tx.send(views);
            })
            .await
            .unwrap();

        let initial = recv(&mut rx).await;
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].id, existing);
        assert_eq!(initial[0].base64_image.as_deref(), Some("/9j/"));
        assert_quiet(&mut rx).await;

        // create (image upload + bin insert are two writes)
        let image_id = registry
            .store_image(PreparedImage { filename: "b.jpg".into(), bytes: vec![1, 2, 3] })
            .await
            .unwrap();
        assert_quiet(&mut rx).await;
        let second = registry
            .create(BinDraft {
                location: north_of(DELHI, 100.0),
                description: None,
                image_id,
                types: vec![],
                added_by: "user-2".into(),
            })
            .await
            .unwrap();
        assert_eq!(recv(&mut rx).await.len(), 2);

        // report insert and update re-join
        let report = store
            .create(
                REPORTS,
                json!({
                    "binId": existing, "reportText": "bin is gone", "uid": null,
                    "trueCount": 0, "falseCount": 0, "timestamp": "2024-05-01T10:00:00Z"
                }),
            )
            .await
            .unwrap();
        let joined = recv(&mut rx).await;
        let with_report = joined.iter().find(|v| v.id == existing).unwrap();
        assert_eq!(with_report.reports.len(), 1);

        store.increment(REPORTS, &report, "trueCount", 1).await.unwrap();
        let joined = recv(&mut rx).await;
        let with_report = joined.iter().find(|v| v.id == existing).unwrap();
        assert_eq!(with_report.reports[0].record.true_count, 1);

        // delete
        store.delete(BINS, &second).await.unwrap();
        assert_eq!(recv(&mut rx).await.len(), 1);
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn cancelled_feed_stops_delivery_and_releases_subscriptions() {
        let (store, registry) = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = registry
            .subscribe(move |views| {
                let _ = tx.send(views);
            })
            .await
            .unwrap();
        assert!(recv(&mut rx).await.is_empty());

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        add_bin(&registry, DELHI, vec![]).await;
        // The feed task owned the sender; once aborted the channel closes.
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(next.is_none());

        let released = tokio::time::timeout(Duration::from_secs(2), async {
            while store.subscriber_count(BINS) + store.subscriber_count(REPORTS) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "collection subscriptions still held");
    }

    #[tokio::test]
    async fn independent_feeds_do_not_interfere() {
        let (_, registry) = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.subscribe(move |v| { let _ = tx_a.send(v); }).await.unwrap();
        let _b = registry.subscribe(move |v| { let _ = tx_b.send(v); }).await.unwrap();
        recv(&mut rx_a).await;
        recv(&mut rx_b).await;

        drop(a);
        add_bin(&registry, DELHI, vec![]).await;

        assert_eq!(recv(&mut rx_b).await.len(), 1);
    }
}
