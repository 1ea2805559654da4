//! # ReportStore
//!
//! Community reports against bins and their vote counters.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use ww_core::models::collections::{BINS, REPORTS};
use ww_core::{AppError, BinId, DocumentStore, Report, ReportId, Result, Stored, UserId, VoteCounts};

use crate::registry::decode_all;

/// Shortest report text accepted, in characters.
pub const MIN_REPORT_TEXT_CHARS: usize = 5;

/// Counts after a vote, and the bin the report is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub report_id: ReportId,
    pub bin_id: BinId,
    #[serde(flatten)]
    pub counts: VoteCounts,
}

/// Oldest first; ties broken by id so the order is stable across reads.
pub(crate) fn sort_reports(reports: &mut [Stored<Report>]) {
    reports.sort_by(|a, b| {
        a.record
            .timestamp
            .cmp(&b.record.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub struct ReportStore {
    store: Arc<dyn DocumentStore>,
}

impl ReportStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Files a report against an existing bin. Several reports per bin are
    /// allowed.
    pub async fn submit(
        &self,
        bin_id: &str,
        text: &str,
        submitted_by: Option<UserId>,
    ) -> Result<ReportId> {
        if text.chars().count() < MIN_REPORT_TEXT_CHARS {
            return Err(AppError::Validation(format!(
                "report text must be at least {MIN_REPORT_TEXT_CHARS} characters"
            )));
        }
        let bin = self
            .store
            .get(BINS, bin_id)
            .await
            .map_err(AppError::persistence)?;
        if bin.is_none() {
            return Err(AppError::not_found("Bin", bin_id));
        }

        let report = Report {
            bin_id: bin_id.to_string(),
            text: text.to_string(),
            submitted_by: submitted_by.filter(|uid| !uid.trim().is_empty()),
            true_count: 0,
            false_count: 0,
            timestamp: Utc::now(),
        };
        let data = serde_json::to_value(&report).map_err(AppError::persistence)?;
        let id = self
            .store
            .create(REPORTS, data)
            .await
            .map_err(AppError::persistence)?;
        info!("report {} filed against bin {}", id, bin_id);
        Ok(id)
    }

    /// Adds one vote with the store's atomic increment, then re-reads the
    /// report so the returned counts include every concurrent vote applied so
    /// far.
    pub async fn vote(&self, report_id: &str, confirm: bool) -> Result<VoteOutcome> {
        let field = if confirm { "trueCount" } else { "falseCount" };
        let found = self
            .store
            .increment(REPORTS, report_id, field, 1)
            .await
            .map_err(AppError::persistence)?;
        if !found {
            return Err(AppError::not_found("Report", report_id));
        }

        // A concurrent vote may have resolved and removed it already.
        let report = self
            .get(report_id)
            .await?
            .ok_or_else(|| AppError::not_found("Report", report_id))?;
        debug!(
            "report {} now {}/{}",
            report_id, report.record.true_count, report.record.false_count
        );
        Ok(VoteOutcome {
            report_id: report.id,
            bin_id: report.record.bin_id,
            counts: VoteCounts {
                true_count: report.record.true_count,
                false_count: report.record.false_count,
            },
        })
    }

    pub async fn get(&self, report_id: &str) -> Result<Option<Stored<Report>>> {
        let doc = self
            .store
            .get(REPORTS, report_id)
            .await
            .map_err(AppError::persistence)?;
        doc.map(|d| d.decode::<Report>())
            .transpose()
            .map_err(|e| AppError::Persistence(format!("malformed report {report_id}: {e}")))
    }

    /// Reports filed against `bin_id`, oldest first.
    pub async fn for_bin(&self, bin_id: &str) -> Result<Vec<Stored<Report>>> {
        let docs = self
            .store
            .query_where(REPORTS, "binId", &json!(bin_id))
            .await
            .map_err(AppError::persistence)?;
        let mut reports = decode_all::<Report>(&docs);
        sort_reports(&mut reports);
        Ok(reports)
    }

    /// The report voters see for a bin: its oldest one.
    pub async fn first_for_bin(&self, bin_id: &str) -> Result<Option<Stored<Report>>> {
        Ok(self.for_bin(bin_id).await?.into_iter().next())
    }

    /// Returns `false` if the report was already gone.
    pub async fn delete(&self, report_id: &str) -> Result<bool> {
        self.store
            .delete(REPORTS, report_id)
            .await
            .map_err(AppError::persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ww_core::{Coordinate, PreparedImage, BinDraft};
    use ww_store_memory::MemoryDocumentStore;

    use crate::registry::BinRegistry;

    async fn setup() -> (Arc<MemoryDocumentStore>, ReportStore, BinId) {
        let store = Arc::new(MemoryDocumentStore::new());
        let registry = BinRegistry::new(store.clone());
        let image_id = registry
            .store_image(PreparedImage { filename: "a.jpg".into(), bytes: vec![1] })
            .await
            .unwrap();
        let bin_id = registry
            .create(BinDraft {
                location: Coordinate::new(28.6936, 77.2146),
                description: None,
                image_id,
                types: vec![],
                added_by: "user-1".into(),
            })
            .await
            .unwrap();
        (store.clone(), ReportStore::new(store), bin_id)
    }

    #[tokio::test]
    async fn four_characters_fail_five_succeed() {
        let (_, reports, bin_id) = setup().await;

        let err = reports.submit(&bin_id, "gone", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let id = reports.submit(&bin_id, "moved", Some("u".into())).await.unwrap();
        let stored = reports.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.text, "moved");
        assert_eq!((stored.record.true_count, stored.record.false_count), (0, 0));
        assert_eq!(stored.record.submitted_by.as_deref(), Some("u"));
    }

    #[tokio::test]
    async fn length_counts_characters_not_bytes() {
        let (_, reports, bin_id) = setup().await;
        // 4 characters, 8 bytes
        assert!(reports.submit(&bin_id, "ééé!", None).await.is_err());
    }

    #[tokio::test]
    async fn short_text_is_rejected_before_any_write() {
        let (store, reports, _) = setup().await;
        // Bin does not exist either, validation still wins.
        let err = reports.submit("missing", "abc", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.list(REPORTS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reporting_unknown_bin_is_not_found() {
        let (_, reports, _) = setup().await;
        let err = reports.submit("missing", "bin is gone", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }

    #[tokio::test]
    async fn blank_submitter_is_stored_as_null() {
        let (store, reports, bin_id) = setup().await;
        let id = reports.submit(&bin_id, "overflowing", Some("  ".into())).await.unwrap();
        let raw = store.get(REPORTS, &id).await.unwrap().unwrap();
        assert!(raw.data["uid"].is_null());
    }

    #[tokio::test]
    async fn vote_increments_exactly_one_counter() {
        let (_, reports, bin_id) = setup().await;
        let id = reports.submit(&bin_id, "bin is gone", None).await.unwrap();

        let outcome = reports.vote(&id, true).await.unwrap();
        assert_eq!(outcome.counts, VoteCounts { true_count: 1, false_count: 0 });
        assert_eq!(outcome.bin_id, bin_id);

        let outcome = reports.vote(&id, false).await.unwrap();
        assert_eq!(outcome.counts, VoteCounts { true_count: 1, false_count: 1 });
    }

    #[tokio::test]
    async fn vote_on_missing_report_is_not_found() {
        let (_, reports, _) = setup().await;
        let err = reports.vote("nope", true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "Report"));
    }

    #[tokio::test]
    async fn concurrent_votes_are_all_counted() {
        let (_, reports, bin_id) = setup().await;
        let reports = Arc::new(reports);
        let id = reports.submit(&bin_id, "bin is gone", None).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let reports = reports.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move { reports.vote(&id, i % 2 == 0).await }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let report = reports.get(&id).await.unwrap().unwrap();
        assert_eq!(report.record.true_count, 10);
        assert_eq!(report.record.false_count, 10);
    }

    #[tokio::test]
    async fn first_report_is_the_oldest() {
        let (store, reports, bin_id) = setup().await;
        // Inserted newest-first
        for (text, ts) in [("second one", "2024-05-02T00:00:00Z"), ("first one", "2024-05-01T00:00:00Z")] {
            store
                .create(
                    REPORTS,
                    json!({
                        "binId": bin_id, "reportText": text, "uid": null,
                        "trueCount": 0, "falseCount": 0, "timestamp": ts
                    }),
                )
                .await
                .unwrap();
        }
        reports.submit("other", "ignored", None).await.unwrap_err();

        let all = reports.for_bin(&bin_id).await.unwrap();
        assert_eq!(all.len(), 2);
        let first = reports.first_for_bin(&bin_id).await.unwrap().unwrap();
        assert_eq!(first.record.text, "first one");
        assert!(reports.first_for_bin("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_, reports, bin_id) = setup().await;
        let id = reports.submit(&bin_id, "bin is gone", None).await.unwrap();
        assert!(reports.delete(&id).await.unwrap());
        assert!(!reports.delete(&id).await.unwrap());
    }
}
