//! # ModerationEngine
//!
//! Turns community votes into outcomes. A report that collects enough
//! confirmations removes its bin; one that collects enough rejections is
//! discarded and the bin stays.

use std::sync::Arc;

use log::info;
use serde::Serialize;
use ww_core::{AppError, BinId, ReportId, Result, VoteCounts};

use crate::registry::BinRegistry;
use crate::reports::ReportStore;

/// Confirm votes that delete the reported bin.
pub const CONFIRM_THRESHOLD: u32 = 5;
/// Reject votes that discard the report.
pub const REJECT_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Open,
    ConfirmedDeleted,
    RejectedDiscarded,
}

/// Which terminal state, if any, `counts` has reached. Confirmation is
/// checked first.
pub fn evaluate(counts: VoteCounts) -> ReportState {
    if counts.true_count >= CONFIRM_THRESHOLD {
        ReportState::ConfirmedDeleted
    } else if counts.false_count >= REJECT_THRESHOLD {
        ReportState::RejectedDiscarded
    } else {
        ReportState::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub report_id: ReportId,
    pub bin_id: BinId,
    #[serde(flatten)]
    pub counts: VoteCounts,
    pub state: ReportState,
}

pub struct ModerationEngine {
    registry: Arc<BinRegistry>,
    reports: Arc<ReportStore>,
}

impl ModerationEngine {
    pub fn new(registry: Arc<BinRegistry>, reports: Arc<ReportStore>) -> Self {
        Self { registry, reports }
    }

    /// Records one vote and applies the resulting outcome.
    ///
    /// Deletions are idempotent, so two voters crossing a threshold at the
    /// same time both succeed and the bin is removed once.
    pub async fn cast_vote(&self, voter: &str, report_id: &str, confirm: bool) -> Result<VoteResult> {
        if voter.trim().is_empty() {
            return Err(AppError::Unauthorized("sign in to vote on reports".into()));
        }

        let outcome = self.reports.vote(report_id, confirm).await?;
        let state = evaluate(outcome.counts);
        match state {
            ReportState::ConfirmedDeleted => {
                info!(
                    "report {} confirmed by {} votes, removing bin {}",
                    outcome.report_id, outcome.counts.true_count, outcome.bin_id
                );
                self.registry.delete(&outcome.bin_id).await?;
                self.reports.delete(&outcome.report_id).await?;
            }
            ReportState::RejectedDiscarded => {
                info!(
                    "report {} rejected by {} votes, discarding it",
                    outcome.report_id, outcome.counts.false_count
                );
                self.reports.delete(&outcome.report_id).await?;
            }
            ReportState::Open => {}
        }

        Ok(VoteResult {
            report_id: outcome.report_id,
            bin_id: outcome.bin_id,
            counts: outcome.counts,
            state,
        })
    }

    /// Votes on the report shown for a bin, which is its oldest one.
    pub async fn vote_on_first_report(
        &self,
        voter: &str,
        bin_id: &str,
        confirm: bool,
    ) -> Result<VoteResult> {
        if voter.trim().is_empty() {
            return Err(AppError::Unauthorized("sign in to vote on reports".into()));
        }
        if self.registry.get(bin_id).await?.is_none() {
            return Err(AppError::not_found("Bin", bin_id));
        }
        let report = self
            .reports
            .first_for_bin(bin_id)
            .await?
            .ok_or_else(|| AppError::not_found("Report for bin", bin_id))?;
        self.cast_vote(voter, &report.id, confirm).await
    }
}
