//! # SubmissionFlow
//!
//! Adding a bin from a captured photo: proximity check, classification gate,
//! image normalization and upload, then the bin record itself.

use std::sync::Arc;

use base64::Engine;
use log::{info, warn};
use serde::Serialize;
use ww_core::{
    AppError, BinDraft, BinId, ClassificationGate, Coordinate, ImageProcessor, Result, WasteType,
};

use crate::registry::BinRegistry;

/// Everything the user supplies when adding a bin.
#[derive(Debug, Clone)]
pub struct BinSubmission {
    pub location: Coordinate,
    pub description: Option<String>,
    pub types: Vec<WasteType>,
    /// Raw photo bytes as captured.
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Created { id: BinId },
    /// Another bin is already recorded within the duplicate radius.
    Duplicate,
    /// The classifier did not recognize a bin in the photo.
    NotABin,
}

pub struct SubmissionFlow {
    registry: Arc<BinRegistry>,
    gate: Arc<dyn ClassificationGate>,
    processor: Arc<dyn ImageProcessor>,
}

impl SubmissionFlow {
    pub fn new(
        registry: Arc<BinRegistry>,
        gate: Arc<dyn ClassificationGate>,
        processor: Arc<dyn ImageProcessor>,
    ) -> Self {
        Self {
            registry,
            gate,
            processor,
        }
    }

    /// Runs the full add-bin flow for `user`.
    ///
    /// Nothing is written unless the location is free and the photo passes the
    /// gate. If the bin record fails to persist, the uploaded image is removed
    /// again.
    pub async fn submit(&self, user: Option<&str>, submission: BinSubmission) -> Result<SubmissionOutcome> {
        let user = user
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Unauthorized("sign in to add a bin".into()))?;
        if !submission.location.is_valid() {
            return Err(AppError::Validation("location is out of range".into()));
        }
        if submission.image.is_empty() {
            return Err(AppError::Validation("a photo of the bin is required".into()));
        }

        if self.registry.check_duplicate(submission.location).await? {
            info!(
                "rejected bin from {}: duplicate near ({}, {})",
                user, submission.location.latitude, submission.location.longitude
            );
            return Ok(SubmissionOutcome::Duplicate);
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&submission.image);
        let is_bin = self
            .gate
            .classify(&encoded)
            .await
            .map_err(AppError::network)?;
        if !is_bin {
            info!("rejected bin from {}: photo not classified as a bin", user);
            return Ok(SubmissionOutcome::NotABin);
        }

        let prepared = self
            .processor
            .prepare(submission.image)
            .await
            .map_err(|e| AppError::Validation(format!("unreadable photo: {e:#}")))?;
        let image_id = self.registry.store_image(prepared).await?;

        let draft = BinDraft {
            location: submission.location,
            description: submission
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            image_id: image_id.clone(),
            types: submission.types,
            added_by: user.to_string(),
        };
        match self.registry.create(draft).await {
            Ok(id) => Ok(SubmissionOutcome::Created { id }),
            Err(e) => {
                warn!("bin creation failed, discarding image {}: {}", image_id, e);
                self.registry.discard_image(&image_id).await;
                Err(e)
            }
        }
    }
}
