//! # ww-classifier-hf
//!
//! Hugging Face inference-API implementation of `ClassificationGate` and
//! `ImageLabeler`. The endpoint is any image-classification model that answers
//! `{"inputs": "<base64>"}` with `[{"label": ..., "score": ...}]`.

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use ww_core::traits::{ClassificationGate, ImageLabeler};
use ww_core::Prediction;

/// ImageNet-style labels that count as "this is a bin".
pub const GARBAGE_KEYWORDS: [&str; 10] = [
    "ashcan",
    "trash can",
    "garbage can",
    "wastebin",
    "ash bin",
    "ash-bin",
    "ashbin",
    "dustbin",
    "trash barrel",
    "trash bin",
];

pub const DEFAULT_MIN_SCORE: f64 = 0.5;

pub struct HfClassifierConfig {
    pub endpoint: String,
    pub api_token: SecretString,
    /// Minimum confidence for a garbage keyword to pass the gate.
    pub min_score: f64,
    pub timeout: Duration,
}

pub struct HfClassifier {
    client: reqwest::Client,
    config: HfClassifierConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Predictions(Vec<Prediction>),
    Error { error: String },
}

impl HfClassifier {
    pub fn new(config: HfClassifierConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building classifier http client")?;
        Ok(Self { client, config })
    }

    async fn infer(&self, image_base64: &str) -> anyhow::Result<Vec<Prediction>> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_token.expose_secret())
            .json(&serde_json::json!({ "inputs": image_base64 }))
            .send()
            .await
            .context("classifier request failed")?;

        let status = response.status();
        let body = response.text().await.context("reading classifier response")?;
        if !status.is_success() {
            bail!("classifier returned {status}: {body}");
        }
        let predictions = parse_response(&body)?;
        log::debug!(
            "classifier labels: {}",
            predictions
                .iter()
                .map(|p| format!("{} ({:.2})", p.label, p.score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(predictions)
    }
}

/// Decodes an inference response body. An `{"error": ...}` body is an error.
pub fn parse_response(body: &str) -> anyhow::Result<Vec<Prediction>> {
    match serde_json::from_str::<InferenceResponse>(body) {
        Ok(InferenceResponse::Predictions(predictions)) => Ok(predictions),
        Ok(InferenceResponse::Error { error }) => Err(anyhow!("classifier error: {error}")),
        Err(e) => Err(anyhow!("unexpected classifier response: {e}")),
    }
}

/// `true` if any prediction at or above `min_score` names a garbage container.
/// Multi-name labels ("ashcan, trash can, ...") match on any of their names.
pub fn is_garbage(predictions: &[Prediction], min_score: f64) -> bool {
    predictions.iter().any(|p| {
        p.score >= min_score
            && p.label
                .split(',')
                .map(|part| part.trim().to_lowercase())
                .any(|part| GARBAGE_KEYWORDS.contains(&part.as_str()))
    })
}

#[async_trait]
impl ClassificationGate for HfClassifier {
    async fn classify(&self, image_base64: &str) -> anyhow::Result<bool> {
        let predictions = self.infer(image_base64).await?;
        let verdict = is_garbage(&predictions, self.config.min_score);
        log::info!("image classified, garbage = {}", verdict);
        Ok(verdict)
    }
}

#[async_trait]
impl ImageLabeler for HfClassifier {
    async fn labels(&self, image_base64: &str) -> anyhow::Result<Vec<Prediction>> {
        self.infer(image_base64).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(label: &str, score: f64) -> Prediction {
        Prediction {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn parses_prediction_list() {
        let body = r#"[{"label":"ashcan, trash can, garbage can","score":0.91},{"label":"mailbox","score":0.03}]"#;
        let predictions = parse_response(body).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[1].label, "mailbox");
    }

    #[test]
    fn error_body_is_an_error() {
        let err = parse_response(r#"{"error":"Model is currently loading","estimated_time":20.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("currently loading"));
        assert!(parse_response("<html>").is_err());
    }

    #[test]
    fn empty_list_is_not_garbage() {
        assert!(!is_garbage(&parse_response("[]").unwrap(), DEFAULT_MIN_SCORE));
    }

    #[test]
    fn keyword_must_clear_min_score() {
        assert!(is_garbage(&[p("Dustbin", 0.5)], DEFAULT_MIN_SCORE));
        assert!(!is_garbage(&[p("dustbin", 0.49)], DEFAULT_MIN_SCORE));
        assert!(!is_garbage(&[p("water bottle", 0.99)], DEFAULT_MIN_SCORE));
    }

    #[test]
    fn multi_name_imagenet_labels_match() {
        let label = "ashcan, trash can, garbage can, wastebin, ash bin, ash-bin, ashbin, dustbin, trash barrel, trash bin";
        assert!(is_garbage(&[p("mailbox", 0.2), p(label, 0.7)], DEFAULT_MIN_SCORE));
    }
}
