//! # AppError
//!
//! Centralized error handling for the WasteWise services.
//! Maps port failures (store, classifier) to actionable error types.

use std::fmt::Display;

use thiserror::Error;

/// The primary error type for all domain operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Bin, Report, BinImage)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Bad input (e.g., short report text, out-of-range location)
    #[error("validation error: {0}")]
    Validation(String),

    /// Caller has no user identity for an operation that needs one
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Document store read/write failure or a malformed stored document
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Classification service unreachable or returned garbage
    #[error("network error: {0}")]
    Network(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        AppError::NotFound(kind.to_string(), id.into())
    }

    /// Wraps a store-side failure, keeping the full `anyhow` context chain.
    pub fn persistence(err: impl Display) -> Self {
        AppError::Persistence(format!("{err:#}"))
    }

    pub fn network(err: impl Display) -> Self {
        AppError::Network(format!("{err:#}"))
    }
}

/// A specialized Result type for WasteWise logic.
pub type Result<T> = std::result::Result<T, AppError>;
