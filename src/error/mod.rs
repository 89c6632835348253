//! Error taxonomy shared by every component of the reliability layer.
//!
//! Storage backends report [`StorageError`]s; the [`ErrorClassifier`] turns
//! them into [`ClassifiedError`]s carrying a stable [`ErrorCode`], a
//! retryability flag and a severity. Only errors classified as
//! [`ErrorCode::Transient`] should ever be wrapped in retry logic.

mod classifier;
mod storage;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::{classify, ErrorClassifier};
pub use storage::StorageError;

/// Stable error codes surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    NotFound,
    AlreadyExists,
    VersionConflict,
    InvalidReference,
    Transient,
    Unknown,
    ProcessingInProgress,
}

impl ErrorCode {
    /// Wire name of the code, e.g. `VERSION_CONFLICT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::VersionConflict => "VERSION_CONFLICT",
            ErrorCode::InvalidReference => "INVALID_REFERENCE",
            ErrorCode::Transient => "TRANSIENT",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::ProcessingInProgress => "PROCESSING_IN_PROGRESS",
        }
    }

    /// Suggested transport status for the presentation layer.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::Validation | ErrorCode::InvalidReference => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyExists
            | ErrorCode::VersionConflict
            | ErrorCode::ProcessingInProgress => 409,
            ErrorCode::Transient => 503,
            ErrorCode::Unknown => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A failure mapped onto the error taxonomy.
///
/// This is the value persisted inside a failed command result, so it must
/// stay serializable and compare equal after a round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ClassifiedError {
    pub code: ErrorCode,
    pub message: String,
    pub field: Option<String>,
    pub retryable: bool,
    pub severity: Severity,
}

impl ClassifiedError {
    /// Create an error with the code's default severity and retryability.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let (retryable, severity) = match code {
            ErrorCode::NotFound => (false, Severity::Low),
            ErrorCode::Validation
            | ErrorCode::AlreadyExists
            | ErrorCode::VersionConflict
            | ErrorCode::InvalidReference
            | ErrorCode::ProcessingInProgress => (false, Severity::Medium),
            ErrorCode::Transient => (true, Severity::High),
            ErrorCode::Unknown => (false, Severity::High),
        };

        Self {
            code,
            message: message.into(),
            field: None,
            retryable,
            severity,
        }
    }

    /// Attach the offending field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// A `VALIDATION` error on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message).with_field(field)
    }

    /// A `NOT_FOUND` error for `what`.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", what))
    }

    /// A `VERSION_CONFLICT` for `id`, which was no longer at `expected`.
    pub fn version_conflict(what: impl fmt::Display, id: &str, expected: u64) -> Self {
        Self::new(
            ErrorCode::VersionConflict,
            format!(
                "{} {} was modified concurrently or does not exist (expected version {})",
                what, id, expected
            ),
        )
    }

    /// A `PROCESSING_IN_PROGRESS` error for an idempotency key.
    pub fn processing_in_progress(key: &str) -> Self {
        Self::new(
            ErrorCode::ProcessingInProgress,
            format!("request {} is already being processed", key),
        )
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Render the error in the shape surfaced to callers.
    pub fn to_response(&self, trace_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            code: self.code,
            message: self.message.clone(),
            field: self.field.clone(),
            retryable: self.retryable,
            severity: self.severity,
            trace_id,
        }
    }
}

/// Error shape handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub retryable: bool,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}
