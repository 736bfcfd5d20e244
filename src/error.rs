use records::RecordError;
use store::{MediaError, StoreError};
use thiserror::Error;

/// Errors surfaced by the lifecycle manager, lookups and the fallback queue.
///
/// Validation and transition errors are the caller's to fix; store
/// unavailability, timeouts and failed uploads are transient and may be
/// retried or queued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(RecordError),

    #[error("invalid transition: {0}")]
    InvalidTransition(RecordError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("version conflict: expected {expected}, current {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("fallback queue is full ({capacity} entries)")]
    QueueFull { capacity: usize },

    #[error("fallback queue error: {0}")]
    Fallback(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::StoreUnavailable(_)
                | ServiceError::Timeout(_)
                | ServiceError::UploadFailed(_)
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    /// Stable machine-readable name, used for logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InvalidTransition(_) => "INVALID_TRANSITION",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict { .. } => "CONFLICT",
            ServiceError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ServiceError::Timeout(_) => "TIMEOUT",
            ServiceError::UploadFailed(_) => "UPLOAD_FAILED",
            ServiceError::QueueFull { .. } => "QUEUE_FULL",
            ServiceError::Fallback(_) => "FALLBACK_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RecordError> for ServiceError {
    fn from(err: RecordError) -> Self {
        if err.is_transition_error() {
            ServiceError::InvalidTransition(err)
        } else {
            ServiceError::Validation(err)
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(format!("request {id}")),
            StoreError::Conflict { expected, actual } => {
                ServiceError::Conflict { expected, actual }
            }
            StoreError::Unavailable(msg) => ServiceError::StoreUnavailable(msg),
            StoreError::Timeout => ServiceError::Timeout("store request".into()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for ServiceError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(reason) => {
                ServiceError::Validation(RecordError::invalid("file", reason))
            }
            MediaError::Timeout => ServiceError::Timeout("media upload".into()),
            MediaError::NotFound(url) => ServiceError::NotFound(format!("media {url}")),
            other => ServiceError::UploadFailed(other.to_string()),
        }
    }
}
