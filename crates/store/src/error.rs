use thiserror::Error;

use crate::CodeField;

/// Failures reported by [`crate::RequestStore`] backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(String),

    /// The stored version moved on since the caller read the record.
    #[error("version conflict: expected {expected}, stored {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// A code is already live or retired.
    #[error("{field} code {code} is already taken")]
    Duplicate { field: CodeField, code: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request timed out")]
    Timeout,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("record encoding error: {0}")]
    Encode(String),
}

impl StoreError {
    pub fn backend(err: impl ToString) -> Self {
        StoreError::Backend(err.to_string())
    }

    pub fn encode(err: impl ToString) -> Self {
        StoreError::Encode(err.to_string())
    }

    /// Transport failures worth retrying or queueing locally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::encode(err)
    }
}

/// Failures reported by [`crate::MediaStore`] backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MediaError {
    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("media store unavailable: {0}")]
    Unavailable(String),

    #[error("media request timed out")]
    Timeout,

    #[error("media object not found: {0}")]
    NotFound(String),

    #[error("unexpected media response: {0}")]
    Response(String),
}

impl MediaError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MediaError::Unavailable(_) | MediaError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Unavailable("refused".into()).is_retryable());
        assert!(!StoreError::NotFound("x".into()).is_retryable());
        assert!(!StoreError::Conflict { expected: 1, actual: 2 }.is_retryable());
        assert!(MediaError::Timeout.is_retryable());
        assert!(!MediaError::Rejected("too large".into()).is_retryable());
    }

    #[test]
    fn duplicate_message_names_field() {
        let err = StoreError::Duplicate {
            field: CodeField::Pickup,
            code: "ABCD2345".into(),
        };
        assert_eq!(err.to_string(), "pickup code ABCD2345 is already taken");
    }
}
