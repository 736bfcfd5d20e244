//! Error types produced by the records crate.
//!
//! Every variant describes a problem with the *shape* of a request or with a
//! workflow rule, never a transport failure. Callers report these inline and
//! do not retry them.
//!
//! | Error | Raised when |
//! |-------|-------------|
//! | [`MissingField`](RecordError::MissingField) | a required field is absent or blank after sanitization |
//! | [`InvalidField`](RecordError::InvalidField) | a field is present but malformed |
//! | [`UnknownCategory`](RecordError::UnknownCategory) | the document category is not in the registry |
//! | [`TooManyAttachments`](RecordError::TooManyAttachments) | more attachments than the configured limit |
//! | [`StatusNotInKind`](RecordError::StatusNotInKind) | a status is not part of the record kind's state set |
//! | [`InvalidTransition`](RecordError::InvalidTransition) | the status change is not an edge of the adjacency table |
//! | [`TerminalStatus`](RecordError::TerminalStatus) | a workflow mutation was attempted on a terminal record |
//! | [`NegativeCount`](RecordError::NegativeCount) | a certification count below zero |
//!
//! ```rust
//! use records::{RecordError, RequestKind, Status};
//!
//! let err = RecordError::StatusNotInKind {
//!     kind: RequestKind::Blotter,
//!     status: Status::ReadyForPickup,
//! };
//! assert!(err.to_string().contains("ready_for_pickup"));
//! assert!(!err.is_transition_error());
//! ```
use thiserror::Error;

use crate::types::{RequestKind, Status};

/// Validation and workflow errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    /// A required field was missing or empty once control characters and
    /// surrounding whitespace were stripped.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field was supplied but its value is unusable.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The document category has no entry in the category registry.
    #[error("unknown document category: {0}")]
    UnknownCategory(String),

    /// Attachments exceed the per-request limit.
    #[error("too many attachments: {got} supplied, at most {max} allowed")]
    TooManyAttachments { max: usize, got: usize },

    /// The requested status is not a member of the kind's state set.
    #[error("status {status} is not valid for {kind} requests")]
    StatusNotInKind { kind: RequestKind, status: Status },

    /// The requested status is not adjacent to the current one.
    #[error("cannot move {kind} request from {from} to {to} without an admin override")]
    InvalidTransition {
        kind: RequestKind,
        from: Status,
        to: Status,
    },

    /// The record is in a terminal state and refuses workflow changes.
    #[error("request is {0}; workflow changes are closed")]
    TerminalStatus(Status),

    /// Certification counts are non-negative.
    #[error("certification count must be non-negative, got {0}")]
    NegativeCount(i64),
}

impl RecordError {
    pub fn missing(field: impl Into<String>) -> Self {
        RecordError::MissingField(field.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RecordError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by the state machine rather than by input shape.
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            RecordError::InvalidTransition { .. } | RecordError::TerminalStatus(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_message_names_field() {
        let err = RecordError::missing("subject_name");
        assert_eq!(err.to_string(), "missing required field: subject_name");
    }

    #[test]
    fn invalid_transition_message() {
        let err = RecordError::InvalidTransition {
            kind: RequestKind::Document,
            from: Status::Collected,
            to: Status::Pending,
        };
        let msg = err.to_string();
        assert!(msg.contains("collected"));
        assert!(msg.contains("pending"));
        assert!(err.is_transition_error());
    }

    #[test]
    fn too_many_attachments_message() {
        let err = RecordError::TooManyAttachments { max: 3, got: 5 };
        assert!(err.to_string().contains("at most 3"));
    }
}
