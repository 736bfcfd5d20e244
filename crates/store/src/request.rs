use std::fmt;

use async_trait::async_trait;
use records::{Request, RequestDraft, RequestKind, Status};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// The three public identifiers a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeField {
    Tracking,
    Pickup,
    PublicToken,
}

impl CodeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeField::Tracking => "tracking",
            CodeField::Pickup => "pickup",
            CodeField::PublicToken => "public_token",
        }
    }
}

impl fmt::Display for CodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codes carried by a draft, paired with their field.
pub fn draft_codes(draft: &RequestDraft) -> Vec<(CodeField, String)> {
    collect_codes(
        &draft.tracking_code,
        draft.pickup_code.as_deref(),
        draft.public_token.as_deref(),
    )
}

/// Codes carried by a stored record, paired with their field.
pub fn request_codes(request: &Request) -> Vec<(CodeField, String)> {
    collect_codes(
        &request.tracking_code,
        request.pickup_code.as_deref(),
        request.public_token.as_deref(),
    )
}

fn collect_codes(
    tracking: &str,
    pickup: Option<&str>,
    token: Option<&str>,
) -> Vec<(CodeField, String)> {
    let mut codes = vec![(CodeField::Tracking, tracking.to_string())];
    if let Some(code) = pickup {
        codes.push((CodeField::Pickup, code.to_string()));
    }
    if let Some(code) = token {
        codes.push((CodeField::PublicToken, code.to_string()));
    }
    codes
}

/// Admin listing filter. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub kind: Option<RequestKind>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl ListFilter {
    pub fn kind(kind: RequestKind) -> Self {
        Self {
            kind: Some(kind),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.kind.is_none_or(|k| request.kind() == k)
            && self.status.is_none_or(|s| request.status == s)
    }
}

/// Newest first, ties broken by id so listings are stable.
pub(crate) fn sort_listing(records: &mut [Request]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Authoritative persistence for requests.
///
/// Backends assign ids and timestamps, keep every code unique across live
/// and deleted records, and bump `version` on every successful update.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persists a new record. Fails with [`StoreError::Duplicate`] when any
    /// of the draft's codes is live or retired.
    async fn insert(&self, draft: RequestDraft) -> Result<Request, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Request>, StoreError>;

    /// Resolves a live record by one of its codes. Codes are compared as given.
    async fn find_by_code(&self, field: CodeField, code: &str)
        -> Result<Option<Request>, StoreError>;

    /// True when the code is held by a live record or was retired by a delete.
    async fn code_exists(&self, field: CodeField, code: &str) -> Result<bool, StoreError>;

    /// Replaces the mutable part of a record when the stored version equals
    /// `expected_version`. Identifiers and `created_at` are kept from the
    /// stored copy.
    async fn update(&self, request: Request, expected_version: u64)
        -> Result<Request, StoreError>;

    /// Hard delete. Codes stay retired. Returns false when nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, StoreError>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Applies the update contract to a stored record.
pub(crate) fn merge_update(
    stored: &Request,
    mut incoming: Request,
    expected_version: u64,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Request, StoreError> {
    if stored.version != expected_version {
        return Err(StoreError::Conflict {
            expected: expected_version,
            actual: stored.version,
        });
    }
    incoming.id = stored.id.clone();
    incoming.tracking_code = stored.tracking_code.clone();
    incoming.pickup_code = stored.pickup_code.clone();
    incoming.public_token = stored.public_token.clone();
    incoming.subject_name = stored.subject_name.clone();
    incoming.contact = stored.contact.clone();
    incoming.attachments = stored.attachments.clone();
    incoming.created_at = stored.created_at;
    incoming.updated_at = now;
    incoming.version = stored.version + 1;
    Ok(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use records::{ContactInfo, DocumentDetails, PaymentMethod, RequestDetails};

    fn draft() -> RequestDraft {
        RequestDraft {
            tracking_code: "ABIS-2345ABCD".into(),
            public_token: None,
            pickup_code: Some("PK2345AB".into()),
            subject_name: "Rosa Lim".into(),
            contact: ContactInfo {
                primary: "0917".into(),
                ..Default::default()
            },
            details: RequestDetails::Document(DocumentDetails {
                category: "Certificate of Residency".into(),
                fields: Default::default(),
                purpose: None,
                appointment_at: None,
                pickup: true,
            }),
            payment_method: PaymentMethod::Cash,
            attachments: vec![],
        }
    }

    #[test]
    fn draft_codes_skip_absent_fields() {
        let codes = draft_codes(&draft());
        assert_eq!(
            codes,
            vec![
                (CodeField::Tracking, "ABIS-2345ABCD".to_string()),
                (CodeField::Pickup, "PK2345AB".to_string()),
            ]
        );
    }

    #[test]
    fn merge_update_keeps_identity_and_bumps_version() {
        let stored = Request::from_draft("r1", draft(), Utc::now());
        let mut incoming = stored.clone();
        incoming.tracking_code = "ABIS-HIJACKED".into();
        incoming.remarks = Some("ok".into());
        let merged = merge_update(&stored, incoming, 1, Utc::now()).unwrap();
        assert_eq!(merged.tracking_code, "ABIS-2345ABCD");
        assert_eq!(merged.remarks.as_deref(), Some("ok"));
        assert_eq!(merged.version, 2);
    }

    #[test]
    fn merge_update_detects_stale_version() {
        let stored = Request::from_draft("r1", draft(), Utc::now());
        let err = merge_update(&stored, stored.clone(), 7, Utc::now()).unwrap_err();
        assert_eq!(err, StoreError::Conflict { expected: 7, actual: 1 });
    }

    #[test]
    fn filter_matches_kind_and_status() {
        let req = Request::from_draft("r1", draft(), Utc::now());
        assert!(ListFilter::default().matches(&req));
        assert!(ListFilter::kind(RequestKind::Document).matches(&req));
        assert!(!ListFilter::kind(RequestKind::Blotter).matches(&req));
        assert!(!ListFilter::kind(RequestKind::Document)
            .with_status(Status::Approved)
            .matches(&req));
    }
}
