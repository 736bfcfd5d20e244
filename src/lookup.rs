//! Public lookups by tracking code, public token and pickup code.
//!
//! Blotter reports are never returned whole to the public: the token lookup
//! yields a [`PublicBlotterView`] built the same way for every caller, and the
//! reporter's identity appears in it only when the reporter opted in.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use records::{PaymentStatus, Request, RequestDetails, Status};
use serde::{Deserialize, Serialize};
use store::CodeField;
use tracing::debug;

use crate::ServiceError;
use crate::codes::normalize_code;
use crate::lifecycle::LifecycleManager;

/// What the public sees of a blotter report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicBlotterView {
    pub public_token: String,
    pub title: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_contact: Option<String>,
}

impl PublicBlotterView {
    /// `None` for documents and for records without a token.
    pub fn from_request(request: &Request) -> Option<Self> {
        let RequestDetails::Blotter(report) = &request.details else {
            return None;
        };
        let public_token = request.public_token.clone()?;
        let (reporter_name, reporter_contact) = if report.show_reporter {
            (
                Some(request.subject_name.clone()),
                Some(request.contact.primary.clone()),
            )
        } else {
            (None, None)
        };
        Some(Self {
            public_token,
            title: report.title.clone(),
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
            remarks: request.remarks.clone(),
            reporter_name,
            reporter_contact,
        })
    }
}

/// What the pickup desk needs to hand over a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupView {
    pub id: String,
    pub tracking_code: String,
    pub subject_name: String,
    pub category: String,
    pub status: Status,
    pub payment_status: PaymentStatus,
    pub version: u64,
}

impl PickupView {
    pub fn from_request(request: &Request) -> Option<Self> {
        let doc = request.document()?;
        Some(Self {
            id: request.id.clone(),
            tracking_code: request.tracking_code.clone(),
            subject_name: request.subject_name.clone(),
            category: doc.category.clone(),
            status: request.status,
            payment_status: request.payment_status,
            version: request.version,
        })
    }
}

pub struct TrackingLookup {
    manager: Arc<LifecycleManager>,
}

impl TrackingLookup {
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        Self { manager }
    }

    async fn resolve(&self, field: CodeField, raw: &str) -> Result<Request, ServiceError> {
        let code = normalize_code(raw);
        if code.is_empty() {
            return Err(records::RecordError::missing(field.as_str()).into());
        }
        let found = self.manager.store().find_by_code(field, &code).await?;
        debug!(%field, found = found.is_some(), "lookup");
        found.ok_or_else(|| ServiceError::not_found(format!("{field} code")))
    }

    /// Full record of a document request. Blotter tracking codes are not
    /// resolvable here.
    pub async fn by_tracking_code(&self, code: &str) -> Result<Request, ServiceError> {
        let request = self.resolve(CodeField::Tracking, code).await?;
        if request.document().is_none() {
            return Err(ServiceError::not_found("tracking code"));
        }
        Ok(request)
    }

    pub async fn by_public_token(&self, token: &str) -> Result<PublicBlotterView, ServiceError> {
        let request = self.resolve(CodeField::PublicToken, token).await?;
        PublicBlotterView::from_request(&request)
            .ok_or_else(|| ServiceError::not_found("public_token code"))
    }

    pub async fn by_pickup_code(&self, code: &str) -> Result<PickupView, ServiceError> {
        let request = self.resolve(CodeField::Pickup, code).await?;
        PickupView::from_request(&request).ok_or_else(|| ServiceError::not_found("pickup code"))
    }

    /// In-person handoff: walks the document forward to `collected`.
    pub async fn mark_collected(
        &self,
        code: &str,
        actor: Option<&str>,
    ) -> Result<PickupView, ServiceError> {
        let request = self.resolve(CodeField::Pickup, code).await?;
        let collected = self.manager.collect(&request.id, actor).await?;
        PickupView::from_request(&collected).ok_or_else(|| ServiceError::not_found("pickup code"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use records::{BlotterDetails, ContactInfo, PaymentMethod, RequestDraft};

    use super::*;

    fn report(show_reporter: bool) -> Request {
        let draft = RequestDraft {
            tracking_code: "ABIS-BLT77777".into(),
            public_token: Some("TOKEN7777777".into()),
            pickup_code: None,
            subject_name: "Ramon Santos".into(),
            contact: ContactInfo {
                primary: "09998887777".into(),
                ..Default::default()
            },
            details: RequestDetails::Blotter(BlotterDetails {
                title: "Boundary dispute".into(),
                description: "Fence moved overnight".into(),
                incident_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                show_reporter,
            }),
            payment_method: PaymentMethod::Cash,
            attachments: vec![],
        };
        Request::from_draft("b1", draft, Utc::now())
    }

    #[test]
    fn hidden_reporter_is_redacted() {
        let view = PublicBlotterView::from_request(&report(false)).unwrap();
        assert!(view.reporter_name.is_none());
        assert!(view.reporter_contact.is_none());
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("Ramon"));
        assert!(!json.contains("09998887777"));
        assert!(!json.contains("Fence moved"));
        assert!(!json.contains("2024-09-01"));
    }

    #[test]
    fn visible_reporter_is_included() {
        let view = PublicBlotterView::from_request(&report(true)).unwrap();
        assert_eq!(view.reporter_name.as_deref(), Some("Ramon Santos"));
        assert_eq!(view.reporter_contact.as_deref(), Some("09998887777"));
    }

    #[test]
    fn pickup_view_only_for_documents() {
        assert!(PickupView::from_request(&report(true)).is_none());
    }
}
