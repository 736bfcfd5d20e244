//! Core data model for document requests and blotter reports.
//!
//! Both kinds share one [`Request`] record: the lifecycle fields (status,
//! payment, certificate, annotations) are identical and only the
//! [`RequestDetails`] differ.
//!
//! ```text
//! NewRequest ──validate()──▶ Submission ──with codes──▶ RequestDraft ──store──▶ Request
//! ```
//!
//! Wire names are `snake_case` throughout, e.g. `ready_for_pickup`,
//! `pending_verification`, `at_site`.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Discriminates document requests from blotter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Document,
    Blotter,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Document => "document",
            RequestKind::Blotter => "blotter",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow state. Which values are legal depends on the [`RequestKind`];
/// see [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Approved,
    ReadyForPickup,
    Issued,
    Collected,
    Rejected,
    Investigating,
    Done,
    Published,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::ReadyForPickup => "ready_for_pickup",
            Status::Issued => "issued",
            Status::Collected => "collected",
            Status::Rejected => "rejected",
            Status::Investigating => "investigating",
            Status::Done => "done",
            Status::Published => "published",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "ready_for_pickup" => Ok(Status::ReadyForPickup),
            "issued" => Ok(Status::Issued),
            "collected" => Ok(Status::Collected),
            "rejected" => Ok(Status::Rejected),
            "investigating" => Ok(Status::Investigating),
            "done" => Ok(Status::Done),
            "published" => Ok(Status::Published),
            other => Err(RecordError::invalid("status", format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Gcash,
    Bank,
    Cash,
    AtSite,
}

impl FromStr for PaymentMethod {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcash" => Ok(PaymentMethod::Gcash),
            "bank" => Ok(PaymentMethod::Bank),
            "cash" => Ok(PaymentMethod::Cash),
            "at_site" | "onsite" | "on_site" => Ok(PaymentMethod::AtSite),
            other => Err(RecordError::invalid(
                "payment_method",
                format!("unknown payment method '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    PendingVerification,
    Paid,
    Unpaid,
}

/// Admin-only crime record annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeRecord {
    Yes,
    No,
}

/// Reference to an object held by the media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// How to reach the submitter.
///
/// Document requests carry a phone, an optional second phone and an optional
/// e-mail; blotter reports carry a single free-form contact in `primary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDetails {
    /// Document type, e.g. "Barangay Clearance".
    pub category: String,
    /// Category-specific fields, validated against the registry.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pickup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlotterDetails {
    pub title: String,
    pub description: String,
    pub incident_date: NaiveDate,
    /// When false, reporter identity never leaves the service on public lookups.
    #[serde(default)]
    pub show_reporter: bool,
}

/// Kind-specific part of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetails {
    Document(DocumentDetails),
    Blotter(BlotterDetails),
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestDetails::Document(_) => RequestKind::Document,
            RequestDetails::Blotter(_) => RequestKind::Blotter,
        }
    }
}

/// One entry of a record's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Status,
    pub to: Status,
    pub at: DateTime<Utc>,
    /// Set when the change bypassed the adjacency table.
    #[serde(default)]
    pub overridden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// A persisted document request or blotter report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub tracking_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_code: Option<String>,
    pub subject_name: String,
    pub contact: ContactInfo,
    pub details: RequestDetails,
    pub status: Status,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof: Option<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<MediaRef>,
    /// Certificates replaced by a later upload, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_history: Vec<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crime_record: Option<CrimeRecord>,
    #[serde(default)]
    pub certification_count: u32,
    #[serde(default)]
    pub attachments: Vec<MediaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Revision counter bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl Request {
    /// Materializes a draft once the store has assigned an id.
    pub fn from_draft(id: impl Into<String>, draft: RequestDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            tracking_code: draft.tracking_code,
            public_token: draft.public_token,
            pickup_code: draft.pickup_code,
            subject_name: draft.subject_name,
            contact: draft.contact,
            details: draft.details,
            status: Status::Pending,
            payment_method: draft.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_proof: None,
            certificate: None,
            certificate_history: Vec::new(),
            crime_record: None,
            certification_count: 0,
            attachments: draft.attachments,
            remarks: None,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }

    pub fn document(&self) -> Option<&DocumentDetails> {
        match &self.details {
            RequestDetails::Document(d) => Some(d),
            RequestDetails::Blotter(_) => None,
        }
    }

    pub fn blotter(&self) -> Option<&BlotterDetails> {
        match &self.details {
            RequestDetails::Blotter(b) => Some(b),
            RequestDetails::Document(_) => None,
        }
    }

    /// Category for documents, title for blotter reports.
    pub fn label(&self) -> &str {
        match &self.details {
            RequestDetails::Document(d) => &d.category,
            RequestDetails::Blotter(b) => &b.title,
        }
    }
}

/// Validated request contents plus generated identifiers, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub tracking_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_code: Option<String>,
    pub subject_name: String,
    pub contact: ContactInfo,
    pub details: RequestDetails,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub attachments: Vec<MediaRef>,
}

impl RequestDraft {
    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }
}

/// Identifiers handed to [`Submission::into_draft`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedCodes {
    pub tracking_code: String,
    pub public_token: Option<String>,
    pub pickup_code: Option<String>,
}

/// Output of [`crate::validate`]: sanitized, registry-checked contents
/// without identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub subject_name: String,
    pub contact: ContactInfo,
    pub details: RequestDetails,
    pub payment_method: PaymentMethod,
    pub attachments: Vec<MediaRef>,
}

impl Submission {
    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }

    /// Pickup codes are only issued to document requests that asked for pickup.
    pub fn wants_pickup(&self) -> bool {
        matches!(&self.details, RequestDetails::Document(d) if d.pickup)
    }

    pub fn into_draft(self, codes: AssignedCodes) -> RequestDraft {
        RequestDraft {
            tracking_code: codes.tracking_code,
            public_token: codes.public_token,
            pickup_code: codes.pickup_code,
            subject_name: self.subject_name,
            contact: self.contact,
            details: self.details,
            payment_method: self.payment_method,
            attachments: self.attachments,
        }
    }
}

/// Public document request form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub pickup: bool,
    #[serde(default)]
    pub appointment_at: Option<DateTime<Utc>>,
}

/// Public blotter report form. Attachments are media references that were
/// uploaded before the report is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlotterInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reporter_name: String,
    #[serde(default)]
    pub reporter_contact: String,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub show_reporter: bool,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub attachments: Vec<MediaRef>,
}

/// Either kind of creation input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewRequest {
    Document(DocumentInput),
    Blotter(BlotterInput),
}

impl NewRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            NewRequest::Document(_) => RequestKind::Document,
            NewRequest::Blotter(_) => RequestKind::Blotter,
        }
    }
}

/// Admin edits applied together in one write. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPatch {
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Signed so that negative input reaches validation instead of failing
    /// deserialization.
    #[serde(default)]
    pub certification_count: Option<i64>,
    #[serde(default)]
    pub crime_record: Option<CrimeRecord>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl RequestPatch {
    pub fn is_empty(&self) -> bool {
        *self == RequestPatch::default()
    }
}
