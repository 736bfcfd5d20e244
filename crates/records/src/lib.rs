//! Barangay request records.
//!
//! Everything a request *is*, independent of where it is stored:
//!
//! - **Data model** ([`Request`], [`RequestDetails`], status and payment enums)
//! - **Validation** of public submissions ([`validate`]) into a [`Submission`]
//! - **Status state machine** ([`status`]) with adjacency table and admin override
//! - **Category registry** ([`CategoryRegistry`]) for per-document fields
//! - **Admin patches** ([`apply_patch`]) applied in one pass
//!
//! ## Example
//!
//! ```
//! use records::{validate, DocumentInput, NewRequest, RecordsConfig, ContactInfo};
//!
//! let mut input = DocumentInput {
//!     subject_name: "  Juan dela Cruz ".into(),
//!     category: "Barangay Clearance".into(),
//!     contact: ContactInfo { primary: "09171234567".into(), ..Default::default() },
//!     pickup: true,
//!     ..Default::default()
//! };
//! input.fields.insert("purpose".into(), "Employment".into());
//!
//! let submission = validate(NewRequest::Document(input), &RecordsConfig::default()).unwrap();
//! assert_eq!(submission.subject_name, "Juan dela Cruz");
//! assert!(submission.wants_pickup());
//! ```
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

mod config;
mod error;
mod registry;
mod sanitize;
pub mod status;
mod types;

use crate::sanitize::{check_length, sanitize_optional, sanitize_required, sanitize_text};

pub use crate::config::{ConfigError, RecordsConfig};
pub use crate::error::RecordError;
pub use crate::registry::{CategoryRegistry, FieldSpec, FieldType};
pub use crate::status::CertificateOutcome;
pub use crate::types::{
    AssignedCodes, BlotterDetails, BlotterInput, ContactInfo, CrimeRecord, DocumentDetails,
    DocumentInput, MediaRef, NewRequest, PaymentMethod, PaymentStatus, Request, RequestDetails,
    RequestDraft, RequestKind, RequestPatch, Status, StatusChange, Submission,
};

/// Validates and sanitizes a public submission.
pub fn validate(input: NewRequest, cfg: &RecordsConfig) -> Result<Submission, RecordError> {
    let start = Instant::now();
    let kind = input.kind();
    let result = match input {
        NewRequest::Document(doc) => validate_document(doc, cfg),
        NewRequest::Blotter(report) => validate_blotter(report, cfg, Utc::now()),
    };
    let elapsed_micros = start.elapsed().as_micros();
    match &result {
        Ok(_) => debug!(%kind, elapsed_micros, "validate_success"),
        Err(err) => warn!(%kind, error = %err, elapsed_micros, "validate_failure"),
    }
    result
}

fn line(field: &str, value: String, cfg: &RecordsConfig) -> Result<String, RecordError> {
    let value = sanitize_required(field, value, cfg.strip_control_chars)?;
    check_length(field, &value, cfg.max_line_chars)?;
    Ok(value)
}

fn optional_line(
    field: &str,
    value: Option<String>,
    cfg: &RecordsConfig,
) -> Result<Option<String>, RecordError> {
    let value = sanitize_optional(value, cfg.strip_control_chars);
    if let Some(v) = &value {
        check_length(field, v, cfg.max_line_chars)?;
    }
    Ok(value)
}

fn text(field: &str, value: String, cfg: &RecordsConfig) -> Result<String, RecordError> {
    let value = sanitize_text(value, cfg.strip_control_chars)
        .ok_or_else(|| RecordError::missing(field))?;
    check_length(field, &value, cfg.max_text_chars)?;
    Ok(value)
}

fn validate_document(doc: DocumentInput, cfg: &RecordsConfig) -> Result<Submission, RecordError> {
    let subject_name = line("subject_name", doc.subject_name, cfg)?;
    let category = line("category", doc.category, cfg)?;
    if !cfg.categories.contains(&category) {
        return Err(RecordError::UnknownCategory(category));
    }
    let contact = validate_contact(doc.contact, cfg)?;
    let purpose = optional_line("purpose", doc.purpose, cfg)?;

    // The public form sends `purpose` at the top level; categories that
    // declare a purpose field take it from there when the field is absent.
    let mut values = doc.fields;
    let declares_purpose = cfg
        .categories
        .fields(&category)
        .is_some_and(|specs| specs.iter().any(|s| s.name == "purpose"));
    if declares_purpose && !values.contains_key("purpose") {
        if let Some(p) = &purpose {
            values.insert("purpose".to_string(), p.clone());
        }
    }
    let fields = cfg
        .categories
        .validate(&category, values, cfg.strip_control_chars)?;

    Ok(Submission {
        subject_name,
        contact,
        details: RequestDetails::Document(DocumentDetails {
            category,
            fields,
            purpose,
            appointment_at: doc.appointment_at,
            pickup: doc.pickup,
        }),
        payment_method: doc.payment_method,
        attachments: Vec::new(),
    })
}

fn validate_contact(contact: ContactInfo, cfg: &RecordsConfig) -> Result<ContactInfo, RecordError> {
    let primary = line("contact.primary", contact.primary, cfg)?;
    let secondary = optional_line("contact.secondary", contact.secondary, cfg)?;
    let email = optional_line("contact.email", contact.email, cfg)?;
    if let Some(email) = &email {
        let well_formed = email
            .split_once('@')
            .is_some_and(|(user, host)| !user.is_empty() && host.contains('.'));
        if !well_formed {
            return Err(RecordError::invalid("contact.email", "not an e-mail address"));
        }
    }
    Ok(ContactInfo {
        primary,
        secondary,
        email,
    })
}

fn validate_blotter(
    report: BlotterInput,
    cfg: &RecordsConfig,
    now: DateTime<Utc>,
) -> Result<Submission, RecordError> {
    let title = line("title", report.title, cfg)?;
    let description = text("description", report.description, cfg)?;
    let reporter_name = line("reporter_name", report.reporter_name, cfg)?;
    let reporter_contact = line("reporter_contact", report.reporter_contact, cfg)?;
    let incident_date = report
        .incident_date
        .ok_or_else(|| RecordError::missing("incident_date"))?;
    if cfg.reject_future_incidents && incident_date > now.date_naive() {
        return Err(RecordError::invalid("incident_date", "lies in the future"));
    }

    if report.attachments.len() > cfg.max_attachments {
        return Err(RecordError::TooManyAttachments {
            max: cfg.max_attachments,
            got: report.attachments.len(),
        });
    }
    if report.attachments.iter().any(|a| a.url.trim().is_empty()) {
        return Err(RecordError::invalid("attachments", "attachment without url"));
    }

    Ok(Submission {
        subject_name: reporter_name,
        contact: ContactInfo {
            primary: reporter_contact,
            secondary: None,
            email: None,
        },
        details: RequestDetails::Blotter(BlotterDetails {
            title,
            description,
            incident_date,
            show_reporter: report.show_reporter,
        }),
        payment_method: report.payment_method,
        attachments: report.attachments,
    })
}

/// Fields touched by [`apply_patch`], in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub changed: Vec<&'static str>,
    pub status_from: Option<Status>,
}

impl PatchOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Applies an admin patch in place. Status changes follow the adjacency
/// table; setting a field to its current value is not a change.
pub fn apply_patch(
    request: &mut Request,
    patch: RequestPatch,
    cfg: &RecordsConfig,
    at: DateTime<Utc>,
    actor: Option<&str>,
) -> Result<PatchOutcome, RecordError> {
    let mut outcome = PatchOutcome::default();
    let strip = cfg.strip_control_chars;

    if let Some(count) = patch.certification_count {
        let count = u32::try_from(count).map_err(|_| {
            if count < 0 {
                RecordError::NegativeCount(count)
            } else {
                RecordError::invalid("certification_count", "too large")
            }
        })?;
        if request.certification_count != count {
            request.certification_count = count;
            outcome.changed.push("certification_count");
        }
    }

    if let Some(category) = patch.category {
        let category = line("category", category, cfg)?;
        match &mut request.details {
            RequestDetails::Document(doc) if doc.category != category => {
                if !cfg.categories.contains(&category) {
                    return Err(RecordError::UnknownCategory(category));
                }
                doc.category = category;
                outcome.changed.push("category");
            }
            RequestDetails::Document(_) => {}
            RequestDetails::Blotter(_) => {
                return Err(RecordError::invalid("category", "blotter reports have no category"))
            }
        }
    }

    if patch.title.is_some() || patch.description.is_some() {
        let RequestDetails::Blotter(report) = &mut request.details else {
            return Err(RecordError::invalid("title", "documents have no title or description"));
        };
        if let Some(title) = patch.title {
            let title = line("title", title, cfg)?;
            if report.title != title {
                report.title = title;
                outcome.changed.push("title");
            }
        }
        if let Some(description) = patch.description {
            let description = text("description", description, cfg)?;
            if report.description != description {
                report.description = description;
                outcome.changed.push("description");
            }
        }
    }

    if let Some(remarks) = patch.remarks {
        let remarks = sanitize_text(remarks, strip);
        if let Some(r) = &remarks {
            check_length("remarks", r, cfg.max_text_chars)?;
        }
        if request.remarks != remarks {
            request.remarks = remarks;
            outcome.changed.push("remarks");
        }
    }

    if let Some(method) = patch.payment_method {
        if request.payment_method != method {
            request.payment_method = method;
            outcome.changed.push("payment_method");
        }
    }

    if let Some(payment) = patch.payment_status {
        if request.payment_status != payment {
            request.payment_status = payment;
            outcome.changed.push("payment_status");
        }
    }

    if let Some(crime) = patch.crime_record {
        if request.crime_record != Some(crime) {
            request.crime_record = Some(crime);
            outcome.changed.push("crime_record");
        }
    }

    if let Some(to) = patch.status {
        let from = request.status;
        if status::advance(request, to, at, actor)? {
            outcome.status_from = Some(from);
            outcome.changed.push("status");
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn clearance() -> DocumentInput {
        let mut input = DocumentInput {
            subject_name: "Ana Reyes".into(),
            category: "Barangay Clearance".into(),
            contact: ContactInfo {
                primary: "09181112222".into(),
                secondary: Some(" ".into()),
                email: Some("ana@example.ph".into()),
            },
            pickup: true,
            ..Default::default()
        };
        input.fields.insert("purpose".into(), "Employment".into());
        input
    }

    fn report() -> BlotterInput {
        BlotterInput {
            title: "Noise complaint".into(),
            description: "Videoke until 2am\nSecond night in a row".into(),
            reporter_name: "Lito Garcia".into(),
            reporter_contact: "09990001111".into(),
            incident_date: NaiveDate::from_ymd_opt(2024, 2, 14),
            show_reporter: false,
            payment_method: PaymentMethod::Cash,
            attachments: vec![MediaRef::new("https://media/a.jpg")],
        }
    }

    fn stored(submission: Submission) -> Request {
        let draft = submission.into_draft(AssignedCodes {
            tracking_code: "ABIS-AAAA2222".into(),
            public_token: None,
            pickup_code: None,
        });
        Request::from_draft("id-1", draft, Utc::now())
    }

    #[test]
    fn document_validates_and_sanitizes() {
        let sub = validate(NewRequest::Document(clearance()), &RecordsConfig::default()).unwrap();
        assert_eq!(sub.kind(), RequestKind::Document);
        assert_eq!(sub.contact.secondary, None);
        assert!(sub.wants_pickup());
    }

    #[test]
    fn document_requires_name_category_contact() {
        let cfg = RecordsConfig::default();
        let check = |input: DocumentInput, field: &str| {
            let err = validate(NewRequest::Document(input), &cfg).unwrap_err();
            assert_eq!(err, RecordError::missing(field));
        };

        let mut input = clearance();
        input.subject_name.clear();
        check(input, "subject_name");

        let mut input = clearance();
        input.category.clear();
        check(input, "category");

        let mut input = clearance();
        input.contact.primary = " ".into();
        check(input, "contact.primary");
    }

    #[test]
    fn top_level_purpose_fills_registry_field() {
        let mut input = clearance();
        input.fields.clear();
        input.purpose = Some("Scholarship".into());
        let sub = validate(NewRequest::Document(input), &RecordsConfig::default()).unwrap();
        let RequestDetails::Document(doc) = sub.details else {
            panic!("expected document details");
        };
        assert_eq!(doc.fields.get("purpose").map(String::as_str), Some("Scholarship"));
    }

    #[test]
    fn malformed_email_rejected() {
        let mut input = clearance();
        input.contact.email = Some("ana-at-example".into());
        assert!(matches!(
            validate(NewRequest::Document(input), &RecordsConfig::default()),
            Err(RecordError::InvalidField { .. })
        ));
    }

    #[test]
    fn blotter_requires_incident_date() {
        let mut input = report();
        input.incident_date = None;
        assert_eq!(
            validate(NewRequest::Blotter(input), &RecordsConfig::default()).unwrap_err(),
            RecordError::missing("incident_date")
        );
    }

    #[test]
    fn blotter_future_incident_rejected() {
        let mut input = report();
        input.incident_date = Some((Utc::now() + Duration::days(3)).date_naive());
        assert!(validate(NewRequest::Blotter(input), &RecordsConfig::default()).is_err());
    }

    #[test]
    fn blotter_attachment_limit() {
        let mut input = report();
        input.attachments = (0..4).map(|i| MediaRef::new(format!("u{i}"))).collect();
        assert_eq!(
            validate(NewRequest::Blotter(input), &RecordsConfig::default()).unwrap_err(),
            RecordError::TooManyAttachments { max: 3, got: 4 }
        );
    }

    #[test]
    fn blotter_keeps_description_lines() {
        let sub = validate(NewRequest::Blotter(report()), &RecordsConfig::default()).unwrap();
        let RequestDetails::Blotter(b) = &sub.details else {
            panic!("expected blotter details");
        };
        assert!(b.description.contains('\n'));
        assert_eq!(sub.subject_name, "Lito Garcia");
        assert_eq!(sub.attachments.len(), 1);
    }

    #[test]
    fn patch_rejects_negative_count() {
        let cfg = RecordsConfig::default();
        let mut req = stored(validate(NewRequest::Document(clearance()), &cfg).unwrap());
        let patch = RequestPatch {
            certification_count: Some(-1),
            ..Default::default()
        };
        assert_eq!(
            apply_patch(&mut req, patch, &cfg, Utc::now(), None).unwrap_err(),
            RecordError::NegativeCount(-1)
        );
    }

    #[test]
    fn patch_applies_fields_and_status() {
        let cfg = RecordsConfig::default();
        let mut req = stored(validate(NewRequest::Document(clearance()), &cfg).unwrap());
        let patch = RequestPatch {
            status: Some(Status::Approved),
            payment_status: Some(PaymentStatus::Paid),
            certification_count: Some(2),
            crime_record: Some(CrimeRecord::No),
            remarks: Some("Bring a valid ID".into()),
            ..Default::default()
        };
        let outcome =
            apply_patch(&mut req, patch.clone(), &cfg, Utc::now(), Some("admin")).unwrap();
        assert_eq!(outcome.status_from, Some(Status::Pending));
        assert_eq!(req.status, Status::Approved);
        assert_eq!(req.certification_count, 2);
        assert_eq!(req.crime_record, Some(CrimeRecord::No));

        let again = apply_patch(&mut req, patch, &cfg, Utc::now(), Some("admin")).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn patch_title_on_document_rejected() {
        let cfg = RecordsConfig::default();
        let mut req = stored(validate(NewRequest::Document(clearance()), &cfg).unwrap());
        let patch = RequestPatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(apply_patch(&mut req, patch, &cfg, Utc::now(), None).is_err());
    }
}
