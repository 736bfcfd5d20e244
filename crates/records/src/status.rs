//! Status state machine for both request kinds.
//!
//! ```text
//! document:  pending ─▶ approved ─▶ ready_for_pickup ─▶ issued ─▶ collected
//!               │           │
//!               └───────────┴─▶ rejected
//!
//! blotter:   pending ─▶ investigating ─▶ done
//!               ├─▶ rejected
//!               └─▶ published
//! ```
//!
//! Regular transitions must follow an edge. [`override_status`] jumps to any
//! member of the kind's state set and is marked in the history so it can be
//! audited separately. Transitions to the current status are no-ops, which
//! keeps every mutation idempotent under retry.
use chrono::{DateTime, Utc};

use crate::error::RecordError;
use crate::types::{MediaRef, Request, RequestKind, Status, StatusChange};

const DOCUMENT_STATES: &[Status] = &[
    Status::Pending,
    Status::Approved,
    Status::ReadyForPickup,
    Status::Issued,
    Status::Collected,
    Status::Rejected,
];

const BLOTTER_STATES: &[Status] = &[
    Status::Pending,
    Status::Investigating,
    Status::Done,
    Status::Rejected,
    Status::Published,
];

/// All states a request of `kind` may be in.
pub fn states(kind: RequestKind) -> &'static [Status] {
    match kind {
        RequestKind::Document => DOCUMENT_STATES,
        RequestKind::Blotter => BLOTTER_STATES,
    }
}

/// Adjacency table.
pub fn successors(kind: RequestKind, from: Status) -> &'static [Status] {
    match (kind, from) {
        (RequestKind::Document, Status::Pending) => &[Status::Approved, Status::Rejected],
        (RequestKind::Document, Status::Approved) => &[Status::ReadyForPickup, Status::Rejected],
        (RequestKind::Document, Status::ReadyForPickup) => &[Status::Issued],
        (RequestKind::Document, Status::Issued) => &[Status::Collected],
        (RequestKind::Blotter, Status::Pending) => {
            &[Status::Investigating, Status::Rejected, Status::Published]
        }
        (RequestKind::Blotter, Status::Investigating) => &[Status::Done],
        _ => &[],
    }
}

pub fn is_member(kind: RequestKind, status: Status) -> bool {
    states(kind).contains(&status)
}

pub fn ensure_member(kind: RequestKind, status: Status) -> Result<(), RecordError> {
    if is_member(kind, status) {
        Ok(())
    } else {
        Err(RecordError::StatusNotInKind { kind, status })
    }
}

pub fn is_adjacent(kind: RequestKind, from: Status, to: Status) -> bool {
    successors(kind, from).contains(&to)
}

/// A state with no outgoing edge.
pub fn is_terminal(kind: RequestKind, status: Status) -> bool {
    is_member(kind, status) && successors(kind, status).is_empty()
}

/// Position along the document happy path; `None` for `rejected` and for
/// blotter-only states.
pub fn document_rank(status: Status) -> Option<u8> {
    match status {
        Status::Pending => Some(0),
        Status::Approved => Some(1),
        Status::ReadyForPickup => Some(2),
        Status::Issued => Some(3),
        Status::Collected => Some(4),
        _ => None,
    }
}

fn record_change(
    request: &mut Request,
    to: Status,
    at: DateTime<Utc>,
    overridden: bool,
    reason: Option<String>,
    actor: Option<&str>,
) {
    request.status_history.push(StatusChange {
        from: request.status,
        to,
        at,
        overridden,
        reason,
        actor: actor.map(str::to_string),
    });
    request.status = to;
}

/// Moves `request` along one edge. Returns `Ok(false)` when it is already in
/// `to`.
pub fn advance(
    request: &mut Request,
    to: Status,
    at: DateTime<Utc>,
    actor: Option<&str>,
) -> Result<bool, RecordError> {
    let kind = request.kind();
    ensure_member(kind, to)?;
    if request.status == to {
        return Ok(false);
    }
    if is_terminal(kind, request.status) {
        return Err(RecordError::TerminalStatus(request.status));
    }
    if !is_adjacent(kind, request.status, to) {
        return Err(RecordError::InvalidTransition {
            kind,
            from: request.status,
            to,
        });
    }
    record_change(request, to, at, false, None, actor);
    Ok(true)
}

/// Admin override: any member of the kind's state set, with a mandatory reason.
pub fn override_status(
    request: &mut Request,
    to: Status,
    reason: &str,
    at: DateTime<Utc>,
    actor: Option<&str>,
) -> Result<bool, RecordError> {
    ensure_member(request.kind(), to)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(RecordError::missing("reason"));
    }
    if request.status == to {
        return Ok(false);
    }
    record_change(request, to, at, true, Some(reason.to_string()), actor);
    Ok(true)
}

/// Walks a document forward to `collected` through `issued` when needed.
/// Returns the statuses passed through, empty if it was already collected.
pub fn walk_to_collected(
    request: &mut Request,
    at: DateTime<Utc>,
    actor: Option<&str>,
) -> Result<Vec<Status>, RecordError> {
    let kind = request.kind();
    ensure_member(kind, Status::Collected)?;
    let path: &[Status] = match request.status {
        Status::Collected => &[],
        Status::ReadyForPickup => &[Status::Issued, Status::Collected],
        Status::Issued => &[Status::Collected],
        from => {
            return Err(RecordError::InvalidTransition {
                kind,
                from,
                to: Status::Collected,
            })
        }
    };
    for step in path {
        advance(request, *step, at, actor)?;
    }
    Ok(path.to_vec())
}

/// What [`attach_certificate`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateOutcome {
    pub changed: bool,
    /// Previous certificate, now in `certificate_history`.
    pub replaced: Option<MediaRef>,
    /// Status before the automatic advance to `ready_for_pickup`.
    pub advanced_from: Option<Status>,
}

/// Sets the certificate. Documents still at `pending` or `approved` move to
/// `ready_for_pickup`; the same reference twice is a no-op. Rejected records
/// accept no certificate.
pub fn attach_certificate(
    request: &mut Request,
    certificate: MediaRef,
    at: DateTime<Utc>,
    actor: Option<&str>,
) -> Result<CertificateOutcome, RecordError> {
    if request.certificate.as_ref() == Some(&certificate) {
        return Ok(CertificateOutcome::default());
    }
    if request.status == Status::Rejected {
        return Err(RecordError::TerminalStatus(Status::Rejected));
    }

    let mut outcome = CertificateOutcome {
        changed: true,
        ..Default::default()
    };
    if let Some(previous) = request.certificate.replace(certificate) {
        request.certificate_history.push(previous.clone());
        outcome.replaced = Some(previous);
    }

    let ready = document_rank(Status::ReadyForPickup);
    if request.kind() == RequestKind::Document && document_rank(request.status) < ready {
        outcome.advanced_from = Some(request.status);
        record_change(
            request,
            Status::ReadyForPickup,
            at,
            false,
            Some("certificate attached".to_string()),
            actor,
        );
    }
    Ok(outcome)
}
