//! Admin handlers shared by documents and blotter reports.
//!
//! Every handler first checks that the id belongs to the kind named by the
//! route, so `/api/documents/{id}` never touches a blotter report.

use crate::error::{ServerError, ServerResult};
use crate::middleware::AdminActor;
use crate::routes::{expected_version, read_upload, record_response};
use crate::state::ServerState;
use axum::extract::Multipart;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use barangay::ServiceError;
use records::{CrimeRecord, Request, RequestKind, RequestPatch, Status};
use serde::Deserialize;
use store::{ListFilter, MediaUpload};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideBody {
    pub status: Status,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CrimeRecordBody {
    #[serde(alias = "crimeRecord")]
    pub crime_record: CrimeRecord,
}

/// Loads a record and hides it when it is of the other kind.
pub(crate) async fn load(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
) -> ServerResult<Request> {
    let request = state.manager.get(id).await?;
    if request.kind() != kind {
        return Err(ServiceError::not_found(format!("{kind} {id}")).into());
    }
    Ok(request)
}

pub(crate) async fn list(
    state: &ServerState,
    kind: RequestKind,
    query: ListQuery,
) -> ServerResult<Vec<Request>> {
    let mut filter = ListFilter::kind(kind);
    if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        filter = filter.with_status(status.parse()?);
    }
    Ok(state.manager.list(filter).await?)
}

pub(crate) async fn get(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
) -> ServerResult<Response> {
    let request = load(state, kind, id).await?;
    Ok(record_response(StatusCode::OK, request))
}

pub(crate) async fn patch(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    headers: &HeaderMap,
    actor: &AdminActor,
    patch: RequestPatch,
) -> ServerResult<Response> {
    let expected = expected_version(headers)?;
    load(state, kind, id).await?;
    if patch.is_empty() {
        return Err(ServerError::BadRequest("patch names no fields".into()));
    }
    let saved = state
        .manager
        .apply_patch(id, patch, expected, actor.as_actor())
        .await?;
    Ok(record_response(StatusCode::OK, saved))
}

pub(crate) async fn delete(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    actor: &AdminActor,
) -> ServerResult<StatusCode> {
    load(state, kind, id).await?;
    state.manager.delete(id, actor.as_actor()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn status_override(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    headers: &HeaderMap,
    actor: &AdminActor,
    body: OverrideBody,
) -> ServerResult<Response> {
    let expected = expected_version(headers)?;
    load(state, kind, id).await?;
    let saved = state
        .manager
        .override_status(id, body.status, &body.reason, expected, actor.as_actor())
        .await?;
    Ok(record_response(StatusCode::OK, saved))
}

pub(crate) async fn set_crime_record(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    headers: &HeaderMap,
    actor: &AdminActor,
    body: CrimeRecordBody,
) -> ServerResult<Response> {
    let expected = expected_version(headers)?;
    load(state, kind, id).await?;
    let saved = state
        .manager
        .set_crime_record(id, body.crime_record, expected, actor.as_actor())
        .await?;
    Ok(record_response(StatusCode::OK, saved))
}

/// Finds the first file part whose name is one of `names`.
async fn single_file(multipart: &mut Multipart, names: &[&str]) -> ServerResult<MediaUpload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name().is_some_and(|name| names.contains(&name)) {
            return read_upload(field).await;
        }
    }
    Err(records::RecordError::missing(names[0]).into())
}

pub(crate) async fn upload_certificate(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    headers: &HeaderMap,
    actor: &AdminActor,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let expected = expected_version(headers)?;
    load(state, kind, id).await?;
    let upload = single_file(&mut multipart, &["certificate", "file"]).await?;
    let saved = state
        .manager
        .upload_certificate(id, upload, expected, actor.as_actor())
        .await?;
    Ok(record_response(StatusCode::OK, saved))
}

/// Public payment update: the proof file only. The payment method and
/// status stay admin-editable, so the caller's record comes back unchanged
/// apart from the proof and is shaped by the kind's public handler.
pub(crate) async fn update_payment(
    state: &ServerState,
    kind: RequestKind,
    id: &str,
    mut multipart: Multipart,
) -> ServerResult<Request> {
    load(state, kind, id).await?;
    let proof = single_file(&mut multipart, &["paymentProof", "payment_proof"]).await?;
    Ok(state.manager.upload_payment_proof(id, proof, None).await?)
}
