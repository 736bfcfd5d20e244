//! API route handlers
//!
//! - `health`: liveness, readiness, metrics and metadata
//! - `documents`: document requests, pickup desk
//! - `blotter`: blotter reports and the redacted token lookup
//! - `requests`: admin handlers shared by both kinds
//! - `settings`: public settings and their admin updates
//! - `fallback`: local queue inspection and reconcile

pub mod blotter;
pub mod documents;
pub mod fallback;
pub mod health;
pub mod requests;
pub mod settings;

use crate::error::{ServerError, ServerResult};
use axum::extract::multipart::Field;
use axum::http::header::{ETAG, IF_MATCH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use barangay::SubmitOutcome;
use records::Request;
use serde_json::json;
use store::MediaUpload;

/// API version and base info
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Barangay Request Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/api/documents",
            "/api/documents/track/by-number/{code}",
            "/api/blotter",
            "/api/blotter/by-token/{token}",
            "/api/settings",
            "/health",
            "/ready",
            "/metrics"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// A record with its version as a strong `ETag`.
pub(crate) fn record_response(status: StatusCode, request: Request) -> Response {
    let etag = HeaderValue::from_str(&format!("\"{}\"", request.version));
    let mut response = (status, Json(request)).into_response();
    if let Ok(etag) = etag {
        response.headers_mut().insert(ETAG, etag);
    }
    response
}

/// `201` with the record, or `202` when the submission went to the local queue.
pub(crate) fn submit_response(outcome: SubmitOutcome) -> Response {
    match outcome {
        SubmitOutcome::Created(request) => record_response(StatusCode::CREATED, request),
        SubmitOutcome::Queued(entry) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "queued": true,
                "local_id": entry.local_id,
                "queued_at": entry.queued_at,
            })),
        )
            .into_response(),
    }
}

/// Parses `If-Match`. Accepts `"3"`, `W/"3"` and bare `3`; `*` means any.
pub(crate) fn expected_version(headers: &HeaderMap) -> ServerResult<Option<u64>> {
    let Some(raw) = headers.get(IF_MATCH) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .map_err(|_| ServerError::BadRequest("If-Match is not ASCII".into()))?
        .trim();
    if raw == "*" {
        return Ok(None);
    }
    let tag = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"');
    tag.parse()
        .map(Some)
        .map_err(|_| ServerError::BadRequest(format!("If-Match must carry a version, got {raw}")))
}

/// Reads a multipart file part into an upload.
pub(crate) async fn read_upload(field: Field<'_>) -> ServerResult<MediaUpload> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await?;
    let upload = MediaUpload::new(file_name, bytes);
    Ok(match content_type {
        Some(content_type) => upload.with_content_type(content_type),
        None => upload,
    })
}
