use crate::error::ServerResult;
use crate::middleware::AdminActor;
use crate::routes::requests::{self, CrimeRecordBody, ListQuery, OverrideBody};
use crate::routes::{record_response, submit_response};
use crate::state::ServerState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use barangay::PickupView;
use records::{DocumentInput, NewRequest, Request, RequestKind, RequestPatch};
use std::sync::Arc;

const KIND: RequestKind = RequestKind::Document;

/// Public document request form. `201` with codes, or `202` when queued.
pub async fn create_document(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<DocumentInput>,
) -> ServerResult<Response> {
    let outcome = state.submit(NewRequest::Document(input)).await?;
    Ok(submit_response(outcome))
}

/// Public tracking lookup. Codes are matched case-insensitively.
pub async fn track_document(
    State(state): State<Arc<ServerState>>,
    Path(code): Path<String>,
) -> ServerResult<Response> {
    let request = state.lookup.by_tracking_code(&code).await?;
    Ok(record_response(StatusCode::OK, request))
}

pub async fn update_payment(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ServerResult<Response> {
    let saved = requests::update_payment(&state, KIND, &id, multipart).await?;
    Ok(record_response(StatusCode::OK, saved))
}

pub async fn list_documents(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Vec<Request>>> {
    Ok(Json(requests::list(&state, KIND, query).await?))
}

pub async fn get_document(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    requests::get(&state, KIND, &id).await
}

pub async fn patch_document(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<RequestPatch>,
) -> ServerResult<Response> {
    requests::patch(&state, KIND, &id, &headers, &actor, patch).await
}

pub async fn delete_document(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
) -> ServerResult<StatusCode> {
    requests::delete(&state, KIND, &id, &actor).await
}

pub async fn upload_certificate(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ServerResult<Response> {
    requests::upload_certificate(&state, KIND, &id, &headers, &actor, multipart).await
}

pub async fn set_crime_record(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CrimeRecordBody>,
) -> ServerResult<Response> {
    requests::set_crime_record(&state, KIND, &id, &headers, &actor, body).await
}

pub async fn status_override(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<OverrideBody>,
) -> ServerResult<Response> {
    requests::status_override(&state, KIND, &id, &headers, &actor, body).await
}

/// Pickup desk: what the resident is collecting.
pub async fn pickup_lookup(
    State(state): State<Arc<ServerState>>,
    Path(code): Path<String>,
) -> ServerResult<Json<PickupView>> {
    Ok(Json(state.lookup.by_pickup_code(&code).await?))
}

/// Pickup desk handoff; walks the document through `issued` to `collected`.
pub async fn pickup_collect(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(code): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let view = state.lookup.mark_collected(&code, actor.as_actor()).await?;
    Ok(Json(view))
}
