use crate::error::ServerResult;
use crate::middleware::AdminActor;
use crate::routes::requests::{self, CrimeRecordBody, ListQuery, OverrideBody};
use crate::routes::{read_upload, submit_response};
use crate::state::ServerState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use barangay::{PublicBlotterView, ServiceError};
use chrono::NaiveDate;
use records::{BlotterInput, NewRequest, RecordError, Request, RequestKind, RequestPatch, Status};
use std::sync::Arc;

const KIND: RequestKind = RequestKind::Blotter;

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Public blotter report. Multipart text fields plus up to the configured
/// number of `attachments` files, which are uploaded before the report is
/// created.
pub async fn create_blotter(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let max = state.manager.records_config().max_attachments;
    let mut input = BlotterInput::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "attachments" || name == "attachments[]" {
            if files.len() == max {
                return Err(RecordError::TooManyAttachments { max, got: max + 1 }.into());
            }
            files.push(read_upload(field).await?);
            continue;
        }
        let text = field.text().await?;
        match name.as_str() {
            "title" => input.title = text,
            "description" => input.description = text,
            "reporter_name" | "reporterName" => input.reporter_name = text,
            "reporter_contact" | "reporterContact" => input.reporter_contact = text,
            "incident_date" | "incidentDate" if !text.trim().is_empty() => {
                let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
                    RecordError::invalid("incident_date", "expected YYYY-MM-DD")
                })?;
                input.incident_date = Some(date);
            }
            "show_reporter" | "showReporter" => input.show_reporter = truthy(&text),
            "payment_method" | "paymentMethod" if !text.trim().is_empty() => {
                input.payment_method = text.parse()?;
            }
            _ => {}
        }
    }

    // Fields are checked before any upload so a bad form leaves no orphans.
    records::validate(NewRequest::Blotter(input.clone()), state.manager.records_config())?;

    for file in files {
        let media = state.manager.upload_media(file).await?;
        input.attachments.push(media);
    }

    let outcome = state.submit(NewRequest::Blotter(input)).await?;
    Ok(submit_response(outcome))
}

/// Public, redacted lookup by token.
pub async fn track_blotter(
    State(state): State<Arc<ServerState>>,
    Path(token): Path<String>,
) -> ServerResult<Json<PublicBlotterView>> {
    Ok(Json(state.lookup.by_public_token(&token).await?))
}

pub async fn update_payment(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ServerResult<Json<PublicBlotterView>> {
    let saved = requests::update_payment(&state, KIND, &id, multipart).await?;
    let view = PublicBlotterView::from_request(&saved)
        .ok_or_else(|| ServiceError::not_found(format!("{KIND} {id}")))?;
    Ok(Json(view))
}

pub async fn list_blotter(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Vec<Request>>> {
    Ok(Json(requests::list(&state, KIND, query).await?))
}

pub async fn list_pending(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<Json<Vec<Request>>> {
    let query = ListQuery {
        status: Some(Status::Pending.as_str().to_string()),
    };
    Ok(Json(requests::list(&state, KIND, query).await?))
}

pub async fn get_blotter(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    requests::get(&state, KIND, &id).await
}

pub async fn patch_blotter(
    State(state): State<Arc<ServerState>>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<RequestPatch>,
) -> ServerResult<Response> {
    requests::patch(&state, KIND, &id, &headers, &actor, patch).await
}

pub async fn delete_blotter(
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;

    #[test]
    fn checkbox_values() {
        assert!(truthy("true"));
        assert!(truthy(" ON "));
        assert!(truthy("1"));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }

    #[test]
    fn too_many_attachments_is_a_bad_request() {
        let err: ServerError = RecordError::TooManyAttachments { max: 3, got: 4 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
