use crate::error::{ServerError, ServerResult};
use crate::state::{ServerMetadata, ServerState};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Health check endpoint (liveness)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "barangay-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness check endpoint. `503` while the request store cannot be reached;
/// public submissions may still be accepted into the fallback queue.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let store = match state.manager.ping().await {
        Ok(()) => "ready".to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "readiness_store_failure");
            format!("unavailable: {err}")
        }
    };
    let fallback = match &state.fallback {
        Some(queue) => match queue.len().await {
            Ok(len) => json!({ "pending": len, "capacity": queue.capacity() }),
            Err(err) => json!({ "error": err.to_string() }),
        },
        None => json!("disabled"),
    };
    let ready = store == "ready";
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "barangay-server",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": uptime_seconds(),
            "components": {
                "api": "ready",
                "store": store,
                "fallback": fallback,
            }
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

/// Server metadata endpoint (authenticated)
pub async fn server_metadata(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    let fallback_queue = match &state.fallback {
        Some(queue) => Some(queue.len().await?),
        None => None,
    };

    let metadata = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime_seconds(),
        fallback_queue,
    };

    Ok(Json(serde_json::to_value(metadata)?))
}
