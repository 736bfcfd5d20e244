use crate::error::ServerResult;
use crate::state::ServerState;
use axum::extract::State;
use axum::Json;
use barangay::fallback::QueuedSubmission;
use barangay::{FallbackQueue, ReconcileReport, ServiceError};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub capacity: usize,
    pub pending: Vec<QueuedSubmission>,
}

fn queue(state: &ServerState) -> ServerResult<&Arc<FallbackQueue>> {
    state
        .fallback
        .as_ref()
        .ok_or_else(|| ServiceError::not_found("fallback queue").into())
}

pub async fn queue_status(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<Json<QueueSnapshot>> {
    let queue = queue(&state)?;
    Ok(Json(QueueSnapshot {
        capacity: queue.capacity(),
        pending: queue.pending().await?,
    }))
}

/// Replays queued submissions. Fails with `503` while the store is down.
pub async fn reconcile(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<Json<ReconcileReport>> {
    let queue = queue(&state)?;
    let report = queue.reconcile(&state.manager).await?;
    metrics::counter!("barangay_reconciled_total").increment(report.synced.len() as u64);
    Ok(Json(report))
}
