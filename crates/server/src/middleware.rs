use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

/// Who performed an admin action, recorded in status history and audit logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor(pub String);

impl AdminActor {
    pub fn as_actor(&self) -> Option<&str> {
        Some(self.0.as_str())
    }
}

/// Request id assigned by [`request_id`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Admin key authentication middleware
pub async fn admin_auth(
    state: axum::extract::State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let admin_key = request
        .headers()
        .get("x-admin-key")
        .or_else(|| request.headers().get(AUTHORIZATION))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim().to_string());

    let Some(key) = admin_key.filter(|k| !k.is_empty()) else {
        return Err(ServerError::Authentication(
            "admin key required in 'x-admin-key' or 'Authorization: Bearer <key>'".to_string(),
        ));
    };

    if !state.is_valid_admin_key(&key) {
        tracing::warn!(target: "audit", uri = %request.uri(), "admin_auth_failure");
        return Err(ServerError::Authentication("invalid admin key".to_string()));
    }

    if !state.check_rate_limit(&key) {
        return Err(ServerError::RateLimitExceeded);
    }

    let actor = request
        .headers()
        .get("x-admin-name")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("admin")
        .to_string();
    request.extensions_mut().insert(AdminActor(actor));

    Ok(next.run(request).await)
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let status = response.status();

    // Paths only: query strings may carry codes.
    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "request_completed"
    );

    response
}
