//! Server initialization and routing
//!
//! Public routes cover submission, tracking and payment proof; everything
//! else sits behind [`admin_auth`].

use crate::config::ServerConfig;
use crate::middleware::{admin_auth, log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{blotter, documents, fallback, health, settings};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Middleware, outermost first: trace, request id, request log, CORS,
/// compression, timeout, body limit. Admin routes add key authentication.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        // Documents
        .route("/api/documents", post(documents::create_document))
        .route(
            "/api/documents/track/by-number/{code}",
            get(documents::track_document),
        )
        .route(
            "/api/documents/{id}/update-payment",
            post(documents::update_payment),
        )
        // Blotter
        .route("/api/blotter", post(blotter::create_blotter))
        .route("/api/blotter/by-token/{token}", get(blotter::track_blotter))
        .route(
            "/api/blotter/{id}/update-payment",
            post(blotter::update_payment),
        )
        // Settings
        .route("/api/settings", get(settings::get_settings));

    let admin_routes = Router::new()
        // Documents
        .route("/api/documents", get(documents::list_documents))
        .route(
            "/api/documents/{id}",
            get(documents::get_document)
                .patch(documents::patch_document)
                .delete(documents::delete_document),
        )
        .route(
            "/api/documents/{id}/upload-certificate",
            post(documents::upload_certificate),
        )
        .route(
            "/api/documents/{id}/set-crime-record",
            post(documents::set_crime_record),
        )
        .route(
            "/api/documents/{id}/status-override",
            post(documents::status_override),
        )
        .route("/api/documents/pickup/{code}", get(documents::pickup_lookup))
        .route(
            "/api/documents/pickup/{code}/collect",
            post(documents::pickup_collect),
        )
        // Blotter
        .route("/api/blotter", get(blotter::list_blotter))
        .route("/api/blotter/pending", get(blotter::list_pending))
        .route(
            "/api/blotter/{id}",
            get(blotter::get_blotter)
                .patch(blotter::patch_blotter)
                .delete(blotter::delete_blotter),
        )
        .route(
            "/api/blotter/{id}/upload-certificate",
            post(blotter::upload_certificate),
        )
        .route(
            "/api/blotter/{id}/set-crime-record",
            post(blotter::set_crime_record),
        )
        .route(
            "/api/blotter/{id}/status-override",
            post(blotter::status_override),
        )
        // Settings
        .route("/api/settings/{key}", post(settings::set_setting))
        .route(
            "/api/settings/gcash/upload-qr",
            post(settings::upload_gcash_qr),
        )
        // Fallback queue
        .route("/api/admin/fallback", get(fallback::queue_status))
        .route("/api/admin/fallback/reconcile", post(fallback::reconcile))
        .route("/api/metadata", get(health::server_metadata))
        .route_layer(from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
///
/// Blocks until SIGTERM or Ctrl+C. Tracing must already be initialised.
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(ServerState::new(config.clone())?);
    let app = build_router(state);

    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        %addr,
        admin_keys = config.admin_keys.len(),
        barangay_config = config.barangay_config.as_deref().unwrap_or("defaults"),
        "server_starting"
    );
    tracing::info!(
        timeout_secs = config.timeout_secs,
        max_body_size_mb = config.max_body_size_mb,
        rate_limit_per_minute = config.rate_limit_per_minute,
        cors = config.enable_cors,
        metrics = config.metrics_enabled,
        "server_limits"
    );

    if config.admin_keys.is_empty() {
        tracing::warn!("no admin keys configured; admin routes will refuse every request");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server_shutdown_complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl_c_handler_failure");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "sigterm_handler_failure");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
