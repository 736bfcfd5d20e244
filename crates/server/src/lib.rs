//! HTTP REST API for barangay document requests and blotter reports.
//!
//! Residents submit requests, attach payment proofs and track progress by
//! code; staff manage records behind an admin key. All workflow rules live in
//! the `barangay` crate; this crate maps them onto routes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public
//!
//! - `POST /api/documents` - Submit a document request
//! - `GET /api/documents/track/by-number/{code}` - Track a document request
//! - `POST /api/documents/{id}/update-payment` - Upload a payment proof
//! - `POST /api/blotter` - File a blotter report (multipart)
//! - `GET /api/blotter/by-token/{token}` - Redacted blotter lookup
//! - `POST /api/blotter/{id}/update-payment` - Upload a payment proof
//! - `GET /api/settings` - Public settings
//! - `GET /`, `/health`, `/ready`, `/metrics`
//!
//! ## Admin (`x-admin-key` or `Authorization: Bearer <key>`)
//!
//! - `GET /api/documents`, `GET|PATCH|DELETE /api/documents/{id}`
//! - `POST /api/documents/{id}/upload-certificate|set-crime-record|status-override`
//! - `GET /api/documents/pickup/{code}`, `POST /api/documents/pickup/{code}/collect`
//! - `GET /api/blotter`, `GET /api/blotter/pending`, `GET|PATCH|DELETE /api/blotter/{id}`
//! - `POST /api/blotter/{id}/upload-certificate|set-crime-record|status-override`
//! - `POST /api/settings/{key}`, `POST /api/settings/gcash/upload-qr`
//! - `GET /api/admin/fallback`, `POST /api/admin/fallback/reconcile`
//! - `GET /api/metadata`
//!
//! `PATCH` and the admin `POST` mutations honour `If-Match: "<version>"`;
//! record responses carry the version as `ETag`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
