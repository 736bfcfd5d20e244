//! Barangay document request and blotter report lifecycle.
//!
//! This crate ties the record model (`records`) to storage (`store`):
//!
//! - [`LifecycleManager`] validates submissions, assigns codes, and applies
//!   every admin mutation through the status state machine.
//! - [`CodeGenerator`] draws tracking codes, pickup codes and public tokens.
//! - [`TrackingLookup`] answers public lookups with redacted views.
//! - [`FallbackQueue`] (feature `embedded`) buffers submissions while the
//!   store is unreachable and replays them on [`FallbackQueue::reconcile`].
//! - [`BarangayConfig`] loads all of the above from YAML.
//!
//! ```
//! use std::sync::Arc;
//! use barangay::{LifecycleManager, TrackingLookup, BarangayConfig};
//! use records::{ContactInfo, DocumentInput, NewRequest, Status};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let manager = Arc::new(LifecycleManager::from_config(&BarangayConfig::default()).unwrap());
//! let lookup = TrackingLookup::new(Arc::clone(&manager));
//!
//! let mut form = DocumentInput {
//!     subject_name: "Juan dela Cruz".into(),
//!     category: "Barangay Clearance".into(),
//!     contact: ContactInfo { primary: "09171234567".into(), ..Default::default() },
//!     ..Default::default()
//! };
//! form.fields.insert("purpose".into(), "Employment".into());
//!
//! let created = manager.create(NewRequest::Document(form)).await.unwrap();
//! manager.transition(&created.id, Status::Approved, None, Some("secretary")).await.unwrap();
//!
//! let tracked = lookup.by_tracking_code(&created.tracking_code.to_lowercase()).await.unwrap();
//! assert_eq!(tracked.status, Status::Approved);
//! # });
//! ```

pub mod codes;
pub mod config;
mod error;
#[cfg(feature = "embedded")]
pub mod fallback;
pub mod lifecycle;
pub mod lookup;

pub use crate::codes::{CodeConfig, CodeGenerator, normalize_code};
pub use crate::config::{BarangayConfig, ConfigLoadError, FallbackConfig, LifecycleConfig};
pub use crate::error::ServiceError;
#[cfg(feature = "embedded")]
pub use crate::fallback::{FallbackQueue, ReconcileReport, SubmitOutcome};
pub use crate::lifecycle::LifecycleManager;
pub use crate::lookup::{PickupView, PublicBlotterView, TrackingLookup};

pub use records;
pub use store;
