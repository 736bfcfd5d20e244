//! Storage seams for barangay requests.
//!
//! Two traits, each with swappable backends selected through configuration:
//!
//! | Trait | Backends |
//! |-------|----------|
//! | [`RequestStore`] | [`InMemoryStore`], [`RedbStore`] (`backend-redb`), [`RestStore`] (`backend-rest`) |
//! | [`MediaStore`] | [`InMemoryMedia`], [`HttpMediaStore`] (`backend-rest`) |
//!
//! Request stores own identity: they assign ids, timestamps and versions,
//! and refuse any code that is live or was retired by a delete.
//!
//! ```
//! use records::{ContactInfo, DocumentDetails, PaymentMethod, RequestDetails, RequestDraft};
//! use store::{BackendConfig, CodeField};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = BackendConfig::in_memory().build().unwrap();
//! let draft = RequestDraft {
//!     tracking_code: "ABIS-7KQ2M9XD".into(),
//!     public_token: None,
//!     pickup_code: None,
//!     subject_name: "Juan dela Cruz".into(),
//!     contact: ContactInfo { primary: "09171234567".into(), ..Default::default() },
//!     details: RequestDetails::Document(DocumentDetails {
//!         category: "Barangay Clearance".into(),
//!         fields: Default::default(),
//!         purpose: None,
//!         appointment_at: None,
//!         pickup: false,
//!     }),
//!     payment_method: PaymentMethod::Gcash,
//!     attachments: vec![],
//! };
//! let created = store.insert(draft).await.unwrap();
//! let found = store.find_by_code(CodeField::Tracking, "ABIS-7KQ2M9XD").await.unwrap();
//! assert_eq!(found.map(|r| r.id), Some(created.id));
//! # });
//! ```
mod config;
mod error;
mod media;
mod memory;
mod request;

#[cfg(feature = "backend-redb")]
mod redb;
#[cfg(feature = "backend-rest")]
mod rest;

pub use crate::config::{BackendConfig, MediaConfig};
pub use crate::error::{MediaError, StoreError};
pub use crate::media::{InMemoryMedia, MediaStore, MediaUpload};
pub use crate::memory::InMemoryStore;
pub use crate::request::{draft_codes, request_codes, CodeField, ListFilter, RequestStore};

#[cfg(feature = "backend-rest")]
pub use crate::media::HttpMediaStore;
#[cfg(feature = "backend-redb")]
pub use crate::redb::RedbStore;
#[cfg(feature = "backend-rest")]
pub use crate::rest::RestStore;
