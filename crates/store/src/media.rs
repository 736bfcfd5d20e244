use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use records::MediaRef;
use uuid::Uuid;

use crate::MediaError;

/// A file handed to [`MediaStore::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl MediaUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Strips any directory part a browser may have sent.
    pub fn base_name(&self) -> &str {
        self.file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.file_name)
    }
}

/// Object storage for certificates, payment proofs and attachments.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores the file and returns a stable reference.
    async fn upload(&self, upload: MediaUpload) -> Result<MediaRef, MediaError>;

    async fn fetch(&self, url: &str) -> Result<Bytes, MediaError>;
}

fn ensure_non_empty(upload: &MediaUpload) -> Result<(), MediaError> {
    if upload.bytes.is_empty() {
        return Err(MediaError::Rejected(format!("{} is empty", upload.file_name)));
    }
    Ok(())
}

/// Keeps uploads in memory under `memory://media/<uuid>/<name>` URLs.
#[derive(Default)]
pub struct InMemoryMedia {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStore for InMemoryMedia {
    async fn upload(&self, upload: MediaUpload) -> Result<MediaRef, MediaError> {
        ensure_non_empty(&upload)?;
        let name = upload.base_name().to_string();
        let url = format!("memory://media/{}/{}", Uuid::new_v4().simple(), name);
        self.objects
            .write()
            .map_err(|_| MediaError::Unavailable("poisoned lock".into()))?
            .insert(url.clone(), upload.bytes);
        Ok(MediaRef::new(url).with_file_name(name))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, MediaError> {
        self.objects
            .read()
            .map_err(|_| MediaError::Unavailable("poisoned lock".into()))?
            .get(url)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(url.to_string()))
    }
}

#[cfg(feature = "backend-rest")]
pub use http::HttpMediaStore;

#[cfg(feature = "backend-rest")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use records::MediaRef;
    use reqwest::multipart::{Form, Part};
    use reqwest::Client;
    use serde::Deserialize;
    use tracing::debug;

    use super::{ensure_non_empty, MediaStore, MediaUpload};
    use crate::MediaError;

    fn transport(err: reqwest::Error) -> MediaError {
        if err.is_timeout() {
            MediaError::Timeout
        } else if err.is_connect() || err.is_request() {
            MediaError::Unavailable(err.to_string())
        } else {
            MediaError::Response(err.to_string())
        }
    }

    #[derive(Deserialize)]
    struct UploadResponse {
        secure_url: String,
        #[serde(default)]
        original_filename: Option<String>,
    }

    /// Unsigned multipart uploads (`file` + `upload_preset`) to a hosted
    /// media service that answers with `secure_url`.
    pub struct HttpMediaStore {
        client: Client,
        upload_url: String,
        upload_preset: String,
    }

    impl HttpMediaStore {
        pub fn new(
            upload_url: impl Into<String>,
            upload_preset: impl Into<String>,
            timeout: Duration,
        ) -> Result<Self, MediaError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| MediaError::Unavailable(e.to_string()))?;
            Ok(Self {
                client,
                upload_url: upload_url.into(),
                upload_preset: upload_preset.into(),
            })
        }
    }

    #[async_trait]
    impl MediaStore for HttpMediaStore {
        async fn upload(&self, upload: MediaUpload) -> Result<MediaRef, MediaError> {
            ensure_non_empty(&upload)?;
            let name = upload.base_name().to_string();
            let mut part = Part::bytes(upload.bytes.to_vec()).file_name(name.clone());
            if let Some(ct) = &upload.content_type {
                part = part
                    .mime_str(ct)
                    .map_err(|e| MediaError::Rejected(e.to_string()))?;
            }
            let form = Form::new()
                .part("file", part)
                .text("upload_preset", self.upload_preset.clone());

            let response = self
                .client
                .post(&self.upload_url)
                .multipart(form)
                .send()
                .await
                .map_err(transport)?;
            let status = response.status();
            if status.is_server_error() {
                return Err(MediaError::Unavailable(status.to_string()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(MediaError::Rejected(format!("{status}: {body}")));
            }
            let body: UploadResponse = response.json().await.map_err(transport)?;
            debug!(url = %body.secure_url, "media_upload_success");
            Ok(MediaRef::new(body.secure_url)
                .with_file_name(body.original_filename.unwrap_or(name)))
        }

        async fn fetch(&self, url: &str) -> Result<Bytes, MediaError> {
            let response = self.client.get(url).send().await.map_err(transport)?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(MediaError::NotFound(url.to_string()));
            }
            if !status.is_success() {
                return Err(MediaError::Unavailable(status.to_string()));
            }
            response.bytes().await.map_err(transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_upload_and_fetch() {
        let media = InMemoryMedia::new();
        let stored = media
            .upload(MediaUpload::new("C:\\scans\\cert.pdf", &b"%PDF-1.7"[..]))
            .await
            .unwrap();
        assert_eq!(stored.file_name.as_deref(), Some("cert.pdf"));
        assert!(stored.url.ends_with("/cert.pdf"));
        assert_eq!(media.fetch(&stored.url).await.unwrap(), Bytes::from_static(b"%PDF-1.7"));
        assert_eq!(media.len(), 1);
    }

    #[tokio::test]
    async fn empty_upload_rejected() {
        let media = InMemoryMedia::new();
        let err = media.upload(MediaUpload::new("blank.png", Bytes::new())).await.unwrap_err();
        assert!(matches!(err, MediaError::Rejected(_)));
    }

    #[tokio::test]
    async fn unknown_url_is_not_found() {
        let media = InMemoryMedia::new();
        assert!(matches!(
            media.fetch("memory://media/none").await,
            Err(MediaError::NotFound(_))
        ));
    }
}
