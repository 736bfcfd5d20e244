//! Request store client for an external HTTP backend.
//!
//! Resource shapes follow the public API: documents under `/documents`,
//! blotter reports under `/blotter`. A record id alone does not tell the
//! kind, so id-based calls try documents first and fall back to blotter on
//! 404. Transport failures and 5xx answers map to retryable errors.
use std::time::Duration;

use async_trait::async_trait;
use records::{Request, RequestDraft, RequestKind};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::request::sort_listing;
use crate::{CodeField, ListFilter, RequestStore, StoreError};

const KINDS: [RequestKind; 2] = [RequestKind::Document, RequestKind::Blotter];

fn collection(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Document => "documents",
        RequestKind::Blotter => "blotter",
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else if err.is_connect() || err.is_request() {
        StoreError::Unavailable(err.to_string())
    } else if err.is_decode() {
        StoreError::encode(err)
    } else {
        StoreError::backend(err)
    }
}

#[derive(Deserialize)]
struct CodeExists {
    exists: bool,
}

pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(StoreError::backend)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Maps non-success statuses; 404 becomes `Ok(None)`.
    async fn checked(response: Response) -> Result<Option<Response>, StoreError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_success() {
            return Ok(Some(response));
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                // The backend reports its current version in the body when it can.
                let actual = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("version").and_then(|v| v.as_u64()))
                    .unwrap_or_default();
                StoreError::Conflict {
                    expected: 0,
                    actual,
                }
            }
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                StoreError::Unavailable(format!("{s}: {body}"))
            }
            s => StoreError::Backend(format!("{s}: {body}")),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Option<Request>, StoreError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        match Self::checked(response).await? {
            Some(ok) => Ok(Some(ok.json().await.map_err(transport)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RequestStore for RestStore {
    async fn insert(&self, draft: RequestDraft) -> Result<Request, StoreError> {
        let response = self
            .client
            .post(self.url(collection(draft.kind())))
            .json(&draft)
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            // Duplicate codes are reported as 422 with the offending field.
            let body: serde_json::Value = response.json().await.map_err(transport)?;
            let field = match body.get("field").and_then(|v| v.as_str()) {
                Some("pickup") => CodeField::Pickup,
                Some("public_token") => CodeField::PublicToken,
                _ => CodeField::Tracking,
            };
            let code = body
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Err(StoreError::Duplicate { field, code });
        }
        let created = Self::checked(response)
            .await?
            .ok_or_else(|| StoreError::backend("backend answered 404 on create"))?;
        let request: Request = created.json().await.map_err(transport)?;
        debug!(id = %request.id, kind = %request.kind(), "rest_insert");
        Ok(request)
    }

    async fn get(&self, id: &str) -> Result<Option<Request>, StoreError> {
        for kind in KINDS {
            if let Some(found) = self.get_json(&format!("{}/{id}", collection(kind))).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn find_by_code(
        &self,
        field: CodeField,
        code: &str,
    ) -> Result<Option<Request>, StoreError> {
        match field {
            CodeField::Tracking => {
                for kind in KINDS {
                    let path = format!("{}/track/by-number/{code}", collection(kind));
                    if let Some(found) = self.get_json(&path).await? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
            CodeField::Pickup => self.get_json(&format!("documents/pickup/{code}")).await,
            CodeField::PublicToken => self.get_json(&format!("blotter/by-token/{code}")).await,
        }
    }

    async fn code_exists(&self, field: CodeField, code: &str) -> Result<bool, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("codes/{}/{code}", field.as_str())))
            .send()
            .await
            .map_err(transport)?;
        match Self::checked(response).await? {
            Some(ok) => Ok(ok.json::<CodeExists>().await.map_err(transport)?.exists),
            None => Ok(false),
        }
    }

    async fn update(
        &self,
        request: Request,
        expected_version: u64,
    ) -> Result<Request, StoreError> {
        let path = format!("{}/{}", collection(request.kind()), request.id);
        let response = self
            .client
            .patch(self.url(&path))
            .header(header::IF_MATCH, format!("\"{expected_version}\""))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        match Self::checked(response).await {
            Ok(Some(ok)) => ok.json().await.map_err(transport),
            Ok(None) => Err(StoreError::NotFound(request.id)),
            Err(StoreError::Conflict { actual, .. }) => Err(StoreError::Conflict {
                expected: expected_version,
                actual,
            }),
            Err(other) => Err(other),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        for kind in KINDS {
            let response = self
                .client
                .delete(self.url(&format!("{}/{id}", collection(kind))))
                .send()
                .await
                .map_err(transport)?;
            if Self::checked(response).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, StoreError> {
        let kinds: Vec<RequestKind> = match filter.kind {
            Some(kind) => vec![kind],
            None => KINDS.to_vec(),
        };
        let mut out = Vec::new();
        for kind in kinds {
            let mut builder = self.client.get(self.url(collection(kind)));
            if let Some(status) = filter.status {
                builder = builder.query(&[("status", status.as_str())]);
            }
            let response = builder.send().await.map_err(transport)?;
            if let Some(ok) = Self::checked(response).await? {
                let page: Vec<Request> = ok.json().await.map_err(transport)?;
                out.extend(page.into_iter().filter(|r| filter.matches(r)));
            }
        }
        sort_listing(&mut out);
        Ok(out)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(transport)?;
        Self::checked(response)
            .await?
            .map(|_| ())
            .ok_or_else(|| StoreError::Unavailable("health endpoint missing".into()))
    }
}
