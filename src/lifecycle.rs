//! Request lifecycle manager.
//!
//! Every mutation is a read-modify-write against the [`RequestStore`]:
//!
//! 1. read the current record,
//! 2. check the caller's expected version (the HTTP `If-Match` value), if any,
//! 3. apply the change in memory through `records`,
//! 4. write back conditioned on the version that was read.
//!
//! A change that leaves the record as it was skips step 4, so retried calls
//! neither bump the version nor add history. A mutation without an expected
//! version that loses a race is re-applied to the fresh record up to
//! `write_retries` times.
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::counter;
use records::{
    CrimeRecord, MediaRef, NewRequest, PaymentMethod, PaymentStatus, RecordsConfig, Request,
    RequestPatch, Status, status,
};
use store::{ListFilter, MediaStore, MediaUpload, RequestStore, StoreError};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::ServiceError;
use crate::codes::CodeGenerator;
use crate::config::{BarangayConfig, LifecycleConfig};

/// Owns the state machine and every side effect on stored requests.
pub struct LifecycleManager {
    store: Arc<dyn RequestStore>,
    media: Arc<dyn MediaStore>,
    codes: CodeGenerator,
    records: RecordsConfig,
    cfg: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn RequestStore>,
        media: Arc<dyn MediaStore>,
        records: RecordsConfig,
        cfg: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            media,
            codes: CodeGenerator::new(cfg.codes.clone()),
            records,
            cfg,
        }
    }

    /// Builds the configured store and media backends.
    pub fn from_config(config: &BarangayConfig) -> Result<Self, ServiceError> {
        let store = config.store.build()?;
        let media = config.media.build()?;
        Ok(Self::new(
            store,
            media,
            config.records.resolve(),
            config.lifecycle.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    pub fn records_config(&self) -> &RecordsConfig {
        &self.records
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.store.ping().await?)
    }

    /// Validates a public submission, assigns its codes and persists it.
    pub async fn create(&self, input: NewRequest) -> Result<Request, ServiceError> {
        let kind = input.kind();
        let span = info_span!("create", %kind);
        async {
            let start = Instant::now();
            let result = self.create_inner(input).await;
            let elapsed_micros = start.elapsed().as_micros();
            match &result {
                Ok(request) => {
                    counter!("barangay_requests_created_total", "kind" => kind.as_str())
                        .increment(1);
                    info!(
                        id = %request.id,
                        tracking_code = %request.tracking_code,
                        elapsed_micros,
                        "create_success"
                    );
                }
                Err(err) => {
                    counter!("barangay_create_failures_total", "code" => err.code()).increment(1);
                    warn!(error = %err, elapsed_micros, "create_failure");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn create_inner(&self, input: NewRequest) -> Result<Request, ServiceError> {
        let submission = records::validate(input, &self.records)?;
        let mut attempt = 0;
        loop {
            let codes = self.codes.assign(self.store.as_ref(), &submission).await?;
            let draft = submission.clone().into_draft(codes);
            match self.store.insert(draft).await {
                Ok(request) => return Ok(request),
                // Another writer claimed a code between the check and the insert.
                Err(StoreError::Duplicate { field, code }) if attempt < self.cfg.create_retries => {
                    attempt += 1;
                    warn!(%field, %code, attempt, "create_code_race");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Request, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("request {id}")))
    }

    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, ServiceError> {
        Ok(self.store.list(filter).await?)
    }

    async fn mutate<F>(
        &self,
        id: &str,
        expected: Option<u64>,
        op: &'static str,
        mut apply: F,
    ) -> Result<Request, ServiceError>
    where
        F: FnMut(&mut Request, DateTime<Utc>) -> Result<bool, ServiceError> + Send,
    {
        let rounds = if expected.is_some() {
            1
        } else {
            1 + self.cfg.write_retries
        };
        let mut round = 0;
        loop {
            round += 1;
            let current = self.get(id).await?;
            if let Some(expected) = expected {
                if expected != current.version {
                    return Err(ServiceError::Conflict {
                        expected,
                        actual: current.version,
                    });
                }
            }

            let mut next = current.clone();
            if !apply(&mut next, Utc::now())? {
                debug!(id, op, version = current.version, "mutation_noop");
                return Ok(current);
            }
            match self.store.update(next, current.version).await {
                Ok(saved) => {
                    debug!(id, op, version = saved.version, "mutation_saved");
                    return Ok(saved);
                }
                Err(StoreError::Conflict { .. }) if expected.is_none() && round < rounds => {
                    debug!(id, op, round, "mutation_retry");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Moves a record along one edge of its kind's adjacency table.
    pub async fn transition(
        &self,
        id: &str,
        to: Status,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let mut from = None;
        let saved = self
            .mutate(id, expected, "transition", |req, now| {
                from = Some(req.status);
                Ok(status::advance(req, to, now, actor)?)
            })
            .await?;
        if let Some(from) = from.filter(|f| *f != to) {
            counter!("barangay_transitions_total", "to" => to.as_str()).increment(1);
            info!(id, %from, %to, actor = actor.unwrap_or("-"), "transition_success");
        }
        Ok(saved)
    }

    /// Admin override: any status of the kind, with a mandatory reason.
    pub async fn override_status(
        &self,
        id: &str,
        to: Status,
        reason: &str,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let mut from = None;
        let saved = self
            .mutate(id, expected, "override_status", |req, now| {
                let before = req.status;
                let changed = status::override_status(req, to, reason, now, actor)?;
                if changed {
                    from = Some(before);
                }
                Ok(changed)
            })
            .await?;
        if let Some(from) = from {
            counter!("barangay_status_overrides_total").increment(1);
            warn!(
                target: "audit",
                id,
                tracking_code = %saved.tracking_code,
                %from,
                %to,
                reason = reason.trim(),
                actor = actor.unwrap_or("-"),
                "status_override"
            );
        }
        Ok(saved)
    }

    /// Sets the certificate; documents before `ready_for_pickup` advance to it.
    pub async fn attach_certificate(
        &self,
        id: &str,
        certificate: MediaRef,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let mut outcome = None;
        let saved = self
            .mutate(id, expected, "attach_certificate", |req, now| {
                let result = status::attach_certificate(req, certificate.clone(), now, actor)?;
                let changed = result.changed;
                outcome = Some(result);
                Ok(changed)
            })
            .await?;
        if let Some(outcome) = outcome.filter(|o| o.changed) {
            if let Some(previous) = &outcome.replaced {
                // The old object stays in the media store; cleanup is a storage decision.
                info!(
                    target: "audit",
                    id,
                    previous_url = %previous.url,
                    url = %certificate.url,
                    "certificate_replaced"
                );
            }
            if let Some(from) = outcome.advanced_from {
                info!(id, %from, to = %saved.status, "certificate_auto_advance");
            }
        }
        Ok(saved)
    }

    /// Stores the proof reference. Payment status is left to the admin.
    pub async fn attach_payment_proof(
        &self,
        id: &str,
        proof: MediaRef,
        expected: Option<u64>,
    ) -> Result<Request, ServiceError> {
        self.mutate(id, expected, "attach_payment_proof", |req, _| {
            if req.payment_proof.as_ref() == Some(&proof) {
                return Ok(false);
            }
            req.payment_proof = Some(proof.clone());
            Ok(true)
        })
        .await
    }

    /// Sends a file to the media store under the size limit and upload
    /// timeout. Used directly for blotter attachments, which are uploaded
    /// before the report exists.
    pub async fn upload_media(&self, upload: MediaUpload) -> Result<MediaRef, ServiceError> {
        if upload.bytes.len() > self.cfg.max_upload_bytes {
            return Err(ServiceError::Validation(records::RecordError::invalid(
                "file",
                format!("larger than {} bytes", self.cfg.max_upload_bytes),
            )));
        }
        let file_name = upload.file_name.clone();
        let start = Instant::now();
        let pending = self.media.upload(upload);
        let result = match tokio::time::timeout(self.cfg.upload_timeout(), pending).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Timeout("media upload".into())),
        };
        let elapsed_micros = start.elapsed().as_micros();
        match &result {
            Ok(media) => debug!(%file_name, url = %media.url, elapsed_micros, "upload_success"),
            Err(err) => warn!(%file_name, error = %err, elapsed_micros, "upload_failure"),
        }
        result
    }

    /// Uploads through the media store, then [`Self::attach_certificate`].
    ///
    /// The record is checked first so that unknown or rejected records do not
    /// leave orphaned uploads behind.
    pub async fn upload_certificate(
        &self,
        id: &str,
        upload: MediaUpload,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let current = self.get(id).await?;
        if current.status == Status::Rejected {
            return Err(records::RecordError::TerminalStatus(Status::Rejected).into());
        }
        let media = self.upload_media(upload).await?;
        self.attach_certificate(id, media, expected, actor).await
    }

    pub async fn upload_payment_proof(
        &self,
        id: &str,
        upload: MediaUpload,
        expected: Option<u64>,
    ) -> Result<Request, ServiceError> {
        self.get(id).await?;
        let media = self.upload_media(upload).await?;
        self.attach_payment_proof(id, media, expected).await
    }

    /// Applies several admin edits in one versioned write.
    pub async fn apply_patch(
        &self,
        id: &str,
        patch: RequestPatch,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let mut changed_fields = Vec::new();
        let mut status_from = None;
        let saved = self
            .mutate(id, expected, "apply_patch", |req, now| {
                let outcome = records::apply_patch(req, patch.clone(), &self.records, now, actor)?;
                changed_fields = outcome.changed.clone();
                status_from = outcome.status_from;
                Ok(!outcome.is_noop())
            })
            .await?;
        if !changed_fields.is_empty() {
            info!(
                id,
                fields = ?changed_fields,
                actor = actor.unwrap_or("-"),
                "patch_success"
            );
        }
        if let Some(from) = status_from {
            counter!("barangay_transitions_total", "to" => saved.status.as_str()).increment(1);
            info!(id, %from, to = %saved.status, "transition_success");
        }
        Ok(saved)
    }

    pub async fn set_payment_status(
        &self,
        id: &str,
        value: PaymentStatus,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            payment_status: Some(value),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    pub async fn set_payment_method(
        &self,
        id: &str,
        value: PaymentMethod,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            payment_method: Some(value),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    pub async fn set_crime_record(
        &self,
        id: &str,
        value: CrimeRecord,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            crime_record: Some(value),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    /// Negative counts are a validation error.
    pub async fn set_certification_count(
        &self,
        id: &str,
        value: i64,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            certification_count: Some(value),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    /// `None` or blank clears the remarks.
    pub async fn set_remarks(
        &self,
        id: &str,
        value: Option<String>,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            remarks: Some(value.unwrap_or_default()),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    pub async fn set_category(
        &self,
        id: &str,
        category: String,
        expected: Option<u64>,
        actor: Option<&str>,
    ) -> Result<Request, ServiceError> {
        let patch = RequestPatch {
            category: Some(category),
            ..Default::default()
        };
        self.apply_patch(id, patch, expected, actor).await
    }

    /// Walks a document through `issued` to `collected` at the pickup desk.
    pub async fn collect(&self, id: &str, actor: Option<&str>) -> Result<Request, ServiceError> {
        let mut path = Vec::new();
        let saved = self
            .mutate(id, None, "collect", |req, now| {
                path = status::walk_to_collected(req, now, actor)?;
                Ok(!path.is_empty())
            })
            .await?;
        if !path.is_empty() {
            counter!("barangay_transitions_total", "to" => Status::Collected.as_str())
                .increment(1);
            info!(id, steps = path.len(), actor = actor.unwrap_or("-"), "collect_success");
        }
        Ok(saved)
    }

    /// Hard delete. Codes of the deleted record are never handed out again.
    pub async fn delete(&self, id: &str, actor: Option<&str>) -> Result<(), ServiceError> {
        if !self.store.delete(id).await? {
            return Err(ServiceError::not_found(format!("request {id}")));
        }
        counter!("barangay_requests_deleted_total").increment(1);
        warn!(target: "audit", id, actor = actor.unwrap_or("-"), "request_deleted");
        Ok(())
    }
}
