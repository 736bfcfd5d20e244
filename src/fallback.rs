//! Local fallback queue for submissions made while the store is unreachable.
//!
//! The queue is a bounded FIFO persisted in its own redb file. Entries carry
//! a `local-<uuid>` id that can never be mistaken for a store id, and they
//! are never authoritative: [`FallbackQueue::reconcile`] re-submits them
//! through the lifecycle manager, which validates and assigns codes as for
//! any other submission.
//!
//! Reconciliation stops at the first transient failure so that order is
//! preserved; entries the store rejects as invalid are dropped and reported.
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use records::{NewRequest, Request};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ServiceError;
use crate::config::FallbackConfig;
use crate::lifecycle::LifecycleManager;

const QUEUE: TableDefinition<u64, &[u8]> = TableDefinition::new("fallback_queue");

fn queue_err(err: impl ToString) -> ServiceError {
    ServiceError::Fallback(err.to_string())
}

/// A submission waiting for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSubmission {
    pub seq: u64,
    pub local_id: String,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub input: NewRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(Request),
    Queued(QueuedSubmission),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedEntry {
    pub local_id: String,
    pub id: String,
    pub tracking_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEntry {
    pub local_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub synced: Vec<SyncedEntry>,
    pub rejected: Vec<RejectedEntry>,
    /// Entries still queued after the pass.
    pub remaining: usize,
}

pub struct FallbackQueue {
    db: Arc<Database>,
    capacity: usize,
}

impl FallbackQueue {
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, ServiceError> {
        let db = Database::create(path).map_err(queue_err)?;
        let txn = db.begin_write().map_err(queue_err)?;
        {
            txn.open_table(QUEUE).map_err(queue_err)?;
        }
        txn.commit().map_err(queue_err)?;
        Ok(Self {
            db: Arc::new(db),
            capacity,
        })
    }

    /// `None` when no queue path is configured.
    pub fn from_config(cfg: &FallbackConfig) -> Result<Option<Self>, ServiceError> {
        cfg.path
            .as_deref()
            .map(|path| Self::open(path, cfg.capacity))
            .transpose()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Database) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(db.as_ref()))
            .await
            .map_err(queue_err)?
    }

    pub async fn len(&self) -> Result<usize, ServiceError> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(queue_err)?;
            let table = txn.open_table(QUEUE).map_err(queue_err)?;
            Ok(table.len().map_err(queue_err)? as usize)
        })
        .await
    }

    pub async fn is_empty(&self) -> Result<bool, ServiceError> {
        Ok(self.len().await? == 0)
    }

    /// Appends a submission. Fails with [`ServiceError::QueueFull`] at capacity.
    pub async fn enqueue(&self, input: NewRequest) -> Result<QueuedSubmission, ServiceError> {
        let capacity = self.capacity;
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(queue_err)?;
            let entry = {
                let mut table = txn.open_table(QUEUE).map_err(queue_err)?;
                if table.len().map_err(queue_err)? as usize >= capacity {
                    return Err(ServiceError::QueueFull { capacity });
                }
                let seq = table
                    .last()
                    .map_err(queue_err)?
                    .map(|(key, _)| key.value() + 1)
                    .unwrap_or(1);
                let entry = QueuedSubmission {
                    seq,
                    local_id: format!("local-{}", Uuid::new_v4()),
                    queued_at: Utc::now(),
                    attempts: 0,
                    last_error: None,
                    input,
                };
                let encoded = serde_json::to_vec(&entry).map_err(queue_err)?;
                table.insert(seq, encoded.as_slice()).map_err(queue_err)?;
                entry
            };
            txn.commit().map_err(queue_err)?;
            Ok(entry)
        })
        .await
    }

    /// Queued entries, oldest first.
    pub async fn pending(&self) -> Result<Vec<QueuedSubmission>, ServiceError> {
        self.blocking(|db| {
            let txn = db.begin_read().map_err(queue_err)?;
            let table = txn.open_table(QUEUE).map_err(queue_err)?;
            let mut out = Vec::new();
            for item in table.iter().map_err(queue_err)? {
                let (_, value) = item.map_err(queue_err)?;
                out.push(serde_json::from_slice(value.value()).map_err(queue_err)?);
            }
            Ok(out)
        })
        .await
    }

    async fn remove(&self, seq: u64) -> Result<(), ServiceError> {
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(queue_err)?;
            {
                let mut table = txn.open_table(QUEUE).map_err(queue_err)?;
                table.remove(seq).map_err(queue_err)?;
            }
            txn.commit().map_err(queue_err)
        })
        .await
    }

    async fn record_failure(
        &self,
        mut entry: QueuedSubmission,
        error: String,
    ) -> Result<(), ServiceError> {
        entry.attempts += 1;
        entry.last_error = Some(error);
        self.blocking(move |db| {
            let encoded = serde_json::to_vec(&entry).map_err(queue_err)?;
            let txn = db.begin_write().map_err(queue_err)?;
            {
                let mut table = txn.open_table(QUEUE).map_err(queue_err)?;
                table
                    .insert(entry.seq, encoded.as_slice())
                    .map_err(queue_err)?;
            }
            txn.commit().map_err(queue_err)
        })
        .await
    }

    /// Creates through the manager; queues only when the failure is transient.
    pub async fn submit_or_queue(
        &self,
        manager: &LifecycleManager,
        input: NewRequest,
    ) -> Result<SubmitOutcome, ServiceError> {
        match manager.create(input.clone()).await {
            Ok(request) => Ok(SubmitOutcome::Created(request)),
            Err(err) if err.is_retryable() => {
                let entry = self.enqueue(input).await?;
                warn!(
                    local_id = %entry.local_id,
                    error = %err,
                    "submission_queued"
                );
                Ok(SubmitOutcome::Queued(entry))
            }
            Err(err) => Err(err),
        }
    }

    /// Replays queued submissions in order once the store answers a ping.
    pub async fn reconcile(
        &self,
        manager: &LifecycleManager,
    ) -> Result<ReconcileReport, ServiceError> {
        manager.ping().await?;

        let mut report = ReconcileReport::default();
        let entries = self.pending().await?;
        let total = entries.len();
        for (index, entry) in entries.into_iter().enumerate() {
            match manager.create(entry.input.clone()).await {
                Ok(created) => {
                    self.remove(entry.seq).await?;
                    info!(
                        local_id = %entry.local_id,
                        id = %created.id,
                        tracking_code = %created.tracking_code,
                        "reconcile_synced"
                    );
                    report.synced.push(SyncedEntry {
                        local_id: entry.local_id,
                        id: created.id,
                        tracking_code: created.tracking_code,
                    });
                }
                Err(err) if err.is_retryable() => {
                    warn!(local_id = %entry.local_id, error = %err, "reconcile_deferred");
                    self.record_failure(entry, err.to_string()).await?;
                    report.remaining = total - index;
                    return Ok(report);
                }
                Err(err) => {
                    self.remove(entry.seq).await?;
                    warn!(local_id = %entry.local_id, error = %err, "reconcile_rejected");
                    report.rejected.push(RejectedEntry {
                        local_id: entry.local_id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use records::{ContactInfo, DocumentInput};
    use tempfile::TempDir;

    use super::*;

    fn input(name: &str) -> NewRequest {
        NewRequest::Document(DocumentInput {
            subject_name: name.into(),
            category: "Certificate of Residency".into(),
            contact: ContactInfo {
                primary: "09170001111".into(),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn enqueue_is_fifo_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outbox.redb");
        {
            let queue = FallbackQueue::open(&path, 10).unwrap();
            let first = queue.enqueue(input("Uno")).await.unwrap();
            let second = queue.enqueue(input("Dos")).await.unwrap();
            assert!(first.local_id.starts_with("local-"));
            assert!(second.seq > first.seq);
        }
        let queue = FallbackQueue::open(&path, 10).unwrap();
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].input, input("Uno"));
        assert_eq!(pending[1].input, input("Dos"));
    }

    #[tokio::test]
    async fn full_queue_refuses_entries() {
        let dir = TempDir::new().unwrap();
        let queue = FallbackQueue::open(dir.path().join("q.redb"), 1).unwrap();
        queue.enqueue(input("Uno")).await.unwrap();
        assert_eq!(
            queue.enqueue(input("Dos")).await.unwrap_err(),
            ServiceError::QueueFull { capacity: 1 }
        );
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
