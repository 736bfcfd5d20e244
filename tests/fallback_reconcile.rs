#![cfg(feature = "embedded")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use barangay::{
    FallbackQueue, LifecycleConfig, LifecycleManager, ServiceError, SubmitOutcome, records, store,
};
use records::{
    BlotterInput, ContactInfo, DocumentInput, NewRequest, RecordsConfig, Request, RequestDraft,
};
use store::{CodeField, InMemoryMedia, InMemoryStore, ListFilter, RequestStore, StoreError};
use tempfile::TempDir;

/// In-memory store that can be switched off to simulate an outage.
#[derive(Default)]
struct Switchable {
    inner: InMemoryStore,
    offline: AtomicBool,
}

impl Switchable {
    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RequestStore for Switchable {
    async fn insert(&self, draft: RequestDraft) -> Result<Request, StoreError> {
        self.check()?;
        self.inner.insert(draft).await
    }

    async fn get(&self, id: &str) -> Result<Option<Request>, StoreError> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn find_by_code(
        &self,
        field: CodeField,
        code: &str,
    ) -> Result<Option<Request>, StoreError> {
        self.check()?;
        self.inner.find_by_code(field, code).await
    }

    async fn code_exists(&self, field: CodeField, code: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.code_exists(field, code).await
    }

    async fn update(&self, request: Request, expected_version: u64) -> Result<Request, StoreError> {
        self.check()?;
        self.inner.update(request, expected_version).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, StoreError> {
        self.check()?;
        self.inner.list(filter).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

fn setup() -> (Arc<Switchable>, LifecycleManager) {
    let store = Arc::new(Switchable::default());
    let manager = LifecycleManager::new(
        Arc::clone(&store) as Arc<dyn RequestStore>,
        Arc::new(InMemoryMedia::new()),
        RecordsConfig::default(),
        LifecycleConfig::default(),
    );
    (store, manager)
}

fn residency(name: &str) -> NewRequest {
    NewRequest::Document(DocumentInput {
        subject_name: name.into(),
        category: "Certificate of Residency".into(),
        contact: ContactInfo {
            primary: "09170002222".into(),
            ..Default::default()
        },
        ..Default::default()
    })
}

#[tokio::test]
async fn outage_queues_then_reconcile_replays_in_order() {
    let dir = TempDir::new().unwrap();
    let queue = FallbackQueue::open(dir.path().join("outbox.redb"), 10).unwrap();
    let (store, manager) = setup();

    store.set_offline(true);
    let mut local_ids = Vec::new();
    for name in ["Ana Cruz", "Ben Lim"] {
        match queue.submit_or_queue(&manager, residency(name)).await.unwrap() {
            SubmitOutcome::Queued(entry) => local_ids.push(entry.local_id),
            SubmitOutcome::Created(_) => panic!("store is offline"),
        }
    }
    assert_eq!(queue.len().await.unwrap(), 2);

    // Reconcile refuses to start while the store is down.
    let err = queue.reconcile(&manager).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(queue.len().await.unwrap(), 2);

    store.set_offline(false);
    let report = queue.reconcile(&manager).await.unwrap();
    assert_eq!(report.remaining, 0);
    assert!(report.rejected.is_empty());
    let synced: Vec<_> = report.synced.iter().map(|s| s.local_id.clone()).collect();
    assert_eq!(synced, local_ids);
    assert!(queue.is_empty().await.unwrap());

    for entry in &report.synced {
        let stored = manager.get(&entry.id).await.unwrap();
        assert_eq!(stored.tracking_code, entry.tracking_code);
        assert!(!entry.id.starts_with("local-"));
    }
}

#[tokio::test]
async fn invalid_input_is_never_queued() {
    let dir = TempDir::new().unwrap();
    let queue = FallbackQueue::open(dir.path().join("outbox.redb"), 10).unwrap();
    let (store, manager) = setup();
    store.set_offline(true);

    let err = queue
        .submit_or_queue(&manager, NewRequest::Blotter(BlotterInput::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn online_store_creates_directly() {
    let dir = TempDir::new().unwrap();
    let queue = FallbackQueue::open(dir.path().join("outbox.redb"), 10).unwrap();
    let (_, manager) = setup();

    let outcome = queue
        .submit_or_queue(&manager, residency("Carla Diaz"))
        .await
        .unwrap();
    assert!(matches!(outcome, SubmitOutcome::Created(_)));
    assert!(queue.is_empty().await.unwrap());
}

#[tokio::test]
async fn entries_the_store_rejects_are_dropped_and_reported() {
    let dir = TempDir::new().unwrap();
    let queue = FallbackQueue::open(dir.path().join("outbox.redb"), 10).unwrap();
    let (_, manager) = setup();

    // Queued directly, as an older build might have done with looser rules.
    let bad = queue
        .enqueue(NewRequest::Document(DocumentInput {
            subject_name: "Dario Ong".into(),
            category: "Fishing License".into(),
            contact: ContactInfo {
                primary: "09170003333".into(),
                ..Default::default()
            },
            ..Default::default()
        }))
        .await
        .unwrap();
    queue.enqueue(residency("Ella Tan")).await.unwrap();

    let report = queue.reconcile(&manager).await.unwrap();
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].local_id, bad.local_id);
    assert_eq!(report.synced.len(), 1);
    assert!(queue.is_empty().await.unwrap());
}
