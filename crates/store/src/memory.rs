use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use records::{Request, RequestDraft};
use uuid::Uuid;

use crate::request::{draft_codes, merge_update, request_codes, sort_listing};
use crate::{CodeField, ListFilter, RequestStore, StoreError};

#[derive(Default)]
struct Inner {
    records: HashMap<String, Request>,
    codes: HashMap<(CodeField, String), String>,
    retired: HashSet<(CodeField, String)>,
}

/// A `RwLock<HashMap>` store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn insert(&self, draft: RequestDraft) -> Result<Request, StoreError> {
        let mut guard = self.write()?;
        let codes = draft_codes(&draft);
        // All codes are checked before any is claimed.
        for key in &codes {
            if guard.codes.contains_key(key) || guard.retired.contains(key) {
                return Err(StoreError::Duplicate {
                    field: key.0,
                    code: key.1.clone(),
                });
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let request = Request::from_draft(id.clone(), draft, Utc::now());
        for key in codes {
            guard.codes.insert(key, id.clone());
        }
        guard.records.insert(id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: &str) -> Result<Option<Request>, StoreError> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn find_by_code(
        &self,
        field: CodeField,
        code: &str,
    ) -> Result<Option<Request>, StoreError> {
        let guard = self.read()?;
        Ok(guard
            .codes
            .get(&(field, code.to_string()))
            .and_then(|id| guard.records.get(id))
            .cloned())
    }

    async fn code_exists(&self, field: CodeField, code: &str) -> Result<bool, StoreError> {
        let guard = self.read()?;
        let key = (field, code.to_string());
        Ok(guard.codes.contains_key(&key) || guard.retired.contains(&key))
    }

    async fn update(
        &self,
        request: Request,
        expected_version: u64,
    ) -> Result<Request, StoreError> {
        let mut guard = self.write()?;
        let stored = guard
            .records
            .get(&request.id)
            .ok_or_else(|| StoreError::NotFound(request.id.clone()))?;
        let merged = merge_update(stored, request, expected_version, Utc::now())?;
        guard.records.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        let Some(request) = guard.records.remove(id) else {
            return Ok(false);
        };
        for key in request_codes(&request) {
            guard.codes.remove(&key);
            guard.retired.insert(key);
        }
        Ok(true)
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, StoreError> {
        let mut out: Vec<Request> = self
            .read()?
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_listing(&mut out);
        Ok(out)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }
}
