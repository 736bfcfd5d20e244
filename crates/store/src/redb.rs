//! Embedded request store on redb.
//!
//! Three tables live in one file:
//!
//! | table | key | value |
//! |-------|-----|-------|
//! | `requests` | record id | JSON-encoded [`Request`] |
//! | `codes` | `<field>:<code>` | record id |
//! | `retired_codes` | `<field>:<code>` | unix seconds of the delete |
//!
//! Every operation is a single redb transaction run on
//! `tokio::task::spawn_blocking`, so inserts claim all of a record's codes
//! atomically and updates compare versions inside the write transaction.
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use records::{Request, RequestDraft};
use uuid::Uuid;

use crate::request::{draft_codes, merge_update, request_codes, sort_listing};
use crate::{CodeField, ListFilter, RequestStore, StoreError};

const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("requests");
const CODES: TableDefinition<&str, &str> = TableDefinition::new("codes");
const RETIRED: TableDefinition<&str, i64> = TableDefinition::new("retired_codes");

fn code_key(field: CodeField, code: &str) -> String {
    format!("{}:{}", field.as_str(), code)
}

pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens or creates the database file and its tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        let txn = db.begin_write().map_err(StoreError::backend)?;
        {
            txn.open_table(REQUESTS).map_err(StoreError::backend)?;
            txn.open_table(CODES).map_err(StoreError::backend)?;
            txn.open_table(RETIRED).map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(db.as_ref()))
            .await
            .map_err(StoreError::backend)?
    }
}

fn read_record(db: &Database, id: &str) -> Result<Option<Request>, StoreError> {
    let txn = db.begin_read().map_err(StoreError::backend)?;
    let table = txn.open_table(REQUESTS).map_err(StoreError::backend)?;
    let bytes = table
        .get(id)
        .map_err(StoreError::backend)?
        .map(|guard| guard.value().to_vec());
    bytes
        .map(|b| serde_json::from_slice(&b).map_err(StoreError::from))
        .transpose()
}

#[async_trait]
impl RequestStore for RedbStore {
    async fn insert(&self, draft: RequestDraft) -> Result<Request, StoreError> {
        self.blocking(move |db| {
            let codes = draft_codes(&draft);
            let id = Uuid::new_v4().simple().to_string();
            let request = Request::from_draft(id.clone(), draft, Utc::now());
            let encoded = serde_json::to_vec(&request)?;

            let txn = db.begin_write().map_err(StoreError::backend)?;
            {
                let mut code_table = txn.open_table(CODES).map_err(StoreError::backend)?;
                let retired = txn.open_table(RETIRED).map_err(StoreError::backend)?;
                for (field, code) in &codes {
                    let key = code_key(*field, code);
                    let live = code_table
                        .get(key.as_str())
                        .map_err(StoreError::backend)?
                        .is_some();
                    let dead = retired
                        .get(key.as_str())
                        .map_err(StoreError::backend)?
                        .is_some();
                    if live || dead {
                        // Dropping the uncommitted transaction aborts it.
                        return Err(StoreError::Duplicate {
                            field: *field,
                            code: code.clone(),
                        });
                    }
                    code_table
                        .insert(key.as_str(), id.as_str())
                        .map_err(StoreError::backend)?;
                }
                let mut table = txn.open_table(REQUESTS).map_err(StoreError::backend)?;
                table
                    .insert(id.as_str(), encoded.as_slice())
                    .map_err(StoreError::backend)?;
            }
            txn.commit().map_err(StoreError::backend)?;
            Ok(request)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Request>, StoreError> {
        let id = id.to_string();
        self.blocking(move |db| read_record(db, &id)).await
    }

    async fn find_by_code(
        &self,
        field: CodeField,
        code: &str,
    ) -> Result<Option<Request>, StoreError> {
        let key = code_key(field, code);
        self.blocking(move |db| {
            let id = {
                let txn = db.begin_read().map_err(StoreError::backend)?;
                let table = txn.open_table(CODES).map_err(StoreError::backend)?;
                let id = table
                    .get(key.as_str())
                    .map_err(StoreError::backend)?
                    .map(|guard| guard.value().to_string());
                id
            };
            match id {
                Some(id) => read_record(db, &id),
                None => Ok(None),
            }
        })
        .await
    }

    async fn code_exists(&self, field: CodeField, code: &str) -> Result<bool, StoreError> {
        let key = code_key(field, code);
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(StoreError::backend)?;
            let live = txn
                .open_table(CODES)
                .map_err(StoreError::backend)?
                .get(key.as_str())
                .map_err(StoreError::backend)?
                .is_some();
            if live {
                return Ok(true);
            }
            let retired = txn
                .open_table(RETIRED)
                .map_err(StoreError::backend)?
                .get(key.as_str())
                .map_err(StoreError::backend)?
                .is_some();
            Ok(retired)
        })
        .await
    }

    async fn update(
        &self,
        request: Request,
        expected_version: u64,
    ) -> Result<Request, StoreError> {
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            let merged = {
                let mut table = txn.open_table(REQUESTS).map_err(StoreError::backend)?;
                let current = table
                    .get(request.id.as_str())
                    .map_err(StoreError::backend)?
                    .map(|guard| guard.value().to_vec())
                    .ok_or_else(|| StoreError::NotFound(request.id.clone()))?;
                let stored: Request = serde_json::from_slice(&current)?;
                let merged = merge_update(&stored, request, expected_version, Utc::now())?;
                let encoded = serde_json::to_vec(&merged)?;
                table
                    .insert(merged.id.as_str(), encoded.as_slice())
                    .map_err(StoreError::backend)?;
                merged
            };
            txn.commit().map_err(StoreError::backend)?;
            Ok(merged)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            {
                let mut table = txn.open_table(REQUESTS).map_err(StoreError::backend)?;
                let removed = table
                    .remove(id.as_str())
                    .map_err(StoreError::backend)?
                    .map(|guard| guard.value().to_vec());
                let Some(bytes) = removed else {
                    return Ok(false);
                };
                let request: Request = serde_json::from_slice(&bytes)?;

                let mut codes = txn.open_table(CODES).map_err(StoreError::backend)?;
                let mut retired = txn.open_table(RETIRED).map_err(StoreError::backend)?;
                let now = Utc::now().timestamp();
                for (field, code) in request_codes(&request) {
                    let key = code_key(field, &code);
                    codes.remove(key.as_str()).map_err(StoreError::backend)?;
                    retired
                        .insert(key.as_str(), now)
                        .map_err(StoreError::backend)?;
                }
            }
            txn.commit().map_err(StoreError::backend)?;
            Ok(true)
        })
        .await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Request>, StoreError> {
        self.blocking(move |db| {
            let txn = db.begin_read().map_err(StoreError::backend)?;
            let table = txn.open_table(REQUESTS).map_err(StoreError::backend)?;
            let mut out = Vec::new();
            for item in table.iter().map_err(StoreError::backend)? {
                let (_, value) = item.map_err(StoreError::backend)?;
                let request: Request = serde_json::from_slice(value.value())?;
                if filter.matches(&request) {
                    out.push(request);
                }
            }
            sort_listing(&mut out);
            Ok(out)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.blocking(|db| {
            db.begin_read().map_err(StoreError::backend)?;
            Ok(())
        })
        .await
    }
}
