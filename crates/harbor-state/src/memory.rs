//! In-memory state store for tests, local development, and as the reference
//! for etag and transaction behaviour.
//!
//! [`InMemoryStore`] keeps every record in a `HashMap` behind a single
//! `RwLock`. Reads share the lock; every write, including a whole
//! transaction, takes it exclusively.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ETagError, StoreError, StoreResult};
use crate::traits::{Store, TransactionalStore};
use crate::types::{
    DeleteRequest, Feature, GetRequest, GetResponse, Metadata, SetRequest,
    TransactionalOperation, TransactionalStateRequest,
};

#[derive(Clone, Debug)]
struct StoredItem {
    data: Vec<u8>,
    etag: Option<String>,
}

impl From<&SetRequest> for StoredItem {
    fn from(req: &SetRequest) -> Self {
        Self {
            data: req.value.clone(),
            etag: req.etag.clone(),
        }
    }
}

/// An in-memory implementation of [`Store`] and [`TransactionalStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<HashMap<String, StoredItem>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_items()?.len())
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_items()?.is_empty())
    }

    /// Remove every key.
    pub fn clear(&self) -> StoreResult<()> {
        self.write_items()?.clear();
        Ok(())
    }

    fn read_items(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, StoredItem>>> {
        self.items
            .read()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))
    }

    fn write_items(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, StoredItem>>> {
        self.items
            .write()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {e}")))
    }
}

/// Every etag-carrying operation must name an existing key whose stored
/// etag matches exactly.
fn validate_etags(
    items: &HashMap<String, StoredItem>,
    operations: &[TransactionalOperation],
) -> StoreResult<()> {
    for op in operations {
        let Some(etag) = op.etag() else {
            continue;
        };
        match items.get(op.key()) {
            Some(item) if item.etag.as_deref() == Some(etag) => {}
            Some(_) => {
                return Err(ETagError::mismatch(format!(
                    "etag does not match for key {}",
                    op.key()
                ))
                .into());
            }
            None => {
                return Err(ETagError::mismatch(format!(
                    "etag does not match for key not found {}",
                    op.key()
                ))
                .into());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn init(&self, _metadata: Metadata) -> StoreResult<()> {
        Ok(())
    }

    fn features(&self) -> Vec<Feature> {
        vec![Feature::ETag, Feature::Transactional]
    }

    async fn get(&self, req: &GetRequest) -> StoreResult<GetResponse> {
        let items = self.read_items()?;
        Ok(match items.get(&req.key) {
            Some(item) => GetResponse {
                data: Some(item.data.clone()),
                etag: item.etag.clone(),
                metadata: Metadata::new(),
            },
            None => GetResponse::default(),
        })
    }

    async fn set(&self, req: &SetRequest) -> StoreResult<()> {
        let mut items = self.write_items()?;
        items.insert(req.key.clone(), StoredItem::from(req));
        Ok(())
    }

    async fn delete(&self, req: &DeleteRequest) -> StoreResult<()> {
        let mut items = self.write_items()?;
        items.remove(&req.key);
        Ok(())
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalStore> {
        Some(self)
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn multi(&self, req: &TransactionalStateRequest) -> StoreResult<()> {
        // One exclusive guard for both phases: nothing can interleave
        // between validation and apply.
        let mut items = self.write_items()?;

        validate_etags(&items, &req.operations)?;

        for op in &req.operations {
            match op {
                TransactionalOperation::Upsert(set) => {
                    items.insert(set.key.clone(), StoredItem::from(set));
                }
                TransactionalOperation::Delete(del) => {
                    items.remove(&del.key);
                }
            }
        }

        debug!(operations = req.operations.len(), "transaction applied");
        Ok(())
    }
}
