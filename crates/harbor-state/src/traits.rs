//! The [`Store`] capability contract every backend implements, and the
//! optional [`TransactionalStore`] extension.
//!
//! Bulk operations have sequential default implementations. A backend with
//! a native batch primitive overrides them; one without gets fail-fast
//! semantics for free: items are applied in order, the first error stops the
//! batch, and items already applied stay committed.

use async_trait::async_trait;
use tracing::error;

use crate::error::StoreResult;
use crate::types::{
    BulkGetResponse, DeleteRequest, Feature, GetRequest, GetResponse, Metadata, SetRequest,
    TransactionalStateRequest,
};

/// A key/value state backend.
///
/// Implementations must be thread-safe (`Send + Sync`): a single instance is
/// shared by every caller for the lifetime of the process.
#[async_trait]
pub trait Store: Send + Sync {
    /// Prepare the backend with its component metadata.
    async fn init(&self, metadata: Metadata) -> StoreResult<()>;

    /// Capabilities this backend supports.
    fn features(&self) -> Vec<Feature>;

    /// Liveness probe.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Read a single key.
    ///
    /// An unknown key is not an error: it yields a response with `data: None`.
    async fn get(&self, req: &GetRequest) -> StoreResult<GetResponse>;

    /// Read several keys, returning one entry per request in request order.
    async fn bulk_get(&self, reqs: &[GetRequest]) -> StoreResult<Vec<BulkGetResponse>> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            let resp = self.get(req).await.map_err(|e| {
                error!(key = %req.key, error = %e, "bulk get failed");
                e
            })?;
            responses.push(BulkGetResponse {
                key: req.key.clone(),
                data: resp.data,
                etag: resp.etag,
                metadata: resp.metadata,
                error: None,
            });
        }
        Ok(responses)
    }

    /// Write a single key.
    async fn set(&self, req: &SetRequest) -> StoreResult<()>;

    /// Write several keys. Fails fast with no rollback.
    async fn bulk_set(&self, reqs: &[SetRequest]) -> StoreResult<()> {
        for req in reqs {
            if let Err(e) = self.set(req).await {
                error!(key = %req.key, error = %e, "bulk set stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete a single key. Deleting an unknown key succeeds.
    async fn delete(&self, req: &DeleteRequest) -> StoreResult<()>;

    /// Delete several keys. Fails fast with no rollback.
    async fn bulk_delete(&self, reqs: &[DeleteRequest]) -> StoreResult<()> {
        for req in reqs {
            if let Err(e) = self.delete(req).await {
                error!(key = %req.key, error = %e, "bulk delete stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    /// The transactional extension, if this backend implements one.
    ///
    /// Callers must still check [`Feature::Transactional`] before using it.
    fn as_transactional(&self) -> Option<&dyn TransactionalStore> {
        None
    }
}

/// Optional extension: atomic multi-operation execution.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Apply every operation in `req`, or none of them.
    async fn multi(&self, req: &TransactionalStateRequest) -> StoreResult<()>;
}
