//! The state API: routes caller requests to named stores.
//!
//! Every operation resolves the target store first (`not configured` when the
//! registry is empty, `not found` for an unknown name), then validates and
//! namespaces keys, then calls the backend and classifies its error.

use std::sync::Arc;

use harbor_state::{
    Feature, GetRequest, OperationType, Store, TransactionalOperation, TransactionalStateRequest,
    TransactionalStore,
};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::keys::{modified_key, KeyError};
use crate::registry::StoreRegistry;
use crate::request::{
    DeleteBulkStateRequest, DeleteStateRequest, ExecuteStateTransactionRequest,
    GetBulkStateRequest, GetBulkStateResponse, GetStateRequest, GetStateResponse,
    SaveStateRequest,
};

/// Dispatches state operations to the stores of a [`StoreRegistry`].
///
/// Cheap to share: the registry sits behind an `Arc` and every operation
/// takes `&self`.
#[derive(Clone, Debug)]
pub struct StateApi {
    registry: Arc<StoreRegistry>,
    config: ApiConfig,
}

impl StateApi {
    pub fn new(registry: Arc<StoreRegistry>, config: ApiConfig) -> Self {
        Self { registry, config }
    }

    fn store(&self, store_name: &str) -> ApiResult<&Arc<dyn Store>> {
        if self.registry.is_empty() {
            warn!(store = store_name, "state store is not configured");
            return Err(ApiError::not_configured());
        }
        self.registry.get(store_name).ok_or_else(|| {
            warn!(store = store_name, "state store is not found");
            ApiError::store_not_found(store_name)
        })
    }

    fn state_key(&self, store_name: &str, key: &str) -> Result<String, KeyError> {
        modified_key(
            key,
            store_name,
            self.config.app_id.as_deref(),
            self.config.key_prefix(store_name),
        )
    }

    /// Persist one or more items in a single bulk write.
    pub async fn save_state(&self, req: SaveStateRequest) -> ApiResult<()> {
        let store = self.store(&req.store_name)?;
        if req.states.is_empty() {
            return Err(ApiError::invalid_request(format!(
                "no state items to save in state store {}",
                req.store_name
            )));
        }

        let mut reqs = Vec::with_capacity(req.states.len());
        for item in req.states {
            let key = self.state_key(&req.store_name, &item.key)?;
            reqs.push(convert::set_request(item, key));
        }

        debug!(store = %req.store_name, items = reqs.len(), "saving state");
        store.bulk_set(&reqs).await.map_err(|e| {
            let context = format!("failed saving state in state store {}", req.store_name);
            ApiError::from_store(&e, context)
        })
    }

    /// Read a single key. An absent key yields empty data, not an error.
    pub async fn get_state(&self, req: GetStateRequest) -> ApiResult<GetStateResponse> {
        let store = self.store(&req.store_name)?;
        let get = GetRequest {
            key: self.state_key(&req.store_name, &req.key)?,
            metadata: req.metadata,
            options: harbor_state::StateOptions {
                consistency: req.consistency.as_str().to_string(),
                ..Default::default()
            },
        };

        let resp = store.get(&get).await.map_err(|e| {
            ApiError::internal(
                &e,
                format!("fail to get {} from state store {}", req.key, req.store_name),
            )
        })?;
        Ok(resp.into())
    }

    /// Read several keys. Backend errors are returned unwrapped.
    pub async fn get_bulk_state(
        &self,
        req: GetBulkStateRequest,
    ) -> ApiResult<GetBulkStateResponse> {
        let store = self.store(&req.store_name)?;
        if req.keys.is_empty() {
            return Ok(GetBulkStateResponse::default());
        }

        let mut reqs = Vec::with_capacity(req.keys.len());
        for key in &req.keys {
            reqs.push(GetRequest {
                key: self.state_key(&req.store_name, key)?,
                metadata: req.metadata.clone(),
                options: Default::default(),
            });
        }

        debug!(store = %req.store_name, keys = reqs.len(), "bulk reading state");
        let responses = store.bulk_get(&reqs).await?;
        Ok(GetBulkStateResponse {
            items: responses.into_iter().map(convert::bulk_item).collect(),
        })
    }

    /// Delete one key. Deleting an unknown key succeeds.
    pub async fn delete_state(&self, req: DeleteStateRequest) -> ApiResult<()> {
        let store = self.store(&req.store_name)?;
        let del = harbor_state::DeleteRequest {
            key: self.state_key(&req.store_name, &req.key)?,
            options: convert::backend_options(req.options.as_ref()),
            etag: req.etag,
            metadata: req.metadata,
        };

        store.delete(&del).await.map_err(|e| {
            ApiError::from_store(&e, format!("failed deleting state with key {}", req.key))
        })
    }

    /// Delete several keys. Backend errors are returned unwrapped.
    pub async fn delete_bulk_state(&self, req: DeleteBulkStateRequest) -> ApiResult<()> {
        let store = self.store(&req.store_name)?;

        let mut reqs = Vec::with_capacity(req.states.len());
        for item in req.states {
            let key = self.state_key(&req.store_name, &item.key)?;
            reqs.push(convert::delete_request(item, key));
        }

        debug!(store = %req.store_name, items = reqs.len(), "bulk deleting state");
        store.bulk_delete(&reqs).await?;
        Ok(())
    }

    /// Apply upserts and deletes atomically against a transactional store.
    pub async fn execute_state_transaction(
        &self,
        req: ExecuteStateTransactionRequest,
    ) -> ApiResult<()> {
        let store = self.store(&req.store_name)?;
        let tx = transactional(&**store).ok_or_else(|| {
            warn!(store = %req.store_name, "state store doesn't support transaction");
            ApiError::transaction_unsupported(&req.store_name)
        })?;

        let mut operations = Vec::with_capacity(req.operations.len());
        for (index, op) in req.operations.into_iter().enumerate() {
            let Some(item) = op.request else {
                if self.config.reject_missing_operation_payload {
                    return Err(ApiError::invalid_request(format!(
                        "transaction operation {index} ({}) has no request",
                        op.operation_type
                    )));
                }
                debug!(
                    store = %req.store_name,
                    index,
                    operation = %op.operation_type,
                    "skipping transaction operation without request"
                );
                continue;
            };

            let key = self.state_key(&req.store_name, &item.key)?;
            operations.push(match op.operation_type {
                OperationType::Upsert => {
                    TransactionalOperation::Upsert(convert::set_request(item, key))
                }
                OperationType::Delete => {
                    TransactionalOperation::Delete(convert::delete_request(item, key))
                }
            });
        }

        debug!(
            store = %req.store_name,
            operations = operations.len(),
            "executing state transaction"
        );
        let tx_req = TransactionalStateRequest {
            operations,
            metadata: req.metadata,
        };
        tx.multi(&tx_req)
            .await
            .map_err(|e| ApiError::from_store(&e, "error while executing state transaction"))
    }
}

/// The transactional extension of `store`, provided it both advertises
/// [`Feature::Transactional`] and implements the extension.
fn transactional(store: &dyn Store) -> Option<&dyn TransactionalStore> {
    if !Feature::Transactional.is_present(&store.features()) {
        return None;
    }
    store.as_transactional()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use harbor_state::{
        BulkGetResponse, DeleteRequest, ETagError, GetResponse, InMemoryStore, Metadata,
        SetRequest, StoreError, StoreResult,
    };

    use super::*;
    use crate::error::{ErrorKind, StatusCode};
    use crate::keys::KeyPrefixStrategy;
    use crate::request::{
        Concurrency, Consistency, StateItem, StateOptions, TransactionalStateOperation,
    };

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Calls {
        bulk_set: Vec<Vec<SetRequest>>,
        get: Vec<GetRequest>,
        bulk_get: Vec<Vec<GetRequest>>,
        delete: Vec<DeleteRequest>,
        bulk_delete: Vec<Vec<DeleteRequest>>,
        multi: Vec<TransactionalStateRequest>,
    }

    /// Records every call and answers with a fixed outcome.
    #[derive(Default)]
    struct MockStore {
        features: Vec<Feature>,
        transactional: bool,
        fail_with: Option<StoreError>,
        get_response: GetResponse,
        calls: Mutex<Calls>,
    }

    impl MockStore {
        fn transactional() -> Self {
            Self {
                features: vec![Feature::Transactional],
                transactional: true,
                ..Default::default()
            }
        }

        fn failing(err: StoreError) -> Self {
            Self {
                fail_with: Some(err),
                ..Self::transactional()
            }
        }

        fn outcome(&self) -> StoreResult<()> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
            self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Store for MockStore {
        async fn init(&self, _metadata: Metadata) -> StoreResult<()> {
            Ok(())
        }

        fn features(&self) -> Vec<Feature> {
            self.features.clone()
        }

        async fn get(&self, req: &GetRequest) -> StoreResult<GetResponse> {
            self.calls().get.push(req.clone());
            self.outcome()?;
            Ok(self.get_response.clone())
        }

        async fn bulk_get(&self, reqs: &[GetRequest]) -> StoreResult<Vec<BulkGetResponse>> {
            self.calls().bulk_get.push(reqs.to_vec());
            self.outcome()?;
            Ok(reqs
                .iter()
                .map(|r| BulkGetResponse {
                    key: r.key.clone(),
                    data: Some(b"test-data".to_vec()),
                    etag: Some("etag".into()),
                    ..Default::default()
                })
                .collect())
        }

        async fn set(&self, _req: &SetRequest) -> StoreResult<()> {
            unreachable!("dispatcher writes through bulk_set")
        }

        async fn bulk_set(&self, reqs: &[SetRequest]) -> StoreResult<()> {
            self.calls().bulk_set.push(reqs.to_vec());
            self.outcome()
        }

        async fn delete(&self, req: &DeleteRequest) -> StoreResult<()> {
            self.calls().delete.push(req.clone());
            self.outcome()
        }

        async fn bulk_delete(&self, reqs: &[DeleteRequest]) -> StoreResult<()> {
            self.calls().bulk_delete.push(reqs.to_vec());
            self.outcome()
        }

        fn as_transactional(&self) -> Option<&dyn TransactionalStore> {
            if self.transactional {
                Some(self)
            } else {
                None
            }
        }
    }

    #[async_trait]
    impl TransactionalStore for MockStore {
        async fn multi(&self, req: &TransactionalStateRequest) -> StoreResult<()> {
            self.calls().multi.push(req.clone());
            self.outcome()
        }
    }

    fn api(store: &Arc<MockStore>) -> StateApi {
        api_with(store, ApiConfig::default())
    }

    fn api_with(store: &Arc<MockStore>, config: ApiConfig) -> StateApi {
        let registry = StoreRegistry::builder()
            .register("mock", store.clone() as Arc<dyn Store>)
            .build();
        StateApi::new(Arc::new(registry), config)
    }

    fn unconfigured() -> StateApi {
        StateApi::new(Arc::new(StoreRegistry::empty()), ApiConfig::default())
    }

    fn net_error() -> StoreError {
        StoreError::backend("net error")
    }

    fn save(store_name: &str, states: Vec<StateItem>) -> SaveStateRequest {
        SaveStateRequest {
            store_name: store_name.into(),
            states,
        }
    }

    // -----------------------------------------------------------------------
    // Store resolution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn every_operation_reports_missing_configuration() {
        let api = unconfigured();
        let expected = "rpc error: code = FailedPrecondition desc = state store is not configured";

        let err = api.save_state(save("abc", vec![StateItem::new("k", "v")])).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api.get_state(GetStateRequest::new("abc", "k")).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .get_bulk_state(GetBulkStateRequest {
                store_name: "abc".into(),
                keys: vec!["k".into()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api.delete_state(DeleteStateRequest::new("abc", "k")).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .delete_bulk_state(DeleteBulkStateRequest {
                store_name: "abc".into(),
                states: vec![StateItem::key_only("k")],
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .execute_state_transaction(ExecuteStateTransactionRequest {
                store_name: "abc".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn every_operation_reports_unknown_store() {
        let store = Arc::new(MockStore::transactional());
        let api = api(&store);
        let expected = "rpc error: code = InvalidArgument desc = state store abc is not found";

        let err = api.save_state(save("abc", vec![StateItem::new("k", "v")])).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api.get_state(GetStateRequest::new("abc", "k")).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .get_bulk_state(GetBulkStateRequest {
                store_name: "abc".into(),
                keys: vec!["k".into()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api.delete_state(DeleteStateRequest::new("abc", "k")).await.unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .delete_bulk_state(DeleteBulkStateRequest {
                store_name: "abc".into(),
                states: vec![StateItem::key_only("k")],
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
        let err = api
            .execute_state_transaction(ExecuteStateTransactionRequest {
                store_name: "abc".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), expected);

        let calls = store.calls();
        assert!(calls.bulk_set.is_empty() && calls.get.is_empty() && calls.multi.is_empty());
    }

    // -----------------------------------------------------------------------
    // save_state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_passes_items_and_options_through() {
        let store = Arc::new(MockStore::default());
        let api = api(&store);

        let items = vec![
            StateItem::new("abc", "v1").with_options(Concurrency::LastWrite, Consistency::Eventual),
            StateItem::new("def", "v2")
                .with_etag("3")
                .with_options(Concurrency::FirstWrite, Consistency::Strong),
            StateItem::new("ghi", "v3"),
        ];
        api.save_state(save("mock", items)).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.bulk_set.len(), 1);
        let reqs = &calls.bulk_set[0];
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].key, "abc");
        assert_eq!(reqs[0].value, b"v1");
        assert_eq!(reqs[0].options.concurrency, "last-write");
        assert_eq!(reqs[0].options.consistency, "eventual");
        assert_eq!(reqs[1].etag.as_deref(), Some("3"));
        assert_eq!(reqs[1].options.concurrency, "first-write");
        assert_eq!(reqs[1].options.consistency, "strong");
        assert_eq!(reqs[2].options.concurrency, "");
        assert_eq!(reqs[2].options.consistency, "");
    }

    #[tokio::test]
    async fn save_wraps_backend_errors() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .save_state(save("mock", vec![StateItem::new("abc", "v")]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc error: code = Internal desc = failed saving state in state store mock: net error"
        );
    }

    #[tokio::test]
    async fn save_classifies_etag_errors() {
        let store = Arc::new(MockStore::failing(ETagError::invalid("bad").into()));
        let err = api(&store)
            .save_state(save("mock", vec![StateItem::new("abc", "v")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert_eq!(err.kind(), ErrorKind::ETagInvalid);

        let store = Arc::new(MockStore::failing(ETagError::mismatch("stale").into()));
        let err = api(&store)
            .save_state(save("mock", vec![StateItem::new("abc", "v")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);
    }

    #[tokio::test]
    async fn save_rejects_empty_item_list() {
        let store = Arc::new(MockStore::default());
        let err = api(&store).save_state(save("mock", vec![])).await.unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert_eq!(
            err.to_string(),
            "rpc error: code = InvalidArgument desc = no state items to save in state store mock"
        );
        assert!(store.calls().bulk_set.is_empty());
    }

    #[tokio::test]
    async fn save_rejects_reserved_separator_before_writing() {
        let store = Arc::new(MockStore::default());
        let items = vec![StateItem::new("ok", "v"), StateItem::new("bad||key", "v")];
        let err = api(&store).save_state(save("mock", items)).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidKey(_)));
        assert_eq!(err.to_string(), "input key/keyPrefix 'bad||key' can't contain '||'");
        assert!(store.calls().bulk_set.is_empty());
    }

    #[tokio::test]
    async fn save_namespaces_keys() {
        let store = Arc::new(MockStore::default());
        let config = ApiConfig {
            app_id: Some("checkout".into()),
            ..Default::default()
        };
        api_with(&store, config)
            .save_state(save("mock", vec![StateItem::new("abc", "v")]))
            .await
            .unwrap();
        assert_eq!(store.calls().bulk_set[0][0].key, "checkout||abc");

        let store = Arc::new(MockStore::default());
        let mut config = ApiConfig::default();
        config
            .key_prefixes
            .insert("mock".into(), KeyPrefixStrategy::StoreName);
        api_with(&store, config)
            .save_state(save("mock", vec![StateItem::new("abc", "v")]))
            .await
            .unwrap();
        assert_eq!(store.calls().bulk_set[0][0].key, "mock||abc");
    }

    // -----------------------------------------------------------------------
    // get_state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_rejects_reserved_separator() {
        let store = Arc::new(MockStore::default());
        let err = api(&store)
            .get_state(GetStateRequest::new("mock", "mykey||abc"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "input key/keyPrefix 'mykey||abc' can't contain '||'");
        assert!(store.calls().get.is_empty());
    }

    #[tokio::test]
    async fn get_wraps_backend_errors_as_internal() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .get_state(GetStateRequest::new("mock", "mykey"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc error: code = Internal desc = fail to get mykey from state store mock: net error"
        );

        let store = Arc::new(MockStore::failing(ETagError::mismatch("x").into()));
        let err = api(&store)
            .get_state(GetStateRequest::new("mock", "mykey"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Internal);
    }

    #[tokio::test]
    async fn get_returns_data_and_etag() {
        let store = Arc::new(MockStore {
            get_response: GetResponse {
                data: Some(b"test-data".to_vec()),
                etag: Some("etag".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        let mut req = GetStateRequest::new("mock", "mykey");
        req.consistency = Consistency::Strong;
        let resp = api(&store).get_state(req).await.unwrap();
        assert_eq!(resp.data, b"test-data");
        assert_eq!(resp.etag.as_deref(), Some("etag"));

        let calls = store.calls();
        assert_eq!(calls.get[0].key, "mykey");
        assert_eq!(calls.get[0].options.consistency, "strong");
    }

    #[tokio::test]
    async fn get_of_absent_key_is_empty() {
        let store = Arc::new(MockStore::default());
        let resp = api(&store)
            .get_state(GetStateRequest::new("mock", "missing"))
            .await
            .unwrap();
        assert!(resp.data.is_empty());
        assert!(resp.etag.is_none());
    }

    // -----------------------------------------------------------------------
    // get_bulk_state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn bulk_get_returns_errors_unwrapped() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .get_bulk_state(GetBulkStateRequest {
                store_name: "mock".into(),
                keys: vec!["mykey".into()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "net error");
        assert!(matches!(err, ApiError::Store(_)));
    }

    #[tokio::test]
    async fn bulk_get_restores_caller_keys() {
        let store = Arc::new(MockStore::default());
        let mut config = ApiConfig::default();
        config
            .key_prefixes
            .insert("mock".into(), KeyPrefixStrategy::StoreName);
        let resp = api_with(&store, config)
            .get_bulk_state(GetBulkStateRequest {
                store_name: "mock".into(),
                keys: vec!["good-key".into(), "other".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(store.calls().bulk_get[0][0].key, "mock||good-key");
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.items[0].key, "good-key");
        assert_eq!(resp.items[0].data, b"test-data");
        assert_eq!(resp.items[0].etag.as_deref(), Some("etag"));
        assert_eq!(resp.items[1].key, "other");
    }

    #[tokio::test]
    async fn bulk_get_of_no_keys_skips_backend() {
        let store = Arc::new(MockStore::failing(net_error()));
        let resp = api(&store)
            .get_bulk_state(GetBulkStateRequest {
                store_name: "mock".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(resp.items.is_empty());
        assert!(store.calls().bulk_get.is_empty());
    }

    // -----------------------------------------------------------------------
    // delete_state / delete_bulk_state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_passes_key_etag_and_options() {
        let store = Arc::new(MockStore::default());
        let mut req = DeleteStateRequest::new("mock", "abc");
        req.etag = Some("2".into());
        req.options = Some(StateOptions {
            concurrency: Concurrency::FirstWrite,
            consistency: Consistency::Unspecified,
        });
        api(&store).delete_state(req).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls.delete[0].key, "abc");
        assert_eq!(calls.delete[0].etag.as_deref(), Some("2"));
        assert_eq!(calls.delete[0].options.concurrency, "first-write");
        assert_eq!(calls.delete[0].options.consistency, "");
    }

    #[tokio::test]
    async fn delete_wraps_backend_errors() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .delete_state(DeleteStateRequest::new("mock", "abc"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc error: code = Internal desc = failed deleting state with key abc: net error"
        );

        let store = Arc::new(MockStore::failing(ETagError::mismatch("stale").into()));
        let err = api(&store)
            .delete_state(DeleteStateRequest::new("mock", "abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);
    }

    #[tokio::test]
    async fn bulk_delete_passes_items_through() {
        let store = Arc::new(MockStore::default());
        api(&store)
            .delete_bulk_state(DeleteBulkStateRequest {
                store_name: "mock".into(),
                states: vec![StateItem::key_only("abc"), StateItem::key_only("def").with_etag("1")],
            })
            .await
            .unwrap();

        let calls = store.calls();
        let reqs = &calls.bulk_delete[0];
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].key, "abc");
        assert_eq!(reqs[1].etag.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn bulk_delete_returns_errors_unwrapped() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .delete_bulk_state(DeleteBulkStateRequest {
                store_name: "mock".into(),
                states: vec![StateItem::key_only("abc")],
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "net error");
    }

    // -----------------------------------------------------------------------
    // execute_state_transaction
    // -----------------------------------------------------------------------

    fn transaction_request() -> ExecuteStateTransactionRequest {
        let mut metadata = Metadata::new();
        metadata.insert("runtime".into(), "mosn".into());
        ExecuteStateTransactionRequest {
            store_name: "mock".into(),
            operations: vec![
                TransactionalStateOperation::upsert(StateItem::new("upsert", "mock data")),
                TransactionalStateOperation::delete(StateItem::key_only("delete_abc")),
                TransactionalStateOperation {
                    operation_type: OperationType::Delete,
                    request: None,
                },
            ],
            metadata,
        }
    }

    #[tokio::test]
    async fn transaction_forwards_operations_in_order() {
        let store = Arc::new(MockStore::transactional());
        api(&store)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.multi.len(), 1);
        let tx = &calls.multi[0];
        assert_eq!(tx.operations.len(), 2);
        assert_eq!(tx.operations[0].operation(), OperationType::Upsert);
        assert_eq!(tx.operations[0].key(), "upsert");
        assert!(matches!(
            &tx.operations[0],
            TransactionalOperation::Upsert(r) if r.value == b"mock data"
        ));
        assert_eq!(tx.operations[1].operation(), OperationType::Delete);
        assert_eq!(tx.operations[1].key(), "delete_abc");
        assert_eq!(tx.metadata.get("runtime").map(String::as_str), Some("mosn"));
    }

    #[tokio::test]
    async fn transaction_can_reject_missing_payloads() {
        let store = Arc::new(MockStore::transactional());
        let config = ApiConfig {
            reject_missing_operation_payload: true,
            ..Default::default()
        };
        let err = api_with(&store, config)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::InvalidArgument);
        assert!(store.calls().multi.is_empty());
    }

    #[tokio::test]
    async fn transaction_wraps_backend_errors() {
        let store = Arc::new(MockStore::failing(net_error()));
        let err = api(&store)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc error: code = Internal desc = error while executing state transaction: net error"
        );

        let store = Arc::new(MockStore::failing(ETagError::mismatch("stale").into()));
        let err = api(&store)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);
    }

    #[tokio::test]
    async fn transaction_requires_advertised_capability() {
        // Implements the extension but does not advertise it.
        let store = Arc::new(MockStore {
            transactional: true,
            ..Default::default()
        });
        let err = api(&store)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc error: code = FailedPrecondition \
             desc = state store mock doesn't support transaction"
        );
        assert!(store.calls().multi.is_empty());

        // Advertises it but has no extension.
        let store = Arc::new(MockStore {
            features: vec![Feature::Transactional],
            ..Default::default()
        });
        let err = api(&store)
            .execute_state_transaction(transaction_request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityUnsupported);
    }

    #[tokio::test]
    async fn transaction_rejects_reserved_separator() {
        let store = Arc::new(MockStore::transactional());
        let req = ExecuteStateTransactionRequest {
            store_name: "mock".into(),
            operations: vec![TransactionalStateOperation::upsert(StateItem::new("a||b", "v"))],
            ..Default::default()
        };
        let err = api(&store).execute_state_transaction(req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidKey(_)));
        assert!(store.calls().multi.is_empty());
    }

    // -----------------------------------------------------------------------
    // Against the in-memory store
    // -----------------------------------------------------------------------

    fn memory_api() -> StateApi {
        let registry = StoreRegistry::builder()
            .register("mem", Arc::new(InMemoryStore::new()))
            .build();
        let config = ApiConfig {
            app_id: Some("app".into()),
            ..Default::default()
        };
        StateApi::new(Arc::new(registry), config)
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let api = memory_api();
        api.save_state(save("mem", vec![StateItem::new("k", "v").with_etag("1")]))
            .await
            .unwrap();

        let resp = api.get_state(GetStateRequest::new("mem", "k")).await.unwrap();
        assert_eq!(resp.data, b"v");
        assert_eq!(resp.etag.as_deref(), Some("1"));

        api.delete_state(DeleteStateRequest::new("mem", "k")).await.unwrap();
        let resp = api.get_state(GetStateRequest::new("mem", "k")).await.unwrap();
        assert!(resp.data.is_empty());

        // Deleting again succeeds.
        api.delete_state(DeleteStateRequest::new("mem", "k")).await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_transaction_mismatch_changes_nothing() {
        let api = memory_api();
        api.save_state(save(
            "mem",
            vec![StateItem::new("a", "1").with_etag("e1"), StateItem::new("b", "2")],
        ))
        .await
        .unwrap();

        let req = ExecuteStateTransactionRequest {
            store_name: "mem".into(),
            operations: vec![
                TransactionalStateOperation::upsert(StateItem::new("b", "changed")),
                TransactionalStateOperation::delete(StateItem::key_only("a").with_etag("stale")),
            ],
            ..Default::default()
        };
        let err = api.execute_state_transaction(req).await.unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);

        let resp = api
            .get_bulk_state(GetBulkStateRequest {
                store_name: "mem".into(),
                keys: vec!["a".into(), "b".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.items[0].key, "a");
        assert_eq!(resp.items[0].data, b"1");
        assert_eq!(resp.items[1].data, b"2");
    }

    #[tokio::test]
    async fn in_memory_transaction_applies_all() {
        let api = memory_api();
        api.save_state(save("mem", vec![StateItem::new("a", "1").with_etag("e1")]))
            .await
            .unwrap();

        let req = ExecuteStateTransactionRequest {
            store_name: "mem".into(),
            operations: vec![
                TransactionalStateOperation::upsert(StateItem::new("b", "2")),
                TransactionalStateOperation::delete(StateItem::key_only("a").with_etag("e1")),
            ],
            ..Default::default()
        };
        api.execute_state_transaction(req).await.unwrap();

        let a = api.get_state(GetStateRequest::new("mem", "a")).await.unwrap();
        let b = api.get_state(GetStateRequest::new("mem", "b")).await.unwrap();
        assert!(a.data.is_empty());
        assert_eq!(b.data, b"2");
    }
}
