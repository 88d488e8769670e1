//! JSON scripts replayed by `harbor run`.
//!
//! A script is an array of steps tagged by `op`:
//!
//! ```json
//! [
//!   {"op": "save", "store": "orders", "items": [{"key": "a", "value": "1", "etag": "e1"}]},
//!   {"op": "get", "store": "orders", "key": "a", "consistency": "strong"},
//!   {"op": "transaction", "store": "orders", "operations": [
//!     {"operation": "delete", "request": {"key": "a", "etag": "e1"}}
//!   ]}
//! ]
//! ```
//!
//! Values are UTF-8 strings in the script and raw bytes in the state API.

use std::path::Path;

use anyhow::Context;
use harbor_api::{
    Consistency, DeleteBulkStateRequest, DeleteStateRequest, ExecuteStateTransactionRequest,
    GetBulkStateRequest, GetStateRequest, SaveStateRequest, StateItem, StateOptions,
    TransactionalStateOperation,
};
use harbor_state::{Metadata, OperationType};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    Save {
        store: String,
        items: Vec<ScriptItem>,
    },
    Get {
        store: String,
        key: String,
        #[serde(default)]
        consistency: Consistency,
        #[serde(default)]
        metadata: Metadata,
    },
    GetBulk {
        store: String,
        keys: Vec<String>,
        #[serde(default)]
        metadata: Metadata,
    },
    Delete {
        store: String,
        key: String,
        #[serde(default)]
        etag: Option<String>,
        #[serde(default)]
        options: Option<StateOptions>,
        #[serde(default)]
        metadata: Metadata,
    },
    DeleteBulk {
        store: String,
        items: Vec<ScriptItem>,
    },
    Transaction {
        store: String,
        operations: Vec<ScriptOperation>,
        #[serde(default)]
        metadata: Metadata,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Save { .. } => "save",
            Self::Get { .. } => "get",
            Self::GetBulk { .. } => "get-bulk",
            Self::Delete { .. } => "delete",
            Self::DeleteBulk { .. } => "delete-bulk",
            Self::Transaction { .. } => "transaction",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptItem {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub options: Option<StateOptions>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<ScriptItem> for StateItem {
    fn from(item: ScriptItem) -> Self {
        Self {
            key: item.key,
            value: item.value.into_bytes(),
            etag: item.etag,
            options: item.options,
            metadata: item.metadata,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptOperation {
    pub operation: OperationType,
    #[serde(default)]
    pub request: Option<ScriptItem>,
}

impl From<ScriptOperation> for TransactionalStateOperation {
    fn from(op: ScriptOperation) -> Self {
        Self {
            operation_type: op.operation,
            request: op.request.map(StateItem::from),
        }
    }
}

pub fn parse(source: &str) -> anyhow::Result<Vec<Step>> {
    serde_json::from_str(source).context("invalid script")
}

pub fn load(path: &Path) -> anyhow::Result<Vec<Step>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse(&source).with_context(|| format!("in {}", path.display()))
}

fn items(items: Vec<ScriptItem>) -> Vec<StateItem> {
    items.into_iter().map(StateItem::from).collect()
}

pub fn save_request(store: String, list: Vec<ScriptItem>) -> SaveStateRequest {
    SaveStateRequest {
        store_name: store,
        states: items(list),
    }
}

pub fn get_request(
    store: String,
    key: String,
    consistency: Consistency,
    metadata: Metadata,
) -> GetStateRequest {
    GetStateRequest {
        store_name: store,
        key,
        consistency,
        metadata,
    }
}

pub fn get_bulk_request(
    store: String,
    keys: Vec<String>,
    metadata: Metadata,
) -> GetBulkStateRequest {
    GetBulkStateRequest {
        store_name: store,
        keys,
        metadata,
    }
}

pub fn delete_request(
    store: String,
    key: String,
    etag: Option<String>,
    options: Option<StateOptions>,
    metadata: Metadata,
) -> DeleteStateRequest {
    DeleteStateRequest {
        store_name: store,
        key,
        etag,
        options,
        metadata,
    }
}

pub fn delete_bulk_request(store: String, list: Vec<ScriptItem>) -> DeleteBulkStateRequest {
    DeleteBulkStateRequest {
        store_name: store,
        states: items(list),
    }
}

pub fn transaction_request(
    store: String,
    operations: Vec<ScriptOperation>,
    metadata: Metadata,
) -> ExecuteStateTransactionRequest {
    ExecuteStateTransactionRequest {
        store_name: store,
        operations: operations.into_iter().map(Into::into).collect(),
        metadata,
    }
}
