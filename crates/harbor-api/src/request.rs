//! Caller-facing request and response types of the state API.
//!
//! These are transport-agnostic: a gRPC or HTTP front end converts its own
//! messages into these before calling [`crate::StateApi`].

use harbor_state::{Metadata, OperationType, EVENTUAL, FIRST_WRITE, LAST_WRITE, STRONG};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Concurrency mode requested for a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Concurrency {
    #[default]
    Unspecified,
    FirstWrite,
    LastWrite,
}

impl Concurrency {
    /// Backend vocabulary; unspecified is the empty string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::FirstWrite => FIRST_WRITE,
            Self::LastWrite => LAST_WRITE,
        }
    }
}

/// Consistency level requested for a read or write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Consistency {
    #[default]
    Unspecified,
    Eventual,
    Strong,
}

impl Consistency {
    /// Backend vocabulary; unspecified is the empty string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Eventual => EVENTUAL,
            Self::Strong => STRONG,
        }
    }
}

/// Per-item concurrency and consistency hints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOptions {
    #[serde(default)]
    pub concurrency: Concurrency,
    #[serde(default)]
    pub consistency: Consistency,
}

// ---------------------------------------------------------------------------
// StateItem
// ---------------------------------------------------------------------------

/// A key/value pair with optional etag, options, and metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateItem {
    pub key: String,
    pub value: Vec<u8>,
    pub etag: Option<String>,
    pub options: Option<StateOptions>,
    pub metadata: Metadata,
}

impl StateItem {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// An item carrying only a key, as used by deletes.
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_options(mut self, concurrency: Concurrency, consistency: Consistency) -> Self {
        self.options = Some(StateOptions {
            concurrency,
            consistency,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct SaveStateRequest {
    pub store_name: String,
    pub states: Vec<StateItem>,
}

#[derive(Clone, Debug, Default)]
pub struct GetStateRequest {
    pub store_name: String,
    pub key: String,
    pub consistency: Consistency,
    pub metadata: Metadata,
}

impl GetStateRequest {
    pub fn new(store_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            key: key.into(),
            ..Default::default()
        }
    }
}

/// A single read result. `data` is empty when the key is absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetStateResponse {
    pub data: Vec<u8>,
    pub etag: Option<String>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Default)]
pub struct GetBulkStateRequest {
    pub store_name: String,
    pub keys: Vec<String>,
    pub metadata: Metadata,
}

/// One entry of a bulk read, keyed by the caller's original key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkStateItem {
    pub key: String,
    pub data: Vec<u8>,
    pub etag: Option<String>,
    pub metadata: Metadata,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetBulkStateResponse {
    pub items: Vec<BulkStateItem>,
}

#[derive(Clone, Debug, Default)]
pub struct DeleteStateRequest {
    pub store_name: String,
    pub key: String,
    pub etag: Option<String>,
    pub options: Option<StateOptions>,
    pub metadata: Metadata,
}

impl DeleteStateRequest {
    pub fn new(store_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            key: key.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeleteBulkStateRequest {
    pub store_name: String,
    pub states: Vec<StateItem>,
}

/// One entry of a transaction request. The payload may be absent; see
/// [`crate::ApiConfig::reject_missing_operation_payload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionalStateOperation {
    pub operation_type: OperationType,
    pub request: Option<StateItem>,
}

impl TransactionalStateOperation {
    pub fn upsert(item: StateItem) -> Self {
        Self {
            operation_type: OperationType::Upsert,
            request: Some(item),
        }
    }

    pub fn delete(item: StateItem) -> Self {
        Self {
            operation_type: OperationType::Delete,
            request: Some(item),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExecuteStateTransactionRequest {
    pub store_name: String,
    pub operations: Vec<TransactionalStateOperation>,
    pub metadata: Metadata,
}
