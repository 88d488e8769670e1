//! Request and response types shared by every state store backend.
//!
//! These are the backend-facing shapes: concurrency and consistency hints
//! travel as plain strings so that a backend can interpret (or ignore) them
//! in its own vocabulary.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, backend-specific key/value pairs passed through untouched.
pub type Metadata = HashMap<String, String>;

/// Concurrency hint: the first writer wins, later writers must present an etag.
pub const FIRST_WRITE: &str = "first-write";
/// Concurrency hint: the last writer wins.
pub const LAST_WRITE: &str = "last-write";
/// Consistency hint: reads and writes are strongly consistent.
pub const STRONG: &str = "strong";
/// Consistency hint: eventual consistency is acceptable.
pub const EVENTUAL: &str = "eventual";

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// A capability a backend declares support for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    /// The backend honours etags for optimistic concurrency.
    ETag,
    /// The backend implements atomic multi-operation transactions.
    Transactional,
}

impl Feature {
    /// Returns `true` if this feature appears in `features`.
    pub fn is_present(&self, features: &[Feature]) -> bool {
        features.contains(self)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ETag => write!(f, "ETAG"),
            Self::Transactional => write!(f, "TRANSACTIONAL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Concurrency and consistency hints in backend vocabulary.
///
/// An empty string means "unspecified": the backend applies its default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateOptions {
    pub concurrency: String,
    pub consistency: String,
}

/// Write a single value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetRequest {
    pub key: String,
    pub value: Vec<u8>,
    pub etag: Option<String>,
    pub metadata: Metadata,
    pub options: StateOptions,
}

impl SetRequest {
    /// A plain write with no etag, metadata, or options.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Attach an etag to this write.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Read a single value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetRequest {
    pub key: String,
    pub metadata: Metadata,
    pub options: StateOptions,
}

impl GetRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }
}

/// Delete a single value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
    pub etag: Option<String>,
    pub metadata: Metadata,
    pub options: StateOptions,
}

impl DeleteRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Attach an etag to this delete.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a single read. `data` is `None` when the key is unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub data: Option<Vec<u8>>,
    pub etag: Option<String>,
    pub metadata: Metadata,
}

/// One entry of a bulk read, in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkGetResponse {
    pub key: String,
    pub data: Option<Vec<u8>>,
    pub etag: Option<String>,
    pub metadata: Metadata,
    /// Per-key failure reported by backends that read keys independently.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// The kind of a transactional operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Upsert,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation inside an atomic transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionalOperation {
    Upsert(SetRequest),
    Delete(DeleteRequest),
}

impl TransactionalOperation {
    pub fn operation(&self) -> OperationType {
        match self {
            Self::Upsert(_) => OperationType::Upsert,
            Self::Delete(_) => OperationType::Delete,
        }
    }

    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert(req) => &req.key,
            Self::Delete(req) => &req.key,
        }
    }

    /// The etag this operation must match, if any.
    pub fn etag(&self) -> Option<&str> {
        match self {
            Self::Upsert(req) => req.etag.as_deref(),
            Self::Delete(req) => req.etag.as_deref(),
        }
    }
}

/// A batch of operations to apply atomically against one store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionalStateRequest {
    pub operations: Vec<TransactionalOperation>,
    pub metadata: Metadata,
}
