//! Harbor state API.
//!
//! [`StateApi`] is the entry point a sidecar front end calls into. It looks up
//! the named store in a [`StoreRegistry`], namespaces keys according to the
//! store's [`KeyPrefixStrategy`], forwards the request, and classifies
//! failures into [`ApiError`]s that carry an RPC [`StatusCode`].
//!
//! # Modules
//!
//! - [`dispatcher`]: [`StateApi`] and its six operations
//! - [`request`]: caller-facing request and response types
//! - [`registry`]: the immutable name → store mapping
//! - [`keys`]: key validation and prefix strategies
//! - [`config`]: TOML runtime configuration
//! - [`error`]: error taxonomy and status mapping

pub mod config;
mod convert;
pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod registry;
pub mod request;

pub use config::{ApiConfig, RuntimeConfig, StoreConfig, IN_MEMORY_KIND};
pub use dispatcher::StateApi;
pub use error::{ApiError, ApiResult, ConfigError, ErrorKind, StatusCode};
pub use keys::{modified_key, original_key, validate_key, KeyError, KeyPrefixStrategy, SEPARATOR};
pub use registry::{StoreRegistry, StoreRegistryBuilder};
pub use request::{
    BulkStateItem, Concurrency, Consistency, DeleteBulkStateRequest, DeleteStateRequest,
    ExecuteStateTransactionRequest, GetBulkStateRequest, GetBulkStateResponse, GetStateRequest,
    GetStateResponse, SaveStateRequest, StateItem, StateOptions, TransactionalStateOperation,
};
