//! State store capability contract for Harbor.
//!
//! Harbor fronts many interchangeable key/value backends with one state API.
//! This crate defines what a backend must provide and what it may optionally
//! provide:
//!
//! - **Required**: init, feature discovery, get/set/delete and their bulk
//!   variants (bulk variants default to sequential, fail-fast application).
//! - **Optional**: atomic multi-operation transactions, advertised through
//!   [`Feature::Transactional`] and exposed via [`Store::as_transactional`].
//!
//! # Modules
//!
//! - [`error`]: [`StoreError`] and the etag failure kinds
//! - [`types`]: backend request/response types and [`Feature`]
//! - [`traits`]: the [`Store`] and [`TransactionalStore`] traits
//! - [`memory`]: [`InMemoryStore`], the reference backend

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{ETagError, ETagErrorKind, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{Store, TransactionalStore};
pub use types::{
    BulkGetResponse, DeleteRequest, Feature, GetRequest, GetResponse, Metadata, OperationType,
    SetRequest, StateOptions, TransactionalOperation, TransactionalStateRequest, EVENTUAL,
    FIRST_WRITE, LAST_WRITE, STRONG,
};
