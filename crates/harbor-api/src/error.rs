//! Error taxonomy of the state API and its mapping to RPC status codes.
//!
//! Three shapes reach a caller:
//!
//! - [`ApiError::Status`]: a status-classed error, rendered as
//!   `rpc error: code = <Code> desc = <message>`;
//! - [`ApiError::InvalidKey`]: a malformed key, rendered as the plain
//!   validation message;
//! - [`ApiError::Store`]: a backend error returned verbatim by the bulk
//!   get/delete operations.

use std::fmt;
use std::path::PathBuf;

use harbor_state::{ETagErrorKind, StoreError};
use thiserror::Error;

use crate::keys::KeyError;

/// RPC status classes produced by the state API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    InvalidArgument,
    FailedPrecondition,
    Aborted,
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl From<StatusCode> for tonic::Code {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::InvalidArgument => tonic::Code::InvalidArgument,
            StatusCode::FailedPrecondition => tonic::Code::FailedPrecondition,
            StatusCode::Aborted => tonic::Code::Aborted,
            StatusCode::Internal => tonic::Code::Internal,
        }
    }
}

/// What went wrong, independent of how it is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No state store is configured at all.
    Configuration,
    /// The named state store does not exist.
    StoreNotFound,
    /// The request itself is malformed.
    Validation,
    /// The store lacks a capability the operation needs.
    CapabilityUnsupported,
    /// The backend rejected a malformed etag.
    ETagInvalid,
    /// The backend reported an etag mismatch.
    ETagMismatch,
    /// Any other backend failure.
    Backend,
}

impl ErrorKind {
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Configuration | Self::CapabilityUnsupported => StatusCode::FailedPrecondition,
            Self::StoreNotFound | Self::Validation | Self::ETagInvalid => {
                StatusCode::InvalidArgument
            }
            Self::ETagMismatch => StatusCode::Aborted,
            Self::Backend => StatusCode::Internal,
        }
    }

    /// Classify a backend error by its etag kind.
    pub fn of_store_error(err: &StoreError) -> Self {
        match err.etag_kind() {
            Some(ETagErrorKind::Invalid) => Self::ETagInvalid,
            Some(ETagErrorKind::Mismatch) => Self::ETagMismatch,
            None => Self::Backend,
        }
    }
}

/// Errors returned by the state API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rpc error: code = {} desc = {message}", .kind.code())]
    Status { kind: ErrorKind, message: String },

    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// A status error whose code follows from `kind`.
    pub fn status(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Status {
            kind,
            message: message.into(),
        }
    }

    pub fn not_configured() -> Self {
        Self::status(ErrorKind::Configuration, "state store is not configured")
    }

    pub fn store_not_found(store_name: &str) -> Self {
        Self::status(
            ErrorKind::StoreNotFound,
            format!("state store {store_name} is not found"),
        )
    }

    pub fn transaction_unsupported(store_name: &str) -> Self {
        Self::status(
            ErrorKind::CapabilityUnsupported,
            format!("state store {store_name} doesn't support transaction"),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::status(ErrorKind::Validation, message)
    }

    /// Wrap a backend error with operation context. Etag failures keep
    /// their own class; everything else is `Internal`.
    pub fn from_store(err: &StoreError, context: impl fmt::Display) -> Self {
        Self::status(ErrorKind::of_store_error(err), format!("{context}: {err}"))
    }

    /// Wrap a backend error as `Internal` regardless of its kind.
    pub fn internal(err: &StoreError, context: impl fmt::Display) -> Self {
        Self::status(ErrorKind::Backend, format!("{context}: {err}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { kind, .. } => *kind,
            Self::InvalidKey(_) => ErrorKind::Validation,
            Self::Store(err) => ErrorKind::of_store_error(err),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.kind().code()
    }
}

impl From<ApiError> for tonic::Status {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { kind, message } => tonic::Status::new(kind.code().into(), message),
            other => tonic::Status::new(other.code().into(), other.to_string()),
        }
    }
}

/// Result alias for state API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors from loading or validating runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("state store name must not be empty")]
    EmptyStoreName,

    #[error("duplicate state store name: {0}")]
    DuplicateStore(String),

    #[error("invalid app id: {0}")]
    InvalidAppId(#[source] KeyError),

    #[error("invalid default key prefix: {0}")]
    InvalidDefaultKeyPrefix(#[source] KeyError),

    #[error("invalid key prefix for state store {store}: {source}")]
    InvalidKeyPrefix {
        store: String,
        #[source]
        source: KeyError,
    },
}
