//! Error types reported by state store backends.

use std::fmt;

use thiserror::Error;

/// The two etag failure kinds a backend can signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ETagErrorKind {
    /// The supplied etag is malformed or unusable by the backend.
    Invalid,
    /// The supplied etag does not match the stored version.
    Mismatch,
}

impl fmt::Display for ETagErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "invalid etag value",
            Self::Mismatch => "possible etag mismatch. error from state store",
        })
    }
}

/// An etag failure, optionally carrying the backend's own explanation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}{}", cause_suffix(.cause))]
pub struct ETagError {
    kind: ETagErrorKind,
    cause: Option<String>,
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause.as_deref().map(|c| format!(": {c}")).unwrap_or_default()
}

impl ETagError {
    pub fn new(kind: ETagErrorKind, cause: Option<String>) -> Self {
        Self { kind, cause }
    }

    pub fn invalid(cause: impl Into<String>) -> Self {
        Self::new(ETagErrorKind::Invalid, Some(cause.into()))
    }

    pub fn mismatch(cause: impl Into<String>) -> Self {
        Self::new(ETagErrorKind::Mismatch, Some(cause.into()))
    }

    pub fn kind(&self) -> ETagErrorKind {
        self.kind
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

/// Errors that can occur during state store operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An etag check failed.
    #[error(transparent)]
    ETag(#[from] ETagError),

    /// Any other backend failure. The message is the backend's cause string.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Create an opaque backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// The etag kind, if this is an etag failure.
    pub fn etag_kind(&self) -> Option<ETagErrorKind> {
        match self {
            Self::ETag(e) => Some(e.kind()),
            Self::Backend(_) => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etag_messages_without_cause() {
        let invalid = ETagError::new(ETagErrorKind::Invalid, None);
        assert_eq!(invalid.to_string(), "invalid etag value");

        let mismatch = ETagError::new(ETagErrorKind::Mismatch, None);
        assert_eq!(
            mismatch.to_string(),
            "possible etag mismatch. error from state store"
        );
    }

    #[test]
    fn etag_messages_with_cause() {
        let err = ETagError::mismatch("etag does not match for key k");
        assert_eq!(
            err.to_string(),
            "possible etag mismatch. error from state store: etag does not match for key k"
        );
        assert_eq!(err.cause(), Some("etag does not match for key k"));
    }

    #[test]
    fn etag_error_is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(ETagError::invalid("bad"));
        assert_eq!(err.to_string(), "invalid etag value: bad");
        assert!(err.source().is_none());
    }

    #[test]
    fn backend_error_displays_cause_verbatim() {
        let err = StoreError::backend("net error");
        assert_eq!(err.to_string(), "net error");
        assert_eq!(err.etag_kind(), None);
    }

    #[test]
    fn store_error_from_etag_error() {
        let err: StoreError = ETagError::invalid("bad").into();
        assert_eq!(err.etag_kind(), Some(ETagErrorKind::Invalid));
        assert_eq!(err.to_string(), "invalid etag value: bad");
    }
}
