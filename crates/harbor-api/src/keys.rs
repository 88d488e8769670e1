//! State key rules: validation and namespacing.
//!
//! A caller's key is namespaced before it reaches a backend so that several
//! applications (or several logical stores) can share one physical backend.
//! The namespaced form is `<prefix>||<key>`, which is why `||` is reserved:
//!
//! | Strategy | Stored key |
//! |---|---|
//! | `none` | `key` |
//! | `appid` (default) | `app-id||key`, or `key` when no app id is set |
//! | `name` | `store-name||key` |
//! | anything else | `that-string||key` |

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reserved separator between a key prefix and the caller's key.
pub const SEPARATOR: &str = "||";

/// A key (or key prefix) that cannot be used.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("input key/keyPrefix '{0}' can't contain '||'")]
    ContainsSeparator(String),

    #[error("input key/keyPrefix can't be empty")]
    Empty,
}

/// How keys of one store are namespaced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyPrefixStrategy {
    /// Keys are stored as given.
    None,
    /// Keys are prefixed with the application id.
    #[default]
    AppId,
    /// Keys are prefixed with the store name.
    StoreName,
    /// Keys are prefixed with a fixed string.
    Custom(String),
}

impl From<String> for KeyPrefixStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "none" => Self::None,
            "appid" => Self::AppId,
            "name" => Self::StoreName,
            _ => Self::Custom(s),
        }
    }
}

impl From<KeyPrefixStrategy> for String {
    fn from(strategy: KeyPrefixStrategy) -> Self {
        strategy.to_string()
    }
}

impl fmt::Display for KeyPrefixStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::AppId => f.write_str("appid"),
            Self::StoreName => f.write_str("name"),
            Self::Custom(prefix) => f.write_str(prefix),
        }
    }
}

impl KeyPrefixStrategy {
    /// Reject custom prefixes that could not be stripped again.
    pub fn validate(&self) -> Result<(), KeyError> {
        match self {
            Self::Custom(prefix) => validate_key(prefix),
            _ => Ok(()),
        }
    }
}

/// Check that `key` is usable as a state key.
pub fn validate_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.contains(SEPARATOR) {
        return Err(KeyError::ContainsSeparator(key.to_string()));
    }
    Ok(())
}

/// Translate a caller key into the key stored in the backend.
pub fn modified_key(
    key: &str,
    store_name: &str,
    app_id: Option<&str>,
    strategy: &KeyPrefixStrategy,
) -> Result<String, KeyError> {
    validate_key(key)?;
    let prefix = match strategy {
        KeyPrefixStrategy::None => return Ok(key.to_string()),
        KeyPrefixStrategy::AppId => match app_id {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(key.to_string()),
        },
        KeyPrefixStrategy::StoreName => store_name,
        KeyPrefixStrategy::Custom(prefix) => prefix.as_str(),
    };
    validate_key(prefix)?;
    Ok(format!("{prefix}{SEPARATOR}{key}"))
}

/// Recover the caller key from a stored key.
pub fn original_key(key: &str) -> &str {
    key.split_once(SEPARATOR).map_or(key, |(_, rest)| rest)
}
