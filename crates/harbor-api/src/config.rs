//! Runtime configuration: the state API switches and the configured stores.
//!
//! Loaded from TOML and validated on load: store names, every key prefix and
//! the app id.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use harbor_state::Metadata;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys::{validate_key, KeyPrefixStrategy};

/// Store kind for the built-in in-memory backend.
pub const IN_MEMORY_KIND: &str = "in-memory";

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Behaviour switches for the state API.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Application id used by the `appid` key prefix strategy.
    pub app_id: Option<String>,
    /// When `true`, a transaction operation without a payload is rejected
    /// instead of being dropped.
    pub reject_missing_operation_payload: bool,
    /// Strategy for stores without an entry in `key_prefixes`.
    pub default_key_prefix: KeyPrefixStrategy,
    /// Per-store key prefix strategies.
    pub key_prefixes: HashMap<String, KeyPrefixStrategy>,
}

impl ApiConfig {
    /// The key prefix strategy in effect for `store_name`.
    pub fn key_prefix(&self, store_name: &str) -> &KeyPrefixStrategy {
        self.key_prefixes
            .get(store_name)
            .unwrap_or(&self.default_key_prefix)
    }
}

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

/// One configured state store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub key_prefix: Option<KeyPrefixStrategy>,
    /// Passed to the backend's `init`.
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_kind() -> String {
    IN_MEMORY_KIND.to_string()
}

/// Top-level runtime configuration, usually loaded from TOML:
///
/// ```toml
/// [api]
/// app_id = "checkout"
///
/// [[stores]]
/// name = "orders"
/// kind = "in-memory"
/// key_prefix = "name"
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Store names must be non-empty and unique. The app id and every
    /// custom prefix must be usable as a key prefix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(app_id) = &self.api.app_id {
            validate_key(app_id).map_err(ConfigError::InvalidAppId)?;
        }
        self.api
            .default_key_prefix
            .validate()
            .map_err(ConfigError::InvalidDefaultKeyPrefix)?;
        for (store, prefix) in &self.api.key_prefixes {
            prefix.validate().map_err(|source| ConfigError::InvalidKeyPrefix {
                store: store.clone(),
                source,
            })?;
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.name.is_empty() {
                return Err(ConfigError::EmptyStoreName);
            }
            if !seen.insert(store.name.as_str()) {
                return Err(ConfigError::DuplicateStore(store.name.clone()));
            }
            if let Some(prefix) = &store.key_prefix {
                prefix.validate().map_err(|source| ConfigError::InvalidKeyPrefix {
                    store: store.name.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// The API config with per-store key prefixes folded in.
    pub fn api_config(&self) -> ApiConfig {
        let mut api = self.api.clone();
        for store in &self.stores {
            if let Some(prefix) = &store.key_prefix {
                api.key_prefixes.insert(store.name.clone(), prefix.clone());
            }
        }
        api
    }
}
