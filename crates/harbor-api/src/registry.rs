//! The name → backend mapping handed to the state API.
//!
//! A [`StoreRegistry`] is assembled once during process wiring through a
//! [`StoreRegistryBuilder`] and is immutable afterwards, so lookups need no
//! synchronization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use harbor_state::Store;

/// Immutable set of named state stores.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<String, Arc<dyn Store>>,
}

impl StoreRegistry {
    /// A registry with no stores configured.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> StoreRegistryBuilder {
        StoreRegistryBuilder::default()
    }

    /// Look up a store by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Store>> {
        self.stores.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Registered store names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}

/// Collects stores before freezing them into a [`StoreRegistry`].
#[derive(Default)]
pub struct StoreRegistryBuilder {
    stores: HashMap<String, Arc<dyn Store>>,
}

impl StoreRegistryBuilder {
    /// Register `store` under `name`. A later registration with the same
    /// name replaces the earlier one.
    pub fn register(mut self, name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn build(self) -> StoreRegistry {
        StoreRegistry {
            stores: self.stores,
        }
    }
}
