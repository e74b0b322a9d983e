//! Concurrent storage for bindings
//!
//! Uses DashMap for lock-free concurrent registration. Contexts never read
//! from it directly; they take a [`snapshot`](BindingStorage::snapshot).

use crate::component::Component;
use crate::provider::ComponentProvider;
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to a bound provider
pub(crate) type SharedProvider = Arc<dyn ComponentProvider>;

/// Frozen binding table owned by a context
pub(crate) type Bindings = HashMap<Component, SharedProvider, RandomState>;

/// Thread-safe map from binding key to provider
pub(crate) struct BindingStorage {
    providers: DashMap<Component, SharedProvider, RandomState>,
}

impl BindingStorage {
    /// Create new empty storage.
    ///
    /// 8 shards; configurations rarely hold more than a few dozen bindings.
    #[inline]
    pub fn new() -> Self {
        Self {
            providers: DashMap::with_capacity_and_hasher_and_shard_amount(
                0,
                RandomState::new(),
                8,
            ),
        }
    }

    /// Insert or replace a binding, returning the previous provider
    #[inline]
    pub fn insert(&self, component: Component, provider: SharedProvider) -> Option<SharedProvider> {
        self.providers.insert(component, provider)
    }

    #[inline]
    pub fn contains(&self, component: &Component) -> bool {
        self.providers.contains_key(component)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Copy of the current table; later inserts do not show up in it
    pub fn snapshot(&self) -> Bindings {
        let mut bindings =
            HashMap::with_capacity_and_hasher(self.providers.len(), RandomState::new());
        for entry in self.providers.iter() {
            bindings.insert(entry.key().clone(), Arc::clone(entry.value()));
        }
        bindings
    }
}

impl Default for BindingStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingStorage")
            .field("count", &self.len())
            .finish()
    }
}
