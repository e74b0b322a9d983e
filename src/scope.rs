//! Scope decorators
//!
//! A scope decides how instances are reused across resolutions. It is applied
//! by wrapping a binding's provider in a decorator produced by the
//! [`ScopeFactory`] registered under the scope's name. Dependencies and static
//! injection always come from the undecorated provider, so scoping never
//! changes the dependency graph and never skips static members.

use crate::annotation::{Annotation, SINGLETON};
use crate::component::ComponentRef;
use crate::context::Context;
use crate::provider::{ComponentProvider, Instance};
use crate::Result;
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::trace;

/// Reuse policy attached to a binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// New instance per resolution
    #[default]
    Unscoped,
    /// One instance for the lifetime of the binding
    Singleton,
    /// Decorated by the factory registered under this name
    Custom(String),
}

impl Scope {
    /// Scope selected by a scope marker annotation
    pub fn from_annotation(annotation: &Annotation) -> Self {
        if annotation.name() == SINGLETON {
            Scope::Singleton
        } else {
            Scope::Custom(annotation.name().to_string())
        }
    }

    /// Name the decorator factory is registered under
    pub fn name(&self) -> Option<&str> {
        match self {
            Scope::Unscoped => None,
            Scope::Singleton => Some(SINGLETON),
            Scope::Custom(name) => Some(name),
        }
    }

    #[inline]
    pub fn is_unscoped(&self) -> bool {
        matches!(self, Scope::Unscoped)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Unscoped => f.write_str("Unscoped"),
            Scope::Singleton => f.write_str(SINGLETON),
            Scope::Custom(name) => f.write_str(name),
        }
    }
}

/// Wraps a provider in a scope decorator
pub type ScopeFactory =
    Arc<dyn Fn(Box<dyn ComponentProvider>) -> Box<dyn ComponentProvider> + Send + Sync>;

/// Scope name to decorator factory, with the singleton scope pre-registered
pub(crate) struct ScopeRegistry {
    factories: DashMap<String, ScopeFactory, RandomState>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        let factories = DashMap::with_hasher(RandomState::new());
        let singleton: ScopeFactory =
            Arc::new(|provider: Box<dyn ComponentProvider>| -> Box<dyn ComponentProvider> {
                Box::new(SingletonProvider::new(provider))
            });
        factories.insert(SINGLETON.to_string(), singleton);
        Self { factories }
    }

    pub fn register(&self, name: String, factory: ScopeFactory) {
        self.factories.insert(name, factory);
    }

    /// Apply the decorator for `scope`; `None` when no factory is registered
    pub fn decorate(
        &self,
        scope: &Scope,
        provider: Box<dyn ComponentProvider>,
    ) -> Option<Box<dyn ComponentProvider>> {
        let Some(name) = scope.name() else {
            return Some(provider);
        };
        let factory = self.factories.get(name).map(|f| Arc::clone(f.value()))?;

        let undecorated: Arc<dyn ComponentProvider> = Arc::from(provider);
        let scoped = factory(Box::new(Arc::clone(&undecorated)));
        Some(Box::new(ScopedProvider {
            scoped,
            undecorated,
        }))
    }
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("ScopeRegistry").field("scopes", &scopes).finish()
    }
}

/// A scope decorator together with the provider it decorates
struct ScopedProvider {
    scoped: Box<dyn ComponentProvider>,
    undecorated: Arc<dyn ComponentProvider>,
}

impl ComponentProvider for ScopedProvider {
    #[inline]
    fn get(&self, context: &Context) -> Result<Instance> {
        self.scoped.get(context)
    }

    #[inline]
    fn statics(&self, context: &Context) -> Result<()> {
        self.undecorated.statics(context)
    }

    #[inline]
    fn dependencies(&self) -> Vec<ComponentRef> {
        self.undecorated.dependencies()
    }
}

/// Materialized singletons, keyed by singleton provider
///
/// Shared by a configuration and every context built from it, so a singleton
/// outlives the context that first resolved it. Providers only hold the key:
/// deferred handles keep the binding table alive without owning the instances
/// cached here.
pub(crate) struct SingletonCache {
    slots: DashMap<u64, Arc<OnceCell<Instance>>, RandomState>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Slot for singleton `id`, created empty on first use
    pub fn slot(&self, id: u64) -> Arc<OnceCell<Instance>> {
        // clone out so the shard lock is not held while the instance is built
        Arc::clone(self.slots.entry(id).or_default().value())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for SingletonCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonCache")
            .field("slots", &self.len())
            .finish()
    }
}

static NEXT_SINGLETON: AtomicU64 = AtomicU64::new(0);

/// Hands out one instance per configuration
///
/// The instance lives in the [`SingletonCache`] of the context it is resolved
/// through, which every context of the same configuration shares.
/// Materialization is atomic: concurrent first resolutions all observe the
/// one instance that won.
pub struct SingletonProvider {
    id: u64,
    inner: Box<dyn ComponentProvider>,
}

impl SingletonProvider {
    pub fn new(inner: Box<dyn ComponentProvider>) -> Self {
        Self {
            id: NEXT_SINGLETON.fetch_add(1, Ordering::Relaxed),
            inner,
        }
    }
}

impl ComponentProvider for SingletonProvider {
    fn get(&self, context: &Context) -> Result<Instance> {
        context
            .singleton(self.id)
            .get_or_try_init(|| {
                #[cfg(feature = "logging")]
                trace!(target: "inject_context", singleton = self.id, "Materializing singleton");

                self.inner.get(context)
            })
            .cloned()
    }

    #[inline]
    fn statics(&self, context: &Context) -> Result<()> {
        self.inner.statics(context)
    }

    #[inline]
    fn dependencies(&self) -> Vec<ComponentRef> {
        self.inner.dependencies()
    }
}

impl fmt::Debug for SingletonProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonProvider")
            .field("id", &self.id)
            .finish()
    }
}
