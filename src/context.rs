//! Resolution context
//!
//! A [`Context`] is the validated, read-only view of a configuration at the
//! moment [`ContextConfig::get_context`](crate::ContextConfig::get_context)
//! was called. It is cheap to clone and safe to share across threads.
//! Singletons are shared with every other context of the same configuration.

use crate::annotation::Annotation;
use crate::component::{Component, ComponentRef, Wrapper};
use crate::provider::{AnyProvider, Instance, Provider, Resolved};
use crate::scope::SingletonCache;
use crate::storage::Bindings;
use crate::{DiError, Result};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::trace;

/// Validated resolver over a snapshot of bindings
#[derive(Clone)]
pub struct Context {
    bindings: Arc<Bindings>,
    singletons: Arc<SingletonCache>,
}

/// The part of a context a deferred handle keeps
///
/// The binding table is held strongly, so a handle keeps working after the
/// context that issued it is dropped. The singleton cache is held weakly
/// because cached singletons may themselves own handles.
#[derive(Clone)]
pub(crate) struct DetachedContext {
    bindings: Arc<Bindings>,
    singletons: Weak<SingletonCache>,
}

impl DetachedContext {
    /// `None` once the configuration and all its contexts are gone
    pub fn attach(&self) -> Option<Context> {
        self.singletons.upgrade().map(|singletons| Context {
            bindings: Arc::clone(&self.bindings),
            singletons,
        })
    }
}

impl Context {
    pub(crate) fn new(bindings: Bindings, singletons: Arc<SingletonCache>) -> Self {
        Self {
            bindings: Arc::new(bindings),
            singletons,
        }
    }

    pub(crate) fn detach(&self) -> DetachedContext {
        DetachedContext {
            bindings: Arc::clone(&self.bindings),
            singletons: Arc::downgrade(&self.singletons),
        }
    }

    /// Cache slot of the singleton provider `id`
    pub(crate) fn singleton(&self, id: u64) -> Arc<OnceCell<Instance>> {
        self.singletons.slot(id)
    }

    /// Resolve a reference
    ///
    /// `Ok(None)` when nothing is bound under the reference's key, and always
    /// for wrappers other than `Provider`. A `Provider` reference yields a
    /// deferred handle without producing anything yet.
    pub fn resolve(&self, reference: &ComponentRef) -> Result<Option<Resolved>> {
        #[cfg(feature = "logging")]
        trace!(target: "inject_context", reference = %reference, "Resolving component");

        let component = reference.component();
        match reference.container() {
            Some(Wrapper::Other(_)) => Ok(None),
            Some(Wrapper::Provider) => Ok(self.bindings.get(&component).map(|provider| {
                Resolved::Provider(AnyProvider::new(
                    component.clone(),
                    Arc::clone(provider),
                    self.detach(),
                ))
            })),
            None => match self.bindings.get(&component) {
                Some(provider) => provider.get(self).map(|i| Some(Resolved::Instance(i))),
                None => Ok(None),
            },
        }
    }

    /// Resolve the unqualified binding of `T`
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_component(Component::of::<T>())
    }

    /// Resolve the binding of `T` under `qualifier`
    pub fn get_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: Annotation,
    ) -> Result<Arc<T>> {
        self.get_component(Component::qualified::<T>(qualifier))
    }

    /// Resolve the unqualified binding of `T`, `None` if not bound
    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Deferred handle to the unqualified binding of `T`
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Provider<T>> {
        let reference = ComponentRef::typed::<Provider<T>>();
        match self.resolve(&reference)? {
            Some(Resolved::Provider(provider)) => Ok(provider.typed::<T>()),
            _ => Err(DiError::NotFound {
                component: reference.component(),
            }),
        }
    }

    /// Whether `reference` would resolve to something
    pub fn contains(&self, reference: &ComponentRef) -> bool {
        match reference.container() {
            Some(Wrapper::Other(_)) => false,
            _ => self.bindings.contains_key(&reference.component()),
        }
    }

    /// Number of bindings visible to this context
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn get_component<T: ?Sized + Send + Sync + 'static>(
        &self,
        component: Component,
    ) -> Result<Arc<T>> {
        let provider = self
            .bindings
            .get(&component)
            .ok_or_else(|| DiError::NotFound {
                component: component.clone(),
            })?;
        let instance = provider.get(self)?;
        instance.downcast::<T>().ok_or_else(|| {
            DiError::Internal(format!(
                "{component} produced {}, not {}",
                instance.type_name(),
                std::any::type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
