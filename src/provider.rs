//! Provider contracts
//!
//! A [`ComponentProvider`] knows how to produce one instance of a component
//! given a [`Context`], and which component references it needs resolved to
//! do so. Instances travel type-erased as [`Instance`] values.

use crate::component::{Component, ComponentRef};
use crate::context::{Context, DetachedContext};
use crate::{DiError, Result};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased component value
///
/// Holds an `Arc<T>` for the component type `T` it was bound as, which may be
/// a trait object.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    #[inline]
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Recover the typed value; `None` if it was bound as another type
    #[inline]
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both values are the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Strategy producing instances of one component
pub trait ComponentProvider: Send + Sync {
    /// Produce an instance, resolving dependencies from `context`
    fn get(&self, context: &Context) -> Result<Instance>;

    /// One-time side effects run when a context is created
    fn statics(&self, _context: &Context) -> Result<()> {
        Ok(())
    }

    /// References that must be resolvable for `get` to succeed
    fn dependencies(&self) -> Vec<ComponentRef> {
        Vec::new()
    }
}

impl<P: ComponentProvider + ?Sized> ComponentProvider for Box<P> {
    #[inline]
    fn get(&self, context: &Context) -> Result<Instance> {
        (**self).get(context)
    }

    #[inline]
    fn statics(&self, context: &Context) -> Result<()> {
        (**self).statics(context)
    }

    #[inline]
    fn dependencies(&self) -> Vec<ComponentRef> {
        (**self).dependencies()
    }
}

impl<P: ComponentProvider + ?Sized> ComponentProvider for Arc<P> {
    #[inline]
    fn get(&self, context: &Context) -> Result<Instance> {
        (**self).get(context)
    }

    #[inline]
    fn statics(&self, context: &Context) -> Result<()> {
        (**self).statics(context)
    }

    #[inline]
    fn dependencies(&self) -> Vec<ComponentRef> {
        (**self).dependencies()
    }
}

/// Provider that always hands out the same pre-built instance
pub struct InstanceProvider {
    instance: Instance,
}

impl InstanceProvider {
    #[inline]
    pub fn new<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self {
            instance: Instance::new(instance),
        }
    }
}

impl ComponentProvider for InstanceProvider {
    #[inline]
    fn get(&self, _context: &Context) -> Result<Instance> {
        Ok(self.instance.clone())
    }
}

/// Component implementations that can be exposed as interface `I`
///
/// Every component implements itself. Use [`implements!`](crate::implements)
/// to expose a struct as a trait object.
pub trait Implements<I: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<I>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declare that a component can be bound as one or more trait objects
///
/// ```rust
/// use inject_context::implements;
///
/// trait Repository: Send + Sync {}
/// struct SqlRepository;
/// impl Repository for SqlRepository {}
///
/// implements!(SqlRepository => dyn Repository);
/// ```
#[macro_export]
macro_rules! implements {
    ($component:ty => $($interface:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$interface> for $component {
                #[inline]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$interface> {
                    self
                }
            }
        )+
    };
}

/// Type-erased deferred handle produced for a `Provider` reference
#[derive(Clone)]
pub struct AnyProvider {
    component: Component,
    provider: Arc<dyn ComponentProvider>,
    context: DetachedContext,
}

impl AnyProvider {
    pub(crate) fn new(
        component: Component,
        provider: Arc<dyn ComponentProvider>,
        context: DetachedContext,
    ) -> Self {
        Self {
            component,
            provider,
            context,
        }
    }

    /// Binding this handle defers to
    #[inline]
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Produce an instance now, against the bindings of the context that
    /// issued the handle
    ///
    /// Fails with [`DiError::ContextDropped`] once the configuration and every
    /// context built from it have been dropped.
    pub fn get(&self) -> Result<Instance> {
        let context = self.context.attach().ok_or(DiError::ContextDropped)?;
        self.provider.get(&context)
    }

    /// Attach the component type
    #[inline]
    pub fn typed<T: ?Sized + Send + Sync + 'static>(self) -> Provider<T> {
        Provider {
            inner: self,
            _component: PhantomData,
        }
    }
}

impl fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyProvider")
            .field("component", &self.component)
            .finish()
    }
}

/// Deferred handle to a component
///
/// Nothing is produced until [`get`](Provider::get) is called. Declaring a
/// dependency as `Provider<T>` rather than `Arc<T>` breaks cycles during
/// graph validation.
pub struct Provider<T: ?Sized> {
    inner: AnyProvider,
    _component: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    /// Produce an instance
    pub fn get(&self) -> Result<Arc<T>> {
        let instance = self.inner.get()?;
        instance.downcast::<T>().ok_or_else(|| {
            DiError::Internal(format!(
                "provider for {} produced {}",
                std::any::type_name::<T>(),
                instance.type_name()
            ))
        })
    }

    #[inline]
    pub fn component(&self) -> &Component {
        self.inner.component()
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _component: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("component", &self.inner.component)
            .finish()
    }
}

/// Result of resolving a [`ComponentRef`]
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The component value itself
    Instance(Instance),
    /// A deferred handle, for `Provider` references
    Provider(AnyProvider),
}

impl Resolved {
    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Resolved::Instance(instance) => Some(instance),
            Resolved::Provider(_) => None,
        }
    }

    pub fn into_provider(self) -> Option<AnyProvider> {
        match self {
            Resolved::Provider(provider) => Some(provider),
            Resolved::Instance(_) => None,
        }
    }
}
