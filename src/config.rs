//! Binding registry
//!
//! [`ContextConfig`] collects bindings and scope decorators, then produces a
//! validated [`Context`]. Registration methods take `&self`; storage is a
//! concurrent map.

use crate::annotation::Annotation;
use crate::component::Component;
use crate::context::Context;
use crate::descriptor::Injectable;
use crate::error::IllegalComponentReason;
use crate::graph;
use crate::injection::InjectionProvider;
use crate::provider::{ComponentProvider, Implements, InstanceProvider};
use crate::scope::{Scope, ScopeFactory, ScopeRegistry, SingletonCache};
use crate::storage::{BindingStorage, SharedProvider};
use crate::{DiError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// What happens when a key that is already bound is bound again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebindPolicy {
    /// Last registration wins
    #[default]
    Replace,
    /// Fail with [`DiError::AlreadyBound`]
    Reject,
}

/// Registry of bindings from which contexts are built
///
/// # Examples
///
/// ```rust
/// use inject_context::{Annotation, ContextConfig};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// let config = ContextConfig::new();
/// config
///     .bind_instance::<dyn Greeter>(Arc::new(English), &[Annotation::named("en")])
///     .unwrap();
///
/// let context = config.get_context().unwrap();
/// let greeter = context.get_qualified::<dyn Greeter>(Annotation::named("en")).unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
pub struct ContextConfig {
    storage: BindingStorage,
    scopes: ScopeRegistry,
    singletons: Arc<SingletonCache>,
    policy: RebindPolicy,
}

impl ContextConfig {
    /// Create an empty configuration with the singleton scope registered.
    #[inline]
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "inject_context", "Creating new context configuration");

        Self {
            storage: BindingStorage::new(),
            scopes: ScopeRegistry::new(),
            singletons: Arc::new(SingletonCache::new()),
            policy: RebindPolicy::default(),
        }
    }

    /// Set what happens when a key is bound twice.
    pub fn with_rebind_policy(mut self, policy: RebindPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    pub fn rebind_policy(&self) -> RebindPolicy {
        self.policy
    }

    /// Bind `T` to a pre-built instance.
    ///
    /// Without qualifiers the instance is bound under the unqualified key;
    /// otherwise under one key per qualifier. Every annotation must be a
    /// qualifier.
    pub fn bind_instance<T: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<T>,
        qualifiers: &[Annotation],
    ) -> Result<()> {
        let name = std::any::type_name::<T>();
        if let Some(annotation) = qualifiers.iter().find(|a| !a.is_qualifier()) {
            return Err(DiError::illegal(
                name,
                IllegalComponentReason::NotAQualifier(annotation.to_string()),
            ));
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_context",
            component = name,
            qualifiers = qualifiers.len(),
            "Binding instance"
        );

        self.insert(
            keys::<T>(qualifiers),
            Arc::new(InstanceProvider::new(instance)),
        )
    }

    /// Bind `I` to the injectable class `C`.
    ///
    /// `annotations` may hold qualifiers and at most one scope marker. An
    /// explicit scope marker takes precedence over one declared on `C`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use inject_context::{implements, Annotation, ClassDescriptor, ContextConfig, Injectable};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {}
    ///
    /// #[derive(Default)]
    /// struct SystemClock;
    /// impl Clock for SystemClock {}
    /// implements!(SystemClock => dyn Clock);
    ///
    /// impl Injectable for SystemClock {
    ///     fn descriptor() -> ClassDescriptor<Self> {
    ///         ClassDescriptor::new("SystemClock").default_constructor(SystemClock::default)
    ///     }
    /// }
    ///
    /// let config = ContextConfig::new();
    /// config
    ///     .bind::<dyn Clock, SystemClock>(&[Annotation::singleton()])
    ///     .unwrap();
    ///
    /// let context = config.get_context().unwrap();
    /// let a = context.get::<dyn Clock>().unwrap();
    /// let b = context.get::<dyn Clock>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn bind<I, C>(&self, annotations: &[Annotation]) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable + Implements<I>,
    {
        let provider = InjectionProvider::<C, I>::new()?;
        let name = provider.name();

        let mut qualifiers = Vec::new();
        let mut scopes = Vec::new();
        for annotation in annotations {
            if annotation.is_qualifier() {
                qualifiers.push(annotation.clone());
            } else if annotation.is_scope() {
                scopes.push(annotation);
            } else {
                return Err(DiError::illegal(
                    name,
                    IllegalComponentReason::UnsupportedAnnotation(annotation.to_string()),
                ));
            }
        }

        let scope = select_scope(name, &scopes, provider.class_scopes())?;
        let provider = self
            .scopes
            .decorate(&scope, Box::new(provider))
            .ok_or_else(|| {
                DiError::illegal(name, IllegalComponentReason::UnregisteredScope(scope.to_string()))
            })?;

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_context",
            component = std::any::type_name::<I>(),
            implementation = name,
            scope = %scope,
            qualifiers = qualifiers.len(),
            "Binding component"
        );

        self.insert(keys::<I>(&qualifiers), Arc::from(provider))
    }

    /// Bind a hand-written provider under `component`.
    ///
    /// The provider's instances must hold an `Arc` of the component's type.
    pub fn bind_provider<P>(&self, component: Component, provider: P) -> Result<()>
    where
        P: ComponentProvider + 'static,
    {
        #[cfg(feature = "logging")]
        debug!(
            target: "inject_context",
            component = %component,
            "Binding custom provider"
        );

        self.insert(vec![component], Arc::new(provider))
    }

    /// Register the decorator factory for the scope marker named `name`.
    ///
    /// Registering `"Singleton"` replaces the built-in singleton decorator.
    pub fn scope<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(Box<dyn ComponentProvider>) -> Box<dyn ComponentProvider> + Send + Sync + 'static,
    {
        let name = name.into();

        #[cfg(feature = "logging")]
        debug!(target: "inject_context", scope = %name, "Registering scope");

        let factory: ScopeFactory = Arc::new(factory);
        self.scopes.register(name, factory);
    }

    /// Whether `component` is bound
    #[inline]
    pub fn contains(&self, component: &Component) -> bool {
        self.storage.contains(component)
    }

    /// Number of binding keys
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Validate all bindings and produce a context.
    ///
    /// The context works on a snapshot: bindings added afterwards are not
    /// visible to it. Singletons are shared by every context of this
    /// configuration. Static injection runs once per distinct provider, in
    /// binding key order, before the context is returned.
    pub fn get_context(&self) -> Result<Context> {
        let bindings = self.storage.snapshot();
        graph::validate(&bindings)?;

        let mut providers: Vec<SharedProvider> = Vec::with_capacity(bindings.len());
        for key in graph::ordered(&bindings) {
            let provider = &bindings[key];
            if !providers.iter().any(|p| same_provider(p, provider)) {
                providers.push(Arc::clone(provider));
            }
        }

        let context = Context::new(bindings, Arc::clone(&self.singletons));
        for provider in &providers {
            provider.statics(&context)?;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_context",
            bindings = context.len(),
            providers = providers.len(),
            "Created context"
        );

        Ok(context)
    }

    fn insert(&self, keys: Vec<Component>, provider: SharedProvider) -> Result<()> {
        if self.policy == RebindPolicy::Reject {
            if let Some(bound) = keys.iter().find(|key| self.storage.contains(key)) {
                return Err(DiError::AlreadyBound {
                    component: bound.clone(),
                });
            }
        }
        for key in keys {
            #[cfg(feature = "logging")]
            let component = key.to_string();

            if self.storage.insert(key, Arc::clone(&provider)).is_some() {
                #[cfg(feature = "logging")]
                debug!(target: "inject_context", component = %component, "Replaced existing binding");
            }
        }
        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("bindings", &self.storage.len())
            .field("scopes", &self.scopes)
            .field("singletons", &self.singletons)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Unqualified key when there are no qualifiers, else one key per qualifier
fn keys<T: ?Sized + 'static>(qualifiers: &[Annotation]) -> Vec<Component> {
    if qualifiers.is_empty() {
        vec![Component::of::<T>()]
    } else {
        qualifiers
            .iter()
            .map(|q| Component::qualified::<T>(q.clone()))
            .collect()
    }
}

/// Explicit scope first, then the class-level one, else unscoped
fn select_scope(name: &'static str, explicit: &[&Annotation], declared: &[Annotation]) -> Result<Scope> {
    if explicit.len() > 1 || declared.len() > 1 {
        return Err(DiError::illegal(name, IllegalComponentReason::MultipleScopes));
    }
    Ok(explicit
        .first()
        .copied()
        .or(declared.first())
        .map(Scope::from_annotation)
        .unwrap_or_default())
}

#[inline]
fn same_provider(a: &SharedProvider, b: &SharedProvider) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
