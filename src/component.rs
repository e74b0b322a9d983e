//! Component keys and component references
//!
//! A [`Component`] is the key a binding is stored under: a type plus an
//! optional qualifier. A [`ComponentRef`] is what a caller or an injection
//! point asks for; it additionally says whether the value is wanted now or
//! through a deferred [`Provider`](crate::Provider).

use crate::annotation::Annotation;
use crate::provider::Provider;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a component type
///
/// Compares by `TypeId` only; the name is carried for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Generic container a reference asks the component to be wrapped in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrapper {
    /// Deferred single-value provider; the only supported wrapper
    Provider,
    /// Any other container; never resolves
    Other(&'static str),
}

/// The declared type of an injection point, split into component and wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    component: TypeKey,
    wrapper: Option<Wrapper>,
}

impl DeclaredType {
    /// Recover the split from a compile-time type such as `Provider<dyn Repo>`
    #[inline]
    pub fn of<D: Declared + ?Sized>() -> Self {
        D::declared_type()
    }

    #[inline]
    pub fn component(&self) -> TypeKey {
        self.component
    }

    #[inline]
    pub fn wrapper(&self) -> Option<Wrapper> {
        self.wrapper
    }
}

/// Types an injection point can be declared as
///
/// `Arc<T>` asks for the instance itself, `Provider<T>` for a deferred handle.
/// `Vec<T>` is recognised only so that it can be refused.
pub trait Declared {
    fn declared_type() -> DeclaredType;
}

impl<T: ?Sized + Send + Sync + 'static> Declared for Arc<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType {
            component: TypeKey::of::<T>(),
            wrapper: None,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Declared for Provider<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType {
            component: TypeKey::of::<T>(),
            wrapper: Some(Wrapper::Provider),
        }
    }
}

impl<T: Declared> Declared for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType {
            component: T::declared_type().component,
            wrapper: Some(Wrapper::Other("Vec")),
        }
    }
}

/// Binding key: component type and optional qualifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    ty: TypeKey,
    qualifier: Option<Annotation>,
}

impl Component {
    #[inline]
    pub fn new(ty: TypeKey, qualifier: Option<Annotation>) -> Self {
        Self { ty, qualifier }
    }

    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), None)
    }

    #[inline]
    pub fn qualified<T: ?Sized + 'static>(qualifier: Annotation) -> Self {
        Self::new(TypeKey::of::<T>(), Some(qualifier))
    }

    #[inline]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&Annotation> {
        self.qualifier.as_ref()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier} {}", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

/// What to resolve: component type, optional wrapper, optional qualifier
///
/// Equal when all three parts are equal.
///
/// ```rust
/// use inject_context::{Annotation, ComponentRef, Provider};
/// use std::sync::Arc;
///
/// trait Repository: Send + Sync {}
///
/// let eager = ComponentRef::of::<dyn Repository>();
/// let deferred = ComponentRef::typed::<Provider<dyn Repository>>();
/// let declared = ComponentRef::typed::<Arc<dyn Repository>>();
///
/// assert!(!eager.is_container());
/// assert!(deferred.is_container());
/// assert_eq!(eager, declared);
/// assert_ne!(eager, eager.clone().with_qualifier(Annotation::named("primary")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    component: TypeKey,
    container: Option<Wrapper>,
    qualifier: Option<Annotation>,
}

impl ComponentRef {
    /// Reference to the unqualified binding of `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            component: TypeKey::of::<T>(),
            container: None,
            qualifier: None,
        }
    }

    /// Reference to the binding of `T` under `qualifier`
    #[inline]
    pub fn qualified<T: ?Sized + 'static>(qualifier: Annotation) -> Self {
        Self::of::<T>().with_qualifier(qualifier)
    }

    /// Reference whose wrapper and component come from a declared type
    #[inline]
    pub fn typed<D: Declared + ?Sized>() -> Self {
        Self::declared(DeclaredType::of::<D>(), None)
    }

    /// Reference built from an injection point
    #[inline]
    pub fn declared(declared: DeclaredType, qualifier: Option<Annotation>) -> Self {
        Self {
            component: declared.component,
            container: declared.wrapper,
            qualifier,
        }
    }

    pub fn with_qualifier(mut self, qualifier: Annotation) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    #[inline]
    pub fn component_type(&self) -> TypeKey {
        self.component
    }

    #[inline]
    pub fn container(&self) -> Option<Wrapper> {
        self.container
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&Annotation> {
        self.qualifier.as_ref()
    }

    /// Whether any wrapper was requested
    #[inline]
    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }

    /// Whether the supported deferred wrapper was requested
    #[inline]
    pub fn is_provider(&self) -> bool {
        self.container == Some(Wrapper::Provider)
    }

    /// The binding key this reference resolves through
    #[inline]
    pub fn component(&self) -> Component {
        Component::new(self.component, self.qualifier.clone())
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{qualifier} ")?;
        }
        match self.container {
            Some(Wrapper::Provider) => write!(f, "Provider<{}>", self.component),
            Some(Wrapper::Other(name)) => write!(f, "{name}<{}>", self.component),
            None => write!(f, "{}", self.component),
        }
    }
}
