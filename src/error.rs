//! Error types for dependency injection

use crate::component::Component;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while binding, validating or resolving components
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A component class is structurally unusable
    #[error("Illegal component {component}: {reason}")]
    IllegalComponent {
        component: &'static str,
        reason: IllegalComponentReason,
    },

    /// A binding depends on a component nobody bound
    #[error("Dependency {dependency} required by {component} not found")]
    DependencyNotFound {
        component: Component,
        dependency: Component,
    },

    /// Bindings depend on each other without a deferred provider in between
    #[error("Cyclic dependency found among: {components}")]
    CyclicDependency { components: ComponentSet },

    /// Constructing or injecting an instance failed
    #[error("Failed to create component {component}: {reason}")]
    Invocation {
        component: &'static str,
        reason: String,
    },

    /// Typed lookup on a context found no binding
    #[error("Component not found: {component}")]
    NotFound { component: Component },

    /// Re-binding was rejected by the configured policy
    #[error("Component already bound: {component}")]
    AlreadyBound { component: Component },

    /// A deferred provider outlived its configuration and every context of it
    #[error("Context has been dropped")]
    ContextDropped,

    /// Internal error
    #[error("Internal DI error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create an IllegalComponent error
    #[inline]
    pub fn illegal(component: &'static str, reason: IllegalComponentReason) -> Self {
        Self::IllegalComponent { component, reason }
    }

    /// Create a CyclicDependency error, dropping repeated keys
    pub fn cyclic(components: impl IntoIterator<Item = Component>) -> Self {
        let mut set: Vec<Component> = Vec::new();
        for component in components {
            if !set.contains(&component) {
                set.push(component);
            }
        }
        Self::CyclicDependency {
            components: ComponentSet(set),
        }
    }

    /// Create an Invocation error
    #[inline]
    pub fn invocation(component: &'static str, reason: impl Into<String>) -> Self {
        Self::Invocation {
            component,
            reason: reason.into(),
        }
    }

    /// True for errors raised by the binding call itself
    pub fn is_illegal_component(&self) -> bool {
        matches!(self, Self::IllegalComponent { .. })
    }
}

/// Why a component was rejected at binding time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IllegalComponentReason {
    #[error("abstract classes cannot be instantiated")]
    Abstract,

    #[error("interfaces cannot be instantiated")]
    Interface,

    #[error("more than one inject constructor declared")]
    MultipleInjectConstructors,

    #[error("neither an inject constructor nor a default constructor declared")]
    NoInjectOrDefaultConstructor,

    #[error("inject field `{0}` is final")]
    FinalInjectField(&'static str),

    #[error("inject method `{0}` declares type parameters")]
    TypeParameterizedInjectMethod(&'static str),

    #[error("`{0}` carries more than one qualifier")]
    MultipleQualifiers(&'static str),

    #[error("more than one scope given")]
    MultipleScopes,

    #[error("scope `{0}` has no registered provider")]
    UnregisteredScope(String),

    #[error("`{0}` is not a qualifier")]
    NotAQualifier(String),

    #[error("`{0}` is neither a qualifier nor a scope")]
    UnsupportedAnnotation(String),
}

/// Deduplicated set of components reported by a cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentSet(Vec<Component>);

impl ComponentSet {
    /// Components taking part in the cycle, in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, component: &Component) -> bool {
        self.0.contains(component)
    }
}

impl fmt::Display for ComponentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{component}")?;
        }
        f.write_str("]")
    }
}

/// Failure raised by a constructor, setter or inject method
///
/// Wrapped into [`DiError::Invocation`] together with the component name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvocationError(String);

impl InvocationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

impl From<String> for InvocationError {
    fn from(reason: String) -> Self {
        Self(reason)
    }
}

impl From<&str> for InvocationError {
    fn from(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

impl From<DiError> for InvocationError {
    fn from(err: DiError) -> Self {
        Self(err.to_string())
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
