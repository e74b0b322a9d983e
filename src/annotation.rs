//! Value-typed qualifier and scope markers
//!
//! Annotations are plain tagged values: a [`MarkerKind`], a name and an
//! attribute map. Two annotations are equal when all three are equal, so two
//! independently built `Annotation::named("primary")` values select the same
//! binding.

use std::collections::BTreeMap;
use std::fmt;

/// Name of the built-in singleton scope marker
pub const SINGLETON: &str = "Singleton";

/// Name of the built-in named qualifier
pub const NAMED: &str = "Named";

/// What an annotation is meta-annotated as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerKind {
    /// Distinguishes bindings of the same type
    Qualifier,
    /// Governs instance reuse
    Scope,
    /// Anything else; rejected wherever a marker is expected
    Plain,
}

/// A qualifier, scope marker or plain annotation instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Annotation {
    kind: MarkerKind,
    name: String,
    attributes: BTreeMap<String, String>,
}

impl Annotation {
    /// Create an annotation of any kind
    pub fn new(kind: MarkerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// `@Named(value)` qualifier
    pub fn named(value: impl Into<String>) -> Self {
        Self::qualifier(NAMED).with_attribute("value", value)
    }

    /// Custom qualifier without attributes
    pub fn qualifier(name: impl Into<String>) -> Self {
        Self::new(MarkerKind::Qualifier, name)
    }

    /// Built-in singleton scope marker
    pub fn singleton() -> Self {
        Self::scope(SINGLETON)
    }

    /// Custom scope marker
    pub fn scope(name: impl Into<String>) -> Self {
        Self::new(MarkerKind::Scope, name)
    }

    /// An annotation that is neither qualifier nor scope
    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(MarkerKind::Plain, name)
    }

    /// Attach an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    #[inline]
    pub fn is_qualifier(&self) -> bool {
        self.kind == MarkerKind::Qualifier
    }

    #[inline]
    pub fn is_scope(&self) -> bool {
        self.kind == MarkerKind::Scope
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if !self.attributes.is_empty() {
            f.write_str("(")?;
            for (i, (key, value)) in self.attributes.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key}=\"{value}\"")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
