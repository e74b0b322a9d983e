//! # inject-context - JSR-330 Style Dependency Injection for Rust
//!
//! Components are bound into a [`ContextConfig`]; [`ContextConfig::get_context`]
//! validates the whole dependency graph up front and hands out a [`Context`]
//! that resolves components on demand.
//!
//! ## Features
//!
//! - **Constructor, field and method injection** - Driven by a [`ClassDescriptor`]
//!   each component class supplies through [`Injectable`]
//! - **Qualifiers** - `@Named("x")` and custom qualifier markers select among
//!   bindings of the same type
//! - **Scopes** - Singleton out of the box, custom scopes via decorator factories
//! - **Deferred providers** - A `Provider<T>` dependency breaks a cycle
//! - **Eager validation** - Missing and cyclic dependencies fail at context creation
//! - **Lock-free registration** - Bindings live in a `DashMap`
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use inject_context::{
//!     Arguments, ClassDescriptor, ContextConfig, Injectable, Parameter,
//! };
//! use std::sync::Arc;
//!
//! trait Repository: Send + Sync {
//!     fn url(&self) -> &str;
//! }
//!
//! struct Postgres;
//! impl Repository for Postgres {
//!     fn url(&self) -> &str {
//!         "postgres://localhost"
//!     }
//! }
//!
//! struct UserService {
//!     repository: Arc<dyn Repository>,
//! }
//!
//! impl Injectable for UserService {
//!     fn descriptor() -> ClassDescriptor<Self> {
//!         ClassDescriptor::new("UserService").inject_constructor(
//!             vec![Parameter::of::<Arc<dyn Repository>>("repository")],
//!             |args: &mut Arguments| {
//!                 Ok(UserService {
//!                     repository: args.instance::<dyn Repository>()?,
//!                 })
//!             },
//!         )
//!     }
//! }
//!
//! let config = ContextConfig::new();
//! config.bind_instance::<dyn Repository>(Arc::new(Postgres), &[]).unwrap();
//! config.bind::<UserService, UserService>(&[]).unwrap();
//!
//! let context = config.get_context().unwrap();
//! let users = context.get::<UserService>().unwrap();
//! assert_eq!(users.repository.url(), "postgres://localhost");
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use inject_context::{Arguments, ClassDescriptor, ContextConfig, DiError, Injectable, Parameter};
//! use std::sync::Arc;
//!
//! struct Mailer;
//!
//! struct Signup {
//!     _mailer: Arc<Mailer>,
//! }
//!
//! impl Injectable for Signup {
//!     fn descriptor() -> ClassDescriptor<Self> {
//!         ClassDescriptor::new("Signup").inject_constructor(
//!             vec![Parameter::of::<Arc<Mailer>>("mailer")],
//!             |args: &mut Arguments| Ok(Signup { _mailer: args.instance::<Mailer>()? }),
//!         )
//!     }
//! }
//!
//! let config = ContextConfig::new();
//! config.bind::<Signup, Signup>(&[]).unwrap();
//!
//! // Nothing provides Mailer
//! assert!(matches!(
//!     config.get_context(),
//!     Err(DiError::DependencyNotFound { .. })
//! ));
//! ```
//!
//! ## Derive
//!
//! With the `derive` feature, `#[derive(Injectable)]` writes the descriptor
//! for structs whose `#[inject]` fields are `Arc<T>` or `Provider<T>`.

// The derive macro expands to `::inject_context::...` paths
extern crate self as inject_context;

mod annotation;
mod component;
mod config;
mod context;
mod descriptor;
mod error;
mod graph;
mod injection;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod scope;
mod storage;

pub use annotation::*;
pub use component::*;
pub use config::*;
pub use context::*;
pub use descriptor::*;
pub use error::*;
pub use injection::*;
pub use provider::*;
pub use scope::{Scope, ScopeFactory, SingletonProvider};

#[cfg(feature = "derive")]
pub use inject_context_derive::Injectable;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        implements, Annotation, Arguments, ClassDescriptor, Component, ComponentRef, Context,
        ContextConfig, DiError, FieldDescriptor, Injectable, MethodDescriptor, Parameter,
        Provider, Result,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dependency;

    impl Injectable for Dependency {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("Dependency").default_constructor(|| Dependency)
        }
    }

    struct Service {
        dependency: Arc<Dependency>,
    }

    impl Injectable for Service {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("Service").inject_constructor(
                vec![Parameter::of::<Arc<Dependency>>("dependency")],
                |args: &mut Arguments| {
                    Ok(Service {
                        dependency: args.instance::<Dependency>()?,
                    })
                },
            )
        }
    }

    #[test]
    fn test_resolves_bound_dependency() {
        let dependency = Arc::new(Dependency);
        let config = ContextConfig::new();
        config
            .bind_instance::<Dependency>(Arc::clone(&dependency), &[])
            .unwrap();
        config.bind::<Service, Service>(&[]).unwrap();

        let context = config.get_context().unwrap();
        let service = context.get::<Service>().unwrap();

        assert!(Arc::ptr_eq(&service.dependency, &dependency));
    }

    #[test]
    fn test_missing_dependency_names_both_ends() {
        let config = ContextConfig::new();
        config.bind::<Service, Service>(&[]).unwrap();

        match config.get_context() {
            Err(DiError::DependencyNotFound {
                component,
                dependency,
            }) => {
                assert_eq!(component, Component::of::<Service>());
                assert_eq!(dependency, Component::of::<Dependency>());
            }
            other => panic!("expected DependencyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_dependency_bound_by_class() {
        let config = ContextConfig::new();
        config.bind::<Dependency, Dependency>(&[]).unwrap();
        config.bind::<Service, Service>(&[]).unwrap();

        let context = config.get_context().unwrap();
        assert!(context.get::<Service>().is_ok());
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let config = ContextConfig::new();
        config.bind::<Dependency, Dependency>(&[]).unwrap();
        let context: Context = config.get_context().unwrap();
        let dependency: Result<Arc<Dependency>> = context.get::<Dependency>();
        assert!(dependency.is_ok());
    }
}
