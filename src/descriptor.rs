//! Type descriptors
//!
//! Rust has no runtime reflection, so a component class describes itself:
//! which constructors it has, which fields and methods are injection points,
//! and what its class hierarchy looks like. [`InjectionProvider`] turns a
//! descriptor into an instantiation recipe.
//!
//! Superclasses are modelled as an explicit, ordered list of [`ClassLevel`]s.
//! Level 0 is the class itself, followed by its nearest superclass and so on
//! up to (not including) the root type. Members of every level operate on the
//! concrete type `C`, typically by reaching into an embedded base struct.
//!
//! # Example
//!
//! ```rust
//! use inject_context::{
//!     Arguments, ClassDescriptor, ConstructorDescriptor, FieldDescriptor, Injectable, Parameter,
//! };
//! use std::sync::Arc;
//!
//! struct Clock;
//!
//! struct Scheduler {
//!     clock: Arc<Clock>,
//!     fallback: Option<Arc<Clock>>,
//! }
//!
//! impl Injectable for Scheduler {
//!     fn descriptor() -> ClassDescriptor<Self> {
//!         ClassDescriptor::new("Scheduler")
//!             .constructor(ConstructorDescriptor::inject(
//!                 vec![Parameter::of::<Arc<Clock>>("clock")],
//!                 |args: &mut Arguments| {
//!                     Ok(Scheduler {
//!                         clock: args.instance::<Clock>()?,
//!                         fallback: None,
//!                     })
//!                 },
//!             ))
//!             .field(FieldDescriptor::inject(
//!                 Parameter::of::<Arc<Clock>>("fallback"),
//!                 |this: &mut Scheduler, arg| {
//!                     this.fallback = Some(arg.instance::<Clock>()?);
//!                     Ok(())
//!                 },
//!             ))
//!     }
//! }
//!
//! let descriptor = Scheduler::descriptor();
//! assert_eq!(descriptor.name(), "Scheduler");
//! assert_eq!(descriptor.hierarchy()[0].fields().len(), 1);
//! ```
//!
//! [`InjectionProvider`]: crate::InjectionProvider

use crate::annotation::Annotation;
use crate::component::{ComponentRef, Declared, DeclaredType};
use crate::error::{IllegalComponentReason, InvocationError};
use crate::provider::{Provider, Resolved};
use crate::{DiError, Result};
use std::fmt;
use std::sync::Arc;

/// Result of a descriptor closure
pub type InvokeResult<T> = std::result::Result<T, InvocationError>;

type ConstructFn<C> = Arc<dyn Fn(&mut Arguments) -> InvokeResult<C> + Send + Sync>;
type SetFn<C> = Arc<dyn Fn(&mut C, Argument) -> InvokeResult<()> + Send + Sync>;
type InvokeFn<C> = Arc<dyn Fn(&mut C, &mut Arguments) -> InvokeResult<()> + Send + Sync>;
type StaticFn = Arc<dyn Fn(&mut Arguments) -> InvokeResult<()> + Send + Sync>;

/// Concrete classes that can be instantiated by the container
///
/// Implement by hand or with `#[derive(Injectable)]` (feature `derive`).
pub trait Injectable: Sized + Send + Sync + 'static {
    fn descriptor() -> ClassDescriptor<Self>;
}

/// Instantiability of a described class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Concrete,
    Abstract,
    Interface,
}

/// An injection point: a declared type plus the element's annotations
#[derive(Debug, Clone)]
pub struct Parameter {
    name: &'static str,
    declared: DeclaredType,
    annotations: Vec<Annotation>,
}

impl Parameter {
    /// Parameter declared as `D`, e.g. `Arc<dyn Repo>` or `Provider<dyn Repo>`
    pub fn of<D: Declared>(name: &'static str) -> Self {
        Self {
            name,
            declared: DeclaredType::of::<D>(),
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Shorthand for `annotated(Annotation::named(value))`
    pub fn named(self, value: impl Into<String>) -> Self {
        self.annotated(Annotation::named(value))
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn declared(&self) -> DeclaredType {
        self.declared
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Build the reference this element resolves, extracting its qualifier
    pub(crate) fn reference(&self, component: &'static str) -> Result<ComponentRef> {
        let mut qualifiers = self.annotations.iter().filter(|a| a.is_qualifier());
        let qualifier = qualifiers.next().cloned();
        if qualifiers.next().is_some() {
            return Err(DiError::illegal(
                component,
                IllegalComponentReason::MultipleQualifiers(self.name),
            ));
        }
        Ok(ComponentRef::declared(self.declared, qualifier))
    }
}

/// One resolved dependency handed to a descriptor closure
pub struct Argument {
    reference: ComponentRef,
    value: Resolved,
}

impl Argument {
    pub(crate) fn new(reference: ComponentRef, value: Resolved) -> Self {
        Self { reference, value }
    }

    /// The dependency as an instance of `T`
    pub fn instance<T: ?Sized + Send + Sync + 'static>(self) -> InvokeResult<Arc<T>> {
        match self.value {
            Resolved::Instance(instance) => instance.downcast::<T>().ok_or_else(|| {
                InvocationError::new(format!(
                    "{} resolved to {}, not {}",
                    self.reference,
                    instance.type_name(),
                    std::any::type_name::<T>()
                ))
            }),
            Resolved::Provider(_) => Err(InvocationError::new(format!(
                "{} is a deferred provider, not an instance",
                self.reference
            ))),
        }
    }

    /// The dependency as a deferred handle to `T`
    pub fn provider<T: ?Sized + Send + Sync + 'static>(self) -> InvokeResult<Provider<T>> {
        match self.value {
            Resolved::Provider(provider) => Ok(provider.typed::<T>()),
            Resolved::Instance(_) => Err(InvocationError::new(format!(
                "{} is an instance, not a deferred provider",
                self.reference
            ))),
        }
    }

    #[inline]
    pub fn reference(&self) -> &ComponentRef {
        &self.reference
    }
}

/// Positional dependencies of a constructor or method
pub struct Arguments {
    values: std::vec::IntoIter<Argument>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Argument>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    /// Next positional argument
    pub fn next(&mut self) -> InvokeResult<Argument> {
        self.values
            .next()
            .ok_or_else(|| InvocationError::new("not enough arguments"))
    }

    /// Next argument as an instance of `T`
    pub fn instance<T: ?Sized + Send + Sync + 'static>(&mut self) -> InvokeResult<Arc<T>> {
        self.next()?.instance::<T>()
    }

    /// Next argument as a deferred handle to `T`
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&mut self) -> InvokeResult<Provider<T>> {
        self.next()?.provider::<T>()
    }

    /// Arguments not yet consumed
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// A constructor of `C`
pub struct ConstructorDescriptor<C> {
    inject: bool,
    parameters: Vec<Parameter>,
    construct: ConstructFn<C>,
}

impl<C> ConstructorDescriptor<C> {
    /// Constructor carrying the inject annotation
    pub fn inject<F>(parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&mut Arguments) -> InvokeResult<C> + Send + Sync + 'static,
    {
        Self {
            inject: true,
            parameters,
            construct: Arc::new(construct),
        }
    }

    /// Constructor without the inject annotation
    pub fn plain<F>(parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&mut Arguments) -> InvokeResult<C> + Send + Sync + 'static,
    {
        Self {
            inject: false,
            parameters,
            construct: Arc::new(construct),
        }
    }

    /// Zero-argument constructor without the inject annotation
    pub fn default_with<F>(construct: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self::plain(Vec::new(), move |_| Ok(construct()))
    }

    #[inline]
    pub fn is_inject(&self) -> bool {
        self.inject
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn construct(&self, arguments: &mut Arguments) -> InvokeResult<C> {
        (self.construct)(arguments)
    }
}

impl<C> Clone for ConstructorDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            inject: self.inject,
            parameters: self.parameters.clone(),
            construct: Arc::clone(&self.construct),
        }
    }
}

/// An inject-annotated field of `C`
pub struct FieldDescriptor<C> {
    parameter: Parameter,
    is_final: bool,
    set: SetFn<C>,
}

impl<C> FieldDescriptor<C> {
    /// The parameter's name is the field name
    pub fn inject<F>(parameter: Parameter, set: F) -> Self
    where
        F: Fn(&mut C, Argument) -> InvokeResult<()> + Send + Sync + 'static,
    {
        Self {
            parameter,
            is_final: false,
            set: Arc::new(set),
        }
    }

    /// Mark the field final; such a field cannot receive injection
    pub fn final_field(mut self) -> Self {
        self.is_final = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.parameter.name
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub(crate) fn set(&self, instance: &mut C, argument: Argument) -> InvokeResult<()> {
        (self.set)(instance, argument)
    }
}

impl<C> Clone for FieldDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            parameter: self.parameter.clone(),
            is_final: self.is_final,
            set: Arc::clone(&self.set),
        }
    }
}

/// A method of `C`
///
/// Inject methods carry parameters and an invoke closure. Methods without the
/// inject annotation are declared by signature only; they matter when they
/// override an inject method of a superclass.
pub struct MethodDescriptor<C> {
    name: &'static str,
    signature: Vec<DeclaredType>,
    type_parameters: usize,
    parameters: Vec<Parameter>,
    invoke: Option<InvokeFn<C>>,
}

impl<C> MethodDescriptor<C> {
    pub fn inject<F>(name: &'static str, parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(&mut C, &mut Arguments) -> InvokeResult<()> + Send + Sync + 'static,
    {
        Self {
            name,
            signature: parameters.iter().map(Parameter::declared).collect(),
            type_parameters: 0,
            parameters,
            invoke: Some(Arc::new(invoke)),
        }
    }

    /// A method without the inject annotation
    pub fn plain(name: &'static str, signature: Vec<DeclaredType>) -> Self {
        Self {
            name,
            signature,
            type_parameters: 0,
            parameters: Vec::new(),
            invoke: None,
        }
    }

    /// Declare the method generic over `count` type parameters
    pub fn type_parameters(mut self, count: usize) -> Self {
        self.type_parameters = count;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is_inject(&self) -> bool {
        self.invoke.is_some()
    }

    #[inline]
    pub fn has_type_parameters(&self) -> bool {
        self.type_parameters != 0
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Same name and same parameter types
    pub fn overrides(&self, other: &MethodDescriptor<C>) -> bool {
        self.name == other.name && self.signature == other.signature
    }

    pub(crate) fn invoke(&self, instance: &mut C, arguments: &mut Arguments) -> InvokeResult<()> {
        match &self.invoke {
            Some(invoke) => invoke(instance, arguments),
            None => Err(InvocationError::new(format!(
                "`{}` is not an inject method",
                self.name
            ))),
        }
    }
}

impl<C> Clone for MethodDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            signature: self.signature.clone(),
            type_parameters: self.type_parameters,
            parameters: self.parameters.clone(),
            invoke: self.invoke.clone(),
        }
    }
}

/// An inject-annotated static method, run once when a context is created
#[derive(Clone)]
pub struct StaticMethodDescriptor {
    name: &'static str,
    parameters: Vec<Parameter>,
    invoke: StaticFn,
}

impl StaticMethodDescriptor {
    pub fn inject<F>(name: &'static str, parameters: Vec<Parameter>, invoke: F) -> Self
    where
        F: Fn(&mut Arguments) -> InvokeResult<()> + Send + Sync + 'static,
    {
        Self {
            name,
            parameters,
            invoke: Arc::new(invoke),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, arguments: &mut Arguments) -> InvokeResult<()> {
        (self.invoke)(arguments)
    }
}

/// Members declared directly on one class of a hierarchy
pub struct ClassLevel<C> {
    name: &'static str,
    fields: Vec<FieldDescriptor<C>>,
    methods: Vec<MethodDescriptor<C>>,
    statics: Vec<StaticMethodDescriptor>,
}

impl<C> ClassLevel<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            methods: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor<C>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDescriptor<C>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn static_method(mut self, method: StaticMethodDescriptor) -> Self {
        self.statics.push(method);
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor<C>] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodDescriptor<C>] {
        &self.methods
    }

    pub fn statics(&self) -> &[StaticMethodDescriptor] {
        &self.statics
    }
}

/// Everything the container needs to know about a component class
pub struct ClassDescriptor<C> {
    name: &'static str,
    kind: ClassKind,
    annotations: Vec<Annotation>,
    constructors: Vec<ConstructorDescriptor<C>>,
    hierarchy: Vec<ClassLevel<C>>,
}

impl<C> ClassDescriptor<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: ClassKind::Concrete,
            annotations: Vec::new(),
            constructors: Vec::new(),
            hierarchy: vec![ClassLevel::new(name)],
        }
    }

    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Class-level annotation, e.g. a scope marker
    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorDescriptor<C>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Shorthand for an inject constructor
    pub fn inject_constructor<F>(self, parameters: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&mut Arguments) -> InvokeResult<C> + Send + Sync + 'static,
    {
        self.constructor(ConstructorDescriptor::inject(parameters, construct))
    }

    /// Shorthand for a zero-argument constructor
    pub fn default_constructor<F>(self, construct: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.constructor(ConstructorDescriptor::default_with(construct))
    }

    /// Field declared on the class itself
    pub fn field(mut self, field: FieldDescriptor<C>) -> Self {
        self.hierarchy[0].fields.push(field);
        self
    }

    /// Method declared on the class itself
    pub fn method(mut self, method: MethodDescriptor<C>) -> Self {
        self.hierarchy[0].methods.push(method);
        self
    }

    /// Static method declared on the class itself
    pub fn static_method(mut self, method: StaticMethodDescriptor) -> Self {
        self.hierarchy[0].statics.push(method);
        self
    }

    /// Append the next superclass; call nearest superclass first
    pub fn extends(mut self, superclass: ClassLevel<C>) -> Self {
        self.hierarchy.push(superclass);
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn class_kind(&self) -> ClassKind {
        self.kind
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor<C>] {
        &self.constructors
    }

    /// Class itself first, then superclasses nearest first
    pub fn hierarchy(&self) -> &[ClassLevel<C>] {
        &self.hierarchy
    }
}

impl<C> fmt::Debug for ClassDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("constructors", &self.constructors.len())
            .field("levels", &self.hierarchy.len())
            .finish()
    }
}
