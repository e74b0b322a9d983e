//! Descriptor-backed component provider
//!
//! [`InjectionProvider`] turns a [`ClassDescriptor`] into an injection recipe:
//! one constructor, the inject fields and inject methods of every class level,
//! and the component references all of them depend on. The recipe is worked
//! out once, when the provider is built; every `get` then replays it.
//!
//! Within a recipe, superclass members come before subclass members and
//! fields are set before any method is invoked.

use crate::component::ComponentRef;
use crate::context::Context;
use crate::descriptor::{
    Argument, Arguments, ClassDescriptor, ClassKind, ConstructorDescriptor, FieldDescriptor,
    Injectable, InvokeResult, MethodDescriptor, Parameter, StaticMethodDescriptor,
};
use crate::error::{IllegalComponentReason, InvocationError};
use crate::provider::{ComponentProvider, Implements, Instance};
use crate::{Annotation, DiError, Result};
use once_cell::sync::OnceCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Provider that instantiates `C` from its descriptor and exposes it as `I`
///
/// ```rust
/// use inject_context::{
///     ClassDescriptor, ComponentRef, ContextConfig, Injectable, InjectionProvider, Parameter,
/// };
/// use std::sync::Arc;
///
/// struct Engine;
/// struct Car {
///     engine: Arc<Engine>,
/// }
///
/// impl Injectable for Car {
///     fn descriptor() -> ClassDescriptor<Self> {
///         ClassDescriptor::new("Car").inject_constructor(
///             vec![Parameter::of::<Arc<Engine>>("engine")],
///             |args| Ok(Car { engine: args.instance::<Engine>()? }),
///         )
///     }
/// }
///
/// let provider = InjectionProvider::<Car>::new().unwrap();
/// assert_eq!(provider.dependencies_ref(), &[ComponentRef::of::<Engine>()]);
///
/// let config = ContextConfig::new();
/// config.bind_instance(Arc::new(Engine), &[]).unwrap();
/// let context = config.get_context().unwrap();
///
/// let car = provider.instantiate(&context).unwrap();
/// assert!(Arc::ptr_eq(&car.engine, &context.get::<Engine>().unwrap()));
/// ```
pub struct InjectionProvider<C, I: ?Sized = C> {
    name: &'static str,
    scopes: Vec<Annotation>,
    constructor: Injection<ConstructorDescriptor<C>>,
    fields: Vec<Injection<FieldDescriptor<C>>>,
    methods: Vec<Injection<MethodDescriptor<C>>>,
    statics: Vec<Injection<StaticMethodDescriptor>>,
    dependencies: Vec<ComponentRef>,
    statics_ran: OnceCell<()>,
    _interface: PhantomData<fn() -> Arc<I>>,
}

/// A member paired with the references its parameters resolve to
struct Injection<M> {
    member: M,
    references: Vec<ComponentRef>,
}

impl<M> Injection<M> {
    fn new(member: M, parameters: &[Parameter], component: &'static str) -> Result<Self> {
        let references = parameters
            .iter()
            .map(|parameter| parameter.reference(component))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { member, references })
    }
}

impl<C, I: ?Sized> InjectionProvider<C, I> {
    /// Build the recipe from `C::descriptor()`
    pub fn new() -> Result<Self>
    where
        C: Injectable,
    {
        Self::from_descriptor(C::descriptor())
    }

    /// Build the recipe from an explicit descriptor
    pub fn from_descriptor(descriptor: ClassDescriptor<C>) -> Result<Self> {
        let name = descriptor.name();

        match descriptor.class_kind() {
            ClassKind::Concrete => {}
            ClassKind::Abstract => {
                return Err(DiError::illegal(name, IllegalComponentReason::Abstract));
            }
            ClassKind::Interface => {
                return Err(DiError::illegal(name, IllegalComponentReason::Interface));
            }
        }

        let constructor = select_constructor(&descriptor)?;
        let fields = inject_fields(&descriptor);
        let methods = inject_methods(&descriptor);

        if let Some(field) = fields.iter().find(|f| f.is_final()) {
            return Err(DiError::illegal(
                name,
                IllegalComponentReason::FinalInjectField(field.name()),
            ));
        }
        if let Some(method) = methods.iter().find(|m| m.has_type_parameters()) {
            return Err(DiError::illegal(
                name,
                IllegalComponentReason::TypeParameterizedInjectMethod(method.name()),
            ));
        }

        let constructor = Injection::new(constructor.clone(), constructor.parameters(), name)?;
        let fields = fields
            .into_iter()
            .map(|f| Injection::new(f.clone(), std::slice::from_ref(f.parameter()), name))
            .collect::<Result<Vec<_>>>()?;
        let methods = methods
            .into_iter()
            .map(|m| Injection::new(m.clone(), m.parameters(), name))
            .collect::<Result<Vec<_>>>()?;
        let statics = descriptor
            .hierarchy()
            .iter()
            .rev()
            .flat_map(|level| level.statics())
            .map(|s| Injection::new(s.clone(), s.parameters(), name))
            .collect::<Result<Vec<_>>>()?;

        let dependencies: Vec<ComponentRef> = constructor
            .references
            .iter()
            .chain(fields.iter().flat_map(|f| &f.references))
            .chain(methods.iter().flat_map(|m| &m.references))
            .chain(statics.iter().flat_map(|s| &s.references))
            .cloned()
            .collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "inject_context",
            component = name,
            fields = fields.len(),
            methods = methods.len(),
            dependencies = dependencies.len(),
            "Built injection recipe"
        );

        Ok(Self {
            name,
            scopes: descriptor
                .annotations()
                .iter()
                .filter(|a| a.is_scope())
                .cloned()
                .collect(),
            constructor,
            fields,
            methods,
            statics,
            dependencies,
            statics_ran: OnceCell::new(),
            _interface: PhantomData,
        })
    }

    /// Name of the implementation class
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Scope markers declared on the implementation class
    pub fn class_scopes(&self) -> &[Annotation] {
        &self.scopes
    }

    /// Constructor parameters, then fields, then methods, then statics
    pub fn dependencies_ref(&self) -> &[ComponentRef] {
        &self.dependencies
    }

    /// Run the recipe and return the concrete instance
    pub fn instantiate(&self, context: &Context) -> Result<C> {
        #[cfg(feature = "logging")]
        trace!(target: "inject_context", component = self.name, "Instantiating component");

        let mut arguments = self.arguments(context, &self.constructor.references)?;
        let mut instance = self
            .constructor
            .member
            .construct(&mut arguments)
            .map_err(|e| self.failed(e))?;

        for field in &self.fields {
            let argument = self.argument(context, &field.references[0])?;
            field
                .member
                .set(&mut instance, argument)
                .map_err(|e| self.failed(e))?;
        }

        for method in &self.methods {
            let mut arguments = self.arguments(context, &method.references)?;
            method
                .member
                .invoke(&mut instance, &mut arguments)
                .map_err(|e| self.failed(e))?;
        }

        Ok(instance)
    }

    fn argument(&self, context: &Context, reference: &ComponentRef) -> Result<Argument> {
        let value = context
            .resolve(reference)?
            .ok_or_else(|| DiError::invocation(self.name, format!("{reference} cannot be resolved")))?;
        Ok(Argument::new(reference.clone(), value))
    }

    fn arguments(&self, context: &Context, references: &[ComponentRef]) -> Result<Arguments> {
        let values = references
            .iter()
            .map(|reference| self.argument(context, reference))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arguments::new(values))
    }

    fn failed(&self, err: InvocationError) -> DiError {
        DiError::invocation(self.name, err.reason())
    }

    fn run_statics(&self, context: &Context) -> InvokeResult<()> {
        for injection in &self.statics {
            let mut arguments = self.arguments(context, &injection.references)?;
            #[cfg(feature = "logging")]
            debug!(
                target: "inject_context",
                component = self.name,
                method = injection.member.name(),
                "Running static injection"
            );
            injection.member.invoke(&mut arguments)?;
        }
        Ok(())
    }
}

impl<C, I> ComponentProvider for InjectionProvider<C, I>
where
    C: Implements<I>,
    I: ?Sized + Send + Sync + 'static,
{
    fn get(&self, context: &Context) -> Result<Instance> {
        let instance = Arc::new(self.instantiate(context)?);
        Ok(Instance::new::<I>(Implements::<I>::upcast(instance)))
    }

    fn statics(&self, context: &Context) -> Result<()> {
        self.statics_ran
            .get_or_try_init(|| self.run_statics(context))
            .map(|_| ())
            .map_err(|e| self.failed(e))
    }

    fn dependencies(&self) -> Vec<ComponentRef> {
        self.dependencies.clone()
    }
}

impl<C, I: ?Sized> fmt::Debug for InjectionProvider<C, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionProvider")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

// =============================================================================
// Recipe discovery
// =============================================================================

fn select_constructor<C>(descriptor: &ClassDescriptor<C>) -> Result<&ConstructorDescriptor<C>> {
    let constructors = descriptor.constructors();
    let mut injects = constructors.iter().filter(|c| c.is_inject());

    match (injects.next(), injects.next()) {
        (Some(_), Some(_)) => Err(DiError::illegal(
            descriptor.name(),
            IllegalComponentReason::MultipleInjectConstructors,
        )),
        (Some(constructor), None) => Ok(constructor),
        (None, _) => constructors
            .iter()
            .find(|c| c.parameters().is_empty())
            .ok_or_else(|| {
                DiError::illegal(
                    descriptor.name(),
                    IllegalComponentReason::NoInjectOrDefaultConstructor,
                )
            }),
    }
}

/// Inject fields of every level, superclass first
fn inject_fields<C>(descriptor: &ClassDescriptor<C>) -> Vec<&FieldDescriptor<C>> {
    descriptor
        .hierarchy()
        .iter()
        .rev()
        .flat_map(|level| level.fields())
        .collect()
}

/// Inject methods of every level, superclass first
///
/// Levels are walked from the class itself upward. A superclass method is
/// dropped when a subclass inject method already overrides it, or when the
/// class itself overrides it without the inject marker.
fn inject_methods<C>(descriptor: &ClassDescriptor<C>) -> Vec<&MethodDescriptor<C>> {
    let hierarchy = descriptor.hierarchy();
    let opt_outs: Vec<&MethodDescriptor<C>> = hierarchy
        .first()
        .map(|level| level.methods().iter().filter(|m| !m.is_inject()).collect())
        .unwrap_or_default();

    let mut collected: Vec<(usize, &MethodDescriptor<C>)> = Vec::new();
    for (depth, level) in hierarchy.iter().enumerate() {
        for method in level.methods().iter().filter(|m| m.is_inject()) {
            if collected.iter().any(|(_, seen)| seen.overrides(method)) {
                continue;
            }
            if opt_outs.iter().any(|o| o.overrides(method)) {
                continue;
            }
            collected.push((depth, method));
        }
    }

    // stable: declaration order is kept within a level
    collected.sort_by(|a, b| b.0.cmp(&a.0));
    collected.into_iter().map(|(_, method)| method).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::DeclaredType;
    use crate::descriptor::ClassLevel;
    use crate::{ContextConfig, Provider};
    use std::sync::atomic::{AtomicU32, Ordering};

    trait Dependency: Send + Sync {
        fn id(&self) -> u32;
    }

    struct DependencyImpl(u32);

    impl Dependency for DependencyImpl {
        fn id(&self) -> u32 {
            self.0
        }
    }

    fn context_with_dependency() -> (Context, Arc<dyn Dependency>) {
        let dependency: Arc<dyn Dependency> = Arc::new(DependencyImpl(7));
        let config = ContextConfig::new();
        config.bind_instance(Arc::clone(&dependency), &[]).unwrap();
        config
            .bind_instance(
                Arc::new(DependencyImpl(42)) as Arc<dyn Dependency>,
                &[Annotation::named("ChosenOne")],
            )
            .unwrap();
        (config.get_context().unwrap(), dependency)
    }

    fn reason<T>(result: Result<T>) -> IllegalComponentReason {
        match result {
            Err(DiError::IllegalComponent { reason, .. }) => reason,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an illegal component"),
        }
    }

    // =========================================================================
    // Constructor injection
    // =========================================================================

    struct DefaultConstructor {
        built: bool,
    }

    impl Injectable for DefaultConstructor {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("DefaultConstructor")
                .default_constructor(|| DefaultConstructor { built: true })
        }
    }

    #[test]
    fn test_default_constructor_when_no_inject_constructor() {
        let (context, _) = context_with_dependency();
        let provider = InjectionProvider::<DefaultConstructor>::new().unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert!(instance.built);
        assert!(provider.dependencies().is_empty());
    }

    struct InjectConstructor {
        dependency: Arc<dyn Dependency>,
    }

    impl Injectable for InjectConstructor {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("InjectConstructor").inject_constructor(
                vec![Parameter::of::<Arc<dyn Dependency>>("dependency")],
                |args| {
                    Ok(InjectConstructor {
                        dependency: args.instance::<dyn Dependency>()?,
                    })
                },
            )
        }
    }

    #[test]
    fn test_inject_constructor_receives_dependency() {
        let (context, dependency) = context_with_dependency();
        let provider = InjectionProvider::<InjectConstructor>::new().unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert!(Arc::ptr_eq(&instance.dependency, &dependency));
        assert_eq!(
            provider.dependencies(),
            vec![ComponentRef::of::<dyn Dependency>()]
        );
    }

    struct ProviderInjectConstructor {
        dependency: Provider<dyn Dependency>,
    }

    impl Injectable for ProviderInjectConstructor {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("ProviderInjectConstructor").inject_constructor(
                vec![Parameter::of::<Provider<dyn Dependency>>("dependency")],
                |args| {
                    Ok(ProviderInjectConstructor {
                        dependency: args.provider::<dyn Dependency>()?,
                    })
                },
            )
        }
    }

    #[test]
    fn test_inject_constructor_receives_provider() {
        let (context, dependency) = context_with_dependency();
        let provider = InjectionProvider::<ProviderInjectConstructor>::new().unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert!(Arc::ptr_eq(&instance.dependency.get().unwrap(), &dependency));
        assert_eq!(
            provider.dependencies(),
            vec![ComponentRef::typed::<Provider<dyn Dependency>>()]
        );
    }

    struct Unit;

    #[test]
    fn test_abstract_component_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("AbstractComponent")
            .kind(ClassKind::Abstract)
            .default_constructor(|| Unit);
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::Abstract
        );
    }

    #[test]
    fn test_interface_component_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("TestComponent").kind(ClassKind::Interface);
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::Interface
        );
    }

    #[test]
    fn test_multiple_inject_constructors_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("MultiInjectConstructor")
            .inject_constructor(vec![Parameter::of::<Arc<String>>("name")], |_| Ok(Unit))
            .inject_constructor(vec![Parameter::of::<Arc<f64>>("value")], |_| Ok(Unit));
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::MultipleInjectConstructors
        );
    }

    #[test]
    fn test_no_inject_nor_default_constructor_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("NoInjectNorDefault").constructor(
            ConstructorDescriptor::plain(vec![Parameter::of::<Arc<String>>("name")], |_| Ok(Unit)),
        );
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::NoInjectOrDefaultConstructor
        );
    }

    #[test]
    fn test_inject_constructor_with_qualifier() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("QualifiedConstructor").inject_constructor(
            vec![Parameter::of::<Arc<dyn Dependency>>("dependency").named("ChosenOne")],
            |args| {
                Ok(InjectConstructor {
                    dependency: args.instance::<dyn Dependency>()?,
                })
            },
        );
        let provider = InjectionProvider::<InjectConstructor>::from_descriptor(descriptor).unwrap();

        assert_eq!(
            provider.dependencies(),
            vec![ComponentRef::qualified::<dyn Dependency>(Annotation::named("ChosenOne"))]
        );
        assert_eq!(provider.instantiate(&context).unwrap().dependency.id(), 42);
    }

    #[test]
    fn test_inject_constructor_multiple_qualifiers_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("MultiQualifierConstructor").inject_constructor(
            vec![Parameter::of::<Arc<dyn Dependency>>("dependency")
                .named("ChosenOne")
                .annotated(Annotation::qualifier("Skywalker"))],
            |_| Ok(Unit),
        );
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::MultipleQualifiers("dependency")
        );
    }

    // =========================================================================
    // Method injection
    // =========================================================================

    #[derive(Default)]
    struct SuperClass {
        super_called: u32,
    }

    fn super_level<C: 'static, F>(base: F) -> ClassLevel<C>
    where
        F: Fn(&mut C) -> &mut SuperClass + Send + Sync + 'static,
    {
        ClassLevel::new("SuperClassWithInjectMethod").method(MethodDescriptor::inject(
            "install",
            vec![],
            move |this: &mut C, _| {
                base(this).super_called += 1;
                Ok(())
            },
        ))
    }

    #[derive(Default)]
    struct SubClassWithInjectMethod {
        base: SuperClass,
        sub_called: u32,
    }

    impl Injectable for SubClassWithInjectMethod {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("SubClassWithInjectMethod")
                .default_constructor(Self::default)
                .method(MethodDescriptor::inject("installAnother", vec![], |this: &mut Self, _| {
                    this.sub_called = this.base.super_called + 1;
                    Ok(())
                }))
                .extends(super_level(|this: &mut Self| &mut this.base))
        }
    }

    #[test]
    fn test_inject_method_without_dependencies_is_called() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("InjectMethodWithNoDependency")
            .default_constructor(SuperClass::default)
            .method(MethodDescriptor::inject("install", vec![], |this: &mut SuperClass, _| {
                this.super_called += 1;
                Ok(())
            }));
        let provider = InjectionProvider::<SuperClass>::from_descriptor(descriptor).unwrap();

        assert_eq!(provider.instantiate(&context).unwrap().super_called, 1);
    }

    #[test]
    fn test_superclass_inject_methods_run_first() {
        let (context, _) = context_with_dependency();
        let provider = InjectionProvider::<SubClassWithInjectMethod>::new().unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert_eq!(instance.base.super_called, 1);
        assert_eq!(instance.sub_called, 2);
    }

    #[test]
    fn test_overriding_inject_method_called_once() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("SubClassOverrideSuperClassWithInject")
            .default_constructor(SubClassWithInjectMethod::default)
            .method(MethodDescriptor::inject("install", vec![], |this: &mut SubClassWithInjectMethod, _| {
                this.base.super_called += 1;
                Ok(())
            }))
            .extends(super_level(|this: &mut SubClassWithInjectMethod| &mut this.base));
        let provider =
            InjectionProvider::<SubClassWithInjectMethod>::from_descriptor(descriptor).unwrap();

        assert_eq!(provider.instantiate(&context).unwrap().base.super_called, 1);
    }

    #[test]
    fn test_override_without_inject_opts_out() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("SubClassOverrideSuperClassWithNoInject")
            .default_constructor(SubClassWithInjectMethod::default)
            .method(MethodDescriptor::plain("install", vec![]))
            .extends(super_level(|this: &mut SubClassWithInjectMethod| &mut this.base));
        let provider =
            InjectionProvider::<SubClassWithInjectMethod>::from_descriptor(descriptor).unwrap();

        assert_eq!(provider.instantiate(&context).unwrap().base.super_called, 0);
    }

    #[test]
    fn test_override_with_other_signature_still_injected() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("SubClassOverloadsInstall")
            .default_constructor(SubClassWithInjectMethod::default)
            .method(MethodDescriptor::plain(
                "install",
                vec![DeclaredType::of::<Arc<dyn Dependency>>()],
            ))
            .extends(super_level(|this: &mut SubClassWithInjectMethod| &mut this.base));
        let provider =
            InjectionProvider::<SubClassWithInjectMethod>::from_descriptor(descriptor).unwrap();

        assert_eq!(provider.instantiate(&context).unwrap().base.super_called, 1);
    }

    #[derive(Default)]
    struct InjectMethodWithDependency {
        dependency: Option<Arc<dyn Dependency>>,
        deferred: Option<Provider<dyn Dependency>>,
    }

    #[test]
    fn test_inject_method_receives_dependencies() {
        let (context, dependency) = context_with_dependency();
        let descriptor = ClassDescriptor::new("InjectMethodWithDependency")
            .default_constructor(InjectMethodWithDependency::default)
            .method(MethodDescriptor::inject(
                "install",
                vec![
                    Parameter::of::<Arc<dyn Dependency>>("dependency"),
                    Parameter::of::<Provider<dyn Dependency>>("deferred").named("ChosenOne"),
                ],
                |this: &mut InjectMethodWithDependency, args| {
                    this.dependency = Some(args.instance::<dyn Dependency>()?);
                    this.deferred = Some(args.provider::<dyn Dependency>()?);
                    Ok(())
                },
            ));
        let provider =
            InjectionProvider::<InjectMethodWithDependency>::from_descriptor(descriptor).unwrap();

        assert_eq!(
            provider.dependencies(),
            vec![
                ComponentRef::of::<dyn Dependency>(),
                ComponentRef::typed::<Provider<dyn Dependency>>()
                    .with_qualifier(Annotation::named("ChosenOne")),
            ]
        );

        let instance = provider.instantiate(&context).unwrap();
        assert!(Arc::ptr_eq(instance.dependency.as_ref().unwrap(), &dependency));
        assert_eq!(instance.deferred.unwrap().get().unwrap().id(), 42);
    }

    #[test]
    fn test_type_parameterized_inject_method_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("InjectMethodWithTypeParameter")
            .default_constructor(|| Unit)
            .method(MethodDescriptor::inject("install", vec![], |_: &mut Unit, _| Ok(())).type_parameters(1));
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::TypeParameterizedInjectMethod("install")
        );
    }

    #[test]
    fn test_inject_method_multiple_qualifiers_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("MultiQualifierInjectMethod")
            .default_constructor(|| Unit)
            .method(MethodDescriptor::inject(
                "install",
                vec![Parameter::of::<Arc<dyn Dependency>>("dependency")
                    .named("ChosenOne")
                    .annotated(Annotation::qualifier("Skywalker"))],
                |_: &mut Unit, _| Ok(()),
            ));
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::MultipleQualifiers("dependency")
        );
    }

    // =========================================================================
    // Field injection
    // =========================================================================

    #[derive(Default)]
    struct ComponentWithFieldInjection {
        dependency: Option<Arc<dyn Dependency>>,
    }

    fn field_level<C: 'static, F>(base: F) -> ClassLevel<C>
    where
        F: Fn(&mut C) -> &mut ComponentWithFieldInjection + Send + Sync + 'static,
    {
        ClassLevel::new("ComponentWithFieldInjection").field(FieldDescriptor::inject(
            Parameter::of::<Arc<dyn Dependency>>("dependency"),
            move |this: &mut C, arg| {
                base(this).dependency = Some(arg.instance::<dyn Dependency>()?);
                Ok(())
            },
        ))
    }

    #[derive(Default)]
    struct SubClassWithFieldInjection {
        base: ComponentWithFieldInjection,
        seen_in_method: bool,
    }

    impl Injectable for SubClassWithFieldInjection {
        fn descriptor() -> ClassDescriptor<Self> {
            ClassDescriptor::new("SubClassWithFieldInjection")
                .default_constructor(Self::default)
                .method(MethodDescriptor::inject("check", vec![], |this: &mut Self, _| {
                    this.seen_in_method = this.base.dependency.is_some();
                    Ok(())
                }))
                .extends(field_level(|this: &mut Self| &mut this.base))
        }
    }

    #[test]
    fn test_superclass_inject_field_set_before_methods() {
        let (context, dependency) = context_with_dependency();
        let provider = InjectionProvider::<SubClassWithFieldInjection>::new().unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert!(Arc::ptr_eq(instance.base.dependency.as_ref().unwrap(), &dependency));
        assert!(instance.seen_in_method);
        assert_eq!(provider.dependencies(), vec![ComponentRef::of::<dyn Dependency>()]);
    }

    #[test]
    fn test_inject_field_with_qualifier() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::new("InjectField")
            .default_constructor(ComponentWithFieldInjection::default)
            .field(FieldDescriptor::inject(
                Parameter::of::<Arc<dyn Dependency>>("dependency").named("ChosenOne"),
                |this: &mut ComponentWithFieldInjection, arg| {
                    this.dependency = Some(arg.instance::<dyn Dependency>()?);
                    Ok(())
                },
            ));
        let provider =
            InjectionProvider::<ComponentWithFieldInjection>::from_descriptor(descriptor).unwrap();

        let instance = provider.instantiate(&context).unwrap();
        assert_eq!(instance.dependency.unwrap().id(), 42);
    }

    #[test]
    fn test_final_inject_field_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("FinalInjectField")
            .default_constructor(|| Unit)
            .field(
                FieldDescriptor::inject(Parameter::of::<Arc<dyn Dependency>>("dependency"), |_: &mut Unit, _| {
                    Ok(())
                })
                .final_field(),
            );
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::FinalInjectField("dependency")
        );
    }

    #[test]
    fn test_inject_field_multiple_qualifiers_illegal() {
        let descriptor = ClassDescriptor::<Unit>::new("MultiQualifierInjectField")
            .default_constructor(|| Unit)
            .field(FieldDescriptor::inject(
                Parameter::of::<Arc<dyn Dependency>>("dependency")
                    .named("ChosenOne")
                    .annotated(Annotation::qualifier("Skywalker")),
                |_: &mut Unit, _| Ok(()),
            ));
        assert_eq!(
            reason(InjectionProvider::<Unit>::from_descriptor(descriptor)),
            IllegalComponentReason::MultipleQualifiers("dependency")
        );
    }

    // =========================================================================
    // Failures and statics
    // =========================================================================

    #[test]
    fn test_constructor_failure_is_invocation_error() {
        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::<Unit>::new("Failing")
            .constructor(ConstructorDescriptor::plain(vec![], |_| Err("boom".into())));
        let provider = InjectionProvider::<Unit>::from_descriptor(descriptor).unwrap();

        match provider.instantiate(&context) {
            Err(DiError::Invocation { component, reason }) => {
                assert_eq!(component, "Failing");
                assert_eq!(reason, "boom");
            }
            _ => panic!("expected invocation error"),
        }
    }

    #[test]
    fn test_statics_run_once() {
        static RUNS: AtomicU32 = AtomicU32::new(0);

        let (context, _) = context_with_dependency();
        let descriptor = ClassDescriptor::<Unit>::new("StaticInjection")
            .default_constructor(|| Unit)
            .static_method(StaticMethodDescriptor::inject(
                "configure",
                vec![Parameter::of::<Arc<dyn Dependency>>("dependency")],
                |args| {
                    assert_eq!(args.instance::<dyn Dependency>()?.id(), 7);
                    RUNS.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            ));
        let provider = InjectionProvider::<Unit>::from_descriptor(descriptor).unwrap();

        assert_eq!(provider.dependencies(), vec![ComponentRef::of::<dyn Dependency>()]);
        provider.statics(&context).unwrap();
        provider.statics(&context).unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_upcasts_to_interface() {
        struct Impl;
        impl Dependency for Impl {
            fn id(&self) -> u32 {
                99
            }
        }
        crate::implements!(Impl => dyn Dependency);
        impl Injectable for Impl {
            fn descriptor() -> ClassDescriptor<Self> {
                ClassDescriptor::new("Impl").default_constructor(|| Impl)
            }
        }

        let (context, _) = context_with_dependency();
        let provider = InjectionProvider::<Impl, dyn Dependency>::new().unwrap();

        let instance = provider.get(&context).unwrap();
        assert_eq!(instance.downcast::<dyn Dependency>().unwrap().id(), 99);
    }
}
