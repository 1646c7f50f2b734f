//! Mutable registration surface, frozen into a [`Container`].
//!
//! The builder collects registrations; [`build`](ContainerBuilder::build)
//! produces the immutable snapshot every resolution path reads. Because
//! `build` consumes the builder, mutating a locked container is
//! unrepresentable; the registration-time failure modes (duplicate key,
//! malformed open registration) are returned synchronously here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::conditional::{
    ConditionalCandidate, ConditionalPredicate, ConditionalSet, PredicateContext,
};
use crate::decorator::{
    erase_service_decorator, erase_trait_decorator, DecoratorRegistration, ServiceDecorator,
    TraitDecorator,
};
use crate::error::{DiError, DiResult};
use crate::key::{key_of, ServiceKey};
use crate::lifetime::Lifetime;
use crate::observer::{ContainerObserver, Observers};
use crate::plan::{DefaultPlanCompiler, PlanCompiler, PlanRewriter};
use crate::provider::{Container, ResolutionContext};
use crate::registration::{
    ClosedBinding, Constructed, DependencySource, InstanceFactory, OpenRegistration, Registration,
    Registry,
};
use crate::traits::{
    AsyncDispose, ConstructorPolicy, DiagnosticAnalyzer, Dispose, ExactTypeRelations,
    TypeRelations,
};

/// Collects service registrations and builds the container.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
///
/// struct Config { retries: u32 }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Config { retries: 3 }).unwrap();
///
/// let container = builder.build();
/// assert_eq!(container.get_required::<Config>().retries, 3);
/// ```
pub struct ContainerBuilder {
    single: HashMap<ServiceKey, ConditionalSet>,
    collections: HashMap<ServiceKey, Vec<Arc<Registration>>>,
    open: Vec<OpenRegistration>,
    decorators: HashMap<ServiceKey, Vec<Arc<DecoratorRegistration>>>,
    rewriters: Vec<Arc<dyn PlanRewriter>>,
    analyzers: Vec<Arc<dyn DiagnosticAnalyzer>>,
    observers: Observers,
    compiler: Arc<dyn PlanCompiler>,
    relations: Arc<dyn TypeRelations>,
    policy: Option<Arc<dyn ConstructorPolicy>>,
}

impl ContainerBuilder {
    /// Creates an empty builder with the default plan compiler and the
    /// exact-match type oracle.
    pub fn new() -> Self {
        Self {
            single: HashMap::new(),
            collections: HashMap::new(),
            open: Vec::new(),
            decorators: HashMap::new(),
            rewriters: Vec::new(),
            analyzers: Vec::new(),
            observers: Observers::new(),
            compiler: Arc::new(DefaultPlanCompiler),
            relations: Arc::new(ExactTypeRelations),
            policy: None,
        }
    }

    // ----- Concrete registrations -----

    /// Registers a factory for the concrete type `T` under `lifetime`.
    ///
    /// Fails with a configuration error when an unconditional
    /// registration for `T` already exists.
    pub fn register<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    /// Registers a fallible factory for `T`; an `Err` from the factory
    /// surfaces as an activation failure wrapped with the requesting
    /// chain.
    pub fn register_try<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> DiResult<T> + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)?))));
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    /// Registers an existing instance as a singleton.
    pub fn register_instance<T>(&mut self, value: T) -> DiResult<&mut Self>
    where
        T: Send + Sync + 'static,
    {
        let shared = Arc::new(value);
        let erased: InstanceFactory =
            Arc::new(move |_: &ResolutionContext| Ok(Constructed::new(shared.clone())));
        self.insert_unconditional(
            key_of::<T>(),
            Registration::new(Lifetime::Singleton, key_of::<T>(), erased),
        )
    }

    /// Registers a factory for a disposable `T`. Each created instance is
    /// owned by its caching scope and disposed with it, in reverse
    /// creation order.
    pub fn register_disposable<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: Dispose,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory = Arc::new(move |ctx: &ResolutionContext| {
            let value = Arc::new(factory(ctx));
            Ok(Constructed::new(value.clone()).with_disposer(value))
        });
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    /// Registers a factory for an async-disposable `T`. Created instances
    /// tear down through their asynchronous path during `dispose_async`.
    pub fn register_async_disposable<T, F>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
    ) -> DiResult<&mut Self>
    where
        T: AsyncDispose,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory = Arc::new(move |ctx: &ResolutionContext| {
            let value = Arc::new(factory(ctx));
            Ok(Constructed::new(value.clone()).with_async_disposer(value))
        });
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    // ----- Trait-object registrations -----

    /// Registers a factory for the trait object `T`.
    pub fn register_trait<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Arc<T> + Send + Sync + 'static,
    {
        // Trait objects are stored double-wrapped: Arc<Arc<dyn T>>.
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    /// Registers an existing trait-object instance as a singleton.
    pub fn register_trait_instance<T>(&mut self, value: Arc<T>) -> DiResult<&mut Self>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let shared: Arc<Arc<T>> = Arc::new(value);
        let erased: InstanceFactory =
            Arc::new(move |_: &ResolutionContext| Ok(Constructed::new(shared.clone())));
        self.insert_unconditional(
            key_of::<T>(),
            Registration::new(Lifetime::Singleton, key_of::<T>(), erased),
        )
    }

    /// Registers a factory for a disposable trait object `T`.
    pub fn register_trait_disposable<T, F>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
    ) -> DiResult<&mut Self>
    where
        T: ?Sized + Dispose,
        F: Fn(&ResolutionContext) -> Arc<T> + Send + Sync + 'static,
    {
        let erased: InstanceFactory = Arc::new(move |ctx: &ResolutionContext| {
            let value = factory(ctx);
            Ok(Constructed::new(Arc::new(value.clone())).with_disposer(value))
        });
        self.insert_unconditional(key_of::<T>(), Registration::new(lifetime, key_of::<T>(), erased))
    }

    // ----- Conditional registrations -----

    /// Registers a guarded factory for `T`.
    ///
    /// The guard runs when `T` is resolved for a consumer shape not seen
    /// before; the chosen producer is cached, so the guard runs at most
    /// once per distinct (key, consumer) pair. Guards must be
    /// side-effect-stable across calls (documented contract, not
    /// enforced). Exactly one handler may apply per concrete resolution.
    pub fn register_conditional<T, F, P>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
        predicate: P,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
        P: Fn(&PredicateContext) -> bool + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        self.push_conditional(
            key_of::<T>(),
            Registration::new(lifetime, key_of::<T>(), erased),
            Arc::new(predicate),
        );
        self
    }

    /// Registers a guarded trait-object factory for `T`, backed by the
    /// implementation `TImpl` (used for predicate context and ambiguity
    /// reporting).
    pub fn register_conditional_trait<T, TImpl, F, P>(
        &mut self,
        lifetime: Lifetime,
        factory: F,
        predicate: P,
    ) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        TImpl: 'static,
        F: Fn(&ResolutionContext) -> Arc<T> + Send + Sync + 'static,
        P: Fn(&PredicateContext) -> bool + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        self.push_conditional(
            key_of::<T>(),
            Registration::new(lifetime, key_of::<TImpl>(), erased),
            Arc::new(predicate),
        );
        self
    }

    // ----- Collections -----

    /// Appends an element to the collection registered for `T`.
    ///
    /// Elements keep registration order; enumerating the collection
    /// re-resolves each element according to that element's own lifetime.
    pub fn append<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        let mut registration = Registration::new(lifetime, key_of::<T>(), erased);
        registration.is_collection = true;
        self.collections
            .entry(key_of::<T>())
            .or_default()
            .push(Arc::new(registration));
        self
    }

    /// Appends a trait-object element, backed by `TImpl`, to the
    /// collection registered for `T`.
    pub fn append_trait<T, TImpl, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        TImpl: 'static,
        F: Fn(&ResolutionContext) -> Arc<T> + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        let mut registration = Registration::new(lifetime, key_of::<TImpl>(), erased);
        registration.is_collection = true;
        self.collections
            .entry(key_of::<T>())
            .or_default()
            .push(Arc::new(registration));
        self
    }

    // ----- Open templates -----

    /// Registers an open template. When a closed key has no direct
    /// registration, the type oracle is asked to close each template
    /// against it; on success the binder supplies the closed rule, which
    /// enters the producer cache under the requested key.
    ///
    /// Rejected synchronously when `key` is not open or the template name
    /// is already registered.
    pub fn register_open<F>(&mut self, key: ServiceKey, binder: F) -> DiResult<&mut Self>
    where
        F: Fn(&ServiceKey) -> Option<ClosedBinding> + Send + Sync + 'static,
    {
        if !key.is_open() {
            return Err(DiError::Configuration(format!(
                "open registration requires an open key, got {}",
                key
            )));
        }
        if self.open.iter().any(|existing| existing.key == key) {
            return Err(DiError::Configuration(format!(
                "duplicate open registration for {}",
                key
            )));
        }
        self.open.push(OpenRegistration {
            key,
            binder: Arc::new(binder),
        });
        Ok(self)
    }

    // ----- Dependency declarations -----

    /// Registers `T` with explicitly declared dependency edges. The edges
    /// are forced into producers at plan-build time, which is what the
    /// verification fixed point walks.
    pub fn register_with_dependencies<T, F>(
        &mut self,
        lifetime: Lifetime,
        dependencies: Vec<ServiceKey>,
        factory: F,
    ) -> DiResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        let mut registration = Registration::new(lifetime, key_of::<T>(), erased);
        registration.dependencies = DependencySource::Declared(dependencies);
        self.insert_unconditional(key_of::<T>(), registration)
    }

    /// Registers `T` with dependency edges supplied by the installed
    /// constructor policy at plan-build time. A policy rejection becomes
    /// an activation failure for `T`.
    pub fn register_auto<T, F>(&mut self, lifetime: Lifetime, factory: F) -> DiResult<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        let mut registration = Registration::new(lifetime, key_of::<T>(), erased);
        registration.dependencies = DependencySource::Policy;
        self.insert_unconditional(key_of::<T>(), registration)
    }

    // ----- Decorators -----

    /// Registers a decorator for the concrete service `T`. Decorators
    /// apply in registration order, the last applied being the one
    /// closest to the consumer.
    pub fn register_decorator<T, D>(&mut self, decorator: D) -> &mut Self
    where
        T: Send + Sync + 'static,
        D: ServiceDecorator<T> + 'static,
    {
        let registration = Arc::new(erase_service_decorator::<T, D>(decorator));
        self.decorators
            .entry(registration.service.clone())
            .or_default()
            .push(registration);
        self
    }

    /// Registers a decorator for the trait-object service `T`.
    pub fn register_trait_decorator<T, D>(&mut self, decorator: D) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        D: TraitDecorator<T> + 'static,
    {
        let registration = Arc::new(erase_trait_decorator::<T, D>(decorator));
        self.decorators
            .entry(registration.service.clone())
            .or_default()
            .push(registration);
        self
    }

    // ----- Collaborators and hooks -----

    /// Replaces the construction-plan compiler.
    pub fn set_plan_compiler(&mut self, compiler: impl PlanCompiler + 'static) -> &mut Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Replaces the type-compatibility oracle.
    pub fn set_type_relations(&mut self, relations: impl TypeRelations + 'static) -> &mut Self {
        self.relations = Arc::new(relations);
        self
    }

    /// Installs the constructor-selection policy consulted by
    /// [`register_auto`](Self::register_auto) registrations.
    pub fn set_constructor_policy(&mut self, policy: impl ConstructorPolicy + 'static) -> &mut Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Adds a plan rewrite hook, run after decoration. An incompatible
    /// rewrite is rejected with a configuration error at plan-build time.
    pub fn add_plan_rewriter(&mut self, rewriter: impl PlanRewriter + 'static) -> &mut Self {
        self.rewriters.push(Arc::new(rewriter));
        self
    }

    /// Adds a diagnostic analyzer, run only by `verify_and_diagnose`.
    pub fn add_analyzer(&mut self, analyzer: impl DiagnosticAnalyzer + 'static) -> &mut Self {
        self.analyzers.push(Arc::new(analyzer));
        self
    }

    /// Adds an event observer.
    pub fn add_observer(&mut self, observer: Arc<dyn ContainerObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Freezes the registrations into an immutable container.
    pub fn build(self) -> Container {
        let mut registry = Registry::new();
        registry.single = self.single;
        registry.collections = self.collections;
        registry.open = self.open;
        Container::from_parts(
            registry,
            self.decorators,
            self.rewriters,
            self.analyzers,
            self.compiler,
            self.relations,
            self.policy,
            self.observers,
        )
    }

    // ----- Internals -----

    fn insert_unconditional(
        &mut self,
        key: ServiceKey,
        registration: Registration,
    ) -> DiResult<&mut Self> {
        let set = self.single.entry(key.clone()).or_default();
        if set.unconditional.is_some() {
            return Err(DiError::Configuration(format!(
                "duplicate registration for {}",
                key
            )));
        }
        set.unconditional = Some(Arc::new(registration));
        Ok(self)
    }

    fn push_conditional(
        &mut self,
        key: ServiceKey,
        registration: Registration,
        predicate: Arc<ConditionalPredicate>,
    ) {
        self.single
            .entry(key)
            .or_default()
            .candidates
            .push(ConditionalCandidate {
                registration: Arc::new(registration),
                predicate,
            });
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
