//! Instance producers: the unit of caching in the resolution engine.
//!
//! A producer pairs a resolved service key with its chosen registration
//! and build state. Producers are created once per distinct resolution
//! shape, live for the container's lifetime, and are never recreated.

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::conditional::ConditionalPredicate;
use crate::error::{DiError, DiResult};
use crate::internal::chain::current_chain;
use crate::internal::dispose_bag::panic_message;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::plan::{ConstructionPlan, ExecutableFactory};
use crate::provider::{select_scope, Container, ResolutionContext, Scope};
use crate::registration::{AnyArc, Constructed, Registration};

/// The cached pairing of a service key with its chosen registration.
///
/// Owns a lazily built, memoized construction plan and compiled factory
/// (first caller wins; racing callers block), and tracks three
/// independent completion flags: plan built, instance created at least
/// once, and extra verifiers run.
pub struct InstanceProducer {
    key: ServiceKey,
    registration: Arc<Registration>,
    #[allow(dead_code)]
    predicate: Option<Arc<ConditionalPredicate>>,
    plan: OnceCell<Arc<ConstructionPlan>>,
    executable: OnceCell<ExecutableFactory>,
    plan_built: AtomicBool,
    instantiated: AtomicBool,
    verifiers_run: AtomicBool,
    referenced: AtomicBool,
    must_verify: AtomicBool,
}

impl InstanceProducer {
    pub(crate) fn new(
        key: ServiceKey,
        registration: Arc<Registration>,
        predicate: Option<Arc<ConditionalPredicate>>,
    ) -> Self {
        Self {
            key,
            registration,
            predicate,
            plan: OnceCell::new(),
            executable: OnceCell::new(),
            plan_built: AtomicBool::new(false),
            instantiated: AtomicBool::new(false),
            verifiers_run: AtomicBool::new(false),
            referenced: AtomicBool::new(false),
            must_verify: AtomicBool::new(false),
        }
    }

    /// The service key this producer satisfies.
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The registration backing this producer.
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Declared lifetime of the backing registration.
    pub fn lifetime(&self) -> Lifetime {
        self.registration.lifetime
    }

    /// Whether the construction plan has been built.
    pub fn is_plan_built(&self) -> bool {
        self.plan_built.load(Ordering::SeqCst)
    }

    /// Whether at least one instance has been created.
    pub fn is_instantiated(&self) -> bool {
        self.instantiated.load(Ordering::SeqCst)
    }

    /// Whether the verification pass has covered this producer as a root.
    pub fn verifiers_run(&self) -> bool {
        self.verifiers_run.load(Ordering::SeqCst)
    }

    /// Whether any other producer depends on this one.
    pub fn is_referenced(&self) -> bool {
        self.referenced.load(Ordering::SeqCst)
    }

    /// Whether this producer must be instantiated during verification
    /// even when it is not a graph root.
    pub fn must_verify(&self) -> bool {
        self.must_verify.load(Ordering::SeqCst)
    }

    /// Flags this producer for explicit verification. Diagnostic
    /// collaborators use this to force instantiation of non-root
    /// producers during `verify()`.
    pub fn mark_for_explicit_verification(&self) {
        self.must_verify.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_referenced(&self) {
        self.referenced.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_verifiers_run(&self) {
        self.verifiers_run.store(true, Ordering::SeqCst);
    }

    /// The memoized construction plan, building it on first call.
    ///
    /// Racing builders block on the cell; the first caller's plan wins.
    pub(crate) fn build_plan(&self, container: &Container) -> DiResult<Arc<ConstructionPlan>> {
        let plan = self
            .plan
            .get_or_try_init(|| container.build_plan_for(self))?
            .clone();
        self.plan_built.store(true, Ordering::SeqCst);
        Ok(plan)
    }

    /// The decorated, rewritten plan if it has been built.
    pub fn plan_if_built(&self) -> Option<Arc<ConstructionPlan>> {
        self.plan.get().cloned()
    }

    fn executable(&self, container: &Container) -> DiResult<ExecutableFactory> {
        if let Some(factory) = self.executable.get() {
            return Ok(factory.clone());
        }
        let plan = self.build_plan(container)?;
        let factory = self
            .executable
            .get_or_try_init(|| container.inner().compiler.compile(&plan))?;
        Ok(factory.clone())
    }

    /// Resolves one instance, caching it per the registration's lifetime.
    pub(crate) fn resolve(&self, container: &Container, scope: Option<&Scope>) -> DiResult<AnyArc> {
        let lifetime = self.registration.lifetime;
        let instance = match lifetime {
            Lifetime::Singleton => container
                .root_state()
                .get_or_add_any(&self.key, || self.create(container, scope))?,
            Lifetime::Transient => {
                let constructed = self.create(container, scope)?;
                // Transient disposables are owned by the scope active at
                // creation, the container root state otherwise.
                if let Some(hook) = constructed.disposer {
                    match select_scope(scope.cloned(), crate::provider::thread_bound_scope()) {
                        Some(active) => active.state().push_entry(hook),
                        None => container.root_state().push_entry(hook),
                    }
                }
                constructed.instance
            }
            Lifetime::Scoped | Lifetime::Custom(_) => {
                let active = select_scope(scope.cloned(), crate::provider::thread_bound_scope())
                    .ok_or_else(|| {
                        DiError::activation(
                            self.key.display_name(),
                            current_chain(),
                            format!("{} service requires an active scope", lifetime),
                        )
                    })?;
                active
                    .state()
                    .get_or_add_any(&self.key, || self.create(container, Some(&active)))?
            }
        };
        self.instantiated.store(true, Ordering::SeqCst);
        Ok(instance)
    }

    fn create(&self, container: &Container, scope: Option<&Scope>) -> DiResult<Constructed> {
        let factory = self.executable(container)?;
        let ctx = ResolutionContext::new(
            container,
            select_scope(scope.cloned(), crate::provider::thread_bound_scope()),
            self.registration.implementation.clone(),
        );
        match catch_unwind(AssertUnwindSafe(|| factory(&ctx))) {
            Ok(result) => {
                result.map_err(|err| err.in_context(self.key.display_name(), current_chain()))
            }
            Err(payload) => Err(DiError::activation(
                self.key.display_name(),
                current_chain(),
                format!("factory panicked: {}", panic_message(payload.as_ref())),
            )),
        }
    }
}

/// Live, ordered view over a collection registration.
///
/// Enumerating the stream re-resolves each element according to that
/// element's own lifetime, so transient elements differ per enumeration
/// while singleton elements stay shared.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
///
/// struct Step(&'static str);
///
/// let mut builder = ContainerBuilder::new();
/// builder.append::<Step, _>(Lifetime::Transient, |_| Step("parse"));
/// builder.append::<Step, _>(Lifetime::Transient, |_| Step("check"));
///
/// let container = builder.build();
/// let stream = container.stream::<Step>();
/// let steps = stream.resolve_all().unwrap();
/// assert_eq!(steps.len(), 2);
/// assert_eq!(steps[0].0, "parse");
/// assert_eq!(steps[1].0, "check");
/// ```
pub struct InstanceStream<T: ?Sized> {
    container: Container,
    producers: Arc<[Arc<InstanceProducer>]>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> InstanceStream<T> {
    pub(crate) fn new(container: Container, producers: Arc<[Arc<InstanceProducer>]>) -> Self {
        Self {
            container,
            producers,
            _marker: PhantomData,
        }
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Whether the collection has no elements.
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl<T: Send + Sync + 'static> InstanceStream<T> {
    /// Resolves every element once, in registration order.
    pub fn resolve_all(&self) -> DiResult<Vec<Arc<T>>> {
        self.iter().collect()
    }

    /// Iterates the elements, resolving each lazily.
    pub fn iter(&self) -> impl Iterator<Item = DiResult<Arc<T>>> + '_ {
        self.producers.iter().map(move |producer| {
            let any = self.container.resolve_with_producer(producer)?;
            any.downcast::<T>()
                .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
        })
    }
}

impl<T: ?Sized + Send + Sync + 'static> InstanceStream<T> {
    /// Resolves every trait-object element once, in registration order.
    pub fn resolve_all_trait(&self) -> DiResult<Vec<Arc<T>>> {
        self.producers
            .iter()
            .map(|producer| {
                let any = self.container.resolve_with_producer(producer)?;
                any.downcast::<Arc<T>>()
                    .map(|arc| (*arc).clone())
                    .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
            })
            .collect()
    }
}
