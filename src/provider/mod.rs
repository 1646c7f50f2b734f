//! The container: locked registries, the producer cache, and resolution.
//!
//! A [`Container`] is the immutable snapshot produced by
//! [`ContainerBuilder::build`](crate::ContainerBuilder::build). The hot
//! resolution path reads the registry without locks; the producer caches
//! are append-only maps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::conditional::{ConditionalPredicate, Dispatch};
use crate::decorator::{apply_decorators, DecoratorRegistration};
use crate::error::{DiError, DiResult};
use crate::internal::chain::{current_chain, with_resolution_frame};
use crate::key::ServiceKey;
use crate::observer::Observers;
use crate::plan::{ConstructionPlan, PlanNode, PlanRewriter};
use crate::producer::{InstanceProducer, InstanceStream};
use crate::registration::{AnyArc, DependencySource, Registration, Registry};
use crate::traits::{
    BoxDisposeFuture, ConstructorPolicy, DiagnosticAnalyzer, DisposeResult, PlanCompiler,
    ResolverCore, TypeRelations,
};
use crate::verification::VerificationPhase;

pub mod context;
pub mod scope;

pub use context::{select_scope, ConsumerInfo, ResolutionContext};
pub use scope::{Scope, ScopeGuard};

pub(crate) use scope::{thread_bound_scope, ScopeKind, ScopeState};

/// The dependency-resolution runtime.
///
/// Cheap to clone (`Arc` internally) and fully thread-safe: registries
/// are immutable after build, producers are memoized first-caller-wins,
/// and singleton instances are cached in the container's root state.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<Database, _>(Lifetime::Singleton, |_| Database {
///     url: "postgres://localhost".to_string(),
/// }).unwrap();
/// builder.register::<UserService, _>(Lifetime::Transient, |ctx| UserService {
///     db: ctx.get_required::<Database>(),
/// }).unwrap();
///
/// let container = builder.build();
/// let service = container.get_required::<UserService>();
/// assert_eq!(service.db.url, "postgres://localhost");
/// ```
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

type ProducerIdentity = (ServiceKey, usize);

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) decorators: HashMap<ServiceKey, Vec<Arc<DecoratorRegistration>>>,
    pub(crate) rewriters: Vec<Arc<dyn PlanRewriter>>,
    pub(crate) analyzers: Vec<Arc<dyn DiagnosticAnalyzer>>,
    pub(crate) compiler: Arc<dyn PlanCompiler>,
    pub(crate) relations: Arc<dyn TypeRelations>,
    pub(crate) policy: Option<Arc<dyn ConstructorPolicy>>,
    pub(crate) observers: Observers,
    /// Memoized (key, consumer shape) -> producer dispatch results.
    dispatch_cache: Mutex<HashMap<(ServiceKey, ConsumerInfo), Arc<InstanceProducer>>>,
    /// One producer per distinct (key, registration) pair, append-only.
    identities: Mutex<HashMap<ProducerIdentity, Arc<InstanceProducer>>>,
    /// Every producer in creation order, for verification and snapshots.
    produced: Mutex<Vec<Arc<InstanceProducer>>>,
    /// Memoized element-producer sequences per collection key.
    streams: Mutex<HashMap<ServiceKey, Arc<[Arc<InstanceProducer>]>>>,
    root_state: Arc<ScopeState>,
    pub(crate) verification: Mutex<VerificationPhase>,
}

impl Container {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        registry: Registry,
        decorators: HashMap<ServiceKey, Vec<Arc<DecoratorRegistration>>>,
        rewriters: Vec<Arc<dyn PlanRewriter>>,
        analyzers: Vec<Arc<dyn DiagnosticAnalyzer>>,
        compiler: Arc<dyn PlanCompiler>,
        relations: Arc<dyn TypeRelations>,
        policy: Option<Arc<dyn ConstructorPolicy>>,
        observers: Observers,
    ) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry,
                decorators,
                rewriters,
                analyzers,
                compiler,
                relations,
                policy,
                observers,
                dispatch_cache: Mutex::new(HashMap::new()),
                identities: Mutex::new(HashMap::new()),
                produced: Mutex::new(Vec::new()),
                streams: Mutex::new(HashMap::new()),
                root_state: ScopeState::new(ScopeKind::Root),
                verification: Mutex::new(VerificationPhase::Idle),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    pub(crate) fn root_state(&self) -> &Arc<ScopeState> {
        &self.inner.root_state
    }

    /// Creates a new scope for resolving scoped services.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone(), ScopeKind::Plain)
    }

    pub(crate) fn create_verification_scope(&self) -> Scope {
        Scope::new(self.clone(), ScopeKind::Verification)
    }

    /// Every producer the container has created, in creation order.
    pub fn producers(&self) -> Vec<Arc<InstanceProducer>> {
        self.inner.produced.lock().unwrap().clone()
    }

    /// Live view over the collection registered for `T`.
    ///
    /// The stream is empty when no elements were appended for `T`.
    pub fn stream<T: ?Sized + 'static>(&self) -> InstanceStream<T> {
        let producers = self.stream_producers(&crate::key::key_of::<T>());
        InstanceStream::new(self.clone(), producers)
    }

    /// Disposes the container-owned singletons synchronously.
    ///
    /// Teardown runs in reverse creation order and aggregates failures;
    /// a second call is a no-op.
    pub fn dispose(&self) -> DiResult<()> {
        let (count, failures) = self.inner.root_state.dispose_sync();
        self.inner.observers.scope_disposed(count);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(failures))
        }
    }

    /// Disposes the container-owned singletons, awaiting async-capable
    /// disposables and falling back to synchronous disposal for the rest.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let (count, failures) = self.inner.root_state.dispose_async().await;
        self.inner.observers.scope_disposed(count);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(failures))
        }
    }

    // ----- Producer lookup -----

    /// Resolves or builds the producer for `key` as seen by `consumer`.
    ///
    /// `Ok(None)` means no registration handles the key. Ambiguous
    /// conditional matches are a configuration error naming every
    /// matching implementation.
    pub(crate) fn producer_for(
        &self,
        key: &ServiceKey,
        consumer: &ConsumerInfo,
    ) -> DiResult<Option<Arc<InstanceProducer>>> {
        if key.is_open() {
            return Err(DiError::Configuration(format!(
                "open key {} cannot be resolved directly",
                key
            )));
        }

        if let Some(set) = self.inner.registry.single.get(key) {
            if !set.is_conditional() {
                if let Some(registration) = &set.unconditional {
                    // Unconditional producers do not depend on the
                    // consumer; cache them under the root shape.
                    return Ok(Some(self.cached_producer(
                        key,
                        ConsumerInfo::Root,
                        registration,
                        None,
                    )));
                }
            } else {
                let cache_key = (key.clone(), consumer.clone());
                if let Some(producer) = self.inner.dispatch_cache.lock().unwrap().get(&cache_key) {
                    return Ok(Some(producer.clone()));
                }
                match set.dispatch(key, consumer) {
                    Dispatch::Ambiguous(names) => {
                        return Err(DiError::Configuration(format!(
                            "ambiguous registrations for {}: {} implementations apply ({})",
                            key,
                            names.len(),
                            names.join(", ")
                        )));
                    }
                    Dispatch::Selected {
                        registration,
                        predicate,
                    } => {
                        let producer = self.intern_producer(key, &registration, predicate);
                        self.inner
                            .dispatch_cache
                            .lock()
                            .unwrap()
                            .insert(cache_key, producer.clone());
                        return Ok(Some(producer));
                    }
                    Dispatch::Unresolved => {}
                }
            }
        }

        // Open templates: first registration the oracle closes wins.
        for open in &self.inner.registry.open {
            if self.inner.relations.close(&open.key, key).is_err() {
                continue;
            }
            if let Some(binding) = (open.binder)(key) {
                return Ok(Some(self.cached_producer(
                    key,
                    ConsumerInfo::Root,
                    &binding.registration,
                    None,
                )));
            }
        }

        Ok(None)
    }

    fn cached_producer(
        &self,
        key: &ServiceKey,
        cache_shape: ConsumerInfo,
        registration: &Arc<Registration>,
        predicate: Option<Arc<ConditionalPredicate>>,
    ) -> Arc<InstanceProducer> {
        let cache_key = (key.clone(), cache_shape);
        if let Some(producer) = self.inner.dispatch_cache.lock().unwrap().get(&cache_key) {
            return producer.clone();
        }
        let producer = self.intern_producer(key, registration, predicate);
        self.inner
            .dispatch_cache
            .lock()
            .unwrap()
            .insert(cache_key, producer.clone());
        producer
    }

    /// One producer per distinct (key, registration) pair; the append-only
    /// identity map guarantees reference stability.
    pub(crate) fn intern_producer(
        &self,
        key: &ServiceKey,
        registration: &Arc<Registration>,
        predicate: Option<Arc<ConditionalPredicate>>,
    ) -> Arc<InstanceProducer> {
        let identity = (
            key.clone(),
            Arc::as_ptr(registration) as *const () as usize,
        );
        let mut identities = self.inner.identities.lock().unwrap();
        if let Some(producer) = identities.get(&identity) {
            return producer.clone();
        }
        let producer = Arc::new(InstanceProducer::new(
            key.clone(),
            registration.clone(),
            predicate,
        ));
        identities.insert(identity, producer.clone());
        self.inner.produced.lock().unwrap().push(producer.clone());
        producer
    }

    pub(crate) fn stream_producers(&self, key: &ServiceKey) -> Arc<[Arc<InstanceProducer>]> {
        if let Some(existing) = self.inner.streams.lock().unwrap().get(key) {
            return existing.clone();
        }
        let elements: Vec<Arc<InstanceProducer>> = match self.inner.registry.collections.get(key) {
            Some(registrations) => registrations
                .iter()
                .enumerate()
                .map(|(index, registration)| {
                    let element_key = match key {
                        ServiceKey::Closed(id, name) => ServiceKey::Element(*id, *name, index),
                        other => other.clone(),
                    };
                    self.intern_producer(&element_key, registration, None)
                })
                .collect(),
            None => Vec::new(),
        };
        let elements: Arc<[Arc<InstanceProducer>]> = elements.into();
        let mut streams = self.inner.streams.lock().unwrap();
        streams.entry(key.clone()).or_insert(elements).clone()
    }

    // ----- Resolution -----

    pub(crate) fn resolve_key(
        &self,
        key: &ServiceKey,
        consumer: ConsumerInfo,
        scope: Option<&Scope>,
    ) -> DiResult<AnyArc> {
        let name = key.display_name();
        let observing = self.inner.observers.has_observers();
        let started = if observing {
            self.inner.observers.resolving(key);
            Some(Instant::now())
        } else {
            None
        };

        let result = with_resolution_frame(name, || {
            let producer = self
                .producer_for(key, &consumer)?
                .ok_or(DiError::NotFound(name))?;
            if !consumer.is_root() {
                producer.mark_referenced();
            }
            producer.resolve(self, scope)
        });

        if let Some(started) = started {
            match &result {
                Ok(_) => self.inner.observers.resolved(key, started.elapsed()),
                Err(err) => self.inner.observers.resolution_failed(key, err),
            }
        }
        result
    }

    pub(crate) fn resolve_stream_key(
        &self,
        key: &ServiceKey,
        consumer: ConsumerInfo,
        scope: Option<&Scope>,
    ) -> DiResult<Vec<AnyArc>> {
        let producers = self.stream_producers(key);
        let mut resolved = Vec::with_capacity(producers.len());
        for producer in producers.iter() {
            if !consumer.is_root() {
                producer.mark_referenced();
            }
            let instance = with_resolution_frame(producer.key().display_name(), || {
                producer.resolve(self, scope)
            })?;
            resolved.push(instance);
        }
        Ok(resolved)
    }

    pub(crate) fn resolve_with_producer(
        &self,
        producer: &Arc<InstanceProducer>,
    ) -> DiResult<AnyArc> {
        with_resolution_frame(producer.key().display_name(), || {
            producer.resolve(self, None)
        })
    }

    // ----- Plan building -----

    /// Builds the construction plan for `producer`: resolve the
    /// dependency source, force producers for the declared edges (this is
    /// what lets plan building register brand-new producers), apply
    /// decorators, then run rewriters.
    pub(crate) fn build_plan_for(
        &self,
        producer: &InstanceProducer,
    ) -> DiResult<Arc<ConstructionPlan>> {
        let registration = producer.registration();
        let service = producer.key().clone();

        let dependencies: Vec<ServiceKey> = match &registration.dependencies {
            DependencySource::Opaque => Vec::new(),
            DependencySource::Declared(keys) => keys.clone(),
            DependencySource::Policy => {
                let policy = self.inner.policy.as_ref().ok_or_else(|| {
                    DiError::activation(
                        service.display_name(),
                        current_chain(),
                        "registration requires a constructor policy, but none is installed",
                    )
                })?;
                policy
                    .select(&registration.implementation)
                    .map_err(|reason| {
                        DiError::activation(
                            service.display_name(),
                            current_chain(),
                            format!(
                                "constructor selection rejected {}: {}",
                                registration.implementation, reason
                            ),
                        )
                    })?
                    .dependencies
            }
        };

        for dependency in &dependencies {
            let consumer =
                ConsumerInfo::member(registration.implementation.clone(), dependency.display_name());
            match self.producer_for(dependency, &consumer)? {
                Some(dependency_producer) => dependency_producer.mark_referenced(),
                None => {
                    return Err(DiError::activation(
                        service.display_name(),
                        current_chain(),
                        format!("dependency {} is not registered", dependency),
                    ));
                }
            }
        }

        let base = ConstructionPlan {
            service: service.clone(),
            implementation: registration.implementation.clone(),
            lifetime: registration.lifetime,
            dependencies,
            node: PlanNode::Factory(registration.factory.clone()),
            applied_decorators: Vec::new(),
        };

        let mut plan = apply_decorators(base, self.decorators_for(&service));

        for rewriter in &self.inner.rewriters {
            let original_service = plan.service.clone();
            let original_implementation = plan.implementation.clone();
            let rewritten = rewriter.rewrite(plan);
            let compatible = rewritten.service == original_service
                && (rewritten.implementation == original_implementation
                    || self
                        .inner
                        .relations
                        .is_assignable(&original_service, &rewritten.implementation));
            if !compatible {
                return Err(DiError::Configuration(format!(
                    "plan rewrite for {} produced incompatible implementation {}",
                    original_service, rewritten.implementation
                )));
            }
            plan = rewritten;
        }

        Ok(Arc::new(plan))
    }

    fn decorators_for(&self, key: &ServiceKey) -> &[Arc<DecoratorRegistration>] {
        self.inner
            .decorators
            .get(key)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }
}

impl ResolverCore for Container {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        self.resolve_key(key, ConsumerInfo::Root, None)
    }

    fn resolve_stream_any(&self, key: &ServiceKey) -> DiResult<Vec<AnyArc>> {
        self.resolve_stream_key(key, ConsumerInfo::Root, None)
    }

    fn push_sync_disposer(&self, name: &'static str, f: Box<dyn FnOnce() -> DisposeResult + Send>) {
        self.inner.root_state.push_sync_hook(name, f);
    }

    fn push_async_disposer(
        &self,
        name: &'static str,
        f: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    ) {
        self.inner.root_state.push_async_hook(name, f);
    }
}
