//! Service registration types and the locked registry snapshot.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::conditional::ConditionalSet;
use crate::error::DiResult;
use crate::internal::dispose_bag::TeardownEntry;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::ResolutionContext;
use crate::traits::{AsyncDispose, Dispose};

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Output of one factory invocation: the erased instance plus the optional
/// teardown hook whose ownership transfers to the caching scope.
pub struct Constructed {
    pub(crate) instance: AnyArc,
    pub(crate) disposer: Option<TeardownEntry>,
}

impl Constructed {
    /// Wraps an already-erased instance with no teardown hook.
    pub fn new(instance: Arc<dyn Any + Send + Sync>) -> Self {
        Self { instance, disposer: None }
    }

    /// The erased instance.
    pub fn instance(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.instance
    }

    /// Attaches a synchronous teardown hook for `disposable`.
    pub fn with_disposer<T: ?Sized + Dispose>(mut self, disposable: Arc<T>) -> Self {
        self.disposer = Some(TeardownEntry::Sync {
            name: std::any::type_name::<T>(),
            run: Box::new(move || disposable.dispose()),
        });
        self
    }

    /// Attaches an asynchronous teardown hook for `disposable`.
    pub fn with_async_disposer<T: ?Sized + AsyncDispose>(mut self, disposable: Arc<T>) -> Self {
        self.disposer = Some(TeardownEntry::Async {
            name: std::any::type_name::<T>(),
            run: Box::new(move || {
                Box::pin(async move { disposable.dispose().await })
            }),
        });
        self
    }
}

/// Erased instance factory shared by every producer of a registration.
pub(crate) type InstanceFactory =
    Arc<dyn for<'a> Fn(&ResolutionContext<'a>) -> DiResult<Constructed> + Send + Sync>;

/// Where a registration's dependency edges come from.
pub(crate) enum DependencySource {
    /// A plain closure; dependencies surface only at execution time.
    Opaque,
    /// Edges declared explicitly at registration time.
    Declared(Vec<ServiceKey>),
    /// Edges obtained from the constructor-selection policy at
    /// plan-build time.
    Policy,
}

/// One construction rule for an implementation.
///
/// Immutable once locked into a container and shared (`Arc`) by every
/// producer that references it.
pub struct Registration {
    pub(crate) lifetime: Lifetime,
    pub(crate) implementation: ServiceKey,
    pub(crate) is_collection: bool,
    pub(crate) dependencies: DependencySource,
    pub(crate) factory: InstanceFactory,
}

impl Registration {
    pub(crate) fn new(
        lifetime: Lifetime,
        implementation: ServiceKey,
        factory: InstanceFactory,
    ) -> Self {
        Self {
            lifetime,
            implementation,
            is_collection: false,
            dependencies: DependencySource::Opaque,
            factory,
        }
    }

    /// Declared lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Implementation key this rule constructs.
    pub fn implementation(&self) -> &ServiceKey {
        &self.implementation
    }

    /// Whether this rule is an element of a collection registration.
    pub fn is_collection(&self) -> bool {
        self.is_collection
    }
}

/// A closed construction rule produced by an open-registration binder.
///
/// Open registrations hand one of these back when the oracle closes their
/// template against a requested key.
pub struct ClosedBinding {
    pub(crate) registration: Arc<Registration>,
}

impl ClosedBinding {
    /// Binds a concrete factory under the requested key.
    pub fn new<T, F>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&ResolutionContext<'a>) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        Self {
            registration: Arc::new(Registration::new(
                lifetime,
                crate::key::key_of::<T>(),
                erased,
            )),
        }
    }

    /// Binds a concrete factory with explicitly declared dependency
    /// edges. The edges are forced into producers when the plan is built,
    /// which is what the verification fixed point walks.
    pub fn with_dependencies<T, F>(
        lifetime: Lifetime,
        dependencies: Vec<ServiceKey>,
        factory: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&ResolutionContext<'a>) -> T + Send + Sync + 'static,
    {
        let erased: InstanceFactory =
            Arc::new(move |ctx: &ResolutionContext| Ok(Constructed::new(Arc::new(factory(ctx)))));
        let mut registration =
            Registration::new(lifetime, crate::key::key_of::<T>(), erased);
        registration.dependencies = DependencySource::Declared(dependencies);
        Self {
            registration: Arc::new(registration),
        }
    }
}

/// An open template registration, closed on demand through the
/// type-relations oracle.
pub(crate) struct OpenRegistration {
    pub(crate) key: ServiceKey,
    pub(crate) binder:
        Arc<dyn Fn(&ServiceKey) -> Option<ClosedBinding> + Send + Sync>,
}

/// Immutable registry snapshot consumed by all resolution paths.
///
/// Produced by `ContainerBuilder::build`; the hot path reads it without
/// locks.
pub(crate) struct Registry {
    pub(crate) single: HashMap<ServiceKey, ConditionalSet>,
    pub(crate) collections: HashMap<ServiceKey, Vec<Arc<Registration>>>,
    pub(crate) open: Vec<OpenRegistration>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            single: HashMap::new(),
            collections: HashMap::new(),
            open: Vec::new(),
        }
    }
}
