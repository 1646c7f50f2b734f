//! Resolution context threaded through every factory call.
//!
//! There is no hidden ambient state in the resolution path itself: the
//! context carries the container, the active scope, and the identity of
//! the implementation under construction. The only thread-bound piece is
//! the ambient scope stack, and the fallback chain over it is a
//! first-class function ([`select_scope`]).

use crate::key::ServiceKey;
use crate::registration::AnyArc;
use crate::traits::{BoxDisposeFuture, DisposeResult, ResolverCore};
use crate::DiResult;

use super::scope::Scope;
use super::Container;

/// The consumer a service is being resolved for.
///
/// Conditional predicates receive this, and the producer cache is keyed
/// by it, so a predicate runs at most once per distinct consumer shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConsumerInfo {
    /// The service was requested directly from the container or a scope.
    Root,
    /// The service is a dependency of another implementation.
    Member {
        /// The implementation declaring the dependency.
        implementation: ServiceKey,
        /// The injection target within that implementation.
        target: &'static str,
    },
}

impl ConsumerInfo {
    /// Whether this is a direct (root) resolution.
    pub fn is_root(&self) -> bool {
        matches!(self, ConsumerInfo::Root)
    }

    /// The declaring implementation, `None` for root resolutions.
    pub fn implementation(&self) -> Option<&ServiceKey> {
        match self {
            ConsumerInfo::Root => None,
            ConsumerInfo::Member { implementation, .. } => Some(implementation),
        }
    }

    pub(crate) fn member(implementation: ServiceKey, target: &'static str) -> Self {
        ConsumerInfo::Member { implementation, target }
    }
}

/// Scope fallback chain: explicit scope first, then the thread-bound
/// ambient scope, then none.
///
/// This is the entire ambient-lookup policy, extracted as a pure function
/// so it can be tested in isolation.
pub fn select_scope(explicit: Option<Scope>, thread_bound: Option<Scope>) -> Option<Scope> {
    explicit.or(thread_bound)
}

/// Context passed to factory functions for resolving dependencies.
///
/// Dependencies resolved through the context are attributed to the
/// implementation under construction, which is what conditional
/// predicates and root detection key off.
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
pub struct ResolutionContext<'a> {
    pub(crate) container: &'a Container,
    pub(crate) scope: Option<Scope>,
    pub(crate) current: ServiceKey,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(container: &'a Container, scope: Option<Scope>, current: ServiceKey) -> Self {
        Self { container, scope, current }
    }

    /// The container this resolution runs against.
    pub fn container(&self) -> &Container {
        self.container
    }

    /// The implementation currently being constructed.
    pub fn current_implementation(&self) -> &ServiceKey {
        &self.current
    }

    fn consumer_for(&self, dependency: &ServiceKey) -> ConsumerInfo {
        ConsumerInfo::member(self.current.clone(), dependency.display_name())
    }
}

impl ResolverCore for ResolutionContext<'_> {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        self.container
            .resolve_key(key, self.consumer_for(key), self.scope.as_ref())
    }

    fn resolve_stream_any(&self, key: &ServiceKey) -> DiResult<Vec<AnyArc>> {
        self.container
            .resolve_stream_key(key, self.consumer_for(key), self.scope.as_ref())
    }

    fn push_sync_disposer(&self, name: &'static str, f: Box<dyn FnOnce() -> DisposeResult + Send>) {
        match &self.scope {
            Some(scope) => scope.state().push_sync_hook(name, f),
            None => self.container.root_state().push_sync_hook(name, f),
        }
    }

    fn push_async_disposer(
        &self,
        name: &'static str,
        f: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    ) {
        match &self.scope {
            Some(scope) => scope.state().push_async_hook(name, f),
            None => self.container.root_state().push_async_hook(name, f),
        }
    }
}
