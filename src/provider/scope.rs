//! Scopes: disposal-ordered instance caches.
//!
//! A scope caches scoped instances, records disposables in creation
//! order, runs end-of-scope callbacks strictly before disposal, and holds
//! a typed side-item store. Disposal is idempotent and strictly reverse
//! creation order; asynchronous teardown is additive to the synchronous
//! path, never a replacement for it.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult, DisposalError};
use crate::internal::dispose_bag::{
    run_async_reverse, run_callbacks, run_sync_reverse, TeardownBag, TeardownEntry,
};
use crate::key::{key_of, ServiceKey};
use crate::registration::{AnyArc, Constructed};
use crate::traits::{
    AsyncDispose, BoxDisposeFuture, Dispose, DisposeResult, ResolverCore,
};

use super::Container;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    /// A user-created scope.
    Plain,
    /// The container's own state backing singleton caching.
    Root,
    /// Engine-owned scope used during verification. Exempt from forced
    /// async-disposal errors on synchronous teardown.
    Verification,
}

/// Shared state of one scope.
pub(crate) struct ScopeState {
    kind: ScopeKind,
    cells: Mutex<HashMap<ServiceKey, Arc<OnceCell<AnyArc>>>>,
    teardown: Mutex<TeardownBag>,
    items: Mutex<HashMap<TypeId, AnyArc>>,
}

impl ScopeState {
    pub(crate) fn new(kind: ScopeKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            cells: Mutex::new(HashMap::new()),
            teardown: Mutex::new(TeardownBag::default()),
            items: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn is_verification(&self) -> bool {
        self.kind == ScopeKind::Verification
    }

    fn cell_for(&self, key: &ServiceKey) -> Arc<OnceCell<AnyArc>> {
        let mut cells = self.cells.lock().unwrap();
        cells.entry(key.clone()).or_default().clone()
    }

    /// Atomic get-or-add: `init` runs at most once per key; racing
    /// callers block and receive the first-created instance. The teardown
    /// hook of a freshly created instance is registered before the value
    /// becomes visible, transferring ownership to this scope.
    pub(crate) fn get_or_add_any<F>(&self, key: &ServiceKey, init: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<Constructed>,
    {
        let cell = self.cell_for(key);
        cell.get_or_try_init(|| {
            let constructed = init()?;
            if let Some(hook) = constructed.disposer {
                self.push_entry(hook);
            }
            Ok(constructed.instance)
        })
        .map(Clone::clone)
    }

    pub(crate) fn push_entry(&self, entry: TeardownEntry) {
        self.teardown.lock().unwrap().push_entry(entry);
    }

    pub(crate) fn push_sync_hook(
        &self,
        name: &'static str,
        run: Box<dyn FnOnce() -> DisposeResult + Send>,
    ) {
        self.push_entry(TeardownEntry::Sync { name, run });
    }

    pub(crate) fn push_async_hook(
        &self,
        name: &'static str,
        run: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    ) {
        self.push_entry(TeardownEntry::Async { name, run });
    }

    pub(crate) fn push_callback(&self, callback: Box<dyn FnOnce() -> DisposeResult + Send>) {
        self.teardown.lock().unwrap().push_callback(callback);
    }

    pub(crate) fn item_any(&self, id: TypeId) -> Option<AnyArc> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn set_item_any(&self, id: TypeId, value: AnyArc) {
        self.items.lock().unwrap().insert(id, value);
    }

    pub(crate) fn get_or_set_item_any<F>(&self, id: TypeId, init: F) -> AnyArc
    where
        F: FnOnce() -> AnyArc,
    {
        let mut items = self.items.lock().unwrap();
        items.entry(id).or_insert_with(init).clone()
    }

    /// Synchronous teardown. Returns the number of disposables attempted
    /// and the aggregated failures; a second call does nothing.
    pub(crate) fn dispose_sync(&self) -> (usize, DisposalError) {
        let pending = self.teardown.lock().unwrap().take_pending();
        let Some((callbacks, entries)) = pending else {
            return (0, DisposalError::default());
        };
        let count = entries.len();
        let mut failures = DisposalError::default();
        run_callbacks(callbacks, &mut failures);
        run_sync_reverse(entries, self.is_verification(), &mut failures);
        (count, failures)
    }

    /// Asynchronous teardown: one reverse-order pass, async-capable
    /// entries awaited, the rest disposed synchronously.
    pub(crate) async fn dispose_async(&self) -> (usize, DisposalError) {
        let pending = self.teardown.lock().unwrap().take_pending();
        let Some((callbacks, entries)) = pending else {
            return (0, DisposalError::default());
        };
        let count = entries.len();
        let mut failures = DisposalError::default();
        run_callbacks(callbacks, &mut failures);
        run_async_reverse(entries, &mut failures).await;
        (count, failures)
    }
}

impl Drop for ScopeState {
    fn drop(&mut self) {
        let bag = self.teardown.get_mut().unwrap();
        if !bag.is_disposed() && !bag.is_empty() {
            eprintln!(
                "[lattice-di] scope dropped with undisposed resources; call dispose() or dispose_async() first"
            );
        }
    }
}

// Thread-bound ambient scope stack, manipulated only through enter guards.
thread_local! {
    static AMBIENT_SCOPES: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// The innermost scope entered on this thread, if any.
pub(crate) fn thread_bound_scope() -> Option<Scope> {
    AMBIENT_SCOPES.with(|stack| stack.borrow().last().cloned())
}

/// Guard returned by [`Scope::enter`]; leaving happens on drop.
pub struct ScopeGuard {
    _private: (),
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        AMBIENT_SCOPES.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Disposal-ordered cache of scoped instances.
///
/// Handles are cheap to clone and share the same underlying state.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct RequestId(u32);
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<RequestId, _>(Lifetime::Scoped, |_| RequestId(7)).unwrap();
///
/// let container = builder.build();
/// let scope = container.create_scope();
///
/// let a = scope.get_required::<RequestId>();
/// let b = scope.get_required::<RequestId>();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = container.create_scope();
/// let c = other.get_required::<RequestId>();
/// assert!(!Arc::ptr_eq(&a, &c));
/// # scope.dispose().unwrap();
/// # other.dispose().unwrap();
/// ```
pub struct Scope {
    pub(crate) container: Container,
    pub(crate) state: Arc<ScopeState>,
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            state: self.state.clone(),
        }
    }
}

impl Scope {
    pub(crate) fn new(container: Container, kind: ScopeKind) -> Self {
        Self {
            container,
            state: ScopeState::new(kind),
        }
    }

    pub(crate) fn state(&self) -> &Arc<ScopeState> {
        &self.state
    }

    /// The container this scope resolves against.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Whether this is an engine-owned verification scope.
    pub fn is_verification(&self) -> bool {
        self.state.is_verification()
    }

    /// Makes this scope the thread-bound ambient scope until the guard
    /// drops. Resolutions without an explicit scope fall back to it (see
    /// [`select_scope`](super::select_scope)).
    pub fn enter(&self) -> ScopeGuard {
        AMBIENT_SCOPES.with(|stack| stack.borrow_mut().push(self.clone()));
        ScopeGuard { _private: () }
    }

    /// Atomic keyed cache access: `init` runs at most once for `T` in
    /// this scope, even under concurrent callers; every racer receives
    /// the first-created instance.
    pub fn get_or_add<T, F>(&self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let cell = self.state.cell_for(&key_of::<T>());
        let any = cell.get_or_init(|| Arc::new(init()) as AnyArc).clone();
        any.downcast::<T>().expect("scope cell holds the keyed type")
    }

    /// Records `disposable` for synchronous teardown, in creation order.
    pub fn register_for_disposal<T: ?Sized + Dispose>(&self, disposable: Arc<T>) {
        self.state.push_sync_hook(
            std::any::type_name::<T>(),
            Box::new(move || disposable.dispose()),
        );
    }

    /// Records `disposable` for asynchronous teardown, in creation order.
    pub fn register_for_async_disposal<T: ?Sized + AsyncDispose>(&self, disposable: Arc<T>) {
        self.state.push_async_hook(
            std::any::type_name::<T>(),
            Box::new(move || Box::pin(async move { disposable.dispose().await })),
        );
    }

    /// Registers a callback run once when the scope ends, in registration
    /// order, strictly before any disposable is disposed. The first
    /// failing callback stops the remaining callbacks (disposal of
    /// registered disposables still proceeds).
    pub fn on_scope_end<F>(&self, callback: F)
    where
        F: FnOnce() -> DisposeResult + Send + 'static,
    {
        self.state.push_callback(Box::new(callback));
    }

    /// Reads a side item previously stored with [`set_item`](Self::set_item).
    pub fn get_item<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.state
            .item_any(TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
    }

    /// Stores a side item, replacing any previous value of the same type.
    ///
    /// A separate `get_item` / `set_item` pair is not atomic; use
    /// [`get_or_set_item`](Self::get_or_set_item) when that matters.
    pub fn set_item<T: Send + Sync + 'static>(&self, value: T) {
        self.state.set_item_any(TypeId::of::<T>(), Arc::new(value));
    }

    /// Atomically reads the side item of type `T`, creating and storing
    /// it when absent.
    pub fn get_or_set_item<T, F>(&self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.state
            .get_or_set_item_any(TypeId::of::<T>(), || Arc::new(init()) as AnyArc)
            .downcast::<T>()
            .expect("item store holds the keyed type")
    }

    /// Ends the scope synchronously.
    ///
    /// Runs end-of-scope callbacks in registration order (stopping at the
    /// first failure), then disposes every registered disposable in
    /// reverse creation order, continuing past individual failures and
    /// aggregating them. Idempotent: a second call is a no-op.
    pub fn dispose(&self) -> DiResult<()> {
        let (count, failures) = self.state.dispose_sync();
        self.container.inner().observers.scope_disposed(count);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(failures))
        }
    }

    /// Ends the scope, disposing async-capable disposables through their
    /// asynchronous path and the rest synchronously, in one reverse-order
    /// pass. Idempotent.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let (count, failures) = self.state.dispose_async().await;
        self.container.inner().observers.scope_disposed(count);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::Disposal(failures))
        }
    }
}

impl ResolverCore for Scope {
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc> {
        self.container
            .resolve_key(key, super::ConsumerInfo::Root, Some(self))
    }

    fn resolve_stream_any(&self, key: &ServiceKey) -> DiResult<Vec<AnyArc>> {
        self.container
            .resolve_stream_key(key, super::ConsumerInfo::Root, Some(self))
    }

    fn push_sync_disposer(&self, name: &'static str, f: Box<dyn FnOnce() -> DisposeResult + Send>) {
        self.state.push_sync_hook(name, f);
    }

    fn push_async_disposer(
        &self,
        name: &'static str,
        f: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    ) {
        self.state.push_async_hook(name, f);
    }
}
