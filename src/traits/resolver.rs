//! Resolver traits for service resolution.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of, ServiceKey};
use crate::traits::{AsyncDispose, BoxDisposeFuture, Dispose, DisposeResult};

/// Core resolver trait for object-safe service resolution.
///
/// Handles the type-erased resolution mechanics; most callers use the
/// generic methods on [`Resolver`] instead. Implemented by the container,
/// scopes, and the resolution context handed to factories, making them
/// interchangeable at injection seams.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service as a type-erased `Arc`.
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<Arc<dyn std::any::Any + Send + Sync>>;

    /// Resolves every element of the collection registered for `key`, in
    /// registration order. Unregistered collections resolve empty.
    fn resolve_stream_any(
        &self,
        key: &ServiceKey,
    ) -> DiResult<Vec<Arc<dyn std::any::Any + Send + Sync>>>;

    /// Registers a synchronous teardown hook with the owning scope.
    fn push_sync_disposer(&self, name: &'static str, f: Box<dyn FnOnce() -> DisposeResult + Send>);

    /// Registers an asynchronous teardown hook with the owning scope.
    fn push_async_disposer(
        &self,
        name: &'static str,
        f: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    );
}

/// High-level, type-safe resolution surface.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct StderrLogger;
/// impl Logger for StderrLogger {
///     fn log(&self, msg: &str) {
///         eprintln!("{}", msg);
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<u32, _>(Lifetime::Singleton, |_| 42u32).unwrap();
/// builder.register_trait::<dyn Logger, _>(Lifetime::Singleton, |_| {
///     Arc::new(StderrLogger)
/// }).unwrap();
///
/// let container = builder.build();
/// assert_eq!(*container.get_required::<u32>(), 42);
/// container.get_required_trait::<dyn Logger>().log("resolved");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of::<T>())?;
        any.downcast::<T>()
            .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
    }

    /// Resolves a concrete service type, panicking on failure.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|err| {
            panic!("failed to resolve {}: {}", std::any::type_name::<T>(), err)
        })
    }

    /// Resolves a trait-object service.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let any = self.resolve_any(&key_of::<T>())?;
        // Trait objects are stored double-wrapped: Arc<Arc<dyn T>>.
        any.downcast::<Arc<T>>()
            .map(|arc| (*arc).clone())
            .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
    }

    /// Resolves a trait-object service, panicking on failure.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get_trait::<T>().unwrap_or_else(|err| {
            panic!("failed to resolve {}: {}", std::any::type_name::<T>(), err)
        })
    }

    /// Resolves every element of the collection registered for `T`, in
    /// registration order. Each call re-resolves per element lifetime.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        let anys = self.resolve_stream_any(&key_of::<T>())?;
        anys.into_iter()
            .map(|any| {
                any.downcast::<T>()
                    .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
            })
            .collect()
    }

    /// Resolves every trait-object element of the collection registered
    /// for `T`, in registration order.
    fn get_all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        let anys = self.resolve_stream_any(&key_of::<T>())?;
        anys.into_iter()
            .map(|any| {
                any.downcast::<Arc<T>>()
                    .map(|arc| (*arc).clone())
                    .map_err(|_| DiError::NotFound(std::any::type_name::<T>()))
            })
            .collect()
    }

    /// Records `service` for synchronous disposal with the owning scope.
    fn register_disposer<T: ?Sized + Dispose>(&self, service: Arc<T>) {
        self.push_sync_disposer(
            std::any::type_name::<T>(),
            Box::new(move || service.dispose()),
        );
    }

    /// Records `service` for asynchronous disposal with the owning scope.
    fn register_async_disposer<T: ?Sized + AsyncDispose>(&self, service: Arc<T>) {
        self.push_async_disposer(
            std::any::type_name::<T>(),
            Box::new(move || Box::pin(async move { service.dispose().await })),
        );
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
