//! Disposal traits for resource teardown.

use std::future::Future;
use std::pin::Pin;

/// Outcome of a single disposal attempt.
///
/// Teardown aggregates failures instead of stopping at the first one, so
/// disposers report errors rather than panicking.
pub type DisposeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Boxed future produced by asynchronous disposers.
pub type BoxDisposeFuture = Pin<Box<dyn Future<Output = DisposeResult> + Send>>;

/// Trait for synchronous resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// caches, closing connections). Registered disposables run in reverse
/// creation order when their owning scope is disposed.
///
/// # Examples
///
/// ```
/// use lattice_di::{Dispose, DisposeResult};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> DisposeResult {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> DisposeResult;
}

/// Trait for asynchronous resource disposal.
///
/// Implement this for services that require async teardown (graceful
/// connection shutdown, async I/O cleanup). During `dispose_async`, an
/// async-capable disposable goes through this path; the synchronous path
/// never also runs for the same object.
///
/// # Examples
///
/// ```
/// use lattice_di::{AsyncDispose, DisposeResult};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> DisposeResult {
///         println!("Closing connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> DisposeResult;
}
