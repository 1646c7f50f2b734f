//! Observers for resolution and lifecycle events.
//!
//! Hooks for tracing what the container does: resolutions, failures,
//! verification runs, and scope teardown. Observer calls happen
//! synchronously on the resolving thread; keep implementations light.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::ServiceKey;

/// Observer of container events. All hooks default to no-ops.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, ContainerObserver, Lifetime, Resolver, ServiceKey};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Tracing;
///
/// impl ContainerObserver for Tracing {
///     fn resolved(&self, key: &ServiceKey, duration: Duration) {
///         eprintln!("resolved {} in {:?}", key.display_name(), duration);
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<u8, _>(Lifetime::Transient, |_| 1u8).unwrap();
/// builder.add_observer(Arc::new(Tracing));
///
/// let container = builder.build();
/// let _ = container.get_required::<u8>();
/// ```
pub trait ContainerObserver: Send + Sync {
    /// A resolution for `key` is starting.
    fn resolving(&self, _key: &ServiceKey) {}

    /// A resolution for `key` succeeded.
    fn resolved(&self, _key: &ServiceKey, _duration: Duration) {}

    /// A resolution for `key` failed.
    fn resolution_failed(&self, _key: &ServiceKey, _error: &DiError) {}

    /// A verification run is starting.
    fn verification_started(&self) {}

    /// A verification run finished.
    fn verification_finished(&self, _succeeded: bool, _duration: Duration) {}

    /// A scope (or the container root) was disposed; `disposables` is the
    /// number of teardown entries attempted.
    fn scope_disposed(&self, _disposables: usize) {}
}

/// Stderr-printing observer for development use.
pub struct LoggingObserver;

impl ContainerObserver for LoggingObserver {
    fn resolving(&self, key: &ServiceKey) {
        eprintln!("[lattice-di] resolving {}", key.display_name());
    }

    fn resolved(&self, key: &ServiceKey, duration: Duration) {
        eprintln!("[lattice-di] resolved {} in {:?}", key.display_name(), duration);
    }

    fn resolution_failed(&self, key: &ServiceKey, error: &DiError) {
        eprintln!("[lattice-di] FAILED {}: {}", key.display_name(), error);
    }

    fn verification_started(&self) {
        eprintln!("[lattice-di] verification started");
    }

    fn verification_finished(&self, succeeded: bool, duration: Duration) {
        eprintln!(
            "[lattice-di] verification {} in {:?}",
            if succeeded { "succeeded" } else { "failed" },
            duration
        );
    }

    fn scope_disposed(&self, disposables: usize) {
        eprintln!("[lattice-di] scope disposed ({} disposables)", disposables);
    }
}

/// Registered observers, fanned out per event. Zero-cost when empty.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    list: Vec<Arc<dyn ContainerObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ContainerObserver>) {
        self.list.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.list.is_empty()
    }

    pub(crate) fn resolving(&self, key: &ServiceKey) {
        for observer in &self.list {
            observer.resolving(key);
        }
    }

    pub(crate) fn resolved(&self, key: &ServiceKey, duration: Duration) {
        for observer in &self.list {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn resolution_failed(&self, key: &ServiceKey, error: &DiError) {
        for observer in &self.list {
            observer.resolution_failed(key, error);
        }
    }

    pub(crate) fn verification_started(&self) {
        for observer in &self.list {
            observer.verification_started();
        }
    }

    pub(crate) fn verification_finished(&self, succeeded: bool, duration: Duration) {
        for observer in &self.list {
            observer.verification_finished(succeeded, duration);
        }
    }

    pub(crate) fn scope_disposed(&self, disposables: usize) {
        for observer in &self.list {
            observer.scope_disposed(disposables);
        }
    }
}
