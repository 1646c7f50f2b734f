//! Internal teardown bookkeeping for scopes.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::DisposalError;
use crate::traits::{BoxDisposeFuture, DisposeResult};

/// One registered disposable, in creation order.
///
/// An entry is either synchronous or asynchronous; the two paths never
/// both run for the same object.
pub(crate) enum TeardownEntry {
    Sync {
        name: &'static str,
        run: Box<dyn FnOnce() -> DisposeResult + Send>,
    },
    Async {
        name: &'static str,
        run: Box<dyn FnOnce() -> BoxDisposeFuture + Send>,
    },
}

pub(crate) type ScopeCallback = Box<dyn FnOnce() -> DisposeResult + Send>;

/// Ordered teardown state of one scope.
///
/// Disposables are appended in creation order and run in reverse; callbacks
/// run in registration order, strictly before any disposal.
#[derive(Default)]
pub(crate) struct TeardownBag {
    entries: Vec<TeardownEntry>,
    callbacks: Vec<ScopeCallback>,
    disposed: bool,
}

impl TeardownBag {
    pub(crate) fn push_entry(&mut self, entry: TeardownEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn push_callback(&mut self, callback: ScopeCallback) {
        self.callbacks.push(callback);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.callbacks.is_empty()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Takes the pending work and marks the bag disposed.
    ///
    /// Returns `None` on a second call, making disposal idempotent.
    pub(crate) fn take_pending(&mut self) -> Option<(Vec<ScopeCallback>, Vec<TeardownEntry>)> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        Some((
            std::mem::take(&mut self.callbacks),
            std::mem::take(&mut self.entries),
        ))
    }
}

/// Runs end-of-scope callbacks in registration order, stopping at the
/// first failure without running later callbacks.
pub(crate) fn run_callbacks(callbacks: Vec<ScopeCallback>, failures: &mut DisposalError) {
    for callback in callbacks {
        match catch_unwind(AssertUnwindSafe(callback)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                failures.push("scope-end callback", err);
                break;
            }
            Err(payload) => {
                failures.push("scope-end callback", panic_message(&payload));
                break;
            }
        }
    }
}

/// Disposes entries synchronously in reverse creation order, continuing
/// past individual failures.
///
/// `lenient_async` suppresses the failure normally reported for an
/// async-only disposable reached from a synchronous teardown (the
/// verification scope's exemption).
pub(crate) fn run_sync_reverse(
    entries: Vec<TeardownEntry>,
    lenient_async: bool,
    failures: &mut DisposalError,
) {
    for entry in entries.into_iter().rev() {
        match entry {
            TeardownEntry::Sync { name, run } => run_one(name, run, failures),
            TeardownEntry::Async { name, .. } => {
                if !lenient_async {
                    failures.push(name, "async disposable requires dispose_async()");
                }
            }
        }
    }
}

/// Disposes entries in reverse creation order, awaiting async-capable
/// entries and falling back to the synchronous path for the rest.
pub(crate) async fn run_async_reverse(entries: Vec<TeardownEntry>, failures: &mut DisposalError) {
    for entry in entries.into_iter().rev() {
        match entry {
            TeardownEntry::Sync { name, run } => run_one(name, run, failures),
            TeardownEntry::Async { name, run } => {
                if let Err(err) = run().await {
                    failures.push(name, err);
                }
            }
        }
    }
}

fn run_one(
    name: &'static str,
    run: Box<dyn FnOnce() -> DisposeResult + Send>,
    failures: &mut DisposalError,
) {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => failures.push(name, err),
        Err(payload) => failures.push(name, panic_message(&payload)),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
