//! Thread-local resolution chain.
//!
//! Tracks the stack of services being resolved on the current thread. The
//! chain serves two purposes: cycle and depth detection, and the context
//! attached to activation failures.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 256;

thread_local! {
    static CHAIN: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Snapshot of the current thread's resolution chain, root first.
pub(crate) fn current_chain() -> Vec<&'static str> {
    CHAIN.with(|chain| chain.borrow().clone())
}

struct ChainFrame;

impl Drop for ChainFrame {
    fn drop(&mut self) {
        CHAIN.with(|chain| {
            chain.borrow_mut().pop();
        });
    }
}

/// Runs `f` with `name` pushed onto the resolution chain.
///
/// Re-entering a name already on the chain is a circular dependency and
/// fails with the full path; the frame pops on unwind as well, keeping the
/// chain consistent when factories panic.
pub(crate) fn with_resolution_frame<T, F>(name: &'static str, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let precheck = CHAIN.with(|chain| {
        let chain = chain.borrow();
        if chain.iter().any(|&n| n == name) {
            let mut path = chain.clone();
            path.push(name);
            return Some(DiError::activation(
                name,
                path.clone(),
                format!("circular dependency: {}", path.join(" -> ")),
            ));
        }
        if chain.len() >= MAX_DEPTH {
            return Some(DiError::activation(
                name,
                chain.clone(),
                format!("resolution depth exceeded {}", MAX_DEPTH),
            ));
        }
        None
    });
    if let Some(err) = precheck {
        return Err(err);
    }

    CHAIN.with(|chain| chain.borrow_mut().push(name));
    let _frame = ChainFrame;
    f()
}
