//! Conditional predicate dispatch.
//!
//! A service key may carry several guarded construction rules. Dispatch
//! evaluates the guards in registration order against the consumer that
//! requested the key; exactly one handler may apply per concrete
//! resolution. Results are cached through the producer cache, so a guard
//! runs at most once per distinct (key, consumer shape).

use std::sync::Arc;

use crate::key::ServiceKey;
use crate::provider::ConsumerInfo;
use crate::registration::Registration;

/// Context handed to conditional registration guards.
pub struct PredicateContext<'a> {
    /// The requested service key.
    pub service: &'a ServiceKey,
    /// The candidate's implementation key.
    pub implementation: &'a ServiceKey,
    /// The consumer the key is being resolved for, or root.
    pub consumer: &'a ConsumerInfo,
    /// Whether an unconditional registration already handles this key.
    ///
    /// Well-behaved guards return `false` when `handled` is true;
    /// matching anyway makes the resolution ambiguous.
    pub handled: bool,
}

/// Guard predicate attached to a conditional registration.
///
/// Guards must be side-effect-stable across calls: the engine caches the
/// chosen producer per (key, consumer shape) and will not re-evaluate.
/// This is a documented contract, not an enforced one.
pub type ConditionalPredicate = dyn Fn(&PredicateContext<'_>) -> bool + Send + Sync;

pub(crate) struct ConditionalCandidate {
    pub(crate) registration: Arc<Registration>,
    pub(crate) predicate: Arc<ConditionalPredicate>,
}

/// All construction rules registered against one service key: an optional
/// unconditional rule plus guarded candidates in registration order.
#[derive(Default)]
pub(crate) struct ConditionalSet {
    pub(crate) unconditional: Option<Arc<Registration>>,
    pub(crate) candidates: Vec<ConditionalCandidate>,
}

pub(crate) enum Dispatch {
    /// No handler applies; the key falls through to open registrations.
    Unresolved,
    Selected {
        registration: Arc<Registration>,
        predicate: Option<Arc<ConditionalPredicate>>,
    },
    /// More than one handler applies; carries every matching
    /// implementation name.
    Ambiguous(Vec<&'static str>),
}

impl ConditionalSet {
    pub(crate) fn is_conditional(&self) -> bool {
        !self.candidates.is_empty()
    }

    /// Picks the applicable rule for one concrete resolution.
    ///
    /// The unconditional rule, when present, counts as a handler:
    /// predicates see `handled = true` and a predicate that still matches
    /// makes the resolution ambiguous.
    pub(crate) fn dispatch(&self, service: &ServiceKey, consumer: &ConsumerInfo) -> Dispatch {
        let handled = self.unconditional.is_some();
        let mut matches: Vec<&ConditionalCandidate> = Vec::new();

        for candidate in &self.candidates {
            let ctx = PredicateContext {
                service,
                implementation: &candidate.registration.implementation,
                consumer,
                handled,
            };
            if (candidate.predicate)(&ctx) {
                matches.push(candidate);
            }
        }

        match (self.unconditional.as_ref(), matches.len()) {
            (Some(unconditional), 0) => Dispatch::Selected {
                registration: unconditional.clone(),
                predicate: None,
            },
            (None, 0) => Dispatch::Unresolved,
            (None, 1) => Dispatch::Selected {
                registration: matches[0].registration.clone(),
                predicate: Some(matches[0].predicate.clone()),
            },
            _ => {
                let mut names: Vec<&'static str> = Vec::new();
                if let Some(unconditional) = &self.unconditional {
                    names.push(unconditional.implementation.display_name());
                }
                names.extend(
                    matches
                        .iter()
                        .map(|c| c.registration.implementation.display_name()),
                );
                Dispatch::Ambiguous(names)
            }
        }
    }
}
