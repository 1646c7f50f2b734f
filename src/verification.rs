//! Whole-graph verification.
//!
//! Verification forces every producer to build its construction plan and
//! instantiates every root at least once, so a single `verify()` call
//! surfaces every independently broken resolution path. Plan building may
//! register brand-new producers (generic closures, conditional branches),
//! so the plan pass iterates to a fixed point under a hard pass budget.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ActivationError, DiError, DiResult};
use crate::producer::InstanceProducer;
use crate::provider::{thread_bound_scope, Container};
use crate::traits::{ContainerSnapshot, ProducerInfo, Severity};

/// Hard bound on plan-closure passes. A graph still producing unbuilt
/// producers after this many passes fails fast instead of looping.
pub(crate) const MAX_VERIFICATION_PASSES: usize = 10;

/// Last verification outcome. The entry mutex holding this value also
/// provides the mutual exclusion between concurrent verification
/// attempts: they block, never interleave.
pub(crate) enum VerificationPhase {
    Idle,
    Succeeded,
    Failed,
}

impl Container {
    /// Verifies the whole registration graph.
    ///
    /// Builds every producer's construction plan (iterating while plan
    /// building registers new producers, up to 10 passes), then creates
    /// one instance of every root producer — a producer no other producer
    /// references, or one explicitly marked for verification. Root
    /// instantiation happens inside an engine-owned verification scope,
    /// or inside the thread-bound ambient scope when one is active.
    /// Instantiation failures are collected, not short-circuited.
    pub fn verify(&self) -> DiResult<()> {
        self.verify_internal(false)
    }

    /// Verifies the graph, then runs every registered diagnostic analyzer
    /// over the final producer snapshot. Any finding above informational
    /// severity fails the call with the complete finding list.
    pub fn verify_and_diagnose(&self) -> DiResult<()> {
        self.verify_internal(true)
    }

    /// Introspection snapshot of every producer, as handed to analyzers.
    pub fn snapshot(&self) -> ContainerSnapshot {
        let producers = self
            .producers()
            .iter()
            .map(|producer| ProducerInfo {
                service: producer.key().display_name(),
                implementation: producer.registration().implementation().display_name(),
                lifetime: producer.lifetime(),
                is_root: !producer.is_referenced(),
                plan_built: producer.is_plan_built(),
                instantiated: producer.is_instantiated(),
                decorators: producer
                    .plan_if_built()
                    .map(|plan| plan.applied_decorators().to_vec())
                    .unwrap_or_default(),
            })
            .collect();
        ContainerSnapshot { producers }
    }

    fn verify_internal(&self, diagnose: bool) -> DiResult<()> {
        let mut phase = self.inner().verification.lock().unwrap();
        self.inner().observers.verification_started();
        let started = Instant::now();

        let result = self.run_verification(diagnose);

        *phase = if result.is_ok() {
            VerificationPhase::Succeeded
        } else {
            VerificationPhase::Failed
        };
        self.inner()
            .observers
            .verification_finished(result.is_ok(), started.elapsed());
        result
    }

    fn run_verification(&self, diagnose: bool) -> DiResult<()> {
        self.seed_producers();

        let mut failures: Vec<ActivationError> = Vec::new();
        let mut broken: HashSet<usize> = HashSet::new();

        // Step 1: plan closure to a fixed point.
        let mut passes = 0;
        loop {
            let pending: Vec<Arc<InstanceProducer>> = self
                .producers()
                .into_iter()
                .filter(|p| !p.is_plan_built() && !broken.contains(&producer_id(p)))
                .collect();
            if pending.is_empty() {
                break;
            }
            passes += 1;
            if passes > MAX_VERIFICATION_PASSES {
                return Err(DiError::Configuration(format!(
                    "verification did not converge: plan building still discovers new producers after {} passes",
                    MAX_VERIFICATION_PASSES
                )));
            }
            for producer in pending {
                if let Err(err) = producer.build_plan(self) {
                    broken.insert(producer_id(&producer));
                    failures.push(to_activation(producer.key().display_name(), err));
                }
            }
        }

        // Step 2: instantiate every root once. An ambient scope is reused
        // when present so async-disposable singletons are not forced
        // through a synchronous teardown here.
        let (scope, engine_owned) = match thread_bound_scope() {
            Some(ambient) => (ambient, false),
            None => (self.create_verification_scope(), true),
        };
        {
            let _guard = scope.enter();
            for producer in self.producers() {
                if producer.is_referenced() && !producer.must_verify() {
                    continue;
                }
                if broken.contains(&producer_id(&producer)) {
                    continue;
                }
                if !producer.is_instantiated() {
                    match self.resolve_with_producer(&producer) {
                        Ok(_) => producer.mark_verifiers_run(),
                        Err(err) => {
                            failures.push(to_activation(producer.key().display_name(), err))
                        }
                    }
                } else {
                    producer.mark_verifiers_run();
                }
            }
        }
        let teardown = if engine_owned { scope.dispose() } else { Ok(()) };

        if !failures.is_empty() {
            return Err(DiError::Activation(ActivationError::aggregate(failures)));
        }
        // Surface teardown failures only when verification itself passed.
        teardown?;

        // Step 3: diagnostics, only on request.
        if diagnose {
            let snapshot = self.snapshot();
            let findings: Vec<_> = self
                .inner()
                .analyzers
                .iter()
                .flat_map(|analyzer| analyzer.analyze(&snapshot))
                .collect();
            if findings
                .iter()
                .any(|finding| finding.severity > Severity::Information)
            {
                return Err(DiError::Diagnostic(findings));
            }
        }

        Ok(())
    }

    /// Creates producers for every explicitly registered shape:
    /// unconditional entries, each conditional candidate, and each
    /// collection element. Open templates cannot be seeded (they have no
    /// closed key yet).
    fn seed_producers(&self) {
        for (key, set) in &self.inner().registry.single {
            if let Some(unconditional) = &set.unconditional {
                self.intern_producer(key, unconditional, None);
            }
            for candidate in &set.candidates {
                self.intern_producer(key, &candidate.registration, Some(candidate.predicate.clone()));
            }
        }
        let collection_keys: Vec<_> = self.inner().registry.collections.keys().cloned().collect();
        for key in collection_keys {
            self.stream_producers(&key);
        }
    }
}

fn producer_id(producer: &Arc<InstanceProducer>) -> usize {
    Arc::as_ptr(producer) as *const () as usize
}

fn to_activation(service: &'static str, err: DiError) -> ActivationError {
    match err {
        DiError::Activation(activation) => activation,
        other => ActivationError::new(service, Vec::new(), other.to_string()),
    }
}
