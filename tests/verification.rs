use lattice_di::{
    element_key_of, ClosedBinding, ContainerBuilder, ContainerSnapshot, DiError, Diagnostic,
    DiagnosticAnalyzer, Lifetime, Resolver, ServiceKey, Severity, TypeRelations,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn verify_builds_plans_and_instantiates_roots() {
    static CREATED: AtomicUsize = AtomicUsize::new(0);

    struct Leaf;
    struct Root {
        _leaf: Arc<Leaf>,
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Leaf, _>(Lifetime::Singleton, |_| Leaf)
        .unwrap();
    builder
        .register::<Root, _>(Lifetime::Transient, |ctx| {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Root {
                _leaf: ctx.get_required::<Leaf>(),
            }
        })
        .unwrap();

    let container = builder.build();
    container.verify().unwrap();

    assert!(CREATED.load(Ordering::SeqCst) >= 1);
    for producer in container.producers() {
        assert!(producer.is_plan_built());
        assert!(producer.is_instantiated());
    }
}

#[test]
fn verify_collects_every_broken_root() {
    struct BrokenA;
    struct BrokenB;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<BrokenA, _>(Lifetime::Transient, |_| -> BrokenA {
            panic!("A cannot be built")
        })
        .unwrap();
    builder
        .register::<BrokenB, _>(Lifetime::Transient, |_| -> BrokenB {
            panic!("B cannot be built")
        })
        .unwrap();

    let container = builder.build();
    match container.verify() {
        Err(DiError::Activation(err)) => {
            assert!(err.reason.contains("A cannot be built"), "got: {}", err.reason);
            assert!(err.reason.contains("B cannot be built"), "got: {}", err.reason);
        }
        other => panic!("expected Activation, got {:?}", other),
    }
}

#[test]
fn verify_reports_missing_declared_dependencies() {
    struct Orphan;
    struct Missing;

    let mut builder = ContainerBuilder::new();
    builder
        .register_with_dependencies::<Orphan, _>(
            Lifetime::Transient,
            vec![lattice_di::key_of::<Missing>()],
            |_| Orphan,
        )
        .unwrap();

    let container = builder.build();
    match container.verify() {
        Err(DiError::Activation(err)) => {
            assert!(err.reason.contains("not registered"), "got: {}", err.reason);
        }
        other => panic!("expected Activation, got {:?}", other),
    }
}

#[test]
fn verification_is_repeatable() {
    struct Leaf;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Leaf, _>(Lifetime::Singleton, |_| Leaf)
        .unwrap();

    let container = builder.build();
    container.verify().unwrap();
    container.verify().unwrap();
}

// Oracle that closes the "chain" template against collection-element
// keys, used to drive producer discovery during plan building.
struct ChainOracle;

impl TypeRelations for ChainOracle {
    fn is_assignable(&self, service: &ServiceKey, candidate: &ServiceKey) -> bool {
        service == candidate
    }

    fn close(&self, _open: &ServiceKey, requested: &ServiceKey) -> Result<ServiceKey, String> {
        if requested.element_index().is_some() {
            Ok(requested.clone())
        } else {
            Err("not a chain link".to_string())
        }
    }
}

struct Link;
struct ChainRoot;

fn chain_builder(depth: usize) -> ContainerBuilder {
    let mut builder = ContainerBuilder::new();
    builder.set_type_relations(ChainOracle);
    builder
        .register_with_dependencies::<ChainRoot, _>(
            Lifetime::Transient,
            vec![element_key_of::<Link>(0)],
            |_| ChainRoot,
        )
        .unwrap();
    builder
        .register_open(ServiceKey::open("chain"), move |requested| {
            let index = requested.element_index()?;
            if index < depth {
                Some(ClosedBinding::with_dependencies::<Link, _>(
                    Lifetime::Transient,
                    vec![element_key_of::<Link>(index + 1)],
                    |_| Link,
                ))
            } else {
                Some(ClosedBinding::new::<Link, _>(Lifetime::Transient, |_| Link))
            }
        })
        .unwrap();
    builder
}

#[test]
fn plan_closure_reaches_a_fixed_point_within_the_budget() {
    // Each pass discovers one new link; a short chain converges.
    let container = chain_builder(4).build();
    container.verify().unwrap();
    assert!(container.producers().len() >= 5);
}

#[test]
fn runaway_producer_discovery_fails_fast_instead_of_looping() {
    // Every plan build registers yet another producer; the engine must
    // give up deterministically once the pass budget is exhausted.
    let container = chain_builder(usize::MAX).build();
    match container.verify() {
        Err(DiError::Configuration(msg)) => {
            assert!(msg.contains("converge"), "got: {}", msg);
        }
        other => panic!("expected Configuration, got {:?}", other),
    }
}

#[test]
fn open_template_resolves_through_the_oracle() {
    struct Widget {
        size: u32,
    }

    struct WidgetOracle;
    impl TypeRelations for WidgetOracle {
        fn is_assignable(&self, service: &ServiceKey, candidate: &ServiceKey) -> bool {
            service == candidate
        }

        fn close(&self, _open: &ServiceKey, requested: &ServiceKey) -> Result<ServiceKey, String> {
            if requested.display_name().ends_with("Widget") {
                Ok(requested.clone())
            } else {
                Err("template does not apply".to_string())
            }
        }
    }

    let mut builder = ContainerBuilder::new();
    builder.set_type_relations(WidgetOracle);
    builder
        .register_open(ServiceKey::open("Widget<T>"), |_requested| {
            Some(ClosedBinding::new::<Widget, _>(Lifetime::Transient, |_| {
                Widget { size: 16 }
            }))
        })
        .unwrap();

    let container = builder.build();
    assert_eq!(container.get_required::<Widget>().size, 16);
}

#[test]
fn open_registration_rejects_closed_keys_at_registration_time() {
    let mut builder = ContainerBuilder::new();
    let result = builder.register_open(lattice_di::key_of::<u32>(), |_| None);
    match result {
        Err(DiError::Configuration(msg)) => assert!(msg.contains("open key"), "got: {}", msg),
        other => panic!("expected Configuration, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn marked_producers_are_instantiated_even_when_referenced() {
    static LEAF_BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Leaf;
    struct Root;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Leaf, _>(Lifetime::Transient, |_| {
            LEAF_BUILT.fetch_add(1, Ordering::SeqCst);
            Leaf
        })
        .unwrap();
    // Root declares the edge but never constructs a Leaf itself, so
    // verification alone leaves Leaf uninstantiated.
    builder
        .register_with_dependencies::<Root, _>(
            Lifetime::Transient,
            vec![lattice_di::key_of::<Leaf>()],
            |_| Root,
        )
        .unwrap();

    let container = builder.build();
    container.verify().unwrap();
    assert_eq!(LEAF_BUILT.load(Ordering::SeqCst), 0);

    for producer in container.producers() {
        if producer.key().display_name().ends_with("Leaf") {
            producer.mark_for_explicit_verification();
        }
    }
    container.verify().unwrap();
    assert_eq!(LEAF_BUILT.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn verification_reuses_the_ambient_scope() {
    struct Session;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Session, _>(Lifetime::Scoped, |_| Session)
        .unwrap();

    let container = builder.build();
    let scope = container.create_scope();
    {
        let _guard = scope.enter();
        container.verify().unwrap();
    }
    // The ambient scope is left for its owner; the verified instance
    // lives in it.
    let again = scope.get_required::<Session>();
    drop(again);
    scope.dispose().unwrap();
}

#[test]
fn scoped_services_verify_inside_an_engine_owned_scope() {
    struct Session;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Session, _>(Lifetime::Scoped, |_| Session)
        .unwrap();

    let container = builder.build();
    container.verify().unwrap();
    // The verification scope is torn down by the engine; scoped
    // resolution still requires a caller scope afterwards.
    assert!(container.get::<Session>().is_err());
}

struct LifestyleNag;

impl DiagnosticAnalyzer for LifestyleNag {
    fn analyze(&self, snapshot: &ContainerSnapshot) -> Vec<Diagnostic> {
        snapshot
            .producers
            .iter()
            .filter(|p| matches!(p.lifetime, Lifetime::Transient))
            .map(|p| Diagnostic {
                severity: Severity::Warning,
                service: p.service,
                description: "transient root; consider a scoped lifestyle".to_string(),
            })
            .collect()
    }
}

#[test]
fn diagnose_mode_fails_on_findings_above_informational() {
    struct Worker;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Worker, _>(Lifetime::Transient, |_| Worker)
        .unwrap();
    builder.add_analyzer(LifestyleNag);

    let container = builder.build();
    // Mechanical verification passes.
    container.verify().unwrap();
    // The diagnosing mode converts the warning into a failure carrying
    // the complete findings list.
    match container.verify_and_diagnose() {
        Err(DiError::Diagnostic(findings)) => {
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].severity, Severity::Warning);
        }
        other => panic!("expected Diagnostic, got {:?}", other),
    }
}

#[test]
fn informational_findings_do_not_fail_diagnosis() {
    struct Chatty;
    impl DiagnosticAnalyzer for Chatty {
        fn analyze(&self, snapshot: &ContainerSnapshot) -> Vec<Diagnostic> {
            snapshot
                .producers
                .iter()
                .map(|p| Diagnostic {
                    severity: Severity::Information,
                    service: p.service,
                    description: "registered".to_string(),
                })
                .collect()
        }
    }

    struct Worker;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Worker, _>(Lifetime::Singleton, |_| Worker)
        .unwrap();
    builder.add_analyzer(Chatty);

    let container = builder.build();
    container.verify_and_diagnose().unwrap();
}

struct EdgeListPolicy;

impl lattice_di::ConstructorPolicy for EdgeListPolicy {
    fn select(
        &self,
        implementation: &ServiceKey,
    ) -> Result<lattice_di::SelectedConstructor, String> {
        if implementation.display_name().ends_with("Repository") {
            Ok(lattice_di::SelectedConstructor {
                implementation: implementation.display_name(),
                dependencies: vec![lattice_di::key_of::<Pool>()],
            })
        } else {
            Err("no usable constructor".to_string())
        }
    }
}

struct Pool;
struct Repository;

#[test]
fn policy_supplied_edges_are_walked_by_verification() {
    let mut builder = ContainerBuilder::new();
    builder.set_constructor_policy(EdgeListPolicy);
    builder
        .register::<Pool, _>(Lifetime::Singleton, |_| Pool)
        .unwrap();
    builder
        .register_auto::<Repository, _>(Lifetime::Transient, |_| Repository)
        .unwrap();

    let container = builder.build();
    container.verify().unwrap();

    // The policy's edge made Pool a referenced dependency.
    let pool = container
        .producers()
        .into_iter()
        .find(|p| p.key().display_name().ends_with("Pool"))
        .unwrap();
    assert!(pool.is_referenced());
}

#[test]
fn policy_rejection_is_an_activation_failure() {
    struct Unselectable;

    let mut builder = ContainerBuilder::new();
    builder.set_constructor_policy(EdgeListPolicy);
    builder
        .register_auto::<Unselectable, _>(Lifetime::Transient, |_| Unselectable)
        .unwrap();

    let container = builder.build();
    match container.verify() {
        Err(DiError::Activation(err)) => {
            assert!(
                err.reason.contains("no usable constructor"),
                "got: {}",
                err.reason
            );
        }
        other => panic!("expected Activation, got {:?}", other),
    }
}
