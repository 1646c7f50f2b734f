use lattice_di::{ContainerBuilder, DiError, Lifetime, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn resolves_registered_singleton() {
    let mut builder = ContainerBuilder::new();
    builder
        .register::<u64, _>(Lifetime::Singleton, |_| 99u64)
        .unwrap();

    let container = builder.build();
    let value = container.get_required::<u64>();
    assert_eq!(*value, 99);
}

#[test]
fn missing_registration_reports_not_found() {
    let container = ContainerBuilder::new().build();
    match container.get::<String>() {
        Err(DiError::NotFound(name)) => assert_eq!(name, "alloc::string::String"),
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn duplicate_unconditional_registration_is_a_configuration_error() {
    let mut builder = ContainerBuilder::new();
    builder
        .register::<u32, _>(Lifetime::Transient, |_| 1u32)
        .unwrap();
    let result = builder.register::<u32, _>(Lifetime::Transient, |_| 2u32);
    match result {
        Err(DiError::Configuration(msg)) => assert!(msg.contains("duplicate")),
        other => panic!("expected Configuration, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn register_instance_shares_the_given_value() {
    struct Config {
        retries: u32,
    }

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Config { retries: 5 }).unwrap();

    let container = builder.build();
    let a = container.get_required::<Config>();
    let b = container.get_required::<Config>();
    assert_eq!(a.retries, 5);
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn transient_dependency_chain_resolves_through_context() {
    struct Inner {
        value: i32,
    }
    struct Outer {
        inner: Arc<Inner>,
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Inner, _>(Lifetime::Singleton, |_| Inner { value: 7 })
        .unwrap();
    builder
        .register::<Outer, _>(Lifetime::Transient, |ctx| Outer {
            inner: ctx.get_required::<Inner>(),
        })
        .unwrap();

    let container = builder.build();
    let outer = container.get_required::<Outer>();
    assert_eq!(outer.inner.value, 7);
}

#[test]
fn trait_registration_resolves_most_convenient_shape() {
    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct FixedClock(u64);
    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register_trait::<dyn Clock, _>(Lifetime::Singleton, |_| Arc::new(FixedClock(1234)))
        .unwrap();

    let container = builder.build();
    let clock = container.get_required_trait::<dyn Clock>();
    assert_eq!(clock.now(), 1234);
}

#[test]
fn fallible_factory_error_surfaces_as_activation() {
    struct Flaky;

    let mut builder = ContainerBuilder::new();
    builder
        .register_try::<Flaky, _>(Lifetime::Transient, |_| {
            Err(DiError::Configuration("refused".to_string()))
        })
        .unwrap();

    let container = builder.build();
    assert!(container.get::<Flaky>().is_err());
}

#[test]
fn factory_panic_becomes_activation_failure() {
    struct Exploding;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Exploding, _>(Lifetime::Transient, |_| -> Exploding {
            panic!("boom at construction")
        })
        .unwrap();

    let container = builder.build();
    match container.get::<Exploding>() {
        Err(DiError::Activation(err)) => {
            assert!(err.reason.contains("boom at construction"), "got: {}", err.reason);
        }
        other => panic!("expected Activation, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn circular_dependency_reports_the_full_chain() {
    struct A {
        _b: Arc<B>,
    }
    struct B {
        _a: Arc<A>,
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register::<A, _>(Lifetime::Transient, |ctx| A {
            _b: ctx.get_required::<B>(),
        })
        .unwrap();
    builder
        .register::<B, _>(Lifetime::Transient, |ctx| B {
            _a: ctx.get_required::<A>(),
        })
        .unwrap();

    let container = builder.build();
    match container.get::<A>() {
        Err(DiError::Activation(err)) => {
            assert!(err.reason.contains("circular"), "got: {}", err.reason);
            // The failing chain walks A -> B -> A.
            assert!(err.reason.matches("::A").count() >= 2, "got: {}", err.reason);
        }
        other => panic!("expected Activation, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn producers_are_reference_stable_across_resolutions() {
    let mut builder = ContainerBuilder::new();
    builder
        .register::<String, _>(Lifetime::Transient, |_| "x".to_string())
        .unwrap();

    let container = builder.build();
    let _ = container.get_required::<String>();
    let first: Vec<_> = container.producers();
    let _ = container.get_required::<String>();
    let second: Vec<_> = container.producers();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(Arc::ptr_eq(&first[0], &second[0]));
}

#[test]
fn singleton_factory_runs_once_even_across_scopes() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Expensive;

    let mut builder = ContainerBuilder::new();
    builder
        .register::<Expensive, _>(Lifetime::Singleton, |_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Expensive
        })
        .unwrap();

    let container = builder.build();
    let root = container.get_required::<Expensive>();
    let scope = container.create_scope();
    let scoped = scope.get_required::<Expensive>();

    assert!(Arc::ptr_eq(&root, &scoped));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    scope.dispose().unwrap();
}

#[test]
fn observer_sees_resolutions_and_failures() {
    use lattice_di::{ContainerObserver, ServiceKey};
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    impl ContainerObserver for Recording {
        fn resolved(&self, key: &ServiceKey, _duration: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ok:{}", key.display_name()));
        }

        fn resolution_failed(&self, key: &ServiceKey, _error: &DiError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("err:{}", key.display_name()));
        }
    }

    let recording = Arc::new(Recording::default());
    let mut builder = ContainerBuilder::new();
    builder
        .register::<u8, _>(Lifetime::Transient, |_| 1u8)
        .unwrap();
    builder.add_observer(recording.clone());

    let container = builder.build();
    let _ = container.get_required::<u8>();
    let _ = container.get::<u16>();

    let events = recording.events.lock().unwrap();
    assert!(events.iter().any(|e| e == "ok:u8"));
    assert!(events.iter().any(|e| e == "err:u16"));
}
