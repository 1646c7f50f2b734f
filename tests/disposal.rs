use async_trait::async_trait;
use lattice_di::{
    AsyncDispose, ContainerBuilder, DiError, Dispose, DisposeResult, Lifetime, Resolver,
};
use std::sync::{Arc, Mutex};

struct Tracked {
    name: &'static str,
    order: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl Dispose for Tracked {
    fn dispose(&self) -> DisposeResult {
        self.order.lock().unwrap().push(self.name.to_string());
        if self.fail {
            Err(format!("{} refused to close", self.name).into())
        } else {
            Ok(())
        }
    }
}

struct AsyncTracked {
    name: &'static str,
    order: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AsyncDispose for AsyncTracked {
    async fn dispose(&self) -> DisposeResult {
        self.order.lock().unwrap().push(format!("async-{}", self.name));
        Ok(())
    }
}

#[test]
fn disposal_runs_in_reverse_creation_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    for name in ["a", "b", "c"] {
        scope.register_for_disposal(Arc::new(Tracked {
            name,
            order: order.clone(),
            fail: false,
        }));
    }

    scope.dispose().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["c", "b", "a"]);
}

#[test]
fn disposal_continues_past_failures_and_aggregates_them() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "a",
        order: order.clone(),
        fail: false,
    }));
    scope.register_for_disposal(Arc::new(Tracked {
        name: "b",
        order: order.clone(),
        fail: true,
    }));
    scope.register_for_disposal(Arc::new(Tracked {
        name: "c",
        order: order.clone(),
        fail: false,
    }));

    match scope.dispose() {
        Err(DiError::Disposal(err)) => {
            assert_eq!(err.failures.len(), 1);
            assert!(err.failures[0].contains("b refused to close"));
        }
        other => panic!("expected Disposal error, got {:?}", other),
    }
    // b failed, a was still disposed afterwards.
    assert_eq!(*order.lock().unwrap(), vec!["c", "b", "a"]);
}

#[test]
fn disposal_is_idempotent() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "only",
        order: order.clone(),
        fail: false,
    }));

    scope.dispose().unwrap();
    scope.dispose().unwrap();
    assert_eq!(order.lock().unwrap().len(), 1);
}

#[test]
fn callbacks_run_in_order_before_any_disposal() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "instance",
        order: order.clone(),
        fail: false,
    }));

    let order_cb1 = order.clone();
    scope.on_scope_end(move || {
        order_cb1.lock().unwrap().push("callback-1".to_string());
        Ok(())
    });
    let order_cb2 = order.clone();
    scope.on_scope_end(move || {
        order_cb2.lock().unwrap().push("callback-2".to_string());
        Ok(())
    });

    scope.dispose().unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["callback-1", "callback-2", "instance"]
    );
}

#[test]
fn failing_callback_stops_later_callbacks_but_not_disposal() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "instance",
        order: order.clone(),
        fail: false,
    }));

    let order_cb1 = order.clone();
    scope.on_scope_end(move || {
        order_cb1.lock().unwrap().push("callback-1".to_string());
        Err("callback exploded".into())
    });
    let order_cb2 = order.clone();
    scope.on_scope_end(move || {
        order_cb2.lock().unwrap().push("callback-2".to_string());
        Ok(())
    });

    match scope.dispose() {
        Err(DiError::Disposal(err)) => {
            assert!(err.failures[0].contains("callback exploded"));
        }
        other => panic!("expected Disposal error, got {:?}", other),
    }
    // Second callback skipped, disposal still ran.
    assert_eq!(*order.lock().unwrap(), vec!["callback-1", "instance"]);
}

#[test]
fn async_only_disposable_fails_synchronous_teardown() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_async_disposal(Arc::new(AsyncTracked {
        name: "client",
        order: order.clone(),
    }));

    match scope.dispose() {
        Err(DiError::Disposal(err)) => {
            assert!(err.failures[0].contains("dispose_async"));
        }
        other => panic!("expected Disposal error, got {:?}", other),
    }
    assert!(order.lock().unwrap().is_empty());
}

#[tokio::test]
async fn async_teardown_is_one_reverse_pass_with_sync_fallback() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "first",
        order: order.clone(),
        fail: false,
    }));
    scope.register_for_async_disposal(Arc::new(AsyncTracked {
        name: "second",
        order: order.clone(),
    }));
    scope.register_for_disposal(Arc::new(Tracked {
        name: "third",
        order: order.clone(),
        fail: false,
    }));

    scope.dispose_async().await.unwrap();
    // Strict reverse creation order, async entries through their async
    // path and sync entries through theirs.
    assert_eq!(
        *order.lock().unwrap(),
        vec!["third", "async-second", "first"]
    );
}

#[tokio::test]
async fn async_disposable_singletons_tear_down_with_the_container() {
    let order = Arc::new(Mutex::new(Vec::new()));

    struct Client {
        order: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AsyncDispose for Client {
        async fn dispose(&self) -> DisposeResult {
            self.order.lock().unwrap().push("client".to_string());
            Ok(())
        }
    }

    let mut builder = ContainerBuilder::new();
    let order_clone = order.clone();
    builder
        .register_async_disposable::<Client, _>(Lifetime::Singleton, move |_| Client {
            order: order_clone.clone(),
        })
        .unwrap();

    let container = builder.build();
    let _client = container.get_required::<Client>();

    container.dispose_async().await.unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["client"]);
}

#[test]
fn panicking_disposer_is_recorded_and_does_not_stop_teardown() {
    struct Panicky;
    impl Dispose for Panicky {
        fn dispose(&self) -> DisposeResult {
            panic!("teardown panic");
        }
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    scope.register_for_disposal(Arc::new(Tracked {
        name: "survivor",
        order: order.clone(),
        fail: false,
    }));
    scope.register_for_disposal(Arc::new(Panicky));

    match scope.dispose() {
        Err(DiError::Disposal(err)) => {
            assert!(err.failures[0].contains("teardown panic"));
        }
        other => panic!("expected Disposal error, got {:?}", other),
    }
    assert_eq!(*order.lock().unwrap(), vec!["survivor"]);
}

#[test]
fn scoped_disposables_are_owned_by_their_scope() {
    struct Connection {
        order: Arc<Mutex<Vec<String>>>,
    }
    impl Dispose for Connection {
        fn dispose(&self) -> DisposeResult {
            self.order.lock().unwrap().push("connection".to_string());
            Ok(())
        }
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut builder = ContainerBuilder::new();
    let order_clone = order.clone();
    builder
        .register_disposable::<Connection, _>(Lifetime::Scoped, move |_| Connection {
            order: order_clone.clone(),
        })
        .unwrap();

    let container = builder.build();
    let scope_a = container.create_scope();
    let scope_b = container.create_scope();
    let _a = scope_a.get_required::<Connection>();
    let _b = scope_b.get_required::<Connection>();

    scope_a.dispose().unwrap();
    assert_eq!(order.lock().unwrap().len(), 1);

    scope_b.dispose().unwrap();
    assert_eq!(order.lock().unwrap().len(), 2);
}
