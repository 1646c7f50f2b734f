use lattice_di::{ContainerBuilder, Lifetime, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Auth;
impl Middleware for Auth {
    fn name(&self) -> &'static str {
        "auth"
    }
}

struct Compression;
impl Middleware for Compression {
    fn name(&self) -> &'static str {
        "compression"
    }
}

#[test]
fn collection_preserves_registration_order() {
    let mut builder = ContainerBuilder::new();
    builder.append_trait::<dyn Middleware, Auth, _>(Lifetime::Transient, |_| Arc::new(Auth));
    builder.append_trait::<dyn Middleware, Compression, _>(Lifetime::Transient, |_| {
        Arc::new(Compression)
    });

    let container = builder.build();
    let all = container.get_all_trait::<dyn Middleware>().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name(), "auth");
    assert_eq!(all[1].name(), "compression");
}

#[test]
fn unregistered_collection_resolves_empty() {
    let container = ContainerBuilder::new().build();
    let all = container.get_all::<u128>().unwrap();
    assert!(all.is_empty());
    assert!(container.stream::<u128>().is_empty());
}

#[test]
fn enumeration_is_a_live_view_not_a_snapshot() {
    static CREATED: AtomicUsize = AtomicUsize::new(0);

    struct Probe {
        id: usize,
    }

    let mut builder = ContainerBuilder::new();
    builder.append::<Probe, _>(Lifetime::Transient, |_| Probe {
        id: CREATED.fetch_add(1, Ordering::SeqCst),
    });

    let container = builder.build();
    let stream = container.stream::<Probe>();

    let first = stream.resolve_all().unwrap();
    let second = stream.resolve_all().unwrap();
    // Transient elements are re-created per enumeration.
    assert_ne!(first[0].id, second[0].id);
}

#[test]
fn elements_keep_their_own_lifetimes() {
    static SINGLETON_CALLS: AtomicUsize = AtomicUsize::new(0);
    static TRANSIENT_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Probe;

    let mut builder = ContainerBuilder::new();
    builder.append::<Probe, _>(Lifetime::Singleton, |_| {
        SINGLETON_CALLS.fetch_add(1, Ordering::SeqCst);
        Probe
    });
    builder.append::<Probe, _>(Lifetime::Transient, |_| {
        TRANSIENT_CALLS.fetch_add(1, Ordering::SeqCst);
        Probe
    });

    let container = builder.build();
    let _ = container.get_all::<Probe>().unwrap();
    let _ = container.get_all::<Probe>().unwrap();

    assert_eq!(SINGLETON_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(TRANSIENT_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn collection_can_be_consumed_as_a_dependency() {
    struct Pipeline {
        names: Vec<&'static str>,
    }

    let mut builder = ContainerBuilder::new();
    builder.append_trait::<dyn Middleware, Auth, _>(Lifetime::Transient, |_| Arc::new(Auth));
    builder.append_trait::<dyn Middleware, Compression, _>(Lifetime::Transient, |_| {
        Arc::new(Compression)
    });
    builder
        .register::<Pipeline, _>(Lifetime::Transient, |ctx| Pipeline {
            names: ctx
                .get_all_trait::<dyn Middleware>()
                .unwrap()
                .iter()
                .map(|m| m.name())
                .collect(),
        })
        .unwrap();

    let container = builder.build();
    let pipeline = container.get_required::<Pipeline>();
    assert_eq!(pipeline.names, vec!["auth", "compression"]);
}
