//! # lattice-di
//!
//! A dependency-resolution runtime: declarative registrations are built
//! into object graphs on demand, instances are cached according to their
//! declared lifetime, and scopes tear everything down deterministically.
//!
//! ## Features
//!
//! - **Lifetimes**: Transient, Scoped, Singleton, and named custom
//!   lifestyles
//! - **Conditional registrations**: guarded candidates dispatched per
//!   consumer, with cached decisions and exactly-one-handler enforcement
//! - **Decorators**: predicate-selected plan wrapping with an
//!   applied-decorator ledger
//! - **Whole-graph verification**: a fixed-point pass that builds every
//!   construction plan and instantiates every root, surfacing every
//!   broken path in one call
//! - **Disposal-ordered scopes**: reverse-creation-order teardown, sync
//!   and async, with end-of-scope callbacks and aggregated failures
//!
//! ## Quick start
//!
//! ```rust
//! use lattice_di::{ContainerBuilder, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register::<Database, _>(Lifetime::Singleton, |_| Database {
//!     connection_string: "postgres://localhost".to_string(),
//! }).unwrap();
//! builder.register::<UserService, _>(Lifetime::Transient, |ctx| UserService {
//!     db: ctx.get_required::<Database>(),
//! }).unwrap();
//!
//! let container = builder.build();
//! container.verify().unwrap();
//!
//! let service = container.get_required::<UserService>();
//! assert_eq!(service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Scoped services
//!
//! ```rust
//! use lattice_di::{ContainerBuilder, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! struct RequestContext {
//!     id: u64,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register::<RequestContext, _>(Lifetime::Scoped, |_| RequestContext {
//!     id: 7,
//! }).unwrap();
//!
//! let container = builder.build();
//!
//! let scope = container.create_scope();
//! let a = scope.get_required::<RequestContext>();
//! let b = scope.get_required::<RequestContext>();
//! assert!(Arc::ptr_eq(&a, &b)); // one instance per scope
//! scope.dispose().unwrap();
//! ```
//!
//! ## Conditional registrations
//!
//! ```rust
//! use lattice_di::{ContainerBuilder, Lifetime, Resolver};
//!
//! struct Sink {
//!     target: &'static str,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_conditional::<Sink, _, _>(
//!     Lifetime::Transient,
//!     |_| Sink { target: "stderr" },
//!     |ctx| ctx.consumer.is_root(),
//! );
//!
//! let container = builder.build();
//! assert_eq!(container.get_required::<Sink>().target, "stderr");
//! ```

// Public modules
pub mod builder;
pub mod conditional;
pub mod decorator;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod plan;
pub mod producer;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;
mod verification;

// Re-export core types
pub use builder::ContainerBuilder;
pub use conditional::{ConditionalPredicate, PredicateContext};
pub use decorator::{DecoratorContext, ServiceDecorator, TraitDecorator};
pub use error::{ActivationError, DiError, DiResult, DisposalError};
pub use key::{element_key_of, key_of, ServiceKey};
pub use lifetime::Lifetime;
pub use observer::{ContainerObserver, LoggingObserver};
pub use plan::{
    ConstructionPlan, DefaultPlanCompiler, ExecutableFactory, PlanCompiler, PlanRewriter,
};
pub use producer::{InstanceProducer, InstanceStream};
pub use provider::{
    select_scope, ConsumerInfo, Container, ResolutionContext, Scope, ScopeGuard,
};
pub use registration::{ClosedBinding, Constructed, Registration};
pub use traits::{
    AsyncDispose, BoxDisposeFuture, ConstructorPolicy, ContainerSnapshot, Diagnostic,
    DiagnosticAnalyzer, Dispose, DisposeResult, ExactTypeRelations, ProducerInfo, Resolver,
    ResolverCore, SelectedConstructor, Severity, TypeRelations,
};
