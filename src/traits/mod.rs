//! Trait seams of the resolution engine.

pub mod collaborators;
pub mod dispose;
pub mod resolver;

pub use collaborators::{
    ConstructorPolicy, ContainerSnapshot, Diagnostic, DiagnosticAnalyzer, ExactTypeRelations,
    ProducerInfo, SelectedConstructor, Severity, TypeRelations,
};
pub use dispose::{AsyncDispose, BoxDisposeFuture, Dispose, DisposeResult};
pub use resolver::{Resolver, ResolverCore};

// The plan compiler lives with the plan model but is a collaborator seam.
pub use crate::plan::PlanCompiler;
