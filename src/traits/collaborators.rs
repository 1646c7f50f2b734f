//! Collaborator seams consumed by the resolution engine.
//!
//! Constructor selection, type compatibility, and diagnostic analysis are
//! external concerns. The engine only depends on the traits in this module
//! and ships trivial defaults where a default makes sense.

use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// Members chosen by the constructor-selection policy for one
/// implementation.
#[derive(Debug, Clone)]
pub struct SelectedConstructor {
    /// The implementation the selection applies to.
    pub implementation: &'static str,
    /// Service keys of the selected constructor's dependencies, in
    /// parameter order.
    pub dependencies: Vec<ServiceKey>,
}

/// Pluggable constructor/member selection strategy.
///
/// Consulted while building the construction plan of a registration that
/// opted into policy-driven wiring. A rejection becomes an activation
/// failure for the requesting service.
pub trait ConstructorPolicy: Send + Sync {
    /// Selects the constructor members for `implementation`, or explains
    /// why none is usable.
    fn select(&self, implementation: &ServiceKey) -> Result<SelectedConstructor, String>;
}

/// Type-compatibility and generic-closure oracle.
///
/// Answers whether a candidate satisfies a service key, and closes open
/// template keys against concrete requests.
pub trait TypeRelations: Send + Sync {
    /// Whether `candidate` satisfies `service`.
    fn is_assignable(&self, service: &ServiceKey, candidate: &ServiceKey) -> bool;

    /// Closes the open key `open` against the concrete `requested` key.
    fn close(&self, open: &ServiceKey, requested: &ServiceKey) -> Result<ServiceKey, String>;
}

/// Default oracle: exact key equality, no generic closure.
///
/// Open registrations never activate under this oracle; install a real
/// implementation to enable template closing.
pub struct ExactTypeRelations;

impl TypeRelations for ExactTypeRelations {
    fn is_assignable(&self, service: &ServiceKey, candidate: &ServiceKey) -> bool {
        service == candidate
    }

    fn close(&self, open: &ServiceKey, _requested: &ServiceKey) -> Result<ServiceKey, String> {
        Err(format!("no generic closure available for {}", open))
    }
}

/// Severity of a diagnostic finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Purely informational; never fails verification.
    Information,
    /// Suspicious configuration worth surfacing.
    Warning,
    /// Broken configuration.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Information => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One finding reported by a diagnostic analyzer.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Finding severity; anything above `Information` fails
    /// verify-and-diagnose.
    pub severity: Severity,
    /// The service the finding concerns.
    pub service: &'static str,
    /// Human-readable description.
    pub description: String,
}

/// Introspection view of one producer, as exposed to analyzers.
#[derive(Debug, Clone)]
pub struct ProducerInfo {
    /// Requested service name.
    pub service: &'static str,
    /// Implementation backing the producer.
    pub implementation: &'static str,
    /// Declared lifetime.
    pub lifetime: Lifetime,
    /// Whether no other producer references this one.
    pub is_root: bool,
    /// Whether the construction plan has been built.
    pub plan_built: bool,
    /// Whether at least one instance has been created.
    pub instantiated: bool,
    /// Identifiers of decorators applied to the plan, in application order.
    pub decorators: Vec<&'static str>,
}

/// Snapshot of the container's producer graph handed to analyzers.
#[derive(Debug, Clone)]
pub struct ContainerSnapshot {
    /// Every producer known to the container, in creation order.
    pub producers: Vec<ProducerInfo>,
}

/// Post-verification diagnostic rule analysis.
///
/// Run only in the explicit verify-and-diagnose mode; any finding above
/// [`Severity::Information`] converts a mechanically successful
/// verification into a diagnostic failure carrying every finding.
pub trait DiagnosticAnalyzer: Send + Sync {
    /// Analyzes the final registration graph.
    fn analyze(&self, snapshot: &ContainerSnapshot) -> Vec<Diagnostic>;
}
