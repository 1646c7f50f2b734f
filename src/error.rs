//! Error types for the resolution engine.

use std::fmt;

use crate::traits::Diagnostic;

/// Failure surfaced while building or creating an instance.
///
/// Carries the requested service, the resolution chain from the root
/// request down to the failing service, and the underlying reason.
#[derive(Debug, Clone)]
pub struct ActivationError {
    /// The service whose activation failed.
    pub service: &'static str,
    /// Resolution chain from the root request to the failing service.
    pub chain: Vec<&'static str>,
    /// Underlying reason, including wrapped collaborator errors.
    pub reason: String,
}

impl ActivationError {
    pub(crate) fn new(service: &'static str, chain: Vec<&'static str>, reason: impl Into<String>) -> Self {
        Self { service, chain, reason: reason.into() }
    }

    /// Folds several independent activation failures into one report.
    pub(crate) fn aggregate(errors: Vec<ActivationError>) -> Self {
        debug_assert!(!errors.is_empty());
        if errors.len() == 1 {
            return errors.into_iter().next().unwrap();
        }
        let mut reason = format!("{} resolution failures:", errors.len());
        for e in &errors {
            reason.push_str("\n  - ");
            reason.push_str(e.service);
            reason.push_str(": ");
            reason.push_str(&e.reason);
        }
        Self { service: "container verification", chain: Vec::new(), reason }
    }
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to activate {}", self.service)?;
        if !self.chain.is_empty() {
            write!(f, " (chain: {})", self.chain.join(" -> "))?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Aggregated scope-teardown failures.
///
/// Every registered disposable is attempted even after earlier failures;
/// each entry records one disposable (or callback) that failed.
#[derive(Debug, Clone, Default)]
pub struct DisposalError {
    /// One entry per failed callback or disposable, in the order the
    /// failures occurred.
    pub failures: Vec<String>,
}

impl DisposalError {
    pub(crate) fn push(&mut self, what: &str, why: impl fmt::Display) {
        self.failures.push(format!("{}: {}", what, why));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} teardown failure(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

/// Resolution engine errors.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, DiError, Resolver};
///
/// let container = ContainerBuilder::new().build();
/// match container.get::<String>() {
///     Err(DiError::NotFound(name)) => assert_eq!(name, "alloc::string::String"),
///     other => panic!("expected NotFound, got {:?}", other),
/// }
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Invalid registration or container misconfiguration: duplicate key,
    /// ambiguous conditional match, incompatible plan rewrite,
    /// non-converging verification.
    Configuration(String),
    /// No registration satisfies the requested key.
    NotFound(&'static str),
    /// Plan building, compilation, or instance creation failed.
    Activation(ActivationError),
    /// One or more disposables failed during scope teardown.
    Disposal(DisposalError),
    /// Verification diagnostics surfaced findings above informational
    /// severity; carries the complete finding list.
    Diagnostic(Vec<Diagnostic>),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            DiError::NotFound(name) => write!(f, "Service not found: {}", name),
            DiError::Activation(err) => err.fmt(f),
            DiError::Disposal(err) => err.fmt(f),
            DiError::Diagnostic(findings) => {
                write!(f, "Verification reported {} diagnostic finding(s)", findings.len())?;
                for finding in findings {
                    write!(f, "\n  [{}] {}: {}", finding.severity, finding.service, finding.description)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DiError {}

impl DiError {
    pub(crate) fn activation(
        service: &'static str,
        chain: Vec<&'static str>,
        reason: impl Into<String>,
    ) -> Self {
        DiError::Activation(ActivationError::new(service, chain, reason))
    }

    /// Wraps a nested failure with the consuming service's context.
    ///
    /// Collaborator and dependency errors are never swallowed; they are
    /// re-raised with the requesting key and chain attached.
    pub(crate) fn in_context(self, service: &'static str, chain: Vec<&'static str>) -> Self {
        match self {
            DiError::Activation(inner) => DiError::Activation(ActivationError {
                service,
                chain,
                reason: format!("{} -> {}", inner.service, inner.reason),
            }),
            DiError::NotFound(missing) => DiError::activation(
                service,
                chain,
                format!("dependency {} is not registered", missing),
            ),
            other => other,
        }
    }
}

/// Result type for engine operations.
pub type DiResult<T> = Result<T, DiError>;
