//! Construction plans, the plan compiler seam, and plan rewriters.
//!
//! A plan is an opaque, rewritable description of how to produce one
//! instance: a base factory node wrapped by zero or more decorator nodes.
//! Plans are built once per producer, possibly rewritten, then compiled
//! into an executable factory through the container's [`PlanCompiler`].

use std::sync::Arc;

use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::ResolutionContext;
use crate::registration::{Constructed, InstanceFactory};

/// Erased decorator application: wraps the output of the inner node.
pub(crate) type DecoratorWrap =
    Arc<dyn for<'a> Fn(Constructed, &ResolutionContext<'a>) -> DiResult<Constructed> + Send + Sync>;

/// Executable factory compiled from a construction plan.
pub type ExecutableFactory =
    Arc<dyn for<'a> Fn(&ResolutionContext<'a>) -> DiResult<Constructed> + Send + Sync>;

pub(crate) enum PlanNode {
    Factory(InstanceFactory),
    Decorated {
        id: &'static str,
        wrap: DecoratorWrap,
        inner: Box<PlanNode>,
    },
}

/// Description of how to produce an instance, prior to compilation.
///
/// Invariant: a rewritten plan's declared result must remain compatible
/// with the original declared type; the container rejects incompatible
/// rewrites with a configuration error.
pub struct ConstructionPlan {
    pub(crate) service: ServiceKey,
    pub(crate) implementation: ServiceKey,
    pub(crate) lifetime: Lifetime,
    pub(crate) dependencies: Vec<ServiceKey>,
    pub(crate) node: PlanNode,
    pub(crate) applied_decorators: Vec<&'static str>,
}

impl ConstructionPlan {
    /// The service key this plan produces.
    pub fn service(&self) -> &ServiceKey {
        &self.service
    }

    /// The implementation backing the plan.
    pub fn implementation(&self) -> &ServiceKey {
        &self.implementation
    }

    /// The declared lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Dependency keys known at plan-build time. Empty for opaque closure
    /// factories whose dependencies only surface at execution.
    pub fn dependencies(&self) -> &[ServiceKey] {
        &self.dependencies
    }

    /// Identifiers of decorators already applied, in application order.
    pub fn applied_decorators(&self) -> &[&'static str] {
        &self.applied_decorators
    }
}

/// Compiles construction plans into executable factories.
///
/// The engine calls the compiler lazily, once per producer, and caches
/// the result.
pub trait PlanCompiler: Send + Sync {
    /// Compiles `plan` into an executable factory.
    fn compile(&self, plan: &ConstructionPlan) -> DiResult<ExecutableFactory>;
}

/// Default compiler: folds the node tree into a closure chain, innermost
/// factory first.
pub struct DefaultPlanCompiler;

impl PlanCompiler for DefaultPlanCompiler {
    fn compile(&self, plan: &ConstructionPlan) -> DiResult<ExecutableFactory> {
        Ok(compile_node(&plan.node))
    }
}

fn compile_node(node: &PlanNode) -> ExecutableFactory {
    match node {
        PlanNode::Factory(factory) => factory.clone(),
        PlanNode::Decorated { wrap, inner, .. } => {
            let inner = compile_node(inner);
            let wrap = wrap.clone();
            Arc::new(move |ctx: &ResolutionContext| {
                let base = inner(ctx)?;
                wrap(base, ctx)
            })
        }
    }
}

/// Hook that may substitute a producer's plan wholesale before
/// compilation.
///
/// The substituted plan's implementation must stay assignable to the
/// original service key, or the container rejects the rewrite.
pub trait PlanRewriter: Send + Sync {
    /// Rewrites `plan`, returning it unchanged when not interested.
    fn rewrite(&self, plan: ConstructionPlan) -> ConstructionPlan;
}
