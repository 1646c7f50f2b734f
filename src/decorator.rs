//! Decorator pipeline for wrapping construction plans.
//!
//! Decorators are chosen by predicate and applied in registration order;
//! the outermost decorator (applied last) is the one closest to the
//! consumer. Each application appends the decorator's identity to the
//! plan's ledger before later predicates run, so a predicate can refuse
//! to decorate twice or react to what is already applied.

use std::sync::Arc;

use crate::error::DiError;
use crate::key::{key_of, ServiceKey};
use crate::plan::{ConstructionPlan, DecoratorWrap, PlanNode};
use crate::provider::ResolutionContext;
use crate::registration::{AnyArc, Constructed};

/// Context handed to decorator predicates.
pub struct DecoratorContext<'a> {
    /// The service key being decorated.
    pub service: &'a ServiceKey,
    /// The implementation backing the base plan.
    pub implementation: &'a ServiceKey,
    /// Identifiers of decorators already applied to the plan, in
    /// application order.
    pub applied: &'a [&'static str],
}

/// A decorator over a concrete service type.
///
/// # Examples
///
/// ```
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver, ServiceDecorator, ResolutionContext};
/// use std::sync::Arc;
///
/// struct Greeter { greeting: String }
///
/// struct Shouting;
/// impl ServiceDecorator<Greeter> for Shouting {
///     fn decorate(&self, inner: Arc<Greeter>, _ctx: &ResolutionContext<'_>) -> Arc<Greeter> {
///         Arc::new(Greeter { greeting: inner.greeting.to_uppercase() })
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<Greeter, _>(Lifetime::Transient, |_| Greeter {
///     greeting: "hello".to_string(),
/// }).unwrap();
/// builder.register_decorator::<Greeter, _>(Shouting);
///
/// let container = builder.build();
/// assert_eq!(container.get_required::<Greeter>().greeting, "HELLO");
/// ```
pub trait ServiceDecorator<T: Send + Sync + 'static>: Send + Sync {
    /// Whether this decorator applies to the plan described by `ctx`.
    fn applies(&self, _ctx: &DecoratorContext<'_>) -> bool {
        true
    }

    /// Wraps the inner instance.
    fn decorate(&self, inner: Arc<T>, ctx: &ResolutionContext<'_>) -> Arc<T>;
}

/// A decorator over a trait-object service.
pub trait TraitDecorator<T: ?Sized + Send + Sync + 'static>: Send + Sync {
    /// Whether this decorator applies to the plan described by `ctx`.
    fn applies(&self, _ctx: &DecoratorContext<'_>) -> bool {
        true
    }

    /// Wraps the inner trait object.
    fn decorate(&self, inner: Arc<T>, ctx: &ResolutionContext<'_>) -> Arc<T>;
}

/// Erased decorator entry held by the container per service key.
pub(crate) struct DecoratorRegistration {
    pub(crate) service: ServiceKey,
    pub(crate) id: &'static str,
    pub(crate) applies: Arc<dyn for<'a> Fn(&DecoratorContext<'a>) -> bool + Send + Sync>,
    pub(crate) wrap: DecoratorWrap,
}

pub(crate) fn erase_service_decorator<T, D>(decorator: D) -> DecoratorRegistration
where
    T: Send + Sync + 'static,
    D: ServiceDecorator<T> + 'static,
{
    let decorator = Arc::new(decorator);
    let applies = {
        let decorator = decorator.clone();
        Arc::new(move |ctx: &DecoratorContext<'_>| decorator.applies(ctx))
    };
    let wrap: DecoratorWrap = Arc::new(move |base: Constructed, ctx: &ResolutionContext| {
        let Constructed { instance, disposer } = base;
        let typed = instance.downcast::<T>().map_err(|_| {
            DiError::activation(
                std::any::type_name::<T>(),
                Vec::new(),
                format!("decorator {} received an incompatible instance", std::any::type_name::<D>()),
            )
        })?;
        let decorated = decorator.decorate(typed, ctx);
        Ok(Constructed { instance: decorated as AnyArc, disposer })
    });
    DecoratorRegistration {
        service: key_of::<T>(),
        id: std::any::type_name::<D>(),
        applies,
        wrap,
    }
}

pub(crate) fn erase_trait_decorator<T, D>(decorator: D) -> DecoratorRegistration
where
    T: ?Sized + Send + Sync + 'static,
    D: TraitDecorator<T> + 'static,
{
    let decorator = Arc::new(decorator);
    let applies = {
        let decorator = decorator.clone();
        Arc::new(move |ctx: &DecoratorContext<'_>| decorator.applies(ctx))
    };
    // Trait objects are stored double-wrapped (Arc<Arc<dyn T>>), so the
    // erased instance downcasts to Arc<T>.
    let wrap: DecoratorWrap = Arc::new(move |base: Constructed, ctx: &ResolutionContext| {
        let Constructed { instance, disposer } = base;
        let typed = instance.downcast::<Arc<T>>().map_err(|_| {
            DiError::activation(
                std::any::type_name::<T>(),
                Vec::new(),
                format!("decorator {} received an incompatible instance", std::any::type_name::<D>()),
            )
        })?;
        let decorated = decorator.decorate((*typed).clone(), ctx);
        Ok(Constructed {
            instance: Arc::new(decorated) as AnyArc,
            disposer,
        })
    });
    DecoratorRegistration {
        service: key_of::<T>(),
        id: std::any::type_name::<D>(),
        applies,
        wrap,
    }
}

/// Applies matching decorators to a base plan in registration order.
///
/// Each application appends its identity to the ledger before later
/// predicates are evaluated.
pub(crate) fn apply_decorators(
    plan: ConstructionPlan,
    decorators: &[Arc<DecoratorRegistration>],
) -> ConstructionPlan {
    let ConstructionPlan {
        service,
        implementation,
        lifetime,
        dependencies,
        mut node,
        mut applied_decorators,
    } = plan;

    for decorator in decorators {
        let ctx = DecoratorContext {
            service: &service,
            implementation: &implementation,
            applied: &applied_decorators,
        };
        if (decorator.applies)(&ctx) {
            node = PlanNode::Decorated {
                id: decorator.id,
                wrap: decorator.wrap.clone(),
                inner: Box::new(node),
            };
            applied_decorators.push(decorator.id);
        }
    }

    ConstructionPlan {
        service,
        implementation,
        lifetime,
        dependencies,
        node,
        applied_decorators,
    }
}
