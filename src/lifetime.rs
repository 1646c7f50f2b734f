//! Service lifetime definitions.

/// Policy governing instance reuse.
///
/// The lifetime decides where a produced instance is cached and which
/// scope owns its disposal.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, Lifetime, Resolver};
///
/// struct Config { url: String }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register::<Config, _>(Lifetime::Singleton, |_| Config {
///     url: "postgres://localhost".to_string(),
/// }).unwrap();
///
/// let container = builder.build();
/// let a = container.get_required::<Config>();
/// let b = container.get_required::<Config>();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// New instance per resolution, never cached.
    Transient,
    /// One instance per active scope, cached for the scope's lifetime.
    Scoped,
    /// One instance per container, cached until the container is disposed.
    Singleton,
    /// User-defined lifestyle. Caches per active scope like `Scoped`, but
    /// keeps its name so diagnostics can tell the two apart.
    Custom(&'static str),
}

impl Lifetime {
    /// Human-readable lifestyle name.
    pub fn name(&self) -> &'static str {
        match self {
            Lifetime::Transient => "Transient",
            Lifetime::Scoped => "Scoped",
            Lifetime::Singleton => "Singleton",
            Lifetime::Custom(name) => name,
        }
    }

}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
