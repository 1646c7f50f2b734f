//! Service key types for the resolution engine.

use std::any::TypeId;

/// Identifier of a requested capability.
///
/// Keys come in three shapes: fully specified services, open templates
/// that can only be resolved after the type-relations oracle closes them
/// against a concrete request, and per-element keys inside a collection
/// registration.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ServiceKey, key_of};
///
/// let closed = key_of::<String>();
/// assert!(!closed.is_open());
///
/// let open = ServiceKey::open("Repository");
/// assert!(open.is_open());
/// assert_eq!(open.display_name(), "Repository");
/// ```
#[derive(Debug, Clone)]
pub enum ServiceKey {
    /// Fully specified service type with TypeId and name for diagnostics.
    Closed(TypeId, &'static str),
    /// Unparameterized template, identified by name only.
    ///
    /// Open keys cannot be resolved directly; they exist to derive closed
    /// producers through the type-relations oracle.
    Open(&'static str),
    /// One element of a collection registration, in registration order.
    Element(TypeId, &'static str, usize),
}

impl ServiceKey {
    /// Creates an open template key.
    pub fn open(name: &'static str) -> Self {
        ServiceKey::Open(name)
    }

    /// Get the type or template name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKey::Closed(_, name) => name,
            ServiceKey::Open(name) => name,
            ServiceKey::Element(_, name, _) => name,
        }
    }

    /// Whether this key is an open template.
    pub fn is_open(&self) -> bool {
        matches!(self, ServiceKey::Open(_))
    }

    /// The element index for collection-element keys, `None` otherwise.
    pub fn element_index(&self) -> Option<usize> {
        match self {
            ServiceKey::Element(_, _, index) => Some(*index),
            _ => None,
        }
    }
}

// Descriptor-only equality: TypeId and index decide, display strings do not.
impl PartialEq for ServiceKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServiceKey::Closed(a, _), ServiceKey::Closed(b, _)) => a == b,
            (ServiceKey::Open(a), ServiceKey::Open(b)) => a == b,
            (ServiceKey::Element(a, _, i), ServiceKey::Element(b, _, j)) => a == b && i == j,
            _ => false,
        }
    }
}

impl Eq for ServiceKey {}

impl PartialOrd for ServiceKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (ServiceKey::Closed(a, _), ServiceKey::Closed(b, _)) => a.cmp(b),
            (ServiceKey::Closed(_, _), _) => Ordering::Less,
            (_, ServiceKey::Closed(_, _)) => Ordering::Greater,
            (ServiceKey::Open(a), ServiceKey::Open(b)) => a.cmp(b),
            (ServiceKey::Open(_), _) => Ordering::Less,
            (_, ServiceKey::Open(_)) => Ordering::Greater,
            (ServiceKey::Element(a, _, i), ServiceKey::Element(b, _, j)) => {
                a.cmp(b).then_with(|| i.cmp(j))
            }
        }
    }
}

impl std::hash::Hash for ServiceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            ServiceKey::Closed(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            ServiceKey::Open(name) => {
                1u8.hash(state);
                name.hash(state);
            }
            ServiceKey::Element(id, _, index) => {
                2u8.hash(state);
                id.hash(state);
                index.hash(state);
            }
        }
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKey::Closed(_, name) => write!(f, "{}", name),
            ServiceKey::Open(name) => write!(f, "{} (open)", name),
            ServiceKey::Element(_, name, index) => write!(f, "{}[{}]", name, index),
        }
    }
}

/// Closed key for a concrete or trait-object service type.
#[inline]
pub fn key_of<T: ?Sized + 'static>() -> ServiceKey {
    ServiceKey::Closed(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Element key for position `index` inside the collection registered for `T`.
#[inline]
pub fn element_key_of<T: ?Sized + 'static>(index: usize) -> ServiceKey {
    ServiceKey::Element(TypeId::of::<T>(), std::any::type_name::<T>(), index)
}
