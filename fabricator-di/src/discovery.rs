//! Discovery of types which should be registered automatically, based on [Marker]s attached to
//! them. Types can be listed explicitly with a [StaticTypeDiscovery] or registered at link time
//! with the [submit_type](crate::submit_type) macro and collected by an [InventoryTypeDiscovery]:
//!
//! ```
//! use fabricator_di::discovery::{InventoryTypeDiscovery, Marker};
//! use fabricator_di::submit_type;
//! use fabricator_di::type_model::TypeModel;
//!
//! struct Clock;
//!
//! fn register_clock() -> (TypeModel, Vec<Marker>) {
//!     (
//!         TypeModel::builder::<Clock>()
//!             .constructor(vec![], |_| Ok(Clock))
//!             .build(),
//!         vec![Marker::singleton(vec!["clock".to_string()])],
//!     )
//! }
//!
//! submit_type!(register_clock);
//!
//! let discovery = InventoryTypeDiscovery::new();
//! ```
//!
//! [scan] then registers the discovered types in a [TypeRegistry] and produces
//! [SingletonDefinition]s for the singletons.

use crate::error::TypeRegistryError;
use crate::singleton::SingletonDefinition;
use crate::type_model::{TypeModel, TypeModelPtr};
use crate::type_registry::TypeRegistry;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

/// Declarative marking of a discovered type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Marker {
    /// The type can be built on demand and is registered under given names, or its type name if
    /// no names are given.
    Constructible { names: Vec<String> },
    /// The type should be instantiated once and bound under given names, or its type name if no
    /// names are given.
    Singleton { names: Vec<String>, lazy: bool },
}

impl Marker {
    pub fn constructible(names: Vec<String>) -> Self {
        Self::Constructible { names }
    }

    pub fn singleton(names: Vec<String>) -> Self {
        Self::Singleton { names, lazy: false }
    }

    pub fn lazy_singleton(names: Vec<String>) -> Self {
        Self::Singleton { names, lazy: true }
    }

    #[inline]
    pub fn kind(&self) -> MarkerKind {
        match self {
            Self::Constructible { .. } => MarkerKind::Constructible,
            Self::Singleton { .. } => MarkerKind::Singleton,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum MarkerKind {
    Constructible,
    Singleton,
}

/// Source of discovered types.
#[cfg_attr(test, automock)]
pub trait TypeDiscovery {
    /// Returns all types with at least one marker of given kind.
    fn find_types_marked_by(&self, kind: MarkerKind) -> Vec<TypeModelPtr>;

    /// Returns markers attached to the type with given name.
    fn markers(&self, type_name: &str) -> Vec<Marker>;
}

/// Discovery over an explicitly built list of types.
#[derive(Clone, Default, Debug)]
pub struct StaticTypeDiscovery {
    types: Vec<(TypeModelPtr, Vec<Marker>)>,
}

impl StaticTypeDiscovery {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_type(mut self, model: TypeModel, markers: Vec<Marker>) -> Self {
        self.add_type(TypeModelPtr::new(model), markers);
        self
    }

    pub fn add_type(&mut self, model: TypeModelPtr, markers: Vec<Marker>) {
        self.types.push((model, markers));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeDiscovery for StaticTypeDiscovery {
    fn find_types_marked_by(&self, kind: MarkerKind) -> Vec<TypeModelPtr> {
        self.types
            .iter()
            .filter(|(_, markers)| markers.iter().any(|marker| marker.kind() == kind))
            .map(|(model, _)| model.clone())
            .collect()
    }

    fn markers(&self, type_name: &str) -> Vec<Marker> {
        self.types
            .iter()
            .filter(|(model, _)| model.name() == type_name)
            .flat_map(|(_, markers)| markers.iter().cloned())
            .collect()
    }
}

/// Discovery of types registered with [submit_type](crate::submit_type).
#[derive(Clone, Debug)]
pub struct InventoryTypeDiscovery {
    types: StaticTypeDiscovery,
}

impl Default for InventoryTypeDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryTypeDiscovery {
    /// Collects all types submitted in the final binary.
    pub fn new() -> Self {
        let mut types = StaticTypeDiscovery::new();
        for (model, markers) in inventory::iter::<internal::TypeRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
        {
            types.add_type(TypeModelPtr::new(model), markers);
        }

        debug!("Collected {} submitted types", types.len());

        Self { types }
    }
}

impl TypeDiscovery for InventoryTypeDiscovery {
    fn find_types_marked_by(&self, kind: MarkerKind) -> Vec<TypeModelPtr> {
        self.types.find_types_marked_by(kind)
    }

    fn markers(&self, type_name: &str) -> Vec<Marker> {
        self.types.markers(type_name)
    }
}

/// Registers discovered constructible types in given registry and returns definitions of
/// discovered singletons.
pub fn scan(
    discovery: &dyn TypeDiscovery,
    registry: &mut TypeRegistry,
) -> Result<Vec<SingletonDefinition>, TypeRegistryError> {
    let constructible = discovery.find_types_marked_by(MarkerKind::Constructible);
    for model in &constructible {
        for names in discovery
            .markers(model.name())
            .into_iter()
            .filter_map(|marker| match marker {
                Marker::Constructible { names } => Some(names),
                _ => None,
            })
        {
            if names.is_empty() {
                registry.register(model.name(), model.clone())?;
            } else {
                for name in names {
                    registry.register(name, model.clone())?;
                }
            }
        }
    }

    let definitions = discovery
        .find_types_marked_by(MarkerKind::Singleton)
        .into_iter()
        .flat_map(|model| {
            discovery
                .markers(model.name())
                .into_iter()
                .filter_map(|marker| match marker {
                    Marker::Singleton { names, lazy } => {
                        Some(SingletonDefinition::new(model.clone(), names).with_lazy(lazy))
                    }
                    _ => None,
                })
                .collect_vec()
        })
        .collect_vec();

    info!(
        "Discovered {} constructible types and {} singletons",
        constructible.len(),
        definitions.len()
    );

    Ok(definitions)
}

/// Registers a type for an [InventoryTypeDiscovery]. Takes a path to a
/// `fn() -> (TypeModel, Vec<Marker>)`.
#[macro_export]
macro_rules! submit_type {
    ($register:path) => {
        $crate::discovery::internal::submit! {
            $crate::discovery::internal::TypeRegisterer {
                register: $register
            }
        }
    };
}

#[doc(hidden)]
pub mod internal {
    use crate::discovery::Marker;
    use crate::type_model::TypeModel;
    use inventory::collect;
    pub use inventory::submit;

    pub struct TypeRegisterer {
        pub register: fn() -> (TypeModel, Vec<Marker>),
    }

    collect!(TypeRegisterer);
}

#[cfg(test)]
mod tests {
    use crate::discovery::{
        scan, Marker, MarkerKind, MockTypeDiscovery, StaticTypeDiscovery, TypeDiscovery,
    };
    use crate::error::TypeRegistryError;
    use crate::type_model::{TypeModel, TypeModelPtr};
    use crate::type_registry::TypeRegistry;
    use mockall::predicate::*;
    use std::any::type_name;

    struct Constructible;

    struct Singleton;

    fn constructible_model() -> TypeModel {
        TypeModel::builder::<Constructible>()
            .constructor(vec![], |_| Ok(Constructible))
            .build()
    }

    fn singleton_model() -> TypeModel {
        TypeModel::builder::<Singleton>()
            .constructor(vec![], |_| Ok(Singleton))
            .build()
    }

    #[test]
    fn should_find_marked_types() {
        let discovery = StaticTypeDiscovery::new()
            .with_type(constructible_model(), vec![Marker::constructible(vec![])])
            .with_type(
                singleton_model(),
                vec![Marker::lazy_singleton(vec!["s".to_string()])],
            );

        let found = discovery.find_types_marked_by(MarkerKind::Singleton);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), type_name::<Singleton>());
        assert_eq!(
            discovery.markers(type_name::<Singleton>()),
            vec![Marker::Singleton {
                names: vec!["s".to_string()],
                lazy: true
            }]
        );
        assert!(discovery.markers("unknown").is_empty());
    }

    #[test]
    fn should_register_constructible_types() {
        let discovery = StaticTypeDiscovery::new()
            .with_type(
                constructible_model(),
                vec![Marker::constructible(vec!["a".to_string(), "b".to_string()])],
            )
            .with_type(singleton_model(), vec![Marker::constructible(vec![])]);

        let mut registry = TypeRegistry::new();
        let definitions = scan(&discovery, &mut registry).unwrap();

        assert!(definitions.is_empty());
        assert!(registry.is_registered("a"));
        assert!(registry.is_registered("b"));
        assert!(registry.is_registered(type_name::<Singleton>()));
    }

    #[test]
    fn should_create_singleton_definitions() {
        let discovery = StaticTypeDiscovery::new()
            .with_type(singleton_model(), vec![Marker::singleton(vec![])])
            .with_type(
                constructible_model(),
                vec![
                    Marker::constructible(vec![]),
                    Marker::lazy_singleton(vec!["lazy".to_string()]),
                ],
            );

        let mut registry = TypeRegistry::new();
        let definitions = scan(&discovery, &mut registry).unwrap();

        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].names, vec![type_name::<Singleton>().to_string()]);
        assert!(!definitions[0].is_lazy);
        assert!(definitions[1].is_lazy);
        assert!(definitions[1].provides("lazy"));
        assert!(registry.is_registered(type_name::<Constructible>()));
        assert!(!registry.is_registered(type_name::<Singleton>()));
    }

    #[test]
    fn should_forward_duplicate_registrations() {
        let mut discovery = MockTypeDiscovery::new();
        discovery
            .expect_find_types_marked_by()
            .with(eq(MarkerKind::Constructible))
            .returning(|_| {
                vec![
                    TypeModelPtr::new(constructible_model()),
                    TypeModelPtr::new(singleton_model()),
                ]
            });
        discovery
            .expect_markers()
            .returning(|_| vec![Marker::constructible(vec!["same".to_string()])]);

        assert!(matches!(
            scan(&discovery, &mut TypeRegistry::new()).unwrap_err(),
            TypeRegistryError::DuplicateRegistration { name, .. } if name == "same"
        ));
    }
}
