//! Runtime object creation and dependency resolution.
//!
//! Types are described by [TypeModel](type_model::TypeModel)s and registered under logical names
//! in a [TypeRegistry](type_registry::TypeRegistry). An [ObjectFactory](factory::ObjectFactory)
//! builds object graphs on demand, selecting constructors and injecting dependencies into
//! constructor parameters and properties, while [singletons](singleton) are created once in
//! dependency order.

pub mod constructor_resolver;
pub mod dependency_store;
pub mod discovery;
mod error;
pub mod factory;
pub mod instance;
pub mod instance_builder;
pub mod singleton;
pub mod type_model;
pub mod type_registry;

pub use error::{ResolutionError, SingletonError, TypeRegistryError};
