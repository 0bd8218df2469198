//! Core functionality for creating instances: constructor selection, recursive resolution of
//! constructor arguments and property injection, guarded against circular dependencies.

use crate::constructor_resolver::ConstructorResolver;
use crate::dependency_store::DependencyStore;
use crate::error::ResolutionError;
use crate::instance::Instance;
use crate::type_model::{Arguments, TypeModel};
use std::any::Any;
use std::fmt::{Display, Formatter};
use tracing::{debug, debug_span, trace, trace_span};

/// Stack of types currently under construction. Passed explicitly through the resolution call
/// tree, so independent resolutions never share it.
#[derive(Clone, Default, Debug, Eq, PartialEq)]
pub struct ResolutionChain {
    types: Vec<String>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.iter().any(|entry| entry == type_name)
    }

    #[inline]
    pub fn push(&mut self, type_name: &str) {
        self.types.push(type_name.to_string());
    }

    #[inline]
    pub fn pop(&mut self) -> Option<String> {
        self.types.pop()
    }

    #[inline]
    pub fn types(&self) -> &[String] {
        &self.types
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn cycle_error(&self, type_name: &str) -> ResolutionError {
        let mut chain = self.types.clone();
        chain.push(type_name.to_string());
        ResolutionError::CircularDependency { chain }
    }
}

impl Display for ResolutionChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.types.join(" -> "))
    }
}

/// Builds instances of [TypeModel]s, taking dependencies from a [DependencyStore].
#[derive(Clone, Copy)]
pub struct InstanceBuilder<'a> {
    store: &'a DependencyStore,
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(store: &'a DependencyStore) -> Self {
        Self { store }
    }

    /// Creates a new instance of given type. `supplied` arguments are passed as leading
    /// constructor arguments, while the rest is resolved from the store.
    pub fn build(
        &self,
        model: &TypeModel,
        supplied: Vec<Option<Instance>>,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        if chain.contains(model.name()) {
            return Err(chain.cycle_error(model.name()));
        }

        let _span = debug_span!("build", type_name = model.name()).entered();

        chain.push(model.name());
        let instance = self.construct(model, supplied, chain);
        chain.pop();

        instance
    }

    /// Injects unset properties of an existing object of given type. Properties which already hold
    /// a value are left untouched, so injection can be safely repeated.
    pub fn inject_properties(
        &self,
        model: &TypeModel,
        object: &mut dyn Any,
        chain: &mut ResolutionChain,
    ) -> Result<(), ResolutionError> {
        if chain.contains(model.name()) {
            return Err(chain.cycle_error(model.name()));
        }

        chain.push(model.name());
        let result = self.inject_unset_properties(model, object, chain);
        chain.pop();

        result
    }

    fn construct(
        &self,
        model: &TypeModel,
        supplied: Vec<Option<Instance>>,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        Self::check_injection_targets(model)?;

        let constructor = ConstructorResolver::new(self.store).resolve(model, &supplied, chain)?;

        let mut arguments = supplied;
        for parameter in &constructor.parameters[arguments.len()..] {
            trace!(parameter = %parameter, "Resolving constructor argument");
            arguments.push(Some(self.store.resolve_or_build(&parameter.name, chain)?));
        }

        let mut object = constructor.invoke(&Arguments::new(arguments))?;
        self.inject_unset_properties(model, &mut *object, chain)?;

        debug!("Created instance of {}", model.name());

        model.seal(object)
    }

    fn check_injection_targets(model: &TypeModel) -> Result<(), ResolutionError> {
        match model.properties().iter().find(|property| !property.is_public) {
            Some(property) => Err(ResolutionError::InvalidInjectionTarget {
                type_name: model.name().to_string(),
                property: property.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn inject_unset_properties(
        &self,
        model: &TypeModel,
        object: &mut dyn Any,
        chain: &mut ResolutionChain,
    ) -> Result<(), ResolutionError> {
        Self::check_injection_targets(model)?;

        for property in model.properties() {
            if property.is_set(object) {
                trace!(property = %property.name, "Property already set - skipping");
                continue;
            }

            let _span = trace_span!("inject", property = %property.name).entered();

            let value = self
                .store
                .resolve_or_build(property.dependency_name(), chain)?;
            property.assign(object, &value)?;
        }

        Ok(())
    }
}
