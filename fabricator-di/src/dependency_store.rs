//! Storage for already created dependency values. Values are bound to logical names, while names
//! which are not bound directly can be satisfied by building registered types or by asking
//! [DependencyProvider]s. Like [TypeRegistry], stores can be chained to a parent store.

use crate::error::ResolutionError;
use crate::factory::{factory_binding_name, StoreFactory};
use crate::instance::Instance;
use crate::instance_builder::{InstanceBuilder, ResolutionChain};
use crate::type_model::{TypeModel, TypeModelPtr};
use crate::type_registry::TypeRegistry;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

pub type DependencyProviderPtr = Rc<dyn DependencyProvider>;

/// Pluggable source of dependencies, consulted when neither direct bindings nor the type registry
/// can satisfy a name. Only one provider may claim a given name.
#[cfg_attr(test, automock)]
pub trait DependencyProvider {
    /// Checks if this provider can satisfy given name, without materializing anything.
    fn provides(&self, name: &str) -> bool;

    /// Returns a type which should be built to satisfy given name, if this provider knows one.
    fn find_type(&self, name: &str) -> Option<TypeModelPtr>;

    /// Returns a value for given name. Providers which only know types should return `Ok(None)`.
    fn resolve(
        &self,
        name: &str,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Option<Instance>, ResolutionError>;
}

enum ProviderAnswer {
    Value(Instance),
    Type(TypeModelPtr),
}

/// Named dependency values, backed by a [TypeRegistry] for building missing ones.
pub struct DependencyStore {
    registry: Rc<TypeRegistry>,
    bindings: RefCell<FxHashMap<String, Instance>>,
    providers: RefCell<Vec<DependencyProviderPtr>>,
    parent: Option<Rc<DependencyStore>>,
}

impl DependencyStore {
    /// Creates a new root store.
    pub fn new(registry: Rc<TypeRegistry>) -> Rc<Self> {
        Self::with_parent(registry, None)
    }

    /// Creates a store which falls back to `parent`. The store always contains a binding for
    /// `dyn Factory`, which refers back to the store itself.
    pub fn with_parent(
        registry: Rc<TypeRegistry>,
        parent: Option<Rc<DependencyStore>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|store| {
            let mut bindings = FxHashMap::default();
            bindings.insert(
                factory_binding_name().to_string(),
                StoreFactory::instance(store.clone()),
            );

            Self {
                registry,
                bindings: RefCell::new(bindings),
                providers: Default::default(),
                parent,
            }
        })
    }

    #[inline]
    pub fn registry(&self) -> &Rc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    pub fn parent(&self) -> Option<&Rc<DependencyStore>> {
        self.parent.as_ref()
    }

    /// Binds a value to given name, replacing and returning any previous local binding.
    pub fn bind<N: Into<String>>(&self, name: N, value: Instance) -> Option<Instance> {
        let name = name.into();
        trace!(name = %name, type_name = value.type_name(), "Binding dependency");
        self.bindings.borrow_mut().insert(name, value)
    }

    /// Removes a local binding. The self-reference binding cannot be removed.
    pub fn unbind(&self, name: &str) -> Option<Instance> {
        if name == factory_binding_name() {
            return None;
        }

        self.bindings.borrow_mut().remove(name)
    }

    /// Checks if given name is bound directly, claimed by a provider or bound in a parent store.
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
            || self
                .providers
                .borrow()
                .iter()
                .any(|provider| provider.provides(name))
            || self
                .parent
                .as_ref()
                .map(|parent| parent.is_bound(name))
                .unwrap_or(false)
    }

    /// Checks if given name can be satisfied either by [DependencyStore::is_bound] or by building
    /// a registered type.
    pub fn can_satisfy(&self, name: &str) -> bool {
        self.is_bound(name)
            || self.registry.is_registered(name)
            || self
                .parent
                .as_ref()
                .map(|parent| parent.can_satisfy(name))
                .unwrap_or(false)
    }

    /// Returns an existing value for given name, without building any registered types. Missing
    /// values are not an error.
    pub fn get(&self, name: &str) -> Result<Option<Instance>, ResolutionError> {
        if let Some(value) = self.local_binding(name) {
            return Ok(Some(value));
        }

        if let Some(ProviderAnswer::Value(value)) =
            self.query_providers(name, &mut ResolutionChain::new())?
        {
            return Ok(Some(value));
        }

        self.parent
            .as_ref()
            .map(|parent| parent.get(name))
            .transpose()
            .map(Option::flatten)
    }

    pub fn add_provider(&self, provider: DependencyProviderPtr) {
        self.providers.borrow_mut().push(provider);
    }

    /// Finds a type which can be built to satisfy given name.
    pub fn find_type(&self, name: &str) -> Result<Option<TypeModelPtr>, ResolutionError> {
        if let Some(model) = self.registry.lookup(name) {
            return Ok(Some(model));
        }

        let mut providers = self.claiming_providers(name);
        if providers.len() > 1 {
            return Err(ResolutionError::AmbiguousProviderResult(name.to_string()));
        }

        if let Some(model) = providers.pop().and_then(|provider| provider.find_type(name)) {
            return Ok(Some(model));
        }

        self.parent
            .as_ref()
            .map(|parent| parent.find_type(name))
            .transpose()
            .map(Option::flatten)
    }

    /// Returns a value for given name, building it if needed. Attempts are made in order: direct
    /// binding, registered type, providers, parent store.
    pub fn resolve_or_build(
        &self,
        name: &str,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        if let Some(value) = self.local_binding(name) {
            trace!(name, "Resolved from binding");
            return Ok(value);
        }

        if let Some(model) = self.registry.lookup(name) {
            trace!(name, type_name = model.name(), "Building registered type");
            return self.build(&model, vec![], chain);
        }

        match self.query_providers(name, chain)? {
            Some(ProviderAnswer::Value(value)) => {
                trace!(name, "Resolved from provider");
                return Ok(value);
            }
            Some(ProviderAnswer::Type(model)) => {
                trace!(name, type_name = model.name(), "Building type found by provider");
                return self.build(&model, vec![], chain);
            }
            None => {}
        }

        if let Some(parent) = &self.parent {
            return parent.resolve_or_build(name, chain);
        }

        Err(ResolutionError::UnresolvedDependency {
            name: name.to_string(),
            chain: chain.types().to_vec(),
        })
    }

    /// Builds an instance of given type using this store for dependencies.
    pub fn build(
        &self,
        model: &TypeModel,
        supplied: Vec<Option<Instance>>,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        InstanceBuilder::new(self).build(model, supplied, chain)
    }

    fn local_binding(&self, name: &str) -> Option<Instance> {
        self.bindings.borrow().get(name).cloned()
    }

    fn claiming_providers(&self, name: &str) -> Vec<DependencyProviderPtr> {
        self.providers
            .borrow()
            .iter()
            .filter(|provider| provider.provides(name))
            .cloned()
            .collect()
    }

    fn query_providers(
        &self,
        name: &str,
        chain: &mut ResolutionChain,
    ) -> Result<Option<ProviderAnswer>, ResolutionError> {
        let mut providers = self.claiming_providers(name);
        if providers.len() > 1 {
            return Err(ResolutionError::AmbiguousProviderResult(name.to_string()));
        }

        let Some(provider) = providers.pop() else {
            return Ok(None);
        };

        if let Some(value) = provider.resolve(name, self, chain)? {
            return Ok(Some(ProviderAnswer::Value(value)));
        }

        Ok(provider.find_type(name).map(ProviderAnswer::Type))
    }
}
