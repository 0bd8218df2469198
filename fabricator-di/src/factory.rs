//! Entry point for creating objects. An [ObjectFactory] combines a [TypeRegistry], a
//! [DependencyStore] and a [SingletonManager], and is usually created with an
//! [ObjectFactoryBuilder]:
//!
//! ```
//! use fabricator_di::factory::ObjectFactoryBuilder;
//! use fabricator_di::instance::InstancePtr;
//! use fabricator_di::type_model::{ParameterType, TypeModel};
//!
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter;
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         "Hello".to_string()
//!     }
//! }
//!
//! struct Welcome {
//!     greeter: InstancePtr<dyn Greeter>,
//! }
//!
//! let factory = ObjectFactoryBuilder::new()
//!     .with_interface::<dyn Greeter>(
//!         TypeModel::builder::<EnglishGreeter>()
//!             .constructor(vec![], |_| Ok(EnglishGreeter))
//!             .implements::<dyn Greeter>(|greeter| greeter as InstancePtr<dyn Greeter>)
//!             .build(),
//!     )
//!     .unwrap()
//!     .build();
//!
//! let welcome = factory
//!     .create(
//!         &TypeModel::builder::<Welcome>()
//!             .constructor(vec![ParameterType::interface::<dyn Greeter>()], |arguments| {
//!                 Ok(Welcome {
//!                     greeter: arguments.get::<dyn Greeter>(0)?,
//!                 })
//!             })
//!             .build(),
//!         vec![],
//!     )
//!     .unwrap()
//!     .downcast::<Welcome>()
//!     .unwrap();
//!
//! assert_eq!(welcome.greeter.greet(), "Hello");
//! ```

use crate::dependency_store::{DependencyProviderPtr, DependencyStore};
use crate::discovery::{scan, TypeDiscovery};
use crate::error::{ResolutionError, SingletonError, TypeRegistryError};
use crate::instance::{Instance, InstancePtr};
use crate::instance_builder::{InstanceBuilder, ResolutionChain};
use crate::singleton::scheduler::SingletonScheduler;
use crate::singleton::{SingletonDefinition, SingletonManager};
use crate::type_model::{TypeModel, TypeModelPtr};
use crate::type_registry::TypeRegistry;
use std::any::{type_name, Any};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Name under which every store binds its own [Factory].
#[inline]
pub fn factory_binding_name() -> &'static str {
    type_name::<dyn Factory>()
}

/// Object creation facade available to constructed objects as a regular dependency, so they can
/// create further objects on demand.
pub trait Factory {
    /// Creates a new instance of the type registered under given name. `arguments` are passed as
    /// leading constructor arguments.
    fn create_instance(
        &self,
        name: &str,
        arguments: Vec<Option<Instance>>,
    ) -> Result<Instance, ResolutionError>;

    /// Returns an existing dependency value, without building registered types. Lazy singletons
    /// are created on first request.
    fn resolve_dependency(&self, name: &str) -> Result<Option<Instance>, ResolutionError>;
}

/// The self-reference bound in every [DependencyStore]. Holds a weak reference, so it doesn't keep
/// its store alive.
pub(crate) struct StoreFactory {
    store: Weak<DependencyStore>,
}

impl StoreFactory {
    pub(crate) fn instance(store: Weak<DependencyStore>) -> Instance {
        Instance::interface(Rc::new(StoreFactory { store }) as InstancePtr<dyn Factory>)
    }

    fn store(&self) -> Result<Rc<DependencyStore>, ResolutionError> {
        self.store.upgrade().ok_or(ResolutionError::FactoryDropped)
    }
}

impl Factory for StoreFactory {
    fn create_instance(
        &self,
        name: &str,
        arguments: Vec<Option<Instance>>,
    ) -> Result<Instance, ResolutionError> {
        let store = self.store()?;
        create_in_store(&store, name, arguments)
    }

    fn resolve_dependency(&self, name: &str) -> Result<Option<Instance>, ResolutionError> {
        self.store()?.get(name)
    }
}

fn create_in_store(
    store: &DependencyStore,
    name: &str,
    arguments: Vec<Option<Instance>>,
) -> Result<Instance, ResolutionError> {
    let model = store
        .find_type(name)?
        .ok_or_else(|| ResolutionError::UnresolvedDependency {
            name: name.to_string(),
            chain: vec![],
        })?;

    store.build(&model, arguments, &mut ResolutionChain::new())
}

/// Builder for [ObjectFactory] with sensible defaults, for easy construction.
#[derive(Default)]
pub struct ObjectFactoryBuilder {
    registry: TypeRegistry,
    parent: Option<Rc<DependencyStore>>,
    bindings: Vec<(String, Instance)>,
    providers: Vec<DependencyProviderPtr>,
    singletons: Vec<SingletonDefinition>,
    scheduler: SingletonScheduler,
}

impl ObjectFactoryBuilder {
    /// Creates a new builder with an empty registry and no parent.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets new [TypeRegistry], replacing any types registered so far.
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a type under given name.
    pub fn with_type<N: Into<String>>(
        mut self,
        name: N,
        model: TypeModel,
    ) -> Result<Self, TypeRegistryError> {
        self.registry.register(name, TypeModelPtr::new(model))?;
        Ok(self)
    }

    /// Registers a type as the implementation of interface `I`.
    pub fn with_interface<I: ?Sized + 'static>(
        mut self,
        model: TypeModel,
    ) -> Result<Self, TypeRegistryError> {
        self.registry
            .register_interface::<I>(TypeModelPtr::new(model))?;
        Ok(self)
    }

    /// Binds a value which will be available in the resulting factory.
    pub fn with_binding<N: Into<String>>(mut self, name: N, value: Instance) -> Self {
        self.bindings.push((name.into(), value));
        self
    }

    pub fn with_provider(mut self, provider: DependencyProviderPtr) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_singleton(mut self, definition: SingletonDefinition) -> Self {
        self.singletons.push(definition);
        self
    }

    /// Sets the scheduler used for ordering eager singletons.
    pub fn with_scheduler(mut self, scheduler: SingletonScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Registers all types and singletons found by given discovery.
    pub fn with_discovery(mut self, discovery: &dyn TypeDiscovery) -> Result<Self, TypeRegistryError> {
        let definitions = scan(discovery, &mut self.registry)?;
        self.singletons.extend(definitions);
        Ok(self)
    }

    /// Direct access to the registry being built.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Builds resulting [ObjectFactory].
    pub fn build(self) -> ObjectFactory {
        let store = DependencyStore::with_parent(Rc::new(self.registry), self.parent);
        for (name, value) in self.bindings {
            store.bind(name, value);
        }

        for provider in self.providers {
            store.add_provider(provider);
        }

        let factory = ObjectFactory::new(store, Rc::new(SingletonManager::new(self.scheduler)));
        for definition in self.singletons {
            factory.register_singleton_definition(definition);
        }

        factory
    }
}

/// Creates objects, resolving their dependencies from bindings, registered types, providers and
/// singletons.
pub struct ObjectFactory {
    store: Rc<DependencyStore>,
    singletons: Rc<SingletonManager>,
}

impl ObjectFactory {
    /// Creates a factory using given store and singleton manager. The manager is added as a
    /// provider of lazy singletons to the store.
    pub fn new(store: Rc<DependencyStore>, singletons: Rc<SingletonManager>) -> Self {
        store.add_provider(singletons.clone());
        Self { store, singletons }
    }

    #[inline]
    pub fn registry(&self) -> &Rc<TypeRegistry> {
        self.store.registry()
    }

    #[inline]
    pub fn store(&self) -> &Rc<DependencyStore> {
        &self.store
    }

    /// Creates a new instance of given type.
    pub fn create(
        &self,
        model: &TypeModel,
        arguments: Vec<Option<Instance>>,
    ) -> Result<Instance, ResolutionError> {
        self.store
            .build(model, arguments, &mut ResolutionChain::new())
    }

    /// Creates a new instance of the type registered under given name, cast to `T`.
    pub fn create_named<T: ?Sized + 'static>(
        &self,
        name: &str,
        arguments: Vec<Option<Instance>>,
    ) -> Result<InstancePtr<T>, ResolutionError> {
        create_in_store(&self.store, name, arguments)?.downcast_typed::<T>()
    }

    /// Creates a new instance of the type registered for interface `T`.
    pub fn create_by_interface<T: ?Sized + 'static>(
        &self,
        arguments: Vec<Option<Instance>>,
    ) -> Result<InstancePtr<T>, ResolutionError> {
        self.create_named::<T>(type_name::<T>(), arguments)
    }

    /// Injects unset properties of an object created elsewhere.
    pub fn inject_properties(
        &self,
        model: &TypeModel,
        object: &mut dyn Any,
    ) -> Result<(), ResolutionError> {
        InstanceBuilder::new(&self.store).inject_properties(
            model,
            object,
            &mut ResolutionChain::new(),
        )
    }

    /// Returns a dependency for interface `T`, building it if needed.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<InstancePtr<T>, ResolutionError> {
        self.resolve_named::<T>(type_name::<T>())
    }

    /// Returns a dependency with given name cast to `T`, building it if needed.
    pub fn resolve_named<T: ?Sized + 'static>(
        &self,
        name: &str,
    ) -> Result<InstancePtr<T>, ResolutionError> {
        self.store
            .resolve_or_build(name, &mut ResolutionChain::new())?
            .downcast_typed::<T>()
    }

    pub fn bind<N: Into<String>>(&self, name: N, value: Instance) -> Option<Instance> {
        self.store.bind(name, value)
    }

    /// Binds a value under the name of interface `T`.
    pub fn bind_interface<T: ?Sized + 'static>(&self, value: InstancePtr<T>) -> Option<Instance> {
        self.store.bind(type_name::<T>(), Instance::interface(value))
    }

    pub fn unbind(&self, name: &str) -> Option<Instance> {
        self.store.unbind(name)
    }

    pub fn get(&self, name: &str) -> Result<Option<Instance>, ResolutionError> {
        self.store.get(name)
    }

    #[inline]
    pub fn is_bound(&self, name: &str) -> bool {
        self.store.is_bound(name)
    }

    pub fn add_provider(&self, provider: DependencyProviderPtr) {
        self.store.add_provider(provider);
    }

    pub fn register_singleton_definition(&self, definition: SingletonDefinition) {
        self.singletons.register_singleton_definition(definition);
    }

    /// Creates all pending eager singletons. See [SingletonManager::instantiate_singletons].
    pub fn instantiate_singletons(&self) -> Result<Vec<Instance>, SingletonError> {
        self.singletons.instantiate_singletons(&self.store)
    }

    pub fn startup(&self) {
        self.singletons.startup();
    }

    pub fn shutdown(&self) {
        self.singletons.shutdown();
    }

    /// Currently active singletons, in instantiation order.
    pub fn singletons(&self) -> Vec<Instance> {
        self.singletons.singletons()
    }

    /// Creates a builder for a child factory. The child has its own registry, store and
    /// singletons, but falls back to this factory for anything it doesn't know.
    pub fn override_builder(&self) -> ObjectFactoryBuilder {
        debug!("Creating override factory builder");

        ObjectFactoryBuilder {
            registry: self.registry().override_registry(None),
            parent: Some(self.store.clone()),
            ..Default::default()
        }
    }
}

impl Factory for ObjectFactory {
    fn create_instance(
        &self,
        name: &str,
        arguments: Vec<Option<Instance>>,
    ) -> Result<Instance, ResolutionError> {
        create_in_store(&self.store, name, arguments)
    }

    fn resolve_dependency(&self, name: &str) -> Result<Option<Instance>, ResolutionError> {
        self.store.get(name)
    }
}
