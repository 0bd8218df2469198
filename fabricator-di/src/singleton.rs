//! Support for singletons: types instantiated at most once and shared via named bindings.
//!
//! Eager singletons are created together by [SingletonManager::instantiate_singletons], in the
//! order computed by the [SingletonScheduler](scheduler::SingletonScheduler). Lazy ones are
//! created on first request, since the manager acts as a
//! [DependencyProvider](crate::dependency_store::DependencyProvider) for every name they provide.
//!
//! Failure to create a single singleton is not fatal - the error is logged and the singleton is
//! omitted, while the rest is created normally. The same applies to [Lifecycle] hooks.

pub mod scheduler;

use crate::dependency_store::{DependencyProvider, DependencyStore};
use crate::error::{ResolutionError, SingletonError};
use crate::instance::{ErrorPtr, Instance};
use crate::instance_builder::ResolutionChain;
use crate::singleton::scheduler::SingletonScheduler;
use crate::type_model::TypeModelPtr;
use derivative::Derivative;
use fxhash::FxHashSet;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, info, info_span};

pub type InstantiationStrategyPtr = Rc<dyn InstantiationStrategy>;

/// Optional start/stop capability of singletons. Singletons are started in instantiation order
/// and stopped in reverse order, so dependencies outlive their dependents. To be recognized, a
/// singleton type needs to declare `implements::<dyn Lifecycle>`.
pub trait Lifecycle {
    fn start(&self) -> Result<(), ErrorPtr> {
        Ok(())
    }

    fn stop(&self) -> Result<(), ErrorPtr> {
        Ok(())
    }
}

/// Creates the instance of a singleton definition.
#[cfg_attr(test, automock)]
pub trait InstantiationStrategy {
    fn instantiate(
        &self,
        definition: &SingletonDefinition,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError>;
}

/// Default strategy - builds the singleton type like any other type.
#[derive(Clone, Copy, Default, Debug)]
pub struct ConstructorStrategy;

impl InstantiationStrategy for ConstructorStrategy {
    fn instantiate(
        &self,
        definition: &SingletonDefinition,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        store.build(&definition.type_model, vec![], chain)
    }
}

/// Strategy delegating to a custom function.
#[derive(Clone, Copy)]
pub struct FnStrategy<F> {
    function: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&DependencyStore) -> Result<Instance, ResolutionError>,
{
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> InstantiationStrategy for FnStrategy<F>
where
    F: Fn(&DependencyStore) -> Result<Instance, ResolutionError>,
{
    fn instantiate(
        &self,
        _definition: &SingletonDefinition,
        store: &DependencyStore,
        _chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        (self.function)(store)
    }
}

/// Type which should be instantiated as a singleton, along with the names the instance should be
/// bound to.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct SingletonDefinition {
    pub type_model: TypeModelPtr,
    pub names: Vec<String>,
    pub is_lazy: bool,

    /// Custom construction; [ConstructorStrategy] when missing.
    #[derivative(Debug = "ignore")]
    pub strategy: Option<InstantiationStrategyPtr>,
}

impl SingletonDefinition {
    /// Creates an eager definition. When no names are given, the instance is bound under the name
    /// of its type.
    pub fn new(type_model: TypeModelPtr, names: Vec<String>) -> Self {
        let names = if names.is_empty() {
            vec![type_model.name().to_string()]
        } else {
            names
        };

        Self {
            type_model,
            names,
            is_lazy: false,
            strategy: None,
        }
    }

    pub fn lazy(self) -> Self {
        self.with_lazy(true)
    }

    pub fn with_lazy(mut self, is_lazy: bool) -> Self {
        self.is_lazy = is_lazy;
        self
    }

    pub fn with_strategy(mut self, strategy: InstantiationStrategyPtr) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        self.type_model.name()
    }

    #[inline]
    pub fn provides(&self, name: &str) -> bool {
        self.names.iter().any(|provided| provided == name)
    }

    pub fn instantiate(
        &self,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Instance, ResolutionError> {
        match &self.strategy {
            Some(strategy) => strategy.instantiate(self, store, chain),
            None => ConstructorStrategy.instantiate(self, store, chain),
        }
    }
}

#[derive(Debug)]
struct LazySingleton {
    definition: SingletonDefinition,
    instance: Option<Instance>,
    under_construction: bool,
}

/// Owner of singleton definitions and created singletons.
#[derive(Default, Debug)]
pub struct SingletonManager {
    scheduler: SingletonScheduler,
    pending: RefCell<Vec<SingletonDefinition>>,
    lazy: RefCell<Vec<LazySingleton>>,
    active: RefCell<Vec<Instance>>,
    started: Cell<bool>,
}

impl SingletonManager {
    pub fn new(scheduler: SingletonScheduler) -> Self {
        Self {
            scheduler,
            ..Default::default()
        }
    }

    /// Adds a definition. Lazy definitions become resolvable immediately, while eager ones wait for
    /// [SingletonManager::instantiate_singletons].
    pub fn register_singleton_definition(&self, definition: SingletonDefinition) {
        debug!(
            type_name = definition.type_name(),
            names = ?definition.names,
            lazy = definition.is_lazy,
            "Registering singleton definition"
        );

        if definition.is_lazy {
            self.lazy.borrow_mut().push(LazySingleton {
                definition,
                instance: None,
                under_construction: false,
            });
        } else {
            self.pending.borrow_mut().push(definition);
        }
    }

    /// Creates all pending eager singletons in dependency order and returns the created
    /// instances. Definitions are kept pending if scheduling fails.
    pub fn instantiate_singletons(
        &self,
        store: &DependencyStore,
    ) -> Result<Vec<Instance>, SingletonError> {
        let pending = self.pending.take();
        let definitions = pending
            .iter()
            .cloned()
            .chain(
                self.lazy
                    .borrow()
                    .iter()
                    .map(|entry| entry.definition.clone()),
            )
            .collect_vec();

        let order = match Self::check_unique_names(&definitions)
            .and_then(|_| self.scheduler.schedule(&definitions, store.registry()))
        {
            Ok(order) => order,
            Err(error) => {
                *self.pending.borrow_mut() = pending;
                return Err(error);
            }
        };

        let mut created = Vec::with_capacity(order.len());
        for definition in order.into_iter().map(|index| &definitions[index]) {
            let _span = info_span!("singleton", type_name = definition.type_name()).entered();

            match definition.instantiate(store, &mut ResolutionChain::new()) {
                Ok(instance) => {
                    self.activate(definition, &instance, store);
                    created.push(instance);
                }
                Err(error) => error!(%error, "Cannot instantiate singleton - skipping"),
            }
        }

        info!("Instantiated {} singletons", created.len());

        Ok(created)
    }

    /// Starts all active singletons, in instantiation order. Does nothing if already started.
    pub fn startup(&self) {
        if self.started.replace(true) {
            return;
        }

        let active = self.active.borrow().clone();
        info!("Starting {} singletons", active.len());

        for instance in &active {
            Self::start_instance(instance);
        }
    }

    /// Stops all active singletons, in reverse instantiation order. Does nothing if not started.
    pub fn shutdown(&self) {
        if !self.started.replace(false) {
            return;
        }

        let active = self.active.borrow().clone();
        info!("Stopping {} singletons", active.len());

        for instance in active.iter().rev() {
            if let Some(lifecycle) = instance.downcast::<dyn Lifecycle>() {
                if let Err(error) = lifecycle.stop() {
                    error!(type_name = instance.type_name(), %error, "Error stopping singleton");
                }
            }
        }
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.get()
    }

    /// Currently active singletons, in instantiation order.
    pub fn singletons(&self) -> Vec<Instance> {
        self.active.borrow().clone()
    }

    /// Returns the lazy singleton providing given name, creating it on first request. Returns
    /// `Ok(None)` if no lazy definition provides the name.
    pub fn resolve_dependency(
        &self,
        name: &str,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Option<Instance>, ResolutionError> {
        let (index, definition) = {
            let lazy = self.lazy.borrow();
            let mut claiming = lazy
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.definition.provides(name));

            let Some((index, entry)) = claiming.next() else {
                return Ok(None);
            };

            if claiming.next().is_some() {
                return Err(ResolutionError::AmbiguousProviderResult(name.to_string()));
            }

            if let Some(instance) = &entry.instance {
                return Ok(Some(instance.clone()));
            }

            if entry.under_construction {
                let mut cycle = chain.types().to_vec();
                cycle.push(entry.definition.type_name().to_string());
                return Err(ResolutionError::CircularDependency { chain: cycle });
            }

            (index, entry.definition.clone())
        };

        let _span = info_span!("lazy_singleton", type_name = definition.type_name()).entered();

        self.lazy.borrow_mut()[index].under_construction = true;
        let result = definition.instantiate(store, chain);

        let mut lazy = self.lazy.borrow_mut();
        lazy[index].under_construction = false;

        let instance = result?;
        lazy[index].instance = Some(instance.clone());
        drop(lazy);

        self.activate(&definition, &instance, store);

        Ok(Some(instance))
    }

    fn activate(
        &self,
        definition: &SingletonDefinition,
        instance: &Instance,
        store: &DependencyStore,
    ) {
        for name in &definition.names {
            store.bind(name.clone(), instance.clone());
        }

        self.active.borrow_mut().push(instance.clone());

        if self.started.get() {
            Self::start_instance(instance);
        }
    }

    fn start_instance(instance: &Instance) {
        if let Some(lifecycle) = instance.downcast::<dyn Lifecycle>() {
            if let Err(error) = lifecycle.start() {
                error!(type_name = instance.type_name(), %error, "Error starting singleton");
            }
        }
    }

    fn check_unique_names(definitions: &[SingletonDefinition]) -> Result<(), SingletonError> {
        let mut seen = FxHashSet::default();
        for name in definitions.iter().flat_map(|definition| definition.names.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(SingletonError::AmbiguousProviderResult {
                    name: name.clone(),
                    type_names: definitions
                        .iter()
                        .filter(|definition| definition.provides(name))
                        .map(|definition| definition.type_name().to_string())
                        .collect(),
                });
            }
        }

        Ok(())
    }
}

impl DependencyProvider for SingletonManager {
    fn provides(&self, name: &str) -> bool {
        self.lazy
            .borrow()
            .iter()
            .any(|entry| entry.definition.provides(name))
    }

    fn find_type(&self, _name: &str) -> Option<TypeModelPtr> {
        None
    }

    fn resolve(
        &self,
        name: &str,
        store: &DependencyStore,
        chain: &mut ResolutionChain,
    ) -> Result<Option<Instance>, ResolutionError> {
        self.resolve_dependency(name, store, chain)
    }
}
