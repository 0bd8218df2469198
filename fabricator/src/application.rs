//! Core application framework functionality.

use crate::config::ApplicationConfig;
use crate::runner::{ApplicationRunnerPtr, ErrorPtr};
use config::ConfigError;
use derive_more::Constructor;
use fabricator_di::discovery::{InventoryTypeDiscovery, TypeDiscovery};
use fabricator_di::factory::{ObjectFactory, ObjectFactoryBuilder};
use fabricator_di::instance::{Instance, InstancePtr};
use fabricator_di::{SingletonError, TypeRegistryError};
use itertools::Itertools;
use std::any::type_name;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::info;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error loading configuration: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Error registering discovered types: {0}")]
    RegistrationError(#[from] TypeRegistryError),
    #[error("Error instantiating singletons: {0}")]
    SingletonError(#[from] SingletonError),
    #[error("Runner error: {0}")]
    RunnerError(ErrorPtr),
}

/// Main entrypoint for the application. Bootstraps an [ObjectFactory] from discovered types,
/// starts singletons, runs [ApplicationRunners](crate::runner::ApplicationRunner) and finally
/// stops singletons.
#[derive(Constructor)]
pub struct Application<D: TypeDiscovery> {
    discovery: D,
    config: ApplicationConfig,
}

impl<D: TypeDiscovery> Application<D> {
    #[inline]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Creates a factory with all discovered types and instantiates eager singletons. The
    /// application config is bound under the name of its type.
    pub fn bootstrap(&self) -> Result<ObjectFactory, ApplicationError> {
        info!("Bootstrapping application...");

        let factory = ObjectFactoryBuilder::new()
            .with_scheduler(self.config.scheduler())
            .with_binding(
                type_name::<ApplicationConfig>(),
                Instance::object(InstancePtr::new(self.config.clone())),
            )
            .with_discovery(&self.discovery)?
            .build();

        factory.instantiate_singletons()?;

        Ok(factory)
    }

    /// Bootstraps the application and runs all runners, highest priority first. Singletons are
    /// stopped even if a runner fails.
    pub fn run(&self) -> Result<(), ApplicationError> {
        let _logger = self.config.install_tracing_logger.then(install_tracing_logger);

        let factory = self.bootstrap()?;
        factory.startup();

        let result = Self::run_runners(&factory);

        factory.shutdown();
        result
    }

    fn run_runners(factory: &ObjectFactory) -> Result<(), ApplicationError> {
        info!("Searching for application runners...");

        let runners = factory
            .singletons()
            .iter()
            .filter_map(|instance| instance.downcast::<ApplicationRunnerPtr>())
            .sorted_by_key(|runner| Reverse(runner.priority()))
            .collect_vec();

        info!("Running {} application runners...", runners.len());

        for runner in &runners {
            runner.run().map_err(ApplicationError::RunnerError)?;
        }

        Ok(())
    }
}

/// Installs a default tracing subscriber for the current thread, until the returned guard is
/// dropped. The filter can be configured with `RUST_LOG`.
fn install_tracing_logger() -> DefaultGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Creates an application with types registered with
/// [submit_type](fabricator_di::submit_type) and config loaded from the environment.
pub fn create_default() -> Result<Application<InventoryTypeDiscovery>, ApplicationError> {
    let config = ApplicationConfig::init_from_environment()?;
    Ok(Application::new(InventoryTypeDiscovery::new(), config))
}
