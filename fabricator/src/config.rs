//! Framework configuration. [ApplicationConfig] is created with opinionated default values, which
//! can then be overwritten by environment variables prefixed with `FABRICATOR_` or the
//! `fabricator.json` file. [Application](crate::application::Application) uses this config to
//! configure itself, and also binds it in the object factory, so it can be injected into any
//! constructed object under the name of its type.

use config::{Config, ConfigError, Environment, File, Source};
use fabricator_di::singleton::scheduler::SingletonScheduler;
use serde::Deserialize;

const CONFIG_ENV_PREFIX: &str = "FABRICATOR";

/// Name of the default config file.
pub const CONFIG_FILE: &str = "fabricator.json";

/// Framework configuration.
#[non_exhaustive]
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ApplicationConfig {
    /// Should a default tracing logger be installed in the scope of the application.
    pub install_tracing_logger: bool,
    /// Maximum number of times a singleton definition can be re-queued while ordering
    /// singletons. When not set, ordering fails only when no progress can be made.
    pub singleton_requeue_limit: Option<usize>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            install_tracing_logger: true,
            singleton_requeue_limit: None,
        }
    }
}

impl From<OptionalApplicationConfig> for ApplicationConfig {
    fn from(value: OptionalApplicationConfig) -> Self {
        let default = Self::default();
        Self {
            install_tracing_logger: value
                .install_tracing_logger
                .unwrap_or(default.install_tracing_logger),
            singleton_requeue_limit: value
                .singleton_requeue_limit
                .or(default.singleton_requeue_limit),
        }
    }
}

impl ApplicationConfig {
    /// Loads the config from [CONFIG_FILE], if present, and the environment.
    pub fn init_from_environment() -> Result<Self, ConfigError> {
        Self::load(
            File::with_name(CONFIG_FILE).required(false),
            Environment::with_prefix(CONFIG_ENV_PREFIX),
        )
    }

    /// Loads the config from a file source overridden by environment variables.
    fn load<S>(file: S, environment: Environment) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize::<OptionalApplicationConfig>())
            .map(|config| config.into())
    }

    pub fn with_install_tracing_logger(mut self, install_tracing_logger: bool) -> Self {
        self.install_tracing_logger = install_tracing_logger;
        self
    }

    pub fn with_singleton_requeue_limit(mut self, singleton_requeue_limit: Option<usize>) -> Self {
        self.singleton_requeue_limit = singleton_requeue_limit;
        self
    }

    /// Creates a singleton scheduler honoring the configured requeue limit.
    pub fn scheduler(&self) -> SingletonScheduler {
        self.singleton_requeue_limit
            .map(SingletonScheduler::with_requeue_limit)
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Default)]
struct OptionalApplicationConfig {
    install_tracing_logger: Option<bool>,
    singleton_requeue_limit: Option<usize>,
}
