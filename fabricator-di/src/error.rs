use crate::instance::ErrorPtr;
use std::rc::Rc;
use thiserror::Error;

fn describe_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        "a top-level request".to_string()
    } else {
        chain.join(" -> ")
    }
}

/// Error related to type registries.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TypeRegistryError {
    #[error("Attempted to register {new_type} under name '{name}', which is already bound to {existing_type}")]
    DuplicateRegistration {
        name: String,
        existing_type: String,
        new_type: String,
    },
}

/// Errors related to creating instances and resolving their dependencies.
#[derive(Error, Clone, Debug)]
pub enum ResolutionError {
    #[error("No constructor of {type_name} can be used with the supplied arguments.\n{report}")]
    NoMatchingConstructor { type_name: String, report: String },
    #[error("Multiple constructors of {type_name} can be used with the supplied arguments.\n{report}")]
    AmbiguousConstructor { type_name: String, report: String },
    #[error("Cannot resolve dependency '{name}' requested by {}", describe_chain(.chain))]
    UnresolvedDependency { name: String, chain: Vec<String> },
    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },
    #[error("Property '{property}' of {type_name} is marked for injection, but is not public")]
    InvalidInjectionTarget { type_name: String, property: String },
    #[error("Multiple providers claim to satisfy dependency '{0}'")]
    AmbiguousProviderResult(String),
    #[error("Argument {index} is missing or not compatible with {expected}")]
    IncompatibleArgument { index: usize, expected: String },
    #[error("Instance of {actual} cannot be used as {expected}")]
    IncompatibleInstance { actual: String, expected: String },
    #[error("Constructor error: {0}")]
    ConstructorError(ErrorPtr),
    #[error("The factory backing this handle has been dropped")]
    FactoryDropped,
}

impl ResolutionError {
    /// Wraps an arbitrary error returned by user construction code.
    pub fn constructor_error<E: std::error::Error + 'static>(error: E) -> Self {
        Self::ConstructorError(Rc::new(error) as ErrorPtr)
    }
}

/// Errors related to ordering singleton definitions.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum SingletonError {
    #[error("Singleton name '{name}' is provided by multiple definitions: {}", .type_names.join(", "))]
    AmbiguousProviderResult {
        name: String,
        type_names: Vec<String>,
    },
    #[error("Cannot schedule singleton {type_name} - its dependencies are unsatisfiable or circular")]
    UnsatisfiableOrCircularSingletonDependency { type_name: String },
}
