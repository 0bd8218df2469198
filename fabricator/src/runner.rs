//! Runners executing actual application logic.

pub use fabricator_di::instance::ErrorPtr;
#[cfg(test)]
use mockall::automock;

pub type ApplicationRunnerPtr = dyn ApplicationRunner;

/// Runs application logic. Runners are singletons which declare
/// `implements::<dyn ApplicationRunner>` in their type model. They are run by the
/// [Application](crate::application::Application) after all singletons have been started.
#[cfg_attr(test, automock)]
pub trait ApplicationRunner {
    /// Runs any application code.
    fn run(&self) -> Result<(), ErrorPtr>;

    /// Returns the priority for this runner. Higher priorities get run first. Default 0.
    fn priority(&self) -> i8 {
        0
    }
}
