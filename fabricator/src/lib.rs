//! Application framework based on [fabricator_di] object construction.
//!
//! Traditional applications start in the `main()` function and often explicitly initialize and pass
//! around various services. With an object factory in place, services can be described once and
//! wired together automatically. This, in turn, requires an entrypoint for the application which
//! discovers types, creates singletons and runs the actual business logic of the application. This
//! crate provides such entrypoint in the form of [Application](application::Application), which
//! also configures additional supporting infrastructure, e.g. logging.

pub mod application;
pub mod config;
pub mod runner;
