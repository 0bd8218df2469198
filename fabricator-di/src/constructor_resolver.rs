//! Selection of a single constructor among the ones declared by a type.
//!
//! A constructor is viable when:
//!
//! 1. it takes at least as many parameters as there are supplied arguments,
//! 2. every supplied argument is assignable to the corresponding leading parameter (null arguments
//! are only accepted by reference parameters),
//! 3. every remaining parameter is an interface which can be satisfied by the
//! [DependencyStore](crate::dependency_store::DependencyStore).
//!
//! Exactly one constructor must be viable - there's no guessing between equally plausible ones.
//! When nothing is viable and the only constructor accepting supplied arguments lacks just some
//! interface dependencies, the first missing one is reported as unresolved.

use crate::dependency_store::DependencyStore;
use crate::error::ResolutionError;
use crate::instance::{Instance, TypeKind};
use crate::instance_builder::ResolutionChain;
use crate::type_model::{ConstructorCandidate, ParameterType, TypeModel};
use itertools::Itertools;
use tracing::trace;

/// Picks constructors using dependencies available in a given store.
#[derive(Clone, Copy)]
pub struct ConstructorResolver<'a> {
    store: &'a DependencyStore,
}

impl<'a> ConstructorResolver<'a> {
    pub fn new(store: &'a DependencyStore) -> Self {
        Self { store }
    }

    /// Returns the only viable constructor for given supplied arguments. `chain` holds the types
    /// under construction, for error reporting.
    pub fn resolve<'m>(
        &self,
        model: &'m TypeModel,
        supplied: &[Option<Instance>],
        chain: &ResolutionChain,
    ) -> Result<&'m ConstructorCandidate, ResolutionError> {
        let accepting = model
            .constructors()
            .iter()
            .filter(|candidate| Self::accepts_supplied(candidate, supplied))
            .collect_vec();

        let viable = accepting
            .iter()
            .copied()
            .filter(|candidate| self.can_inject_remaining(candidate, supplied.len()))
            .collect_vec();

        match viable.as_slice() {
            [constructor] => {
                trace!(
                    type_name = model.name(),
                    signature = %constructor.signature(),
                    "Selected constructor"
                );
                Ok(constructor)
            }
            [] => Err(match self.missing_dependency(&accepting, supplied.len()) {
                Some(name) => ResolutionError::UnresolvedDependency {
                    name: name.to_string(),
                    chain: chain.types().to_vec(),
                },
                None => ResolutionError::NoMatchingConstructor {
                    type_name: model.name().to_string(),
                    report: self.report(model, supplied),
                },
            }),
            _ => Err(ResolutionError::AmbiguousConstructor {
                type_name: model.name().to_string(),
                report: self.report(model, supplied),
            }),
        }
    }

    /// Checks if a parameter can be filled in without being supplied explicitly.
    pub fn is_injectable(&self, parameter: &ParameterType) -> bool {
        parameter.kind == TypeKind::Interface && self.store.can_satisfy(&parameter.name)
    }

    fn accepts_supplied(candidate: &ConstructorCandidate, supplied: &[Option<Instance>]) -> bool {
        candidate.parameters.len() >= supplied.len()
            && supplied
                .iter()
                .zip(&candidate.parameters)
                .all(|(argument, parameter)| match argument {
                    Some(argument) => argument.runtime_type().is_assignable_to(&parameter.name),
                    None => parameter.is_reference(),
                })
    }

    fn can_inject_remaining(&self, candidate: &ConstructorCandidate, supplied: usize) -> bool {
        candidate
            .parameters
            .iter()
            .skip(supplied)
            .all(|parameter| self.is_injectable(parameter))
    }

    /// Returns the first unavailable parameter of the only accepting constructor, if all its
    /// remaining parameters are interfaces.
    fn missing_dependency<'m>(
        &self,
        accepting: &[&'m ConstructorCandidate],
        supplied: usize,
    ) -> Option<&'m str> {
        let &[candidate] = accepting else {
            return None;
        };

        let mut remaining = candidate.parameters.iter().skip(supplied);
        if !remaining
            .clone()
            .all(|parameter| parameter.kind == TypeKind::Interface)
        {
            return None;
        }

        remaining
            .find(|parameter| !self.store.can_satisfy(&parameter.name))
            .map(|parameter| parameter.name.as_str())
    }

    fn report(&self, model: &TypeModel, supplied: &[Option<Instance>]) -> String {
        let supplied_types = supplied
            .iter()
            .map(|argument| argument.as_ref().map(Instance::type_name).unwrap_or("null"))
            .join(", ");

        let candidates = model
            .constructors()
            .iter()
            .map(|candidate| {
                let remaining = candidate
                    .parameters
                    .iter()
                    .skip(supplied.len())
                    .map(|parameter| {
                        format!(
                            "{parameter}: {}",
                            if self.is_injectable(parameter) {
                                "injectable"
                            } else {
                                "not injectable"
                            }
                        )
                    })
                    .join(", ");

                if Self::accepts_supplied(candidate, supplied) {
                    format!("  {} - remaining: [{remaining}]", candidate.signature())
                } else {
                    format!("  {} - supplied arguments do not match", candidate.signature())
                }
            })
            .join("\n");

        format!("Supplied: ({supplied_types})\nConstructors:\n{candidates}")
    }
}
