//! Ordering of eager singleton definitions, so that every singleton is created after all the
//! singletons it depends on.
//!
//! Dependencies of a definition are the names required by its constructors and injectable
//! properties, expanded recursively through registered non-singleton types and lazy singletons,
//! since both get built as part of their dependent. Only names produced by other eager definitions
//! take part in ordering; everything else is expected to be resolvable at construction time.
//!
//! Definitions are processed from a FIFO worklist: a definition whose dependencies are satisfied
//! is scheduled, otherwise it's moved to the back. Scheduling fails as soon as a full pass over
//! the worklist makes no progress, or when a definition is re-queued more times than the optional
//! requeue limit allows.

use crate::error::SingletonError;
use crate::instance::TypeKind;
use crate::singleton::SingletonDefinition;
use crate::type_model::TypeModel;
use crate::type_registry::TypeRegistry;
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Requeue limit reproducing the classic bounded retry heuristic.
pub const DEFAULT_REQUEUE_LIMIT: usize = 5;

/// Computes instantiation order for singleton definitions.
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq)]
pub struct SingletonScheduler {
    requeue_limit: Option<usize>,
}

impl SingletonScheduler {
    /// Creates a scheduler which only fails when no ordering exists.
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a scheduler which additionally fails when any definition gets re-queued more than
    /// `limit` times.
    pub fn with_requeue_limit(limit: usize) -> Self {
        Self {
            requeue_limit: Some(limit),
        }
    }

    #[inline]
    pub fn requeue_limit(&self) -> Option<usize> {
        self.requeue_limit
    }

    /// Returns indices of eager definitions in instantiation order. Lazy definitions are never
    /// scheduled, but their dependencies count as dependencies of whoever needs them.
    pub fn schedule(
        &self,
        definitions: &[SingletonDefinition],
        registry: &TypeRegistry,
    ) -> Result<Vec<usize>, SingletonError> {
        let producers = Self::producers(definitions)?;
        let walk = DependencyWalk::new(definitions, registry);

        let requirements: FxHashMap<usize, Vec<String>> = producers
            .values()
            .copied()
            .map(|index| {
                let required = walk
                    .names(&definitions[index].type_model)
                    .into_iter()
                    .filter(|name| {
                        producers
                            .get(name.as_str())
                            .map(|producer| *producer != index)
                            .unwrap_or(false)
                    })
                    .collect();
                (index, required)
            })
            .collect();

        let mut queue: VecDeque<usize> = definitions
            .iter()
            .enumerate()
            .filter(|(_, definition)| !definition.is_lazy)
            .map(|(index, _)| index)
            .collect();

        let mut requeues = vec![0usize; definitions.len()];
        let mut satisfied: FxHashSet<&str> = FxHashSet::default();
        let mut order = Vec::with_capacity(queue.len());
        let mut stalled = 0usize;

        while let Some(index) = queue.pop_front() {
            let definition = &definitions[index];
            let ready = requirements
                .get(&index)
                .map(|required| required.iter().all(|name| satisfied.contains(name.as_str())))
                .unwrap_or(true);

            if ready {
                trace!(type_name = definition.type_name(), "Scheduled singleton");

                satisfied.extend(definition.names.iter().map(String::as_str));
                order.push(index);
                stalled = 0;
                continue;
            }

            requeues[index] += 1;
            stalled += 1;

            let limit_exceeded = self
                .requeue_limit
                .map(|limit| requeues[index] > limit)
                .unwrap_or(false);

            // every remaining definition was tried since the last progress
            if limit_exceeded || stalled > queue.len() {
                return Err(
                    SingletonError::UnsatisfiableOrCircularSingletonDependency {
                        type_name: definition.type_name().to_string(),
                    },
                );
            }

            queue.push_back(index);
        }

        debug!("Scheduled {} eager singletons", order.len());

        Ok(order)
    }

    fn producers(
        definitions: &[SingletonDefinition],
    ) -> Result<FxHashMap<&str, usize>, SingletonError> {
        let mut producers = FxHashMap::default();
        for (index, definition) in definitions
            .iter()
            .enumerate()
            .filter(|(_, definition)| !definition.is_lazy)
        {
            for name in &definition.names {
                if let Some(previous) = producers.insert(name.as_str(), index) {
                    return Err(SingletonError::AmbiguousProviderResult {
                        name: name.clone(),
                        type_names: vec![
                            definitions[previous].type_name().to_string(),
                            definition.type_name().to_string(),
                        ],
                    });
                }
            }
        }

        Ok(producers)
    }
}

/// Walks dependency names of types, expanding everything built on demand.
pub(crate) struct DependencyWalk<'a> {
    registry: &'a TypeRegistry,
    eager_types: FxHashSet<&'a str>,
    lazy_models: FxHashMap<&'a str, &'a TypeModel>,
}

impl<'a> DependencyWalk<'a> {
    pub(crate) fn new(definitions: &'a [SingletonDefinition], registry: &'a TypeRegistry) -> Self {
        let (lazy, eager): (Vec<_>, Vec<_>) = definitions
            .iter()
            .partition(|definition| definition.is_lazy);

        Self {
            registry,
            eager_types: eager
                .into_iter()
                .map(SingletonDefinition::type_name)
                .collect(),
            lazy_models: lazy
                .into_iter()
                .flat_map(|definition| {
                    definition
                        .names
                        .iter()
                        .map(move |name| (name.as_str(), &*definition.type_model))
                })
                .collect(),
        }
    }

    /// Collects names a type needs from its constructors and injectable properties, transitively.
    pub(crate) fn names(&self, model: &TypeModel) -> Vec<String> {
        let mut names = Vec::new();
        let mut visited = FxHashSet::default();
        visited.insert(model.name().to_string());

        self.collect(model, &mut visited, &mut names);
        names
    }

    fn collect(&self, model: &TypeModel, visited: &mut FxHashSet<String>, names: &mut Vec<String>) {
        let declared: Vec<&str> = model
            .constructors()
            .iter()
            .flat_map(|constructor| constructor.parameters.iter())
            .filter(|parameter| parameter.kind == TypeKind::Interface)
            .map(|parameter| parameter.name.as_str())
            .chain(model.properties().iter().map(|property| property.dependency_name()))
            .collect();

        for name in declared {
            if names.iter().any(|existing| existing == name) {
                continue;
            }

            names.push(name.to_string());

            if let Some(lazy) = self.lazy_models.get(name) {
                if visited.insert(lazy.name().to_string()) {
                    self.collect(lazy, visited, names);
                }
            } else if let Some(dependency) = self.registry.lookup(name) {
                if !self.eager_types.contains(dependency.name())
                    && visited.insert(dependency.name().to_string())
                {
                    self.collect(&dependency, visited, names);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SingletonError;
    use crate::instance::InstancePtr;
    use crate::singleton::scheduler::{DependencyWalk, SingletonScheduler};
    use crate::singleton::SingletonDefinition;
    use crate::type_model::{ParameterType, TypeModel, TypeModelPtr};
    use crate::type_registry::TypeRegistry;
    use std::any::type_name;

    trait Dependency {}

    struct Producer;

    struct Consumer {
        dependency: Option<InstancePtr<dyn Dependency>>,
    }

    struct Intermediate;

    struct Other {
        other: Option<InstancePtr<dyn Dependency>>,
    }

    fn producer(name: &str) -> SingletonDefinition {
        SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Producer>()
                    .with_name(format!("Producer({name})"))
                    .constructor(vec![], |_| Ok(Producer))
                    .build(),
            ),
            vec![name.to_string()],
        )
    }

    fn consumer(type_name: &str, dependency: &str, provides: &str) -> SingletonDefinition {
        let model = TypeModel::builder::<Consumer>()
            .with_name(type_name)
            .constructor(vec![], |_| Ok(Consumer { dependency: None }))
            .named_property::<dyn Dependency>("dependency", dependency, |consumer| {
                &mut consumer.dependency
            })
            .build();

        SingletonDefinition::new(TypeModelPtr::new(model), vec![provides.to_string()])
    }

    fn scheduled_types(definitions: &[SingletonDefinition], order: Vec<usize>) -> Vec<String> {
        order
            .into_iter()
            .map(|index| definitions[index].type_name().to_string())
            .collect()
    }

    #[test]
    fn should_order_dependencies_first() {
        let definitions = vec![consumer("Consumer", "X", "Y"), producer("X")];

        let order = SingletonScheduler::new()
            .schedule(&definitions, &TypeRegistry::new())
            .unwrap();
        assert_eq!(
            scheduled_types(&definitions, order),
            vec!["Producer(X)".to_string(), "Consumer".to_string()]
        );
    }

    #[test]
    fn should_keep_registration_order_for_independent_definitions() {
        let definitions = vec![producer("A"), producer("B"), producer("C")];

        let order = SingletonScheduler::new()
            .schedule(&definitions, &TypeRegistry::new())
            .unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn should_order_chains() {
        let definitions = vec![
            consumer("C3", "Y", "Z2"),
            consumer("C2", "X", "Y"),
            producer("X"),
        ];

        let order = SingletonScheduler::with_requeue_limit(5)
            .schedule(&definitions, &TypeRegistry::new())
            .unwrap();
        assert_eq!(
            scheduled_types(&definitions, order),
            vec!["Producer(X)".to_string(), "C2".to_string(), "C3".to_string()]
        );
    }

    #[test]
    fn should_detect_cycles() {
        let definitions = vec![consumer("C1", "X", "Y"), consumer("C2", "Y", "X")];

        assert!(matches!(
            SingletonScheduler::new()
                .schedule(&definitions, &TypeRegistry::new())
                .unwrap_err(),
            SingletonError::UnsatisfiableOrCircularSingletonDependency { .. }
        ));
        assert!(matches!(
            SingletonScheduler::with_requeue_limit(5)
                .schedule(&definitions, &TypeRegistry::new())
                .unwrap_err(),
            SingletonError::UnsatisfiableOrCircularSingletonDependency { .. }
        ));
    }

    #[test]
    fn should_fail_when_requeue_limit_is_exceeded() {
        let definitions = vec![consumer("Consumer", "X", "Y"), producer("X")];

        assert!(matches!(
            SingletonScheduler::with_requeue_limit(0)
                .schedule(&definitions, &TypeRegistry::new())
                .unwrap_err(),
            SingletonError::UnsatisfiableOrCircularSingletonDependency { type_name } if type_name == "Consumer"
        ));
    }

    #[test]
    fn should_reject_duplicate_eager_names() {
        let definitions = vec![producer("X"), producer("X")];

        assert!(matches!(
            SingletonScheduler::new()
                .schedule(&definitions, &TypeRegistry::new())
                .unwrap_err(),
            SingletonError::AmbiguousProviderResult { name, .. } if name == "X"
        ));
    }

    #[test]
    fn should_skip_lazy_definitions() {
        let definitions = vec![producer("X").lazy(), consumer("Consumer", "X", "Y")];

        let order = SingletonScheduler::new()
            .schedule(&definitions, &TypeRegistry::new())
            .unwrap();
        assert_eq!(order, vec![1]);
    }

    #[test]
    fn should_order_dependencies_of_lazy_singletons_first() {
        let definitions = vec![
            consumer("S", "L", "S"),
            consumer("L", "X", "L").lazy(),
            producer("X"),
        ];

        let order = SingletonScheduler::new()
            .schedule(&definitions, &TypeRegistry::new())
            .unwrap();
        assert_eq!(
            scheduled_types(&definitions, order),
            vec!["Producer(X)".to_string(), "S".to_string()]
        );
    }

    #[test]
    fn should_expand_registered_types() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                "I",
                TypeModelPtr::new(
                    TypeModel::builder::<Intermediate>()
                        .constructor(
                            vec![ParameterType::new("X", crate::instance::TypeKind::Interface)],
                            |_| Ok(Intermediate),
                        )
                        .build(),
                ),
            )
            .unwrap();

        let model = TypeModel::builder::<Other>()
            .constructor(vec![], |_| Ok(Other { other: None }))
            .named_property::<dyn Dependency>("other", "I", |other| &mut other.other)
            .build();

        let names = DependencyWalk::new(&[], &registry).names(&model);
        assert_eq!(names, vec!["I".to_string(), "X".to_string()]);

        let definitions = vec![
            SingletonDefinition::new(TypeModelPtr::new(model), vec![]),
            producer("X"),
        ];
        let order = SingletonScheduler::new()
            .schedule(&definitions, &registry)
            .unwrap();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(definitions[0].names, vec![type_name::<Other>().to_string()]);
    }
}
