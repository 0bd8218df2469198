mod singletons_test {
    use fabricator_di::dependency_store::DependencyStore;
    use fabricator_di::factory::{Factory, ObjectFactory, ObjectFactoryBuilder};
    use fabricator_di::instance::{ErrorPtr, Instance, InstancePtr};
    use fabricator_di::singleton::scheduler::SingletonScheduler;
    use fabricator_di::singleton::{
        FnStrategy, InstantiationStrategyPtr, Lifecycle, SingletonDefinition,
    };
    use fabricator_di::type_model::{TypeModel, TypeModelPtr};
    use fabricator_di::{ResolutionError, SingletonError};
    use std::any::type_name;
    use std::cell::Cell;
    use std::fmt::{Display, Formatter};
    use std::rc::Rc;

    trait Dependency {
        fn shutdown_performed(&self) -> bool;
    }

    #[derive(Default)]
    struct Provider {
        started: Cell<bool>,
        shutdown_performed: Cell<bool>,
    }

    impl Dependency for Provider {
        fn shutdown_performed(&self) -> bool {
            self.shutdown_performed.get()
        }
    }

    impl Lifecycle for Provider {
        fn start(&self) -> Result<(), ErrorPtr> {
            self.started.set(true);
            Ok(())
        }

        fn stop(&self) -> Result<(), ErrorPtr> {
            self.shutdown_performed.set(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Consumer {
        dependency: Option<InstancePtr<dyn Dependency>>,
        dependency_stopped_first: Cell<Option<bool>>,
    }

    impl Lifecycle for Consumer {
        fn stop(&self) -> Result<(), ErrorPtr> {
            self.dependency_stopped_first.set(
                self.dependency
                    .as_ref()
                    .map(|dependency| dependency.shutdown_performed()),
            );
            Ok(())
        }
    }

    #[derive(Default)]
    struct Relay {
        dependency: Option<InstancePtr<dyn Dependency>>,
    }

    impl Dependency for Relay {
        fn shutdown_performed(&self) -> bool {
            false
        }
    }

    #[derive(Debug)]
    struct TestError;

    impl Display for TestError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("construction failed")
        }
    }

    impl std::error::Error for TestError {}

    struct Failing;

    impl Lifecycle for Failing {
        fn start(&self) -> Result<(), ErrorPtr> {
            Err(Rc::new(TestError))
        }
    }

    fn provider_definition() -> SingletonDefinition {
        SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Provider>()
                    .constructor(vec![], |_| Ok(Provider::default()))
                    .implements::<dyn Dependency>(|provider| provider as InstancePtr<dyn Dependency>)
                    .implements::<dyn Lifecycle>(|provider| provider as InstancePtr<dyn Lifecycle>)
                    .build(),
            ),
            vec!["X".to_string()],
        )
    }

    fn consumer_definition() -> SingletonDefinition {
        SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Consumer>()
                    .constructor(vec![], |_| Ok(Consumer::default()))
                    .named_property::<dyn Dependency>("dependency", "X", |consumer| {
                        &mut consumer.dependency
                    })
                    .implements::<dyn Lifecycle>(|consumer| consumer as InstancePtr<dyn Lifecycle>)
                    .build(),
            ),
            vec!["Y".to_string()],
        )
    }

    fn create_factory(definitions: Vec<SingletonDefinition>) -> ObjectFactory {
        definitions
            .into_iter()
            .fold(ObjectFactoryBuilder::new(), |builder, definition| {
                builder.with_singleton(definition)
            })
            .build()
    }

    fn type_names(instances: &[Instance]) -> Vec<String> {
        instances
            .iter()
            .map(|instance| instance.type_name().to_string())
            .collect()
    }

    #[test]
    fn should_instantiate_dependencies_first() {
        let expected = vec![
            type_name::<Provider>().to_string(),
            type_name::<Consumer>().to_string(),
        ];

        for definitions in [
            vec![provider_definition(), consumer_definition()],
            vec![consumer_definition(), provider_definition()],
        ] {
            let factory = create_factory(definitions);

            let created = factory.instantiate_singletons().unwrap();
            assert_eq!(type_names(&created), expected);
            assert_eq!(type_names(&factory.singletons()), expected);

            let consumer = factory.resolve_named::<Consumer>("Y").unwrap();
            let provider = factory.resolve_named::<dyn Dependency>("X").unwrap();
            assert!(Rc::ptr_eq(consumer.dependency.as_ref().unwrap(), &provider));
        }
    }

    #[test]
    fn should_instantiate_with_requeue_limit() {
        let factory = ObjectFactoryBuilder::new()
            .with_scheduler(SingletonScheduler::with_requeue_limit(5))
            .with_singleton(consumer_definition())
            .with_singleton(provider_definition())
            .build();

        assert_eq!(factory.instantiate_singletons().unwrap().len(), 2);
    }

    #[test]
    fn should_shut_down_in_reverse_order() {
        let factory = create_factory(vec![consumer_definition(), provider_definition()]);
        factory.instantiate_singletons().unwrap();
        factory.startup();

        let provider = factory.resolve_named::<Provider>("X").unwrap();
        let consumer = factory.resolve_named::<Consumer>("Y").unwrap();
        assert!(provider.started.get());

        factory.shutdown();

        assert!(provider.shutdown_performed.get());
        assert_eq!(consumer.dependency_stopped_first.get(), Some(false));
    }

    #[test]
    fn should_construct_lazy_singleton_once() {
        let constructed = Rc::new(Cell::new(0usize));
        let counter = constructed.clone();

        let factory = ObjectFactoryBuilder::new()
            .with_singleton(
                SingletonDefinition::new(
                    TypeModelPtr::new(
                        TypeModel::builder::<Provider>()
                            .constructor(vec![], move |_| {
                                counter.set(counter.get() + 1);
                                Ok(Provider::default())
                            })
                            .build(),
                    ),
                    vec!["lazy".to_string(), "alias".to_string()],
                )
                .lazy(),
            )
            .build();

        assert!(factory.instantiate_singletons().unwrap().is_empty());
        assert_eq!(constructed.get(), 0);
        assert!(factory.is_bound("lazy"));

        let first = factory.resolve_dependency("lazy").unwrap().unwrap();
        let second = factory.resolve_dependency("lazy").unwrap().unwrap();
        let alias = factory.resolve_dependency("alias").unwrap().unwrap();

        assert_eq!(constructed.get(), 1);
        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&alias));
        assert_eq!(factory.singletons().len(), 1);
    }

    #[test]
    fn should_inject_lazy_singletons_into_eager_ones() {
        let factory = create_factory(vec![consumer_definition(), provider_definition().lazy()]);

        let created = factory.instantiate_singletons().unwrap();
        assert_eq!(type_names(&created), vec![type_name::<Consumer>().to_string()]);

        // the lazy dependency got created while building the consumer
        assert_eq!(
            type_names(&factory.singletons()),
            vec![
                type_name::<Provider>().to_string(),
                type_name::<Consumer>().to_string(),
            ]
        );
    }

    #[test]
    fn should_instantiate_dependencies_of_lazy_singletons_first() {
        let consumer = SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Consumer>()
                    .constructor(vec![], |_| Ok(Consumer::default()))
                    .named_property::<dyn Dependency>("dependency", "L", |consumer| {
                        &mut consumer.dependency
                    })
                    .build(),
            ),
            vec!["S".to_string()],
        );
        let relay = SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Relay>()
                    .constructor(vec![], |_| Ok(Relay::default()))
                    .named_property::<dyn Dependency>("dependency", "X", |relay| {
                        &mut relay.dependency
                    })
                    .implements::<dyn Dependency>(|relay| relay as InstancePtr<dyn Dependency>)
                    .build(),
            ),
            vec!["L".to_string()],
        )
        .lazy();

        let factory = create_factory(vec![consumer, relay, provider_definition()]);

        let created = factory.instantiate_singletons().unwrap();
        assert_eq!(
            type_names(&created),
            vec![
                type_name::<Provider>().to_string(),
                type_name::<Consumer>().to_string(),
            ]
        );

        let relay = factory.resolve_named::<Relay>("L").unwrap();
        let provider = factory.resolve_named::<dyn Dependency>("X").unwrap();
        assert!(Rc::ptr_eq(relay.dependency.as_ref().unwrap(), &provider));
        assert!(factory
            .resolve_named::<Consumer>("S")
            .unwrap()
            .dependency
            .is_some());
    }

    #[test]
    fn should_omit_failing_singletons() {
        let failing = SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Failing>()
                    .constructor(vec![], |_| Ok(Failing))
                    .build(),
            ),
            vec!["failing".to_string()],
        )
        .with_strategy(Rc::new(FnStrategy::new(|_: &DependencyStore| {
            Err(ResolutionError::constructor_error(TestError))
        })) as InstantiationStrategyPtr);

        let factory = create_factory(vec![failing, provider_definition()]);

        let created = factory.instantiate_singletons().unwrap();
        assert_eq!(type_names(&created), vec![type_name::<Provider>().to_string()]);
        assert_eq!(factory.singletons().len(), 1);
        assert!(factory.get("failing").unwrap().is_none());
    }

    #[test]
    fn should_continue_after_failing_start() {
        let failing = SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Failing>()
                    .constructor(vec![], |_| Ok(Failing))
                    .implements::<dyn Lifecycle>(|failing| failing as InstancePtr<dyn Lifecycle>)
                    .build(),
            ),
            vec![],
        );

        let factory = create_factory(vec![failing, provider_definition()]);
        factory.instantiate_singletons().unwrap();
        factory.startup();

        assert!(factory.resolve_named::<Provider>("X").unwrap().started.get());
    }

    #[test]
    fn should_reject_circular_singletons() {
        let cyclic = SingletonDefinition::new(
            TypeModelPtr::new(
                TypeModel::builder::<Consumer>()
                    .constructor(vec![], |_| Ok(Consumer::default()))
                    .named_property::<dyn Dependency>("dependency", "Y", |consumer| {
                        &mut consumer.dependency
                    })
                    .build(),
            ),
            vec!["X".to_string()],
        );

        let factory = create_factory(vec![cyclic, consumer_definition()]);
        assert!(matches!(
            factory.instantiate_singletons().unwrap_err(),
            SingletonError::UnsatisfiableOrCircularSingletonDependency { .. }
        ));
        assert!(factory.singletons().is_empty());
    }
}
