use fabricator_di::factory::ObjectFactoryBuilder;
use fabricator_di::instance::{ErrorPtr, InstancePtr};
use fabricator_di::singleton::{Lifecycle, SingletonDefinition};
use fabricator_di::type_model::TypeModel;
use std::cell::RefCell;

// singletons can take part in the start/stop lifecycle
struct Database {
    queries: RefCell<Vec<String>>,
}

impl Database {
    fn query(&self, query: &str) {
        self.queries.borrow_mut().push(query.to_string());
    }
}

impl Lifecycle for Database {
    fn start(&self) -> Result<(), ErrorPtr> {
        println!("Connecting to database");
        Ok(())
    }

    fn stop(&self) -> Result<(), ErrorPtr> {
        println!("Disconnecting after {} queries", self.queries.borrow().len());
        Ok(())
    }
}

struct Reporter {
    pub database: Option<InstancePtr<Database>>,
}

impl Lifecycle for Reporter {
    fn start(&self) -> Result<(), ErrorPtr> {
        // the database is started before the reporter, and stopped after it
        if let Some(database) = &self.database {
            database.query("SELECT 1");
        }

        Ok(())
    }
}

fn main() {
    let database = TypeModel::builder::<Database>()
        .constructor(vec![], |_| {
            Ok(Database {
                queries: Default::default(),
            })
        })
        .implements::<dyn Lifecycle>(|database| database as InstancePtr<dyn Lifecycle>)
        .build();

    let reporter = TypeModel::builder::<Reporter>()
        .constructor(vec![], |_| Ok(Reporter { database: None }))
        .named_property::<Database>("database", "database", |reporter| &mut reporter.database)
        .implements::<dyn Lifecycle>(|reporter| reporter as InstancePtr<dyn Lifecycle>)
        .build();

    // registration order doesn't matter - dependencies are always instantiated first
    let factory = ObjectFactoryBuilder::new()
        .with_singleton(SingletonDefinition::new(reporter.into(), vec![]))
        .with_singleton(SingletonDefinition::new(
            database.into(),
            vec!["database".to_string()],
        ))
        .build();

    let singletons = factory
        .instantiate_singletons()
        .expect("error instantiating singletons");
    assert_eq!(singletons.len(), 2);

    factory.startup();
    factory.shutdown();
}
