use fabricator_di::factory::ObjectFactoryBuilder;
use fabricator_di::instance::InstancePtr;
use fabricator_di::type_model::{ParameterType, TypeModel};

// this is a trait we would like to use in our service
trait Greeter {
    fn greet(&self);
}

// this is a dependency which implements the above trait
struct HelloGreeter;

impl Greeter for HelloGreeter {
    fn greet(&self) {
        println!("Hello world!");
    }
}

// this is another type, but with dependencies
struct Service {
    // injected through the constructor
    greeter: InstancePtr<dyn Greeter>,
    // injected after construction, since it's a public property marked for injection
    pub backup: Option<InstancePtr<dyn Greeter>>,
}

impl Service {
    fn call_greet(&self) {
        self.greeter.greet();
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // objects are created by an ObjectFactory
    // for convenience, ObjectFactoryBuilder can be used to create the factory with a reasonable
    // default configuration
    let factory = ObjectFactoryBuilder::new()
        // we're telling the factory to create HelloGreeter when asked for dyn Greeter
        .with_interface::<dyn Greeter>(
            TypeModel::builder::<HelloGreeter>()
                .constructor(vec![], |_| Ok(HelloGreeter))
                .implements::<dyn Greeter>(|greeter| greeter as InstancePtr<dyn Greeter>)
                .build(),
        )
        .expect("error registering HelloGreeter")
        .build();

    let service_model = TypeModel::builder::<Service>()
        .constructor(
            vec![ParameterType::interface::<dyn Greeter>()],
            |arguments| {
                Ok(Service {
                    greeter: arguments.get::<dyn Greeter>(0)?,
                    backup: None,
                })
            },
        )
        .property::<dyn Greeter>("backup", |service| &mut service.backup)
        .build();

    let service = factory
        .create(&service_model, vec![])
        .expect("error creating Service")
        .downcast::<Service>()
        .expect("Service has unexpected type");

    // prints "Hello world!"
    service.call_greet();

    // dependencies are created anew for each injection, unless they are bound or singletons
    assert!(service.backup.is_some());
}
