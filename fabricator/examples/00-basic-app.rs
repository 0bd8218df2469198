use fabricator::application;
use fabricator::runner::{ApplicationRunner, ApplicationRunnerPtr, ErrorPtr};
use fabricator_di::discovery::Marker;
use fabricator_di::instance::InstancePtr;
use fabricator_di::submit_type;
use fabricator_di::type_model::TypeModel;

// this is an application runner, which will run when the application starts; the framework will
// automatically discover it, since it's submitted as a singleton
struct HelloWorldRunner;

impl ApplicationRunner for HelloWorldRunner {
    fn run(&self) -> Result<(), ErrorPtr> {
        println!("Hello world!");
        Ok(())
    }
}

fn register_runner() -> (TypeModel, Vec<Marker>) {
    (
        TypeModel::builder::<HelloWorldRunner>()
            .constructor(vec![], |_| Ok(HelloWorldRunner))
            .implements::<ApplicationRunnerPtr>(|runner| {
                runner as InstancePtr<ApplicationRunnerPtr>
            })
            .build(),
        vec![Marker::singleton(vec![])],
    )
}

submit_type!(register_runner);

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // create our application, which will detect all runners
    let application = application::create_default().expect("unable to create default application");

    // prints "Hello world!"
    application.run().expect("error running application");
}
