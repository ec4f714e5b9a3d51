use std::rc::Rc;

use tiered_di::*;
use tracing_subscriber::EnvFilter;

// Define regular structs with their dependencies

struct Logger {
    prefix: &'static str,
}

impl Logger {
    fn log(&self, content: &str) {
        println!("[{}] {}", self.prefix, content);
    }
}

struct Engine {
    logger: Rc<Logger>,
}

struct Car {
    engine: Rc<Engine>,
    radio: Option<Rc<Radio>>,
}

struct Radio;

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("tiered_di=trace".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    // Application scope: shared services
    let app = Injector::resolve_and_create([
        Binding::of::<Logger>().to_factory(|| Logger { prefix: "app" }, []),
        Binding::of::<Engine>().to_factory(
            |logger: Rc<Logger>| Engine { logger },
            [Dependency::of::<Logger>()],
        ),
    ])?;

    // Component scope: a car per component, the radio is optional
    let component = app.resolve_and_create_child([Binding::of::<Car>().to_factory(
        |engine: Rc<Engine>, radio: Option<Rc<Radio>>| Car { engine, radio },
        [Dependency::of::<Engine>(), Dependency::of::<Radio>().optional()],
    )])?;

    println!("{component}");

    let car: Rc<Car> = component.inject()?;
    car.engine.logger.log(&format!("car built, radio installed: {}", car.radio.is_some()));

    let engine: Rc<Engine> = app.inject()?;
    car.engine
        .logger
        .log(&format!("engine shared with the app scope: {}", Rc::ptr_eq(&engine, &car.engine)));

    // The app scope cannot see bindings of its children
    if let Err(e) = app.get(Token::of::<Car>()) {
        engine.logger.log(&e.to_string());
    }

    Ok(())
}
