//! Demonstrates registering, emitting, watching and dispelling with `emitter`.
//!
//! Run with `RUST_LOG=emitter=trace` to see the dispatch log.

use std::rc::Rc;

use emitter::{DeferredQueue, Emits, Emitter, Event, EventTypes, Handler};
use tracing_subscriber::EnvFilter;

/// A sensor that reports readings in tenths of a degree.
struct Thermometer {
    events: Emitter<i32>,
}

impl Thermometer {
    fn new(name: &str) -> Self {
        Self {
            events: Emitter::builder().name(name).build(),
        }
    }

    fn report(&self, reading: i32) -> emitter::Result<()> {
        let kind = if reading > 300 { "too_hot" } else { "reading" };
        self.events.emit_with(kind, [reading])?;
        Ok(())
    }
}

impl Emits<i32> for Thermometer {
    fn emitter(&self) -> &Emitter<i32> {
        &self.events
    }
}

fn main() -> emitter::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== emitter basic example ===");

    let kitchen = Thermometer::new("kitchen");
    let cellar = Thermometer::new("cellar");

    // The dashboard prints everything it receives from the thermometers it watches.
    let dashboard = Emitter::<i32>::builder()
        .name("dashboard")
        .bound_default_handler(|this, event, args| {
            println!(
                "{}: {} from {} {args:?}",
                this.name().unwrap_or("?"),
                event.event_type(),
                event.target().name().unwrap_or("?")
            );
            Ok(())
        })
        .deferred(Rc::new(DeferredQueue::new()))
        .build();

    // Overheating is handled here and not shown on the dashboard.
    let alarm = Handler::new(|event: &Event<i32>, args: &[i32]| {
        println!("ALARM: {} reported {args:?}", event.target().name().unwrap_or("?"));
        event.stop_propagation();
        Ok(())
    });

    dashboard
        .when("too_hot", alarm.clone())?
        .watch([&kitchen, &cellar]);

    kitchen.report(215)?;
    cellar.report(120)?;
    kitchen.report(345)?;

    // Only notify once about the next reading from anywhere.
    dashboard.once(
        "reading",
        Handler::new(|_, args: &[i32]| {
            println!("first reading after reset: {args:?}");
            Ok(())
        }),
    )?;

    cellar.report(118)?;
    cellar.report(117)?;

    dashboard.dispel(EventTypes::none(), alarm);
    dashboard.unwatch([&kitchen]);

    kitchen.report(400)?;
    cellar.report(350)?;

    println!("Example completed successfully!");

    Ok(())
}
