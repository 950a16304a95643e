use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use edgesim_core::{cast, Event, EventHandler, Simulation, SimulationContext};

#[derive(Clone, Serialize)]
struct Tick {
    label: u32,
}

#[derive(Clone, Serialize)]
struct Forward {
    delay: f64,
}

struct Recorder {
    ctx: SimulationContext,
    seen: Vec<(f64, u32)>,
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Tick { label } => {
                self.seen.push((self.ctx.time(), label));
            }
            Forward { delay } => {
                self.ctx.emit_self(Tick { label: 100 }, delay);
            }
        })
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Trace).try_init();
}

fn recorder(sim: &mut Simulation) -> (Rc<RefCell<Recorder>>, u32) {
    let ctx = sim.create_context("recorder");
    let recorder = Rc::new(RefCell::new(Recorder { ctx, seen: Vec::new() }));
    let id = sim.add_handler("recorder", recorder.clone());
    (recorder, id)
}

#[test]
fn test_events_delivered_in_time_order() {
    init_logger();
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim);
    let mut client = sim.create_context("client");
    client.emit(Tick { label: 3 }, id, 3.0);
    client.emit(Tick { label: 1 }, id, 1.0);
    client.emit(Tick { label: 2 }, id, 2.0);
    sim.step_until_no_events();

    let labels: Vec<u32> = recorder.borrow().seen.iter().map(|(_, l)| *l).collect();
    assert_eq!(labels, vec![1, 2, 3]);
    assert_eq!(sim.time(), 3.0);
}

#[test]
fn test_equal_time_events_keep_emission_order() {
    init_logger();
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim);
    let mut client = sim.create_context("client");
    for label in 0..5 {
        client.emit(Tick { label }, id, 1.0);
    }
    sim.step_until_no_events();

    let labels: Vec<u32> = recorder.borrow().seen.iter().map(|(_, l)| *l).collect();
    assert_eq!(labels, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_events_emitted_from_handler_are_relative_to_current_time() {
    init_logger();
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim);
    let mut client = sim.create_context("client");
    client.emit(Forward { delay: 0.5 }, id, 2.0);
    sim.step_until_no_events();

    assert_eq!(recorder.borrow().seen, vec![(2.5, 100)]);
}

#[test]
fn test_step_until_time_stops_before_later_events() {
    init_logger();
    let mut sim = Simulation::new();
    let (recorder, id) = recorder(&mut sim);
    let mut client = sim.create_context("client");
    client.emit(Tick { label: 1 }, id, 1.0);
    client.emit(Tick { label: 2 }, id, 5.0);

    assert!(sim.step_until_time(2.0));
    assert_eq!(recorder.borrow().seen.len(), 1);
    assert_eq!(sim.pending_events(), 1);
    assert!(!sim.step_until_time(10.0));
    assert_eq!(recorder.borrow().seen.len(), 2);
}

#[test]
fn test_undelivered_event_is_dropped() {
    init_logger();
    let mut sim = Simulation::new();
    let mut client = sim.create_context("client");
    let orphan = sim.create_context("orphan");
    client.emit_now(Tick { label: 1 }, orphan.id());
    assert!(sim.step());
    assert!(!sim.step());
}
