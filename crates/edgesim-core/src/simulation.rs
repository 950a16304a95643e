//! Component registry and the event loop.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::Level::Trace;
use log::{debug, log_enabled, trace};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event};
use crate::state::SimulationState;

struct Component {
    name: String,
    handler: Option<Rc<RefCell<dyn EventHandler>>>,
}

/// Owns the clock, the event queue and the registered components.
#[derive(Default)]
pub struct Simulation {
    state: Rc<RefCell<SimulationState>>,
    ids: HashMap<String, Id>,
    components: Vec<Component>,
}

impl Simulation {
    /// Creates an empty simulation with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.components.len() as Id;
        self.ids.insert(name.to_owned(), id);
        self.components.push(Component {
            name: name.to_owned(),
            handler: None,
        });
        id
    }

    /// Name of a registered component, `"?"` for an unknown id.
    pub fn lookup_name(&self, id: Id) -> &str {
        self.components.get(id as usize).map_or("?", |c| c.name.as_str())
    }

    /// Creates a context for the component with the given name.
    ///
    /// Ids are assigned in registration order starting from 0, a name that is already registered keeps its id.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgesim_core::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let ctx = sim.create_context("coordinator");
    /// assert_eq!(ctx.id(), 0);
    /// assert_eq!(sim.create_context("coordinator").id(), 0);
    /// ```
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        let id = self.register(name);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name, "id": id})
        );
        SimulationContext::new(id, name, self.state.clone())
    }

    /// Attaches the event handler to the component with the given name and returns its id.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.components[id as usize].handler = Some(handler);
        id
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    /// Delivers the earliest pending event, returns `false` if the queue is empty.
    ///
    /// Events sent to a component without handler are logged and dropped.
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use edgesim_core::Simulation;
    ///
    /// #[derive(Serialize)]
    /// struct Wakeup {}
    ///
    /// let mut sim = Simulation::new();
    /// let mut ctx = sim.create_context("device");
    /// ctx.emit_self(Wakeup {}, 1.5);
    /// assert!(sim.step());
    /// assert_eq!(sim.time(), 1.5);
    /// assert!(!sim.step());
    /// ```
    pub fn step(&mut self) -> bool {
        let next = self.state.borrow_mut().pop();
        let Some(event) = next else {
            return false;
        };
        if log_enabled!(Trace) {
            let dest = self.lookup_name(event.dest);
            trace!(
                target: dest,
                "[{:.3} {} {}] {}",
                event.time,
                get_colored("EVENT", colored::Color::BrightBlack),
                dest,
                json!({"type": type_name(&event.data).unwrap_or("?"), "data": event.data, "src": self.lookup_name(event.src)})
            );
        }
        let handler = self.components.get(event.dest as usize).and_then(|c| c.handler.clone());
        match handler {
            Some(handler) => handler.borrow_mut().on(event),
            None => log_undelivered_event(event),
        }
        true
    }

    /// Delivers events until the queue is empty.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Delivers events scheduled at or before `time`, returns `true` if later events remain.
    pub fn step_until_time(&mut self, time: f64) -> bool {
        loop {
            let next = self.state.borrow().next_time();
            match next {
                Some(t) if t <= time => {
                    self.step();
                }
                Some(_) => return true,
                None => return false,
            }
        }
    }

    /// Number of scheduled but not yet delivered events.
    pub fn pending_events(&self) -> usize {
        self.state.borrow().pending()
    }
}
