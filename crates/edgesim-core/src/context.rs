//! Per-component access to the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// Handle through which a component reads the clock and schedules events.
///
/// Obtained from [`Simulation::create_context`](crate::Simulation::create_context). Events emitted from a context
/// carry its component id as the source.
pub struct SimulationContext {
    id: Id,
    name: String,
    state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            state,
        }
    }

    /// Id of the component owning this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of the component owning this context, used as the log target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    /// Sends `data` to component `dest` after `delay` time units.
    ///
    /// Panics if `delay` is negative.
    pub fn emit<T>(&mut self, data: T, dest: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.state.borrow_mut().schedule(data, self.id, dest, delay)
    }

    /// Sends `data` to component `dest` at the current time.
    pub fn emit_now<T>(&mut self, data: T, dest: Id) -> EventId
    where
        T: EventData,
    {
        self.emit(data, dest, 0.)
    }

    /// Sends `data` to the owning component after `delay` time units.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.emit(data, self.id, delay)
    }
}
