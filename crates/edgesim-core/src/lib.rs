//! Discrete-event kernel used by the edge offloading simulator.
//!
//! Components are registered in a [`Simulation`] and talk to each other only through timed events emitted via
//! their [`SimulationContext`]. Events are delivered in non-decreasing time order; events with equal time are
//! delivered in the order they were emitted.
#![warn(missing_docs)]

pub mod component;
pub mod context;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use component::Id;
pub use context::SimulationContext;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
