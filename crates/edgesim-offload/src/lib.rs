//! Task offloading decisions and congestion-aware network delays for edge/cloud simulations.
//!
//! Devices generate tasks ([`workload`]), the [`orchestrator`] picks a tier and a VM for each of them, the
//! [`network`] model computes upload and download delays from the current [`congestion`] at the device's access
//! point, and the [`lifecycle`] coordinator drives every task through these steps on top of the discrete-event
//! kernel from `edgesim-core`.

pub mod config;
pub mod congestion;
pub mod error;
pub mod events;
pub mod executor;
pub mod experiment;
pub mod infrastructure;
pub mod lifecycle;
pub mod mobility;
pub mod network;
pub mod orchestrator;
pub mod simulation;
pub mod stats;
pub mod task;
pub mod workload;

pub use config::SimulationConfig;
pub use error::ConfigError;
pub use simulation::EdgeSimulation;
