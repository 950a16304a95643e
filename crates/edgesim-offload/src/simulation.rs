//! Main entry point for simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use edgesim_core::Simulation;

use crate::config::{MobilityConfig, SimulationConfig};
use crate::congestion::CongestionTracker;
use crate::error::ConfigError;
use crate::executor::TaskExecutor;
use crate::infrastructure::EdgeInfrastructure;
use crate::lifecycle::LifecycleCoordinator;
use crate::mobility::{LocationProvider, NomadicMobility};
use crate::network::build_network_model;
use crate::orchestrator::EdgeOrchestrator;
use crate::stats::{OutcomeLog, Stats, TaskRecord};
use crate::task::TaskRequest;
use crate::workload::WorkloadGenerator;

/// Edge/cloud offloading simulation built on top of the discrete-event kernel.
pub struct EdgeSimulation {
    config: SimulationConfig,
    coordinator: Rc<RefCell<LifecycleCoordinator>>,
    executor: Rc<RefCell<TaskExecutor>>,
    infrastructure: Rc<RefCell<EdgeInfrastructure>>,
    outcomes: Rc<RefCell<OutcomeLog>>,
    workload_loaded: bool,
    sim: Simulation,
}

impl EdgeSimulation {
    /// Creates simulation with infrastructure and mobility built from the config.
    pub fn new(sim: Simulation, config: SimulationConfig) -> Result<Self, ConfigError> {
        let infrastructure = EdgeInfrastructure::from_config(&config.task_types, &config.edge_hosts, &config.cloud_hosts);
        let mobility: Box<dyn LocationProvider> = match config.mobility {
            MobilityConfig::SingleAccessPoint { access_point } => {
                Box::new(NomadicMobility::single_access_point(config.device_count, access_point))
            }
            MobilityConfig::RoundRobin => Box::new(NomadicMobility::round_robin(
                config.device_count,
                config.access_point_count,
            )),
        };
        Self::with_components(sim, config, infrastructure, mobility)
    }

    /// Creates simulation with externally provided infrastructure and location provider.
    pub fn with_components(
        mut sim: Simulation,
        config: SimulationConfig,
        infrastructure: EdgeInfrastructure,
        mobility: Box<dyn LocationProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let network = build_network_model(&config)?;
        let infrastructure = rc!(refcell!(infrastructure));
        let outcomes = rc!(refcell!(OutcomeLog::new(config.warm_up_period)));

        let executor = rc!(refcell!(TaskExecutor::new(
            infrastructure.clone(),
            sim.create_context("executor")
        )));
        let executor_id = sim.add_handler("executor", executor.clone());

        let coordinator = rc!(refcell!(LifecycleCoordinator::new(
            EdgeOrchestrator::new(&config),
            network,
            CongestionTracker::new(config.access_point_count),
            mobility,
            infrastructure.clone(),
            outcomes.clone(),
            executor_id,
            sim.create_context("coordinator"),
        )));
        sim.add_handler("coordinator", coordinator.clone());
        coordinator
            .borrow_mut()
            .start_network_refresh(config.queue_observation_window, config.simulation_time);

        Ok(Self {
            config,
            coordinator,
            executor,
            infrastructure,
            outcomes,
            workload_loaded: false,
            sim,
        })
    }

    /// Schedules the given tasks instead of the generated workload.
    pub fn load_workload(&mut self, requests: Vec<TaskRequest>) {
        let mut coordinator = self.coordinator.borrow_mut();
        for request in requests {
            coordinator.submit(request);
        }
        self.workload_loaded = true;
    }

    /// Generates the synthetic workload from the config and schedules it, returns the number of tasks.
    pub fn generate_workload(&mut self) -> Result<usize, ConfigError> {
        let workload = WorkloadGenerator::new(&self.config)?.generate();
        let count = workload.requests.len();
        self.load_workload(workload.requests);
        Ok(count)
    }

    /// Performs a single simulation step, returns `false` if there are no pending events or processing has stopped
    /// because of a configuration error.
    pub fn step(&mut self) -> bool {
        if self.coordinator.borrow().has_fatal_error() {
            return false;
        }
        self.sim.step()
    }

    /// Runs the simulation until there are no pending events.
    ///
    /// The synthetic workload is generated first unless some workload was already loaded.
    pub fn run(&mut self) -> Result<Stats, ConfigError> {
        if !self.workload_loaded {
            let count = self.generate_workload()?;
            log::info!("Generated {} tasks for {} devices", count, self.config.device_count);
        }
        while self.step() {}
        if let Some(e) = self.coordinator.borrow_mut().take_fatal_error() {
            return Err(e);
        }
        Ok(self.stats())
    }

    pub fn stats(&self) -> Stats {
        self.outcomes.borrow().stats()
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.outcomes.borrow().records().cloned().collect()
    }

    pub fn save_records(&self, path: &str) -> Result<(), std::io::Error> {
        self.outcomes.borrow().save_csv(path)
    }

    /// Returns a copy of the current congestion counters.
    pub fn congestion(&self) -> CongestionTracker {
        self.coordinator.borrow().congestion().clone()
    }

    pub fn coordinator(&self) -> Rc<RefCell<LifecycleCoordinator>> {
        self.coordinator.clone()
    }

    pub fn infrastructure(&self) -> Rc<RefCell<EdgeInfrastructure>> {
        self.infrastructure.clone()
    }

    pub fn executed_tasks(&self) -> u64 {
        self.executor.borrow().executed_tasks()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }
}
