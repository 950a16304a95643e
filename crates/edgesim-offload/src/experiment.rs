//! Tools for running experiments with multiple simulation runs.

use std::fs;
use std::fs::File;
use std::sync::{Arc, Mutex};

use indexmap::map::IndexMap;
use serde::Serialize;
use threadpool::ThreadPool;

use edgesim_core::Simulation;

use crate::config::{ExperimentSweep, SimulationConfig};
use crate::error::ConfigError;
use crate::orchestrator::{Scenario, TierPolicy};
use crate::simulation::EdgeSimulation;

/// Parameters of a single simulation run within an experiment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunParams {
    pub device_count: u32,
    pub scenario: String,
    pub offload_policy: String,
    pub iteration: u32,
    pub seed: u64,
}

/// Results of a single simulation run.
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub id: usize,
    pub params: RunParams,
    /// Summary statistics, empty if the run failed.
    pub results: IndexMap<String, f64>,
    pub error: Option<String>,
}

/// Implements execution of experiment: every combination of device count, scenario, offloading policy and
/// iteration is simulated separately.
pub struct Experiment {
    base: SimulationConfig,
    sweep: ExperimentSweep,
    output_dir: Option<String>,
}

impl Experiment {
    pub fn new(base: SimulationConfig, output_dir: Option<String>) -> Result<Self, ConfigError> {
        let sweep = base
            .experiment
            .clone()
            .ok_or_else(|| ConfigError::invalid("experiment", "experiment section is missing"))?;
        Ok(Self {
            base,
            sweep,
            output_dir,
        })
    }

    /// Configs of all runs in execution order.
    pub fn runs(&self) -> Vec<(RunParams, SimulationConfig)> {
        let mut runs = Vec::new();
        let mut next = Some(self.sweep.min_device_count);
        while let Some(device_count) = next.filter(|count| *count <= self.sweep.max_device_count) {
            for scenario in &self.sweep.scenarios {
                for policy in &self.sweep.offload_policies {
                    for iteration in 0..self.sweep.iterations {
                        runs.push(self.run_config(device_count, *scenario, *policy, iteration));
                    }
                }
            }
            next = device_count.checked_add(self.sweep.device_count_step);
        }
        runs
    }

    fn run_config(
        &self,
        device_count: u32,
        scenario: Scenario,
        policy: TierPolicy,
        iteration: u32,
    ) -> (RunParams, SimulationConfig) {
        let mut config = self.base.clone();
        config.device_count = device_count;
        config.scenario = scenario;
        config.offload_policy = policy;
        config.seed = self.base.seed.wrapping_add(iteration as u64);
        config.experiment = None;
        let params = RunParams {
            device_count,
            scenario: scenario.to_string(),
            offload_policy: policy.to_string(),
            iteration,
            seed: config.seed,
        };
        (params, config)
    }

    /// Runs the experiment using the specified number of threads, returns results ordered by run id.
    pub fn run(&self, num_threads: usize) -> Result<Vec<RunResult>, std::io::Error> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let pool = ThreadPool::new(num_threads.max(1));

        for (idx, (params, config)) in self.runs().into_iter().enumerate() {
            let run_id = idx + 1;
            let results = results.clone();
            pool.execute(move || {
                log::info!("RUN {}: {:?}", run_id, params);
                let outcome = run_simulation(config);
                let result = match outcome {
                    Ok(results) => RunResult {
                        id: run_id,
                        params,
                        results,
                        error: None,
                    },
                    Err(e) => {
                        log::error!("RUN {} failed: {}", run_id, e);
                        RunResult {
                            id: run_id,
                            params,
                            results: IndexMap::new(),
                            error: Some(e.to_string()),
                        }
                    }
                };
                if let Ok(mut results) = results.lock() {
                    results.push(result);
                }
            });
        }

        pool.join();
        let mut results = match Arc::try_unwrap(results) {
            Ok(results) => results.into_inner().unwrap_or_else(|e| e.into_inner()),
            Err(results) => results.lock().map(|r| r.clone()).unwrap_or_default(),
        };
        results.sort_by_key(|r| r.id);

        if let Some(dir) = &self.output_dir {
            fs::create_dir_all(dir)?;
            let mut file = File::create(format!("{}/results.json", dir))?;
            serde_json::to_writer_pretty(&mut file, &results)?;
        }
        Ok(results)
    }
}

fn run_simulation(config: SimulationConfig) -> Result<IndexMap<String, f64>, ConfigError> {
    let sim = Simulation::new();
    let mut edge_sim = EdgeSimulation::new(sim, config)?;
    let stats = edge_sim.run()?;
    Ok(stats.summary())
}
