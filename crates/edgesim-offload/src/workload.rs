//! Synthetic workload generator.

use rand::prelude::*;
use rand_distr::Exp;
use rand_pcg::Pcg64;

use crate::config::{ArrivalModel, SimulationConfig, TaskTypeConfig};
use crate::error::ConfigError;
use crate::task::{DeviceId, TaskRequest};

struct TaskTypeSampler {
    inter_arrival: Exp<f64>,
    input_size: Exp<f64>,
    output_size: Exp<f64>,
    length: Exp<f64>,
}

fn exp(field: &str, mean: f64) -> Result<Exp<f64>, ConfigError> {
    if !(mean > 0.) {
        return Err(ConfigError::invalid(field, format!("mean must be positive, got {}", mean)));
    }
    Exp::new(1. / mean).map_err(|e| ConfigError::invalid(field, e.to_string()))
}

impl TaskTypeSampler {
    fn new(task_type: &TaskTypeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            inter_arrival: exp("mean_inter_arrival", task_type.mean_inter_arrival)?,
            input_size: exp("mean_input_size", task_type.mean_input_size)?,
            output_size: exp("mean_output_size", task_type.mean_output_size)?,
            length: exp("mean_length", task_type.mean_length)?,
        })
    }
}

/// Generated workload.
#[derive(Clone, Debug, Default)]
pub struct Workload {
    /// Task type of each device.
    pub device_task_types: Vec<usize>,
    /// Tasks of all devices ordered by arrival time.
    pub requests: Vec<TaskRequest>,
}

/// Produces task arrivals of all devices for the simulation horizon.
pub struct WorkloadGenerator {
    task_types: Vec<TaskTypeConfig>,
    samplers: Vec<TaskTypeSampler>,
    arrival_model: ArrivalModel,
    device_count: u32,
    horizon: f64,
    rand: Pcg64,
}

impl WorkloadGenerator {
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let samplers = config
            .task_types
            .iter()
            .map(TaskTypeSampler::new)
            .collect::<Result<Vec<_>, _>>()?;
        if samplers.is_empty() {
            return Err(ConfigError::invalid("task_types", "at least one task type is required"));
        }
        if config.arrival_model == ArrivalModel::ActiveIdle
            && config.task_types.iter().any(|t| !(t.active_period > 0.))
        {
            return Err(ConfigError::invalid("task_types.active_period", "must be positive"));
        }
        if let ArrivalModel::FixedInterval { interval } = config.arrival_model {
            if !(interval > 0.) {
                return Err(ConfigError::invalid("arrival_model.interval", "must be positive"));
            }
        }
        Ok(Self {
            task_types: config.task_types.clone(),
            samplers,
            arrival_model: config.arrival_model.clone(),
            device_count: config.device_count,
            horizon: config.simulation_time,
            rand: Pcg64::seed_from_u64(config.seed),
        })
    }

    /// Assigns task type to each device using usage percentages as weights.
    pub fn assign_task_types(&mut self) -> Vec<usize> {
        (0..self.device_count)
            .map(|_| {
                let draw = self.rand.gen_range(0. ..100.);
                let mut cumulative = 0.;
                for (idx, task_type) in self.task_types.iter().enumerate() {
                    cumulative += task_type.usage_percent;
                    if draw < cumulative {
                        return idx;
                    }
                }
                self.task_types.len() - 1
            })
            .collect()
    }

    fn arrival_times(&mut self, task_type: usize) -> Vec<f64> {
        let config = &self.task_types[task_type];
        let sampler = &self.samplers[task_type];
        let rand = &mut self.rand;
        let mut times = Vec::new();
        match self.arrival_model {
            ArrivalModel::FixedInterval { interval } => {
                let mut time = 0.;
                while time < self.horizon {
                    times.push(time);
                    time += interval;
                }
            }
            ArrivalModel::Poisson => {
                let mut time = 0.;
                loop {
                    time += sampler.inter_arrival.sample(rand);
                    if time >= self.horizon {
                        break;
                    }
                    times.push(time);
                }
            }
            ArrivalModel::ActiveIdle => {
                let active = config.active_period;
                let mut active_start = rand.gen_range(0. ..active);
                let mut time = active_start;
                while time < self.horizon {
                    time += sampler.inter_arrival.sample(rand);
                    if time > active_start + active {
                        active_start += active + config.idle_period;
                        time = active_start;
                        continue;
                    }
                    if time < self.horizon {
                        times.push(time);
                    }
                }
            }
        }
        times
    }

    fn request(&mut self, device_id: DeviceId, task_type: usize, arrival_time: f64) -> TaskRequest {
        let sampler = &self.samplers[task_type];
        let rand = &mut self.rand;
        TaskRequest {
            id: 0,
            device_id,
            task_type,
            arrival_time,
            length: (sampler.length.sample(rand).round() as u64).max(1),
            pes: self.task_types[task_type].pes,
            input_size: (sampler.input_size.sample(rand).round() as u64).max(1),
            output_size: (sampler.output_size.sample(rand).round() as u64).max(1),
        }
    }

    /// Generates tasks of all devices, ordered by arrival time with ids assigned in that order.
    pub fn generate(&mut self) -> Workload {
        let device_task_types = self.assign_task_types();
        let mut requests = Vec::new();
        for (device_id, task_type) in device_task_types.iter().enumerate() {
            for time in self.arrival_times(*task_type) {
                let request = self.request(device_id as DeviceId, *task_type, time);
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time));
        for (id, request) in requests.iter_mut().enumerate() {
            request.id = id as u64;
        }
        log::debug!(
            "Generated {} tasks for {} devices",
            requests.len(),
            device_task_types.len()
        );
        Workload {
            device_task_types,
            requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_task_types;

    fn config(arrival_model: ArrivalModel) -> SimulationConfig {
        SimulationConfig {
            device_count: 20,
            simulation_time: 300.,
            arrival_model,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_interval_arrivals() {
        let workload = WorkloadGenerator::new(&config(ArrivalModel::FixedInterval { interval: 10. }))
            .unwrap()
            .generate();
        assert_eq!(workload.requests.len(), 20 * 30);
        assert!(workload.requests.iter().all(|r| (r.arrival_time / 10.).fract() == 0.));
    }

    #[test]
    fn requests_are_ordered_and_sized() {
        for model in [ArrivalModel::Poisson, ArrivalModel::ActiveIdle] {
            let workload = WorkloadGenerator::new(&config(model)).unwrap().generate();
            assert!(!workload.requests.is_empty());
            for (i, pair) in workload.requests.windows(2).enumerate() {
                assert!(pair[0].arrival_time <= pair[1].arrival_time);
                assert_eq!(pair[0].id, i as u64);
            }
            for request in &workload.requests {
                assert!(request.arrival_time >= 0. && request.arrival_time < 300.);
                assert!(request.input_size >= 1 && request.output_size >= 1 && request.length >= 1);
            }
        }
    }

    #[test]
    fn active_idle_respects_idle_periods() {
        let mut cfg = config(ArrivalModel::ActiveIdle);
        cfg.device_count = 1;
        cfg.task_types[0].mean_inter_arrival = 0.5;
        cfg.task_types[0].active_period = 10.;
        cfg.task_types[0].idle_period = 1000.;
        let workload = WorkloadGenerator::new(&cfg).unwrap().generate();
        // only the first active window fits into the horizon
        let first = workload.requests[0].arrival_time;
        assert!(workload.requests.iter().all(|r| r.arrival_time <= first + 10.));
    }

    #[test]
    fn task_types_follow_usage() {
        let mut types = default_task_types();
        types.push(types[0].clone());
        types[0].usage_percent = 0.;
        types[1].usage_percent = 100.;
        let cfg = SimulationConfig {
            task_types: types,
            ..config(ArrivalModel::Poisson)
        };
        let mut generator = WorkloadGenerator::new(&cfg).unwrap();
        assert!(generator.assign_task_types().iter().all(|t| *t == 1));
    }

    #[test]
    fn same_seed_same_workload() {
        let cfg = config(ArrivalModel::Poisson);
        let a = WorkloadGenerator::new(&cfg).unwrap().generate();
        let b = WorkloadGenerator::new(&cfg).unwrap().generate();
        assert_eq!(a.requests, b.requests);
    }
}
