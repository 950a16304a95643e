//! Network delay model.
//!
//! Each link class gets its own [`DelayStrategy`](model::DelayStrategy): either latency/bandwidth curves indexed by
//! the congestion level, or an M/M/1 queue for the shared backbone. A delay of exactly zero means the transfer
//! is rejected.

pub mod curve;
pub mod model;
pub mod queue;

use crate::config::{LinkConfig, SimulationConfig, TaskTypeConfig};
use crate::error::ConfigError;
use model::{CurveDelayStrategy, DelayStrategy, NetworkModel, QueueDelayStrategy};
use queue::{QueueModelState, TrafficEstimate};

/// Initial backbone traffic estimates derived from the task type table.
pub fn initial_queue_state(task_types: &[TaskTypeConfig]) -> QueueModelState {
    let types = task_types.len().max(1) as f64;
    let weighted = |f: &dyn Fn(&TaskTypeConfig) -> f64| {
        task_types.iter().map(|t| f(t) * t.usage_percent / 100.).sum::<f64>() / types
    };
    let mean_inter_arrival = weighted(&|t| t.mean_inter_arrival * 4.);
    QueueModelState::new(
        TrafficEstimate {
            mean_inter_arrival,
            mean_task_size: weighted(&|t| t.mean_input_size),
        },
        TrafficEstimate {
            mean_inter_arrival,
            mean_task_size: weighted(&|t| t.mean_output_size),
        },
    )
}

fn build_strategy(link: &LinkConfig, config: &SimulationConfig) -> Result<Box<dyn DelayStrategy>, ConfigError> {
    Ok(match link {
        LinkConfig::Curve {
            latency,
            bandwidth,
            levels,
            jitter,
        } => Box::new(CurveDelayStrategy::new(
            latency.build(*levels)?,
            bandwidth.build(*levels)?,
            *jitter,
        )),
        LinkConfig::Queue { bandwidth, propagation } => Box::new(QueueDelayStrategy::new(
            *propagation,
            *bandwidth,
            config.device_count,
            initial_queue_state(&config.task_types),
        )),
    })
}

/// Creates network model with strategies for all configured link classes.
pub fn build_network_model(config: &SimulationConfig) -> Result<NetworkModel, ConfigError> {
    let mut model = NetworkModel::new(config.seed.wrapping_add(1));
    for (class, link) in &config.link_bandwidths {
        model.set_strategy(*class, build_strategy(link, config)?);
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_task_types;
    use crate::congestion::LinkClass;
    use crate::task::Leg;

    #[test]
    fn initial_state_from_task_types() {
        let mut types = default_task_types();
        types.push(types[0].clone());
        types[0].usage_percent = 25.;
        types[1].usage_percent = 75.;
        types[1].mean_input_size = 500_000.;
        let state = initial_queue_state(&types);
        let upload = state.estimate(Leg::Upload);
        assert_eq!(upload.mean_inter_arrival, (5. * 4. * 0.25 + 5. * 4. * 0.75) / 2.);
        assert_eq!(upload.mean_task_size, (1_500_000. * 0.25 + 500_000. * 0.75) / 2.);
        assert_eq!(state.estimate(Leg::Download).mean_task_size, 25_000. / 2.);
    }

    #[test]
    fn default_model_has_all_links() {
        let model = build_network_model(&SimulationConfig::default()).unwrap();
        for link in LinkClass::ALL {
            assert!(model.has_link(link));
        }
        assert!(model.is_adaptive());
    }
}
