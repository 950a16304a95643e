//! Simulation configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::congestion::LinkClass;
use crate::error::ConfigError;
use crate::network::curve::DelayCurve;
use crate::orchestrator::placement::PlacementPolicyKind;
use crate::orchestrator::{Scenario, TierPolicy};
use crate::task::Tier;

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub seed: Option<u64>,
    pub simulation_time: Option<f64>,
    pub warm_up_period: Option<f64>,
    pub device_count: Option<u32>,
    pub scenario: Option<String>,
    pub offload_policy: Option<String>,
    pub placement_policy: Option<String>,
    pub bandwidth_threshold_mbps: Option<f64>,
    pub utilization_threshold_percent: Option<f64>,
    pub queue_observation_window: Option<f64>,
    pub access_point_count: Option<u32>,
    pub mobility: Option<MobilityConfig>,
    pub arrival_model: Option<ArrivalModel>,
    pub tier_links: Option<RawTierLinks>,
    pub link_bandwidths: Option<BTreeMap<String, LinkConfig>>,
    pub task_types: Option<Vec<TaskTypeConfig>>,
    pub edge_hosts: Option<Vec<HostConfig>>,
    pub cloud_hosts: Option<Vec<HostConfig>>,
    pub experiment: Option<RawExperimentConfig>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawTierLinks {
    pub edge: Option<String>,
    pub cloud: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawExperimentConfig {
    pub min_device_count: u32,
    pub max_device_count: u32,
    pub device_count_step: Option<u32>,
    pub scenarios: Option<Vec<String>>,
    pub offload_policies: Option<Vec<String>>,
    pub iterations: Option<u32>,
}

/// How devices generate tasks over time.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArrivalModel {
    /// One task every `interval` seconds starting at time 0.
    FixedInterval { interval: f64 },
    /// Exponential inter-arrivals within active periods separated by idle periods.
    ActiveIdle,
    /// Exponential inter-arrivals over the whole simulation.
    Poisson,
}

/// Placement of devices over access points.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MobilityConfig {
    SingleAccessPoint { access_point: u32 },
    RoundRobin,
}

/// Generator of a delay curve.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CurveConfig {
    Constant { value: f64 },
    /// `initial * e^(rate * level)`
    ExponentialGrowth { initial: f64, rate: f64 },
    /// `initial * factor^level`
    GeometricDecay { initial: f64, factor: f64 },
    Table { values: Vec<f64> },
}

impl CurveConfig {
    pub fn build(&self, levels: usize) -> Result<DelayCurve, ConfigError> {
        match self {
            CurveConfig::Constant { value } => DelayCurve::from_values(vec![*value]),
            CurveConfig::ExponentialGrowth { initial, rate } => {
                if *rate < 0. {
                    return Err(ConfigError::invalid("exponential_growth.rate", "must be non-negative"));
                }
                DelayCurve::from_values(DelayCurve::exponential_growth(*initial, *rate, levels).values().to_vec())
            }
            CurveConfig::GeometricDecay { initial, factor } => {
                if !(*factor > 0. && *factor <= 1.) {
                    return Err(ConfigError::invalid("geometric_decay.factor", "must be in (0, 1]"));
                }
                DelayCurve::from_values(DelayCurve::geometric_decay(*initial, *factor, levels).values().to_vec())
            }
            CurveConfig::Table { values } => DelayCurve::from_values(values.clone()),
        }
    }
}

fn default_levels() -> usize {
    180
}

/// Network model of a single link class.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum LinkConfig {
    /// Latency (seconds) and bandwidth (bits/s) curves indexed by congestion level.
    Curve {
        latency: CurveConfig,
        bandwidth: CurveConfig,
        #[serde(default = "default_levels")]
        levels: usize,
        /// Half-width of the uniform jitter window in seconds.
        #[serde(default)]
        jitter: f64,
    },
    /// M/M/1 queue with bandwidth in bits/s and propagation delay in seconds.
    Queue {
        bandwidth: f64,
        #[serde(default)]
        propagation: f64,
    },
}

fn default_pes() -> u32 {
    1
}

/// Row of the task type lookup table.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct TaskTypeConfig {
    pub name: String,
    /// Percentage of devices running this task type.
    pub usage_percent: f64,
    /// Mean time between two tasks of a device in seconds.
    pub mean_inter_arrival: f64,
    #[serde(default)]
    pub active_period: f64,
    #[serde(default)]
    pub idle_period: f64,
    /// Mean input size in bytes.
    pub mean_input_size: f64,
    /// Mean output size in bytes.
    pub mean_output_size: f64,
    /// Mean length in millions of instructions.
    pub mean_length: f64,
    #[serde(default = "default_pes")]
    pub pes: u32,
    /// Predicted CPU demand on an edge VM, percent.
    pub edge_cpu_demand: f64,
    /// Predicted CPU demand on a cloud VM, percent.
    pub cloud_cpu_demand: f64,
}

impl TaskTypeConfig {
    pub fn cpu_demand(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Edge => self.edge_cpu_demand,
            Tier::Cloud => self.cloud_cpu_demand,
        }
    }
}

fn default_host_count() -> u32 {
    1
}

/// Holds configuration of a single host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Number of such hosts.
    #[serde(default = "default_host_count")]
    pub count: u32,
    /// Number of VMs on each host.
    pub vms: u32,
    /// Processing speed of each VM.
    pub mips: f64,
}

/// Link class used to reach each tier.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TierLinks {
    pub edge: LinkClass,
    pub cloud: LinkClass,
}

impl TierLinks {
    pub fn link_for(&self, tier: Tier) -> LinkClass {
        match tier {
            Tier::Edge => self.edge,
            Tier::Cloud => self.cloud,
        }
    }
}

impl Default for TierLinks {
    fn default() -> Self {
        Self {
            edge: LinkClass::Lan,
            cloud: LinkClass::Wan,
        }
    }
}

/// Parameter grid of an experiment.
#[derive(Debug, PartialEq, Clone)]
pub struct ExperimentSweep {
    pub min_device_count: u32,
    pub max_device_count: u32,
    pub device_count_step: u32,
    pub scenarios: Vec<Scenario>,
    pub offload_policies: Vec<TierPolicy>,
    pub iterations: u32,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Simulation horizon in seconds, no tasks arrive after it.
    pub simulation_time: f64,
    /// Tasks arriving before this time are excluded from statistics.
    pub warm_up_period: f64,
    pub device_count: u32,
    pub scenario: Scenario,
    pub offload_policy: TierPolicy,
    pub placement_policy: PlacementPolicyKind,
    pub bandwidth_threshold_mbps: f64,
    pub utilization_threshold_percent: f64,
    /// Refresh period of adaptive network models in seconds.
    pub queue_observation_window: f64,
    pub access_point_count: u32,
    pub mobility: MobilityConfig,
    pub arrival_model: ArrivalModel,
    pub tier_links: TierLinks,
    pub link_bandwidths: BTreeMap<LinkClass, LinkConfig>,
    pub task_types: Vec<TaskTypeConfig>,
    pub edge_hosts: Vec<HostConfig>,
    pub cloud_hosts: Vec<HostConfig>,
    pub experiment: Option<ExperimentSweep>,
}

/// Link models of the aircraft hangar testbed: Wi-Fi LAN to the edge, WAN to the cloud and a shared MAN backbone.
pub fn default_link_bandwidths() -> BTreeMap<LinkClass, LinkConfig> {
    let mut links = BTreeMap::new();
    links.insert(
        LinkClass::Lan,
        LinkConfig::Curve {
            latency: CurveConfig::ExponentialGrowth {
                initial: 0.0005,
                rate: 0.005,
            },
            bandwidth: CurveConfig::GeometricDecay {
                initial: 3e9,
                factor: 0.96,
            },
            levels: default_levels(),
            jitter: 0.,
        },
    );
    links.insert(
        LinkClass::Wan,
        LinkConfig::Curve {
            latency: CurveConfig::ExponentialGrowth {
                initial: 0.005,
                rate: 0.015,
            },
            bandwidth: CurveConfig::GeometricDecay {
                initial: 5.12e8,
                factor: 0.95,
            },
            levels: default_levels(),
            jitter: 0.005,
        },
    );
    links.insert(
        LinkClass::Man,
        LinkConfig::Queue {
            bandwidth: 1.3312e9,
            propagation: 0.005,
        },
    );
    links
}

pub fn default_task_types() -> Vec<TaskTypeConfig> {
    vec![TaskTypeConfig {
        name: "inspection".to_string(),
        usage_percent: 100.,
        mean_inter_arrival: 5.,
        active_period: 40.,
        idle_period: 20.,
        mean_input_size: 1_500_000.,
        mean_output_size: 25_000.,
        mean_length: 3000.,
        pes: 1,
        edge_cpu_demand: 20.,
        cloud_cpu_demand: 5.,
    }]
}

fn default_edge_hosts() -> Vec<HostConfig> {
    vec![HostConfig {
        count: 2,
        vms: 2,
        mips: 10_000.,
    }]
}

fn default_cloud_hosts() -> Vec<HostConfig> {
    vec![HostConfig {
        count: 1,
        vms: 4,
        mips: 100_000.,
    }]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // all fields of the raw config are absent, so only defaults are used
        Self::from_raw(RawSimulationConfig::default()).unwrap_or_else(|e| unreachable!("invalid default config: {}", e))
    }
}

impl SimulationConfig {
    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates config from a YAML string.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(text)?;
        let config = Self::from_raw(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawSimulationConfig) -> Result<Self, ConfigError> {
        let tier_links = match raw.tier_links {
            Some(links) => {
                let defaults = TierLinks::default();
                TierLinks {
                    edge: links.edge.map_or(Ok(defaults.edge), |l| l.parse::<LinkClass>())?,
                    cloud: links.cloud.map_or(Ok(defaults.cloud), |l| l.parse::<LinkClass>())?,
                }
            }
            None => TierLinks::default(),
        };
        let link_bandwidths = match raw.link_bandwidths {
            Some(links) => links
                .into_iter()
                .map(|(name, link)| Ok((name.parse::<LinkClass>()?, link)))
                .collect::<Result<BTreeMap<_, _>, ConfigError>>()?,
            None => default_link_bandwidths(),
        };
        let experiment = match raw.experiment {
            Some(exp) => Some(ExperimentSweep {
                min_device_count: exp.min_device_count,
                max_device_count: exp.max_device_count,
                device_count_step: exp.device_count_step.unwrap_or(1),
                scenarios: match exp.scenarios {
                    Some(names) => names.iter().map(|s| s.parse::<Scenario>()).collect::<Result<Vec<_>, _>>()?,
                    None => vec![Scenario::SingleTier, Scenario::TwoTierWithEo],
                },
                offload_policies: match exp.offload_policies {
                    Some(names) => names.iter().map(|s| s.parse::<TierPolicy>()).collect::<Result<Vec<_>, _>>()?,
                    None => vec![TierPolicy::NetworkBased],
                },
                iterations: exp.iterations.unwrap_or(1),
            }),
            None => None,
        };

        Ok(Self {
            seed: raw.seed.unwrap_or(123),
            simulation_time: raw.simulation_time.unwrap_or(600.),
            warm_up_period: raw.warm_up_period.unwrap_or(0.),
            device_count: raw.device_count.unwrap_or(10),
            scenario: raw.scenario.as_deref().unwrap_or("TWO_TIER_WITH_EO").parse()?,
            offload_policy: raw.offload_policy.as_deref().unwrap_or("NETWORK_BASED").parse()?,
            placement_policy: raw.placement_policy.as_deref().unwrap_or("LEAST_LOADED").parse()?,
            bandwidth_threshold_mbps: raw.bandwidth_threshold_mbps.unwrap_or(20.),
            utilization_threshold_percent: raw.utilization_threshold_percent.unwrap_or(80.),
            queue_observation_window: raw.queue_observation_window.unwrap_or(5.),
            access_point_count: raw.access_point_count.unwrap_or(1),
            mobility: raw
                .mobility
                .unwrap_or(MobilityConfig::SingleAccessPoint { access_point: 0 }),
            arrival_model: raw.arrival_model.unwrap_or(ArrivalModel::ActiveIdle),
            tier_links,
            link_bandwidths,
            task_types: raw.task_types.unwrap_or_else(default_task_types),
            edge_hosts: raw.edge_hosts.unwrap_or_else(default_edge_hosts),
            cloud_hosts: raw.cloud_hosts.unwrap_or_else(default_cloud_hosts),
            experiment,
        })
    }

    /// Tiers that can receive tasks in the configured scenario.
    pub fn active_tiers(&self) -> Vec<Tier> {
        match self.scenario {
            Scenario::SingleTier => vec![Tier::Edge],
            Scenario::TwoTierWithEo => vec![Tier::Edge, Tier::Cloud],
        }
    }

    /// Checks value ranges and cross-references between sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_count == 0 {
            return Err(ConfigError::invalid("device_count", "must be positive"));
        }
        if !(self.simulation_time > 0.) {
            return Err(ConfigError::invalid("simulation_time", "must be positive"));
        }
        if !(self.warm_up_period >= 0. && self.warm_up_period < self.simulation_time) {
            return Err(ConfigError::invalid(
                "warm_up_period",
                "must be non-negative and less than simulation_time",
            ));
        }
        if self.bandwidth_threshold_mbps < 0. {
            return Err(ConfigError::invalid("bandwidth_threshold_mbps", "must be non-negative"));
        }
        if self.utilization_threshold_percent < 0. {
            return Err(ConfigError::invalid("utilization_threshold_percent", "must be non-negative"));
        }
        if !(self.queue_observation_window > 0.) {
            return Err(ConfigError::invalid("queue_observation_window", "must be positive"));
        }
        if self.access_point_count == 0 {
            return Err(ConfigError::invalid("access_point_count", "must be positive"));
        }
        if let MobilityConfig::SingleAccessPoint { access_point } = self.mobility {
            if access_point >= self.access_point_count {
                return Err(ConfigError::UnknownAccessPoint {
                    access_point,
                    count: self.access_point_count,
                });
            }
        }
        match self.arrival_model {
            ArrivalModel::FixedInterval { interval } if !(interval > 0.) => {
                return Err(ConfigError::invalid("arrival_model.interval", "must be positive"));
            }
            ArrivalModel::ActiveIdle => {
                if let Some(t) = self.task_types.iter().find(|t| !(t.active_period > 0.) || t.idle_period < 0.) {
                    return Err(ConfigError::invalid(
                        "task_types.active_period",
                        format!("task type {} needs positive active period and non-negative idle period", t.name),
                    ));
                }
            }
            _ => {}
        }
        self.validate_task_types()?;
        self.validate_links()?;
        for (field, hosts) in [("edge_hosts", &self.edge_hosts), ("cloud_hosts", &self.cloud_hosts)] {
            if hosts.iter().any(|h| !(h.mips > 0.)) {
                return Err(ConfigError::invalid(field, "VM mips must be positive"));
            }
        }
        if let Some(exp) = &self.experiment {
            if exp.device_count_step == 0 || exp.min_device_count == 0 || exp.min_device_count > exp.max_device_count {
                return Err(ConfigError::invalid(
                    "experiment",
                    "device counts must form a non-empty positive range with positive step",
                ));
            }
        }
        Ok(())
    }

    fn validate_task_types(&self) -> Result<(), ConfigError> {
        if self.task_types.is_empty() {
            return Err(ConfigError::invalid("task_types", "at least one task type is required"));
        }
        for t in &self.task_types {
            let positive = [
                t.mean_inter_arrival,
                t.mean_input_size,
                t.mean_output_size,
                t.mean_length,
            ];
            if positive.iter().any(|v| !(*v > 0.)) || t.pes == 0 {
                return Err(ConfigError::invalid(
                    "task_types",
                    format!("task type {} has non-positive means or PE count", t.name),
                ));
            }
            if t.usage_percent < 0. || t.edge_cpu_demand < 0. || t.cloud_cpu_demand < 0. {
                return Err(ConfigError::invalid(
                    "task_types",
                    format!("task type {} has negative usage or CPU demand", t.name),
                ));
            }
        }
        let usage: f64 = self.task_types.iter().map(|t| t.usage_percent).sum();
        if (usage - 100.).abs() > 1e-6 {
            return Err(ConfigError::invalid(
                "task_types.usage_percent",
                format!("usage percentages sum to {}, expected 100", usage),
            ));
        }
        Ok(())
    }

    fn validate_links(&self) -> Result<(), ConfigError> {
        for tier in self.active_tiers() {
            let link = self.tier_links.link_for(tier);
            if !self.link_bandwidths.contains_key(&link) {
                return Err(ConfigError::MissingLink(link.to_string()));
            }
        }
        for (class, link) in &self.link_bandwidths {
            match link {
                LinkConfig::Curve {
                    latency,
                    bandwidth,
                    levels,
                    jitter,
                } => {
                    let latency = latency.build(*levels)?;
                    let bandwidth = bandwidth.build(*levels)?;
                    if !latency.is_non_decreasing() {
                        return Err(ConfigError::invalid(
                            "link_bandwidths.latency",
                            format!("{} latency must not decrease with congestion", class),
                        ));
                    }
                    if !bandwidth.is_non_increasing() || !(bandwidth.at(0) > 0.) {
                        return Err(ConfigError::invalid(
                            "link_bandwidths.bandwidth",
                            format!("{} bandwidth must be positive and must not grow with congestion", class),
                        ));
                    }
                    if *jitter < 0. {
                        return Err(ConfigError::invalid("link_bandwidths.jitter", "must be non-negative"));
                    }
                }
                LinkConfig::Queue { bandwidth, propagation } => {
                    if !(*bandwidth > 0.) || *propagation < 0. {
                        return Err(ConfigError::invalid(
                            "link_bandwidths",
                            format!("{} queue needs positive bandwidth and non-negative propagation", class),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scenario, Scenario::TwoTierWithEo);
        assert_eq!(config.link_bandwidths.len(), 3);
    }

    #[test]
    fn parse_yaml() {
        let config = SimulationConfig::from_yaml(
            r#"
seed: 7
device_count: 40
scenario: SINGLE_TIER
offload_policy: HYBRID
placement_policy: WORST_FIT
arrival_model:
  type: fixed_interval
  interval: 2.5
tier_links:
  edge: man
link_bandwidths:
  man:
    model: queue
    bandwidth: 1.0e9
    propagation: 0.01
task_types:
  - name: camera
    usage_percent: 60
    mean_inter_arrival: 2
    mean_input_size: 100000
    mean_output_size: 1000
    mean_length: 500
    edge_cpu_demand: 10
    cloud_cpu_demand: 2
  - name: sensor
    usage_percent: 40
    mean_inter_arrival: 10
    mean_input_size: 1000
    mean_output_size: 100
    mean_length: 50
    edge_cpu_demand: 1
    cloud_cpu_demand: 1
"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.device_count, 40);
        assert_eq!(config.scenario, Scenario::SingleTier);
        assert_eq!(config.offload_policy, TierPolicy::Hybrid);
        assert_eq!(config.placement_policy, PlacementPolicyKind::WorstFit);
        assert_eq!(config.arrival_model, ArrivalModel::FixedInterval { interval: 2.5 });
        assert_eq!(config.tier_links.link_for(Tier::Edge), LinkClass::Man);
        assert_eq!(config.task_types[0].pes, 1);
        assert_eq!(config.simulation_time, 600.);
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(matches!(
            SimulationConfig::from_yaml("scenario: THREE_TIER"),
            Err(ConfigError::UnknownScenario(_))
        ));
        assert!(matches!(
            SimulationConfig::from_yaml("offload_policy: RANDOM"),
            Err(ConfigError::UnknownTierPolicy(_))
        ));
        assert!(matches!(
            SimulationConfig::from_yaml("placement_policy: NEXT_FIT"),
            Err(ConfigError::UnknownPlacementPolicy(_))
        ));
        assert!(matches!(
            SimulationConfig::from_yaml("tier_links:\n  cloud: gsm"),
            Err(ConfigError::UnknownLinkClass(_))
        ));
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(SimulationConfig::from_yaml("device_count: 0").is_err());
        assert!(SimulationConfig::from_yaml("access_point_count: 2\nmobility:\n  type: single_access_point\n  access_point: 2").is_err());
        assert!(SimulationConfig::from_yaml("task_types: []").is_err());
        assert!(SimulationConfig::from_yaml(
            "link_bandwidths:\n  lan:\n    model: queue\n    bandwidth: 1.0e9"
        )
        .is_err());
        assert!(SimulationConfig::from_yaml("seed: [1, 2").is_err());
        assert!(matches!(
            SimulationConfig::from_file("/nonexistent/config.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
