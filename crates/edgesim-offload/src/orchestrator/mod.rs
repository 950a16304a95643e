//! Offload orchestrator: selects a tier and then a VM for each task.

pub mod placement;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::config::{SimulationConfig, TierLinks};
use crate::congestion::CongestionTracker;
use crate::error::ConfigError;
use crate::infrastructure::{CapacityView, VmView};
use crate::mobility::AccessPointId;
use crate::network::model::{NetworkModel, TransferRequest};
use crate::task::{Leg, TaskRequest, Tier};
use placement::{placement_policy_resolver, VmPlacementPolicy};

/// Size of the payload used to probe the bandwidth to the remote tier, bytes.
pub const BANDWIDTH_PROBE_SIZE: u64 = 128 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// All tasks go to the edge tier.
    SingleTier,
    /// Edge orchestrator chooses between the edge and the cloud.
    TwoTierWithEo,
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SINGLE_TIER" => Ok(Self::SingleTier),
            "TWO_TIER_WITH_EO" => Ok(Self::TwoTierWithEo),
            _ => Err(ConfigError::UnknownScenario(s.to_string())),
        }
    }
}

impl Display for Scenario {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleTier => write!(f, "SINGLE_TIER"),
            Self::TwoTierWithEo => write!(f, "TWO_TIER_WITH_EO"),
        }
    }
}

/// Rule for choosing between the edge and the cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TierPolicy {
    /// Cloud if the probed bandwidth to it exceeds the threshold.
    NetworkBased,
    /// Cloud if the average edge utilization exceeds the threshold.
    UtilizationBased,
    /// Cloud if both conditions hold.
    Hybrid,
}

impl FromStr for TierPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NETWORK_BASED" => Ok(Self::NetworkBased),
            "UTILIZATION_BASED" => Ok(Self::UtilizationBased),
            "HYBRID" => Ok(Self::Hybrid),
            _ => Err(ConfigError::UnknownTierPolicy(s.to_string())),
        }
    }
}

impl Display for TierPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkBased => write!(f, "NETWORK_BASED"),
            Self::UtilizationBased => write!(f, "UTILIZATION_BASED"),
            Self::Hybrid => write!(f, "HYBRID"),
        }
    }
}

/// Progress of the offloading decision for a single task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OffloadDecision {
    Created,
    DeviceSelected(Tier),
    VmSelected(Tier, VmView),
    Rejected(Tier),
}

/// Shared state the orchestrator reads while deciding.
pub struct DecisionContext<'a> {
    pub access_point: AccessPointId,
    pub network: &'a NetworkModel,
    pub congestion: &'a CongestionTracker,
    pub capacity: &'a dyn CapacityView,
}

pub struct EdgeOrchestrator {
    scenario: Scenario,
    tier_policy: TierPolicy,
    bandwidth_threshold_mbps: f64,
    utilization_threshold_percent: f64,
    tier_links: TierLinks,
    placement: Box<dyn VmPlacementPolicy>,
}

impl EdgeOrchestrator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            scenario: config.scenario,
            tier_policy: config.offload_policy,
            bandwidth_threshold_mbps: config.bandwidth_threshold_mbps,
            utilization_threshold_percent: config.utilization_threshold_percent,
            tier_links: config.tier_links,
            placement: placement_policy_resolver(config.placement_policy, config.seed.wrapping_add(2)),
        }
    }

    pub fn tier_links(&self) -> &TierLinks {
        &self.tier_links
    }

    /// Effective bandwidth to the cloud in Mbps estimated from the delay of a reference payload.
    pub fn probe_bandwidth(&self, ctx: &DecisionContext) -> f64 {
        let request = TransferRequest {
            link: self.tier_links.link_for(Tier::Cloud),
            access_point: ctx.access_point,
            size: BANDWIDTH_PROBE_SIZE,
            leg: Leg::Upload,
        };
        let delay = ctx.network.estimate_delay(&request, ctx.congestion);
        if delay <= 0. {
            return 0.;
        }
        BANDWIDTH_PROBE_SIZE as f64 * 8. / delay / 1e6
    }

    pub fn select_tier(&self, ctx: &DecisionContext) -> Tier {
        if self.scenario == Scenario::SingleTier {
            return Tier::Edge;
        }
        let network_ok = || self.probe_bandwidth(ctx) > self.bandwidth_threshold_mbps;
        let edge_busy = || ctx.capacity.average_utilization(Tier::Edge) > self.utilization_threshold_percent;
        let offload = match self.tier_policy {
            TierPolicy::NetworkBased => network_ok(),
            TierPolicy::UtilizationBased => edge_busy(),
            TierPolicy::Hybrid => network_ok() && edge_busy(),
        };
        if offload {
            Tier::Cloud
        } else {
            Tier::Edge
        }
    }

    pub fn select_vm(&mut self, task: &TaskRequest, tier: Tier, capacity: &dyn CapacityView) -> Option<VmView> {
        let required_capacity = capacity.predicted_cpu_demand(task, tier);
        let mut candidates = capacity.enumerate_vms(tier).into_iter().map(|vm| VmView {
            vm,
            required_capacity,
            available_capacity: 100. - capacity.current_cpu_utilization(vm.vm_id),
        });
        self.placement.select_vm(&mut candidates)
    }

    /// Runs both decision stages for a task.
    pub fn decide(&mut self, task: &TaskRequest, ctx: &DecisionContext) -> OffloadDecision {
        let mut decision = OffloadDecision::Created;
        loop {
            decision = match decision {
                OffloadDecision::Created => OffloadDecision::DeviceSelected(self.select_tier(ctx)),
                OffloadDecision::DeviceSelected(tier) => match self.select_vm(task, tier, ctx.capacity) {
                    Some(vm) => OffloadDecision::VmSelected(tier, vm),
                    None => OffloadDecision::Rejected(tier),
                },
                _ => return decision,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::EdgeInfrastructure;
    use crate::network::build_network_model;
    use crate::orchestrator::placement::PlacementPolicyKind;

    fn request() -> TaskRequest {
        TaskRequest {
            id: 0,
            device_id: 0,
            task_type: 0,
            arrival_time: 0.,
            length: 1000,
            pes: 1,
            input_size: 1000,
            output_size: 100,
        }
    }

    fn setup(config: &SimulationConfig) -> (EdgeOrchestrator, NetworkModel, CongestionTracker, EdgeInfrastructure) {
        let mut infra = EdgeInfrastructure::new(&config.task_types);
        infra.add_host(Tier::Edge, 2, 1000.);
        infra.add_host(Tier::Cloud, 2, 10000.);
        (
            EdgeOrchestrator::new(config),
            build_network_model(config).unwrap(),
            CongestionTracker::new(1),
            infra,
        )
    }

    #[test]
    fn single_tier_always_edge() {
        let config = SimulationConfig {
            scenario: Scenario::SingleTier,
            bandwidth_threshold_mbps: 0.,
            ..Default::default()
        };
        let (orchestrator, network, congestion, infra) = setup(&config);
        let ctx = DecisionContext {
            access_point: 0,
            network: &network,
            congestion: &congestion,
            capacity: &infra,
        };
        assert_eq!(orchestrator.select_tier(&ctx), Tier::Edge);
    }

    #[test]
    fn network_based_uses_threshold() {
        let mut config = SimulationConfig::default();
        let (orchestrator, network, congestion, infra) = setup(&config);
        let ctx = DecisionContext {
            access_point: 0,
            network: &network,
            congestion: &congestion,
            capacity: &infra,
        };
        let bandwidth = orchestrator.probe_bandwidth(&ctx);
        assert!(bandwidth > 20.);
        assert_eq!(orchestrator.select_tier(&ctx), Tier::Cloud);

        config.bandwidth_threshold_mbps = bandwidth + 1.;
        let orchestrator = EdgeOrchestrator::new(&config);
        assert_eq!(orchestrator.select_tier(&ctx), Tier::Edge);
    }

    #[test]
    fn utilization_and_hybrid_policies() {
        let mut config = SimulationConfig {
            offload_policy: TierPolicy::UtilizationBased,
            ..Default::default()
        };
        let (orchestrator, network, congestion, mut infra) = setup(&config);
        infra.set_utilization(0, 90.);
        infra.set_utilization(1, 60.);
        let ctx = DecisionContext {
            access_point: 0,
            network: &network,
            congestion: &congestion,
            capacity: &infra,
        };
        assert_eq!(orchestrator.select_tier(&ctx), Tier::Edge);

        config.utilization_threshold_percent = 70.;
        assert_eq!(EdgeOrchestrator::new(&config).select_tier(&ctx), Tier::Cloud);

        config.offload_policy = TierPolicy::Hybrid;
        assert_eq!(EdgeOrchestrator::new(&config).select_tier(&ctx), Tier::Cloud);
        config.bandwidth_threshold_mbps = 1e12;
        assert_eq!(EdgeOrchestrator::new(&config).select_tier(&ctx), Tier::Edge);
    }

    #[test]
    fn decision_states() {
        let config = SimulationConfig {
            scenario: Scenario::SingleTier,
            placement_policy: PlacementPolicyKind::FirstFit,
            ..Default::default()
        };
        let (mut orchestrator, network, congestion, mut infra) = setup(&config);
        let decision = {
            let ctx = DecisionContext {
                access_point: 0,
                network: &network,
                congestion: &congestion,
                capacity: &infra,
            };
            orchestrator.decide(&request(), &ctx)
        };
        match decision {
            OffloadDecision::VmSelected(Tier::Edge, vm) => {
                assert_eq!(vm.vm.vm_id, 0);
                assert_eq!(vm.required_capacity, 20.);
                assert_eq!(vm.available_capacity, 100.);
            }
            other => panic!("unexpected decision {:?}", other),
        }

        infra.set_utilization(0, 100.);
        infra.set_utilization(1, 85.);
        let ctx = DecisionContext {
            access_point: 0,
            network: &network,
            congestion: &congestion,
            capacity: &infra,
        };
        assert_eq!(orchestrator.decide(&request(), &ctx), OffloadDecision::Rejected(Tier::Edge));
    }

    #[test]
    fn parse_names() {
        assert_eq!("TWO_TIER_WITH_EO".parse::<Scenario>().unwrap(), Scenario::TwoTierWithEo);
        assert_eq!("HYBRID".parse::<TierPolicy>().unwrap(), TierPolicy::Hybrid);
        assert!("FOUR_TIER".parse::<Scenario>().is_err());
        assert_eq!(TierPolicy::UtilizationBased.to_string(), "UTILIZATION_BASED");
    }
}
