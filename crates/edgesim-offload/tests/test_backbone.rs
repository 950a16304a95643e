use std::collections::BTreeMap;

use edgesim_core::Simulation;
use edgesim_offload::config::{ArrivalModel, LinkConfig, SimulationConfig, TierLinks};
use edgesim_offload::congestion::LinkClass;
use edgesim_offload::orchestrator::Scenario;
use edgesim_offload::stats::TaskStatus;
use edgesim_offload::task::Leg;
use edgesim_offload::EdgeSimulation;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn backbone_config(bandwidth: f64) -> SimulationConfig {
    let mut links = BTreeMap::new();
    links.insert(
        LinkClass::Man,
        LinkConfig::Queue {
            bandwidth,
            propagation: 0.005,
        },
    );
    SimulationConfig {
        device_count: 5,
        simulation_time: 60.,
        scenario: Scenario::SingleTier,
        arrival_model: ArrivalModel::FixedInterval { interval: 10. },
        tier_links: TierLinks {
            edge: LinkClass::Man,
            cloud: LinkClass::Wan,
        },
        link_bandwidths: links,
        ..Default::default()
    }
}

#[test]
fn stable_backbone_delivers_tasks() {
    init_logger();
    let mut sim = EdgeSimulation::new(Simulation::new(), backbone_config(1.3312e9)).unwrap();
    let stats = sim.run().unwrap();
    assert_eq!(stats.total.counts.submitted, 30);
    assert_eq!(stats.total.counts.completed, 30);
    for record in sim.records() {
        assert_eq!(record.upload_link, Some(LinkClass::Man));
        assert!(record.upload_delay.unwrap() > 0.005);
        assert!(record.download_delay.unwrap() > 0.005);
    }
    let counts = sim.congestion().transfer_counts(LinkClass::Man);
    assert_eq!(counts.started, 60);
    assert_eq!(counts.finished, 60);
}

#[test]
fn overloaded_backbone_rejects_uploads() {
    init_logger();
    let mut sim = EdgeSimulation::new(Simulation::new(), backbone_config(1000.)).unwrap();
    let stats = sim.run().unwrap();
    assert_eq!(stats.total.counts.rejected_bandwidth_upload, 30);
    assert_eq!(stats.total.counts.completed, 0);
    assert!(sim
        .records()
        .iter()
        .all(|r| r.status == TaskStatus::RejectedBandwidth && r.failed_leg == Some(Leg::Upload)));
    assert_eq!(sim.executed_tasks(), 0);
}
