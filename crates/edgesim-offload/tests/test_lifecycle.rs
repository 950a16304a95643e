use std::collections::BTreeMap;

use edgesim_core::Simulation;
use edgesim_offload::config::{CurveConfig, LinkConfig, SimulationConfig};
use edgesim_offload::congestion::{LinkClass, TransferCounts};
use edgesim_offload::error::ConfigError;
use edgesim_offload::infrastructure::EdgeInfrastructure;
use edgesim_offload::mobility::NomadicMobility;
use edgesim_offload::orchestrator::{Scenario, TierPolicy};
use edgesim_offload::stats::TaskStatus;
use edgesim_offload::task::{Leg, TaskRequest, Tier};
use edgesim_offload::EdgeSimulation;

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!((x - y).abs() < eps, "Values do not match: {:.15} vs {:.15}", x, y);
}

fn request(id: u64, device_id: u32, arrival_time: f64, input_size: u64) -> TaskRequest {
    TaskRequest {
        id,
        device_id,
        task_type: 0,
        arrival_time,
        length: 1000,
        pes: 1,
        input_size,
        output_size: 1000,
    }
}

/// LAN with 1 Mbps for a single transfer and no bandwidth for concurrent ones.
fn exclusive_lan_config(device_count: u32) -> SimulationConfig {
    let mut links = BTreeMap::new();
    links.insert(
        LinkClass::Lan,
        LinkConfig::Curve {
            latency: CurveConfig::Constant { value: 0. },
            bandwidth: CurveConfig::Table { values: vec![1e6, 0.] },
            levels: 2,
            jitter: 0.,
        },
    );
    SimulationConfig {
        device_count,
        scenario: Scenario::SingleTier,
        link_bandwidths: links,
        ..Default::default()
    }
}

#[test]
fn single_task_completes() {
    let config = SimulationConfig {
        device_count: 1,
        scenario: Scenario::SingleTier,
        ..Default::default()
    };
    let mut sim = EdgeSimulation::new(Simulation::new(), config).unwrap();
    sim.load_workload(vec![request(0, 0, 1., 50_000)]);
    let stats = sim.run().unwrap();

    let records = sim.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.tier, Some(Tier::Edge));
    assert!(record.upload_delay.unwrap() > 0.);
    assert!(record.download_delay.unwrap() > 0.);
    assert_eq!(record.upload_link, Some(LinkClass::Lan));

    let congestion = sim.congestion();
    assert_eq!(
        congestion.transfer_counts(LinkClass::Lan),
        TransferCounts {
            started: 2,
            finished: 2
        }
    );
    assert_eq!(congestion.total_active(), 0);
    assert_eq!(sim.executed_tasks(), 1);
    assert_eq!(stats.total.counts.completed, 1);
    assert_eq!(sim.infrastructure().borrow().vm(0).unwrap().utilization, 0.);
}

#[test]
fn busy_edge_and_unreachable_cloud_rejects_capacity() {
    let config = SimulationConfig {
        device_count: 1,
        scenario: Scenario::TwoTierWithEo,
        offload_policy: TierPolicy::UtilizationBased,
        cloud_hosts: Vec::new(),
        ..Default::default()
    };
    let mut sim = EdgeSimulation::new(Simulation::new(), config).unwrap();
    {
        let infrastructure = sim.infrastructure();
        let mut infrastructure = infrastructure.borrow_mut();
        for vm in 0..infrastructure.vm_count(Tier::Edge) as u32 {
            infrastructure.set_utilization(vm, 100.);
        }
    }
    sim.load_workload(vec![request(0, 0, 1., 50_000)]);
    let stats = sim.run().unwrap();

    let records = sim.records();
    let record = &records[0];
    assert_eq!(record.status, TaskStatus::RejectedCapacity);
    assert_eq!(record.tier, Some(Tier::Cloud));
    assert_eq!(stats.total.counts.rejected_capacity, 1);
    for link in LinkClass::ALL {
        assert_eq!(sim.congestion().transfer_counts(link).started, 0);
    }
    assert_eq!(sim.executed_tasks(), 0);
}

#[test]
fn concurrent_upload_rejected_for_bandwidth() {
    let mut sim = EdgeSimulation::new(Simulation::new(), exclusive_lan_config(2)).unwrap();
    sim.load_workload(vec![request(0, 0, 1., 1000), request(1, 1, 1., 1000)]);
    let stats = sim.run().unwrap();

    let records = sim.records();
    assert_eq!(records[0].status, TaskStatus::Completed);
    assert_float_eq(records[0].upload_delay.unwrap(), 0.008, 1e-12);
    assert_eq!(records[1].status, TaskStatus::RejectedBandwidth);
    assert_eq!(records[1].failed_leg, Some(Leg::Upload));
    assert_eq!(stats.total.counts.rejected_bandwidth_upload, 1);
    assert_eq!(stats.late_failures(), 0);
    assert_eq!(sim.executed_tasks(), 1);
}

#[test]
fn download_rejection_is_late_failure() {
    let mut sim = EdgeSimulation::new(Simulation::new(), exclusive_lan_config(2)).unwrap();
    // the second upload occupies the link while the first task executes
    sim.load_workload(vec![request(0, 0, 0., 1000), request(1, 1, 0.009, 10_000_000)]);
    let stats = sim.run().unwrap();

    let records = sim.records();
    assert_eq!(records[0].status, TaskStatus::RejectedBandwidth);
    assert_eq!(records[0].failed_leg, Some(Leg::Download));
    assert!(records[0].execution_finish_time.is_some());
    assert_eq!(records[1].status, TaskStatus::Completed);
    assert_float_eq(records[1].upload_delay.unwrap(), 80., 1e-9);
    assert_eq!(stats.late_failures(), 1);
    assert_eq!(stats.total.counts.rejected_bandwidth_upload, 0);
    assert_eq!(sim.executed_tasks(), 2);
    assert_eq!(
        sim.congestion().transfer_counts(LinkClass::Lan),
        TransferCounts {
            started: 3,
            finished: 3
        }
    );
}

#[test]
fn missing_location_stops_run() {
    let config = SimulationConfig {
        device_count: 1,
        scenario: Scenario::SingleTier,
        ..Default::default()
    };
    let infrastructure = EdgeInfrastructure::from_config(&config.task_types, &config.edge_hosts, &config.cloud_hosts);
    let mut mobility = NomadicMobility::new(1);
    mobility.add_placement(0, 100., 0);
    let mut sim =
        EdgeSimulation::with_components(Simulation::new(), config, infrastructure, Box::new(mobility)).unwrap();
    sim.load_workload(vec![request(0, 0, 1., 1000), request(1, 0, 150., 1000)]);
    let result = sim.run();
    assert!(matches!(result, Err(ConfigError::MissingLocation { device: 0, .. })));
    assert_float_eq(sim.current_time(), 1., 1e-12);
}

#[test]
fn generated_workload_runs_to_completion() {
    let config = SimulationConfig {
        device_count: 5,
        simulation_time: 120.,
        warm_up_period: 10.,
        ..Default::default()
    };
    let mut sim = EdgeSimulation::new(Simulation::new(), config).unwrap();
    let stats = sim.run().unwrap();
    assert!(stats.total.counts.submitted > 0);
    assert_eq!(stats.total.counts.unfinished, 0);
    assert_eq!(sim.congestion().total_active(), 0);
    assert_eq!(sim.coordinator().borrow().active_tasks(), 0);
    let after_warm_up = sim.records().iter().filter(|r| r.submit_time >= 10.).count();
    assert_eq!(stats.total.counts.submitted as usize, after_warm_up);
}
