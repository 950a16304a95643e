//! Hosts and VMs of the edge and cloud tiers.

use serde::Serialize;

use crate::config::{HostConfig, TaskTypeConfig};
use crate::task::{TaskRequest, Tier};

pub type HostId = u32;
pub type VmId = u32;

/// Identifies a VM visible to the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VmRef {
    pub tier: Tier,
    pub host_id: HostId,
    pub vm_id: VmId,
}

/// Orchestrator's read-only view of a candidate VM for a particular task.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VmView {
    pub vm: VmRef,
    /// Predicted CPU demand of the task on this VM, percent.
    pub required_capacity: f64,
    /// `100 - current utilization`, percent.
    pub available_capacity: f64,
}

impl VmView {
    pub fn is_eligible(&self) -> bool {
        self.required_capacity <= self.available_capacity
    }
}

/// VM/host capacity view used by the orchestrator.
pub trait CapacityView {
    /// Predicted CPU demand of the task on a VM of the given tier, percent.
    fn predicted_cpu_demand(&self, task: &TaskRequest, tier: Tier) -> f64;

    fn current_cpu_utilization(&self, vm: VmId) -> f64;

    /// VMs of the tier in host-major, VM-minor order.
    fn enumerate_vms(&self, tier: Tier) -> Vec<VmRef>;

    /// Mean utilization over all VMs of the tier, zero for an empty tier.
    fn average_utilization(&self, tier: Tier) -> f64 {
        let vms = self.enumerate_vms(tier);
        if vms.is_empty() {
            return 0.;
        }
        vms.iter().map(|vm| self.current_cpu_utilization(vm.vm_id)).sum::<f64>() / vms.len() as f64
    }
}

#[derive(Clone, Debug)]
pub struct VirtualMachine {
    pub id: VmId,
    pub host_id: HostId,
    pub tier: Tier,
    pub mips: f64,
    /// Sum of CPU demands of running tasks, may exceed 100.
    pub utilization: f64,
    pub running_tasks: u32,
}

#[derive(Clone, Debug)]
pub struct Host {
    pub id: HostId,
    pub tier: Tier,
    pub vms: Vec<VmId>,
}

/// Hosts and VMs of both tiers with their current CPU utilization.
#[derive(Clone, Debug, Default)]
pub struct EdgeInfrastructure {
    hosts: Vec<Host>,
    vms: Vec<VirtualMachine>,
    task_types: Vec<TaskTypeConfig>,
}

impl EdgeInfrastructure {
    /// Creates empty infrastructure for tasks with the given types.
    pub fn new(task_types: &[TaskTypeConfig]) -> Self {
        Self {
            hosts: Vec::new(),
            vms: Vec::new(),
            task_types: task_types.to_vec(),
        }
    }

    pub fn from_config(task_types: &[TaskTypeConfig], edge_hosts: &[HostConfig], cloud_hosts: &[HostConfig]) -> Self {
        let mut infrastructure = Self::new(task_types);
        for (tier, hosts) in [(Tier::Edge, edge_hosts), (Tier::Cloud, cloud_hosts)] {
            for host in hosts {
                for _ in 0..host.count {
                    infrastructure.add_host(tier, host.vms, host.mips);
                }
            }
        }
        infrastructure
    }

    /// Adds host with `vm_count` identical VMs.
    pub fn add_host(&mut self, tier: Tier, vm_count: u32, mips: f64) -> HostId {
        let host_id = self.hosts.len() as HostId;
        let mut host = Host {
            id: host_id,
            tier,
            vms: Vec::new(),
        };
        for _ in 0..vm_count {
            let vm_id = self.vms.len() as VmId;
            self.vms.push(VirtualMachine {
                id: vm_id,
                host_id,
                tier,
                mips,
                utilization: 0.,
                running_tasks: 0,
            });
            host.vms.push(vm_id);
        }
        self.hosts.push(host);
        host_id
    }

    pub fn vm(&self, id: VmId) -> Option<&VirtualMachine> {
        self.vms.get(id as usize)
    }

    pub fn hosts(&self, tier: Tier) -> impl Iterator<Item = &Host> + '_ {
        self.hosts.iter().filter(move |h| h.tier == tier)
    }

    pub fn vm_count(&self, tier: Tier) -> usize {
        self.vms.iter().filter(|vm| vm.tier == tier).count()
    }

    /// Overrides utilization of a VM, used to model background load.
    pub fn set_utilization(&mut self, id: VmId, utilization: f64) {
        if let Some(vm) = self.vms.get_mut(id as usize) {
            vm.utilization = utilization;
        }
    }

    /// Reserves `demand` percent of VM CPU for a running task.
    pub fn allocate(&mut self, id: VmId, demand: f64) {
        if let Some(vm) = self.vms.get_mut(id as usize) {
            vm.utilization += demand;
            vm.running_tasks += 1;
        }
    }

    pub fn release(&mut self, id: VmId, demand: f64) {
        if let Some(vm) = self.vms.get_mut(id as usize) {
            vm.utilization = (vm.utilization - demand).max(0.);
            vm.running_tasks = vm.running_tasks.saturating_sub(1);
        }
    }
}

impl CapacityView for EdgeInfrastructure {
    fn predicted_cpu_demand(&self, task: &TaskRequest, tier: Tier) -> f64 {
        self.task_types
            .get(task.task_type)
            .map_or(0., |task_type| task_type.cpu_demand(tier))
    }

    fn current_cpu_utilization(&self, vm: VmId) -> f64 {
        self.vm(vm).map_or(0., |vm| vm.utilization)
    }

    fn enumerate_vms(&self, tier: Tier) -> Vec<VmRef> {
        self.hosts(tier)
            .flat_map(|host| {
                host.vms.iter().map(move |vm_id| VmRef {
                    tier,
                    host_id: host.id,
                    vm_id: *vm_id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_task_types;

    #[test]
    fn enumeration_is_host_major() {
        let mut infra = EdgeInfrastructure::new(&default_task_types());
        infra.add_host(Tier::Edge, 2, 1000.);
        infra.add_host(Tier::Cloud, 1, 5000.);
        infra.add_host(Tier::Edge, 1, 1000.);
        let edge: Vec<_> = infra.enumerate_vms(Tier::Edge).iter().map(|vm| (vm.host_id, vm.vm_id)).collect();
        assert_eq!(edge, vec![(0, 0), (0, 1), (2, 3)]);
        assert_eq!(infra.vm_count(Tier::Cloud), 1);
    }

    #[test]
    fn utilization_accounting() {
        let mut infra = EdgeInfrastructure::new(&default_task_types());
        infra.add_host(Tier::Edge, 2, 1000.);
        infra.allocate(0, 30.);
        infra.allocate(0, 80.);
        assert_eq!(infra.current_cpu_utilization(0), 110.);
        assert_eq!(infra.average_utilization(Tier::Edge), 55.);
        infra.release(0, 80.);
        assert_eq!(infra.current_cpu_utilization(0), 30.);
        assert_eq!(infra.average_utilization(Tier::Cloud), 0.);
    }
}
