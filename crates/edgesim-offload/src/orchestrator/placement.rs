//! VM placement policies.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::error::ConfigError;
use crate::infrastructure::VmView;

/// Trait for implementation of VM placement policies.
///
/// The policy receives candidate VMs of the chosen tier in host-major, VM-minor order and returns the selected VM or
/// `None` if there is no suitable VM. Candidates are produced lazily, so a policy that stops early does not evaluate
/// the remaining VMs.
pub trait VmPlacementPolicy {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView>;
}

/// Placement policy names accepted in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementPolicyKind {
    LeastLoaded,
    FirstFit,
    BestFit,
    WorstFit,
    RandomFit,
}

impl FromStr for PlacementPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEAST_LOADED" => Ok(Self::LeastLoaded),
            "FIRST_FIT" => Ok(Self::FirstFit),
            "BEST_FIT" => Ok(Self::BestFit),
            "WORST_FIT" => Ok(Self::WorstFit),
            "RANDOM_FIT" => Ok(Self::RandomFit),
            _ => Err(ConfigError::UnknownPlacementPolicy(s.to_string())),
        }
    }
}

impl Display for PlacementPolicyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LeastLoaded => "LEAST_LOADED",
            Self::FirstFit => "FIRST_FIT",
            Self::BestFit => "BEST_FIT",
            Self::WorstFit => "WORST_FIT",
            Self::RandomFit => "RANDOM_FIT",
        };
        write!(f, "{}", name)
    }
}

pub fn placement_policy_resolver(kind: PlacementPolicyKind, seed: u64) -> Box<dyn VmPlacementPolicy> {
    match kind {
        PlacementPolicyKind::LeastLoaded => Box::new(LeastLoaded::new()),
        PlacementPolicyKind::FirstFit => Box::new(FirstFit::new()),
        PlacementPolicyKind::BestFit => Box::new(BestFit::new()),
        PlacementPolicyKind::WorstFit => Box::new(WorstFit::new()),
        PlacementPolicyKind::RandomFit => Box::new(RandomFit::new(seed)),
    }
}

fn max_available(candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
    let mut result: Option<VmView> = None;
    let mut max_available_capacity = 0.;
    for vm in candidates {
        if vm.is_eligible() && vm.available_capacity > max_available_capacity {
            max_available_capacity = vm.available_capacity;
            result = Some(vm);
        }
    }
    result
}

////////////////////////////////////////////////////////////////////////////////

/// Returns the eligible VM with the most free CPU.
#[derive(Default)]
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementPolicy for LeastLoaded {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
        max_available(candidates)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Returns the first eligible VM.
#[derive(Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementPolicy for FirstFit {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
        (&mut &mut *candidates).find(|vm| vm.is_eligible())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Returns the eligible VM with the most free CPU, same as [`LeastLoaded`].
#[derive(Default)]
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementPolicy for BestFit {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
        max_available(candidates)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Returns the eligible VM with the least free CPU.
#[derive(Default)]
pub struct WorstFit;

impl WorstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementPolicy for WorstFit {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
        let mut result: Option<VmView> = None;
        let mut min_available_capacity = 9999.;
        for vm in candidates {
            if vm.is_eligible() && vm.available_capacity < min_available_capacity {
                min_available_capacity = vm.available_capacity;
                result = Some(vm);
            }
        }
        result
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Picks a random host and then a random VM on it.
///
/// Eligibility is not checked, so the selected VM may be overloaded.
pub struct RandomFit {
    rand: Pcg64,
}

impl RandomFit {
    pub fn new(seed: u64) -> Self {
        Self {
            rand: Pcg64::seed_from_u64(seed),
        }
    }
}

impl VmPlacementPolicy for RandomFit {
    fn select_vm(&mut self, candidates: &mut dyn Iterator<Item = VmView>) -> Option<VmView> {
        let mut hosts: Vec<Vec<VmView>> = Vec::new();
        for vm in candidates {
            match hosts.last_mut() {
                Some(host) if host[0].vm.host_id == vm.vm.host_id => host.push(vm),
                _ => hosts.push(vec![vm]),
            }
        }
        if hosts.is_empty() {
            return None;
        }
        let host = &hosts[self.rand.gen_range(0..hosts.len())];
        Some(host[self.rand.gen_range(0..host.len())])
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::infrastructure::VmRef;
    use crate::task::Tier;

    fn views(required: f64, available: &[(u32, f64)]) -> Vec<VmView> {
        available
            .iter()
            .enumerate()
            .map(|(i, (host_id, capacity))| VmView {
                vm: VmRef {
                    tier: Tier::Edge,
                    host_id: *host_id,
                    vm_id: i as u32,
                },
                required_capacity: required,
                available_capacity: *capacity,
            })
            .collect()
    }

    fn select(policy: &mut dyn VmPlacementPolicy, vms: &[VmView]) -> Option<u32> {
        policy.select_vm(&mut vms.iter().copied()).map(|vm| vm.vm.vm_id)
    }

    #[test]
    fn least_loaded_and_best_fit_pick_max_capacity() {
        let vms = views(20., &[(0, 10.), (0, 55.), (1, 30.)]);
        assert_eq!(select(&mut LeastLoaded::new(), &vms), Some(1));
        assert_eq!(select(&mut BestFit::new(), &vms), Some(1));
    }

    #[test]
    fn worst_fit_picks_min_eligible_capacity() {
        let vms = views(20., &[(0, 10.), (0, 55.), (1, 30.)]);
        assert_eq!(select(&mut WorstFit::new(), &vms), Some(2));
    }

    #[test]
    fn first_fit_stops_at_first_eligible() {
        let vms = views(20., &[(0, 10.), (0, 25.), (1, 90.), (1, 95.)]);
        let evaluated = Cell::new(0);
        let mut candidates = vms.iter().copied().inspect(|_| evaluated.set(evaluated.get() + 1));
        let selected = FirstFit::new().select_vm(&mut candidates);
        assert_eq!(selected.map(|vm| vm.vm.vm_id), Some(1));
        assert_eq!(evaluated.get(), 2);
    }

    #[test]
    fn full_tier_gives_no_vm() {
        let vms = views(0., &[(0, 0.), (1, 0.)]);
        assert_eq!(select(&mut LeastLoaded::new(), &vms), None);
        assert_eq!(select(&mut BestFit::new(), &vms), None);
        let vms = views(20., &[(0, 5.), (1, 19.9)]);
        assert_eq!(select(&mut WorstFit::new(), &vms), None);
        assert_eq!(select(&mut FirstFit::new(), &vms), None);
        assert_eq!(select(&mut LeastLoaded::new(), &[]), None);
    }

    #[test]
    fn random_fit_ignores_eligibility() {
        let vms = views(50., &[(0, 0.), (0, 0.), (1, 0.)]);
        let mut policy = RandomFit::new(42);
        let mut seen = [false; 3];
        for _ in 0..100 {
            let vm = select(&mut policy, &vms).unwrap();
            seen[vm as usize] = true;
        }
        assert_eq!(seen, [true, true, true]);
        assert_eq!(select(&mut policy, &[]), None);
    }

    #[test]
    fn parse_policy_names() {
        assert_eq!("RANDOM_FIT".parse::<PlacementPolicyKind>().unwrap(), PlacementPolicyKind::RandomFit);
        assert_eq!(PlacementPolicyKind::WorstFit.to_string(), "WORST_FIT");
        assert!(matches!(
            "NEXT_FIT".parse::<PlacementPolicyKind>(),
            Err(ConfigError::UnknownPlacementPolicy(_))
        ));
    }
}
