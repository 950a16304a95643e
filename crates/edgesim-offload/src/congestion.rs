//! Per-access-point counters of concurrently active transfers.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mobility::AccessPointId;

/// Class of network link a transfer goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkClass {
    /// Local link between a device and its access point (edge tier).
    Lan,
    /// Wide-area link to the cloud.
    Wan,
    /// Metropolitan backbone shared by all access points.
    Man,
}

impl LinkClass {
    pub const ALL: [LinkClass; 3] = [LinkClass::Lan, LinkClass::Wan, LinkClass::Man];

    /// Shared links are tracked by a single counter regardless of the access point.
    pub fn is_shared(&self) -> bool {
        matches!(self, LinkClass::Man)
    }

    fn index(&self) -> usize {
        match self {
            LinkClass::Lan => 0,
            LinkClass::Wan => 1,
            LinkClass::Man => 2,
        }
    }
}

impl Display for LinkClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkClass::Lan => write!(f, "lan"),
            LinkClass::Wan => write!(f, "wan"),
            LinkClass::Man => write!(f, "man"),
        }
    }
}

impl FromStr for LinkClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lan" | "wlan" => Ok(LinkClass::Lan),
            "wan" => Ok(LinkClass::Wan),
            "man" => Ok(LinkClass::Man),
            _ => Err(ConfigError::UnknownLinkClass(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct AccessPointCounters {
    active: [u32; 3],
}

/// Number of transfers started and finished on a link class, used to check that every start has its finish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransferCounts {
    pub started: u64,
    pub finished: u64,
}

/// Tracks how many transfers are active on every link of every access point.
///
/// Counters never go below zero. A `finish` without a matching `start` is reported and ignored.
#[derive(Clone, Debug, Default)]
pub struct CongestionTracker {
    access_points: BTreeMap<AccessPointId, AccessPointCounters>,
    shared: [u32; 3],
    totals: [TransferCounts; 3],
}

impl CongestionTracker {
    /// Creates tracker with zeroed counters for access points `0..access_point_count`.
    pub fn new(access_point_count: u32) -> Self {
        let mut tracker = Self::default();
        for id in 0..access_point_count {
            tracker.access_points.insert(id, AccessPointCounters::default());
        }
        tracker
    }

    fn counter_mut(&mut self, access_point: AccessPointId, link: LinkClass) -> &mut u32 {
        if link.is_shared() {
            &mut self.shared[link.index()]
        } else {
            &mut self.access_points.entry(access_point).or_default().active[link.index()]
        }
    }

    /// Registers a new transfer and returns the number of transfers that were already active on this link.
    pub fn start(&mut self, access_point: AccessPointId, link: LinkClass) -> u32 {
        self.totals[link.index()].started += 1;
        let counter = self.counter_mut(access_point, link);
        let level = *counter;
        *counter += 1;
        level
    }

    /// Unregisters a finished transfer. Returns `false` if there was no active transfer to finish.
    pub fn finish(&mut self, access_point: AccessPointId, link: LinkClass) -> bool {
        let counter = self.counter_mut(access_point, link);
        if *counter == 0 {
            log::error!(
                "Transfer finish without matching start: access point {}, link {}",
                access_point,
                link
            );
            return false;
        }
        *counter -= 1;
        self.totals[link.index()].finished += 1;
        true
    }

    /// Current number of active transfers on the link as seen from the access point.
    pub fn load(&self, access_point: AccessPointId, link: LinkClass) -> u32 {
        if link.is_shared() {
            self.shared[link.index()]
        } else {
            self.access_points
                .get(&access_point)
                .map_or(0, |ap| ap.active[link.index()])
        }
    }

    /// Sum of active transfers over all access points and shared links.
    pub fn total_active(&self) -> u32 {
        let local: u32 = self.access_points.values().flat_map(|ap| ap.active.iter()).sum();
        local + self.shared.iter().sum::<u32>()
    }

    pub fn transfer_counts(&self, link: LinkClass) -> TransferCounts {
        self.totals[link.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_returns_level_before_increment() {
        let mut tracker = CongestionTracker::new(2);
        assert_eq!(tracker.start(0, LinkClass::Lan), 0);
        assert_eq!(tracker.start(0, LinkClass::Lan), 1);
        assert_eq!(tracker.start(1, LinkClass::Lan), 0);
        assert_eq!(tracker.load(0, LinkClass::Lan), 2);
        assert_eq!(tracker.load(0, LinkClass::Wan), 0);
        assert!(tracker.finish(0, LinkClass::Lan));
        assert_eq!(tracker.load(0, LinkClass::Lan), 1);
    }

    #[test]
    fn unmatched_finish_keeps_counter_at_zero() {
        let mut tracker = CongestionTracker::new(1);
        assert!(!tracker.finish(0, LinkClass::Wan));
        assert_eq!(tracker.load(0, LinkClass::Wan), 0);
        assert_eq!(tracker.transfer_counts(LinkClass::Wan), TransferCounts::default());
    }

    #[test]
    fn shared_link_ignores_access_point() {
        let mut tracker = CongestionTracker::new(3);
        tracker.start(0, LinkClass::Man);
        assert_eq!(tracker.start(2, LinkClass::Man), 1);
        assert_eq!(tracker.load(1, LinkClass::Man), 2);
        assert!(tracker.finish(1, LinkClass::Man));
        assert_eq!(tracker.total_active(), 1);
    }

    #[test]
    fn parse_link_class() {
        assert_eq!("LAN".parse::<LinkClass>().unwrap(), LinkClass::Lan);
        assert_eq!("man".parse::<LinkClass>().unwrap(), LinkClass::Man);
        assert!("gsm".parse::<LinkClass>().is_err());
    }
}
