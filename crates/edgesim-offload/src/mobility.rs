//! Device locations over time.

use crate::error::ConfigError;
use crate::task::DeviceId;

pub type AccessPointId = u32;

/// Source of the access point a device is attached to at a given moment.
pub trait LocationProvider {
    /// Returns the access point of `device` at `time` or [`ConfigError::MissingLocation`] if it is unknown.
    fn location_of(&self, device: DeviceId, time: f64) -> Result<AccessPointId, ConfigError>;
}

/// Nomadic mobility: each device stays attached to an access point until its next placement time.
///
/// Lookups return the latest placement at or before the requested time.
#[derive(Clone, Debug, Default)]
pub struct NomadicMobility {
    timelines: Vec<Vec<(f64, AccessPointId)>>,
}

impl NomadicMobility {
    pub fn new(device_count: u32) -> Self {
        Self {
            timelines: vec![Vec::new(); device_count as usize],
        }
    }

    /// All devices are attached to the same access point for the whole simulation.
    pub fn single_access_point(device_count: u32, access_point: AccessPointId) -> Self {
        let mut mobility = Self::new(device_count);
        for device in 0..device_count {
            mobility.add_placement(device, 0., access_point);
        }
        mobility
    }

    /// Devices are spread over access points in round-robin order and never move.
    pub fn round_robin(device_count: u32, access_point_count: u32) -> Self {
        let mut mobility = Self::new(device_count);
        for device in 0..device_count {
            mobility.add_placement(device, 0., device % access_point_count.max(1));
        }
        mobility
    }

    /// Attaches `device` to `access_point` starting from `time`.
    pub fn add_placement(&mut self, device: DeviceId, time: f64, access_point: AccessPointId) {
        let idx = device as usize;
        if idx >= self.timelines.len() {
            self.timelines.resize(idx + 1, Vec::new());
        }
        let timeline = &mut self.timelines[idx];
        let pos = timeline.partition_point(|(t, _)| *t <= time);
        timeline.insert(pos, (time, access_point));
    }

    pub fn access_points(&self) -> impl Iterator<Item = AccessPointId> + '_ {
        self.timelines.iter().flatten().map(|(_, ap)| *ap)
    }
}

impl LocationProvider for NomadicMobility {
    fn location_of(&self, device: DeviceId, time: f64) -> Result<AccessPointId, ConfigError> {
        let missing = || ConfigError::MissingLocation { device, time };
        let timeline = self.timelines.get(device as usize).ok_or_else(missing)?;
        let pos = timeline.partition_point(|(t, _)| *t <= time);
        if pos == 0 {
            return Err(missing());
        }
        Ok(timeline[pos - 1].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_lookup() {
        let mut mobility = NomadicMobility::new(1);
        mobility.add_placement(0, 10., 2);
        mobility.add_placement(0, 0., 1);
        assert_eq!(mobility.location_of(0, 0.).unwrap(), 1);
        assert_eq!(mobility.location_of(0, 9.99).unwrap(), 1);
        assert_eq!(mobility.location_of(0, 10.).unwrap(), 2);
        assert_eq!(mobility.location_of(0, 1e6).unwrap(), 2);
    }

    #[test]
    fn missing_location_is_error() {
        let mut mobility = NomadicMobility::new(2);
        mobility.add_placement(0, 5., 0);
        assert!(matches!(
            mobility.location_of(0, 1.),
            Err(ConfigError::MissingLocation { device: 0, .. })
        ));
        assert!(mobility.location_of(1, 1.).is_err());
        assert!(mobility.location_of(7, 1.).is_err());
    }

    #[test]
    fn round_robin_placement() {
        let mobility = NomadicMobility::round_robin(5, 2);
        let locations: Vec<_> = (0..5).map(|d| mobility.location_of(d, 3.).unwrap()).collect();
        assert_eq!(locations, vec![0, 1, 0, 1, 0]);
    }
}
