use std::collections::BTreeMap;

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64;

use crate::congestion::{CongestionTracker, LinkClass};
use crate::mobility::AccessPointId;
use crate::network::curve::DelayCurve;
use crate::network::queue::{mm1_delay, QueueDelay, QueueModelState};
use crate::task::Leg;

/// Single transfer for which a delay is requested.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransferRequest {
    pub link: LinkClass,
    pub access_point: AccessPointId,
    /// Payload size in bytes.
    pub size: u64,
    pub leg: Leg,
}

/// Computes transfer delays for one link class.
///
/// A zero delay means that the transfer can't be performed over the link right now.
pub trait DelayStrategy {
    /// Expected delay without random jitter and without side effects.
    fn estimate(&self, request: &TransferRequest, congestion: &CongestionTracker) -> f64;

    /// Delay of an actual transfer.
    fn delay(&mut self, request: &TransferRequest, congestion: &CongestionTracker, _rng: &mut dyn RngCore) -> f64 {
        self.estimate(request, congestion)
    }

    /// Recomputes internal parameters from the traffic observed since the previous call.
    fn refresh(&mut self, _now: f64) {}

    /// Whether the strategy has parameters updated by [`refresh`](DelayStrategy::refresh).
    fn is_adaptive(&self) -> bool {
        false
    }
}

/// Link with latency and bandwidth depending on the number of concurrent transfers.
#[derive(Clone, Debug)]
pub struct CurveDelayStrategy {
    /// Base latency in seconds per congestion level.
    latency: DelayCurve,
    /// Effective bandwidth in bits/s per congestion level.
    bandwidth: DelayCurve,
    /// Half-width of the uniform jitter window in seconds.
    jitter: f64,
}

impl CurveDelayStrategy {
    pub fn new(latency: DelayCurve, bandwidth: DelayCurve, jitter: f64) -> Self {
        Self {
            latency,
            bandwidth,
            jitter: jitter.max(0.),
        }
    }

    fn transmission_time(&self, size: u64, level: u32) -> Option<f64> {
        let bandwidth = self.bandwidth.at(level);
        if bandwidth <= 0. {
            return None;
        }
        Some(size as f64 * 8. / bandwidth)
    }
}

impl DelayStrategy for CurveDelayStrategy {
    fn estimate(&self, request: &TransferRequest, congestion: &CongestionTracker) -> f64 {
        let level = congestion.load(request.access_point, request.link);
        match self.transmission_time(request.size, level) {
            Some(transmission) => self.latency.at(level) + transmission,
            None => 0.,
        }
    }

    fn delay(&mut self, request: &TransferRequest, congestion: &CongestionTracker, rng: &mut dyn RngCore) -> f64 {
        let level = congestion.load(request.access_point, request.link);
        let Some(transmission) = self.transmission_time(request.size, level) else {
            return 0.;
        };
        let mut delay = self.latency.at(level) + transmission;
        if self.jitter > 0. {
            delay += rng.gen_range(-self.jitter..=self.jitter);
        }
        // jitter never turns a usable link into the rejection sentinel
        delay.max(transmission)
    }
}

/// Shared backbone link modelled as an M/M/1 queue.
#[derive(Clone, Debug)]
pub struct QueueDelayStrategy {
    /// Propagation delay in seconds.
    propagation: f64,
    /// Link bandwidth in bits/s.
    bandwidth: f64,
    device_count: u32,
    state: QueueModelState,
}

impl QueueDelayStrategy {
    pub fn new(propagation: f64, bandwidth: f64, device_count: u32, state: QueueModelState) -> Self {
        Self {
            propagation,
            bandwidth,
            device_count,
            state,
        }
    }

    /// Delay for the leg together with the reason of a zero result.
    pub fn queue_delay(&self, leg: Leg) -> QueueDelay {
        let estimate = self.state.estimate(leg);
        mm1_delay(
            self.propagation,
            self.bandwidth,
            estimate.mean_inter_arrival,
            estimate.mean_task_size * 8.,
            self.device_count,
        )
    }

    pub fn state(&self) -> &QueueModelState {
        &self.state
    }
}

impl DelayStrategy for QueueDelayStrategy {
    fn estimate(&self, request: &TransferRequest, _congestion: &CongestionTracker) -> f64 {
        self.queue_delay(request.leg).seconds()
    }

    fn delay(&mut self, request: &TransferRequest, _congestion: &CongestionTracker, _rng: &mut dyn RngCore) -> f64 {
        let result = self.queue_delay(request.leg);
        self.state.observe(request.leg, request.size);
        if !matches!(result, QueueDelay::Delay(_)) {
            log::debug!("Backbone {} delay is unusable: {:?}", request.leg, result);
        }
        result.seconds()
    }

    fn refresh(&mut self, now: f64) {
        self.state.refresh(now, self.device_count);
    }

    fn is_adaptive(&self) -> bool {
        true
    }
}

/// Network delay model with a pluggable strategy per link class.
pub struct NetworkModel {
    strategies: BTreeMap<LinkClass, Box<dyn DelayStrategy>>,
    rand: Pcg64,
}

impl NetworkModel {
    pub fn new(seed: u64) -> Self {
        Self {
            strategies: BTreeMap::new(),
            rand: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn set_strategy(&mut self, link: LinkClass, strategy: Box<dyn DelayStrategy>) {
        self.strategies.insert(link, strategy);
    }

    pub fn has_link(&self, link: LinkClass) -> bool {
        self.strategies.contains_key(&link)
    }

    /// Delay of an actual transfer, zero if the transfer can't be performed.
    pub fn transfer_delay(&mut self, request: &TransferRequest, congestion: &CongestionTracker) -> f64 {
        match self.strategies.get_mut(&request.link) {
            Some(strategy) => strategy.delay(request, congestion, &mut self.rand),
            None => {
                log::error!("No delay strategy for link {}", request.link);
                0.
            }
        }
    }

    /// Expected delay of a transfer, used for probing without affecting the model state.
    pub fn estimate_delay(&self, request: &TransferRequest, congestion: &CongestionTracker) -> f64 {
        self.strategies
            .get(&request.link)
            .map_or(0., |strategy| strategy.estimate(request, congestion))
    }

    pub fn refresh(&mut self, now: f64) {
        for strategy in self.strategies.values_mut() {
            strategy.refresh(now);
        }
    }

    pub fn is_adaptive(&self) -> bool {
        self.strategies.values().any(|s| s.is_adaptive())
    }
}
