//! M/M/1 model of a shared backbone link.

use std::cmp::Ordering;

use serde::Serialize;

use crate::task::Leg;

/// Delays above this value mean the link is practically unusable.
pub const QUEUE_DELAY_CEILING: f64 = 15.;

/// Outcome of the M/M/1 delay formula.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum QueueDelay {
    Delay(f64),
    /// Arrival rate is not below the service rate.
    Unstable,
    /// Queue is stable but the expected delay exceeds [`QUEUE_DELAY_CEILING`].
    AboveCeiling,
}

impl QueueDelay {
    /// Delay in seconds, zero for both failure causes.
    pub fn seconds(&self) -> f64 {
        match self {
            QueueDelay::Delay(delay) => *delay,
            _ => 0.,
        }
    }
}

/// Expected M/M/1 sojourn time plus propagation delay.
///
/// `bandwidth` is in bits/s, `mean_task_size` in bits. The arrival rate is `device_count / mean_inter_arrival`.
pub fn mm1_delay(
    propagation: f64,
    bandwidth: f64,
    mean_inter_arrival: f64,
    mean_task_size: f64,
    device_count: u32,
) -> QueueDelay {
    let mu = bandwidth / mean_task_size;
    let lambda = device_count as f64 / mean_inter_arrival;
    if mu.partial_cmp(&lambda) != Some(Ordering::Greater) || !mu.is_finite() {
        return QueueDelay::Unstable;
    }
    let delay = 1. / (mu - lambda) + propagation;
    if delay > QUEUE_DELAY_CEILING {
        QueueDelay::AboveCeiling
    } else {
        QueueDelay::Delay(delay)
    }
}

/// Traffic estimate for one direction of the link.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrafficEstimate {
    /// Mean time between two tasks of a single device, seconds.
    pub mean_inter_arrival: f64,
    /// Mean transferred size, bytes.
    pub mean_task_size: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Observations {
    count: u64,
    total_size: f64,
}

/// Traffic estimates for both directions of the backbone, refreshed from observed transfers.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueModelState {
    upload: TrafficEstimate,
    download: TrafficEstimate,
    observed_upload: Observations,
    observed_download: Observations,
    last_refresh: f64,
}

impl QueueModelState {
    pub fn new(upload: TrafficEstimate, download: TrafficEstimate) -> Self {
        Self {
            upload,
            download,
            observed_upload: Observations::default(),
            observed_download: Observations::default(),
            last_refresh: 0.,
        }
    }

    pub fn estimate(&self, leg: Leg) -> TrafficEstimate {
        match leg {
            Leg::Upload => self.upload,
            Leg::Download => self.download,
        }
    }

    /// Records a transfer of `size` bytes in the current observation window.
    pub fn observe(&mut self, leg: Leg, size: u64) {
        let observations = match leg {
            Leg::Upload => &mut self.observed_upload,
            Leg::Download => &mut self.observed_download,
        };
        observations.count += 1;
        observations.total_size += size as f64;
    }

    /// Replaces the estimates with values derived from the window `[last refresh, now)` and starts a new window.
    ///
    /// A direction without observations keeps its previous estimate.
    pub fn refresh(&mut self, now: f64, device_count: u32) {
        let window = now - self.last_refresh;
        let upload = Self::refreshed(self.upload, self.observed_upload, window, device_count);
        let download = Self::refreshed(self.download, self.observed_download, window, device_count);
        self.upload = upload;
        self.download = download;
        self.observed_upload = Observations::default();
        self.observed_download = Observations::default();
        self.last_refresh = now;
    }

    fn refreshed(
        current: TrafficEstimate,
        observed: Observations,
        window: f64,
        device_count: u32,
    ) -> TrafficEstimate {
        if observed.count == 0 || window <= 0. || device_count == 0 {
            return current;
        }
        let count = observed.count as f64;
        TrafficEstimate {
            mean_inter_arrival: window / (count / device_count as f64),
            mean_task_size: observed.total_size / count,
        }
    }
}
