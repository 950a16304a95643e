//! Offloaded tasks and their lifecycle states.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::congestion::LinkClass;
use crate::infrastructure::{HostId, VmId};
use crate::mobility::AccessPointId;

pub type TaskId = u64;
pub type DeviceId = u32;

/// Computing tier that can run an offloaded task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Edge,
    Cloud,
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Edge => write!(f, "edge"),
            Tier::Cloud => write!(f, "cloud"),
        }
    }
}

/// Direction of a data transfer between a device and a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Upload,
    Download,
}

impl Display for Leg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Upload => write!(f, "upload"),
            Leg::Download => write!(f, "download"),
        }
    }
}

/// Immutable description of a task produced by the workload generator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskRequest {
    pub id: TaskId,
    pub device_id: DeviceId,
    /// Index into the configured task type table.
    pub task_type: usize,
    pub arrival_time: f64,
    /// Computational length in millions of instructions.
    pub length: u64,
    pub pes: u32,
    /// Input payload size in bytes.
    pub input_size: u64,
    /// Output payload size in bytes.
    pub output_size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Generated,
    OffloadRequested,
    Uploading,
    RemoteQueued,
    Downloading,
    Completed,
    RejectedCapacity,
    RejectedBandwidth(Leg),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::RejectedCapacity | TaskState::RejectedBandwidth(_)
        )
    }

    /// Checks whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (*self, next) {
            (Generated, OffloadRequested) => true,
            (OffloadRequested, Uploading | RejectedCapacity | RejectedBandwidth(Leg::Upload)) => true,
            (Uploading, RemoteQueued) => true,
            (RemoteQueued, Downloading | RejectedBandwidth(Leg::Download)) => true,
            (Downloading, Completed) => true,
            _ => false,
        }
    }
}

/// Transfer in progress or finished, remembered so that its congestion slot is released on the same access point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TransferRecord {
    pub link: LinkClass,
    pub access_point: AccessPointId,
    pub start_time: f64,
    pub delay: f64,
    /// Number of transfers that were already active on the link when this one started.
    pub congestion_level: u32,
}

/// Mutable task tracked by the lifecycle coordinator.
#[derive(Clone, Debug)]
pub struct Task {
    pub request: TaskRequest,
    pub state: TaskState,
    pub tier: Option<Tier>,
    pub host_id: Option<HostId>,
    pub vm_id: Option<VmId>,
    pub submitted_from: Option<AccessPointId>,
    pub upload: Option<TransferRecord>,
    pub download: Option<TransferRecord>,
}

impl Task {
    pub fn new(request: TaskRequest) -> Self {
        Self {
            request,
            state: TaskState::Generated,
            tier: None,
            host_id: None,
            vm_id: None,
            submitted_from: None,
            upload: None,
            download: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.request.id
    }

    /// Moves the task into `next` state, returns `false` and keeps the current state if the move is not allowed.
    pub fn transition(&mut self, next: TaskState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn transfer(&self, leg: Leg) -> Option<&TransferRecord> {
        match leg {
            Leg::Upload => self.upload.as_ref(),
            Leg::Download => self.download.as_ref(),
        }
    }
}
