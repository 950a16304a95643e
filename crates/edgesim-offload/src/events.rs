//! Events exchanged between the lifecycle coordinator and the execution collaborator.

use serde::Serialize;

use edgesim_core::Id;

use crate::infrastructure::VmId;
use crate::task::{TaskId, TaskRequest};

/// Device has generated a task.
#[derive(Clone, Serialize)]
pub struct TaskGenerated {
    pub request: TaskRequest,
}

/// Input of the task was received by the selected VM.
#[derive(Clone, Serialize)]
pub struct UploadCompleted {
    pub task_id: TaskId,
}

/// Request to execute a bound task on a VM.
#[derive(Clone, Serialize)]
pub struct ExecuteTask {
    pub task_id: TaskId,
    pub vm_id: VmId,
    /// Length in millions of instructions.
    pub length: u64,
    /// CPU share of the VM occupied during execution, percent.
    pub cpu_demand: f64,
}

#[derive(Clone, Serialize)]
pub struct ExecutionFinished {
    pub task_id: TaskId,
    pub vm_id: VmId,
    pub cpu_demand: f64,
    pub requester: Id,
}

/// Remote execution of the task is complete and its output can be downloaded.
#[derive(Clone, Serialize)]
pub struct RemoteExecutionCompleted {
    pub task_id: TaskId,
}

/// Output of the task was delivered to the device.
#[derive(Clone, Serialize)]
pub struct DownloadCompleted {
    pub task_id: TaskId,
}

/// Periodic refresh of adaptive network model parameters.
#[derive(Clone, Serialize)]
pub struct RefreshNetworkModel {}
