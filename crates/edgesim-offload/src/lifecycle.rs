//! Task lifecycle coordinator.
//!
//! Drives each task through offload decision, upload, remote execution and download:
//!
//! ```text
//! Generated -> OffloadRequested -> Uploading -> RemoteQueued -> Downloading -> Completed
//!                    |                              |
//!                    +-> RejectedCapacity           +-> RejectedBandwidth(download)
//!                    +-> RejectedBandwidth(upload)
//! ```
//!
//! Every transfer increments the congestion counter of its access point and link when it starts and decrements the
//! same counter when it finishes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use edgesim_core::{cast, log_debug, log_error, log_info, log_warn, Event, EventHandler, Id, SimulationContext};

use crate::congestion::CongestionTracker;
use crate::error::ConfigError;
use crate::events::{
    DownloadCompleted, ExecuteTask, RefreshNetworkModel, RemoteExecutionCompleted, TaskGenerated, UploadCompleted,
};
use crate::infrastructure::{CapacityView, EdgeInfrastructure};
use crate::mobility::{AccessPointId, LocationProvider};
use crate::network::model::{NetworkModel, TransferRequest};
use crate::orchestrator::{DecisionContext, EdgeOrchestrator, OffloadDecision};
use crate::stats::OutcomeLog;
use crate::task::{DeviceId, Leg, Task, TaskId, TaskRequest, TaskState, TransferRecord};

pub struct LifecycleCoordinator {
    orchestrator: EdgeOrchestrator,
    network: NetworkModel,
    congestion: CongestionTracker,
    mobility: Box<dyn LocationProvider>,
    infrastructure: Rc<RefCell<EdgeInfrastructure>>,
    outcomes: Rc<RefCell<OutcomeLog>>,
    tasks: HashMap<TaskId, Task>,
    executor_id: Id,
    refresh_period: f64,
    horizon: f64,
    fatal_error: Option<ConfigError>,
    ctx: SimulationContext,
}

impl LifecycleCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: EdgeOrchestrator,
        network: NetworkModel,
        congestion: CongestionTracker,
        mobility: Box<dyn LocationProvider>,
        infrastructure: Rc<RefCell<EdgeInfrastructure>>,
        outcomes: Rc<RefCell<OutcomeLog>>,
        executor_id: Id,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            orchestrator,
            network,
            congestion,
            mobility,
            infrastructure,
            outcomes,
            tasks: HashMap::new(),
            executor_id,
            refresh_period: 0.,
            horizon: 0.,
            fatal_error: None,
            ctx,
        }
    }

    /// Schedules arrival of the task at its arrival time.
    pub fn submit(&mut self, request: TaskRequest) {
        let delay = (request.arrival_time - self.ctx.time()).max(0.);
        self.ctx.emit_self(TaskGenerated { request }, delay);
    }

    /// Starts periodic refresh of adaptive network models, repeated every `period` seconds until `horizon`.
    pub fn start_network_refresh(&mut self, period: f64, horizon: f64) {
        self.refresh_period = period;
        self.horizon = horizon;
        if self.network.is_adaptive() && period > 0. && self.ctx.time() + period <= horizon {
            log_info!(self.ctx, "refreshing network model every {} s until {}", period, horizon);
            self.ctx.emit_self(RefreshNetworkModel {}, period);
        }
    }

    /// Returns the configuration error that stopped task processing, if any.
    pub fn take_fatal_error(&mut self) -> Option<ConfigError> {
        self.fatal_error.take()
    }

    pub fn has_fatal_error(&self) -> bool {
        self.fatal_error.is_some()
    }

    pub fn congestion(&self) -> &CongestionTracker {
        &self.congestion
    }

    pub fn network(&self) -> &NetworkModel {
        &self.network
    }

    /// Number of tasks between upload start and final outcome.
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    fn locate(&mut self, device: DeviceId) -> Option<AccessPointId> {
        match self.mobility.location_of(device, self.ctx.time()) {
            Ok(access_point) => Some(access_point),
            Err(e) => {
                log_error!(self.ctx, "stopping task processing: {}", e);
                self.fatal_error = Some(e);
                None
            }
        }
    }

    fn on_task_generated(&mut self, request: TaskRequest) {
        let now = self.ctx.time();
        let mut task = Task::new(request);
        self.outcomes.borrow_mut().submitted(&task, now);
        let Some(access_point) = self.locate(task.request.device_id) else {
            return;
        };
        task.submitted_from = Some(access_point);
        advance(&self.ctx, &mut task, TaskState::OffloadRequested);

        let decision = {
            let infrastructure = self.infrastructure.borrow();
            let decision_ctx = DecisionContext {
                access_point,
                network: &self.network,
                congestion: &self.congestion,
                capacity: &*infrastructure,
            };
            self.orchestrator.decide(&task.request, &decision_ctx)
        };
        let (tier, vm) = match decision {
            OffloadDecision::VmSelected(tier, vm) => (tier, vm),
            OffloadDecision::Rejected(tier) => {
                task.tier = Some(tier);
                advance(&self.ctx, &mut task, TaskState::RejectedCapacity);
                log_debug!(self.ctx, "task {} rejected: no {} VM with enough capacity", task.id(), tier);
                self.outcomes.borrow_mut().rejected_capacity(&task, now);
                return;
            }
            other => {
                log_error!(self.ctx, "incomplete offload decision for task {}: {:?}", task.id(), other);
                return;
            }
        };
        task.tier = Some(tier);

        let link = self.orchestrator.tier_links().link_for(tier);
        let request = TransferRequest {
            link,
            access_point,
            size: task.request.input_size,
            leg: Leg::Upload,
        };
        let delay = self.network.transfer_delay(&request, &self.congestion);
        if delay <= 0. {
            advance(&self.ctx, &mut task, TaskState::RejectedBandwidth(Leg::Upload));
            log_debug!(self.ctx, "task {} rejected: {} upload is unavailable", task.id(), link);
            self.outcomes
                .borrow_mut()
                .rejected_bandwidth(&task, Leg::Upload, link, now);
            return;
        }

        let congestion_level = self.congestion.start(access_point, link);
        task.upload = Some(TransferRecord {
            link,
            access_point,
            start_time: now,
            delay,
            congestion_level,
        });
        task.host_id = Some(vm.vm.host_id);
        task.vm_id = Some(vm.vm.vm_id);
        advance(&self.ctx, &mut task, TaskState::Uploading);
        log_debug!(
            self.ctx,
            "task {} uploading to {} VM {} over {} for {:.4} s (level {})",
            task.id(),
            tier,
            vm.vm.vm_id,
            link,
            delay,
            congestion_level
        );
        self.outcomes.borrow_mut().started(&task, now);
        self.ctx.emit_self(UploadCompleted { task_id: task.id() }, delay);
        self.tasks.insert(task.id(), task);
    }

    fn on_upload_completed(&mut self, task_id: TaskId) {
        let Some(task) = self.tasks.get_mut(&task_id) else {
            log_error!(self.ctx, "upload completed for unknown task {}", task_id);
            return;
        };
        if let Some(upload) = &task.upload {
            self.congestion.finish(upload.access_point, upload.link);
        }
        advance(&self.ctx, task, TaskState::RemoteQueued);
        let (Some(tier), Some(vm_id)) = (task.tier, task.vm_id) else {
            log_error!(self.ctx, "task {} is not bound to a VM", task_id);
            return;
        };
        let cpu_demand = self.infrastructure.borrow().predicted_cpu_demand(&task.request, tier);
        log_debug!(self.ctx, "task {} received by VM {}", task_id, vm_id);
        self.ctx.emit_now(
            ExecuteTask {
                task_id,
                vm_id,
                length: task.request.length,
                cpu_demand,
            },
            self.executor_id,
        );
    }

    fn on_execution_completed(&mut self, task_id: TaskId) {
        let now = self.ctx.time();
        let Some(device) = self.tasks.get(&task_id).map(|t| t.request.device_id) else {
            log_error!(self.ctx, "execution completed for unknown task {}", task_id);
            return;
        };
        let Some(access_point) = self.locate(device) else {
            return;
        };
        let Some(mut task) = self.tasks.remove(&task_id) else {
            return;
        };
        self.outcomes.borrow_mut().executed(&task, now);
        let Some(tier) = task.tier else {
            log_error!(self.ctx, "task {} has no tier", task_id);
            return;
        };

        let link = self.orchestrator.tier_links().link_for(tier);
        let request = TransferRequest {
            link,
            access_point,
            size: task.request.output_size,
            leg: Leg::Download,
        };
        let delay = self.network.transfer_delay(&request, &self.congestion);
        if delay <= 0. {
            advance(&self.ctx, &mut task, TaskState::RejectedBandwidth(Leg::Download));
            log_debug!(self.ctx, "task {} failed: {} download is unavailable", task_id, link);
            self.outcomes
                .borrow_mut()
                .rejected_bandwidth(&task, Leg::Download, link, now);
            return;
        }

        let congestion_level = self.congestion.start(access_point, link);
        task.download = Some(TransferRecord {
            link,
            access_point,
            start_time: now,
            delay,
            congestion_level,
        });
        advance(&self.ctx, &mut task, TaskState::Downloading);
        log_debug!(
            self.ctx,
            "task {} downloading over {} for {:.4} s (level {})",
            task_id,
            link,
            delay,
            congestion_level
        );
        self.ctx.emit_self(DownloadCompleted { task_id }, delay);
        self.tasks.insert(task_id, task);
    }

    fn on_download_completed(&mut self, task_id: TaskId) {
        let Some(mut task) = self.tasks.remove(&task_id) else {
            log_error!(self.ctx, "download completed for unknown task {}", task_id);
            return;
        };
        if let Some(download) = &task.download {
            self.congestion.finish(download.access_point, download.link);
        }
        advance(&self.ctx, &mut task, TaskState::Completed);
        log_debug!(self.ctx, "task {} completed", task_id);
        self.outcomes.borrow_mut().completed(&task, self.ctx.time());
    }

    fn on_refresh(&mut self) {
        self.network.refresh(self.ctx.time());
        if self.ctx.time() + self.refresh_period <= self.horizon {
            self.ctx.emit_self(RefreshNetworkModel {}, self.refresh_period);
        }
    }
}

fn advance(ctx: &SimulationContext, task: &mut Task, next: TaskState) {
    let current = task.state;
    if !task.transition(next) {
        log_warn!(ctx, "task {} can't move from {:?} to {:?}", task.id(), current, next);
    }
}

impl EventHandler for LifecycleCoordinator {
    fn on(&mut self, event: Event) {
        if self.fatal_error.is_some() {
            return;
        }
        cast!(match event.data {
            TaskGenerated { request } => {
                self.on_task_generated(request);
            }
            UploadCompleted { task_id } => {
                self.on_upload_completed(task_id);
            }
            RemoteExecutionCompleted { task_id } => {
                self.on_execution_completed(task_id);
            }
            DownloadCompleted { task_id } => {
                self.on_download_completed(task_id);
            }
            RefreshNetworkModel {} => {
                self.on_refresh();
            }
        })
    }
}
