//! Reference execution collaborator.

use std::cell::RefCell;
use std::rc::Rc;

use edgesim_core::{cast, log_debug, log_error, Event, EventHandler, Id, SimulationContext};

use crate::events::{ExecuteTask, ExecutionFinished, RemoteExecutionCompleted};
use crate::infrastructure::{EdgeInfrastructure, VmId};
use crate::task::TaskId;

/// Runs tasks on VMs for `length / mips` seconds, occupying their predicted CPU share meanwhile.
///
/// The VM utilization never slows execution down.
pub struct TaskExecutor {
    infrastructure: Rc<RefCell<EdgeInfrastructure>>,
    executed_tasks: u64,
    ctx: SimulationContext,
}

impl TaskExecutor {
    pub fn new(infrastructure: Rc<RefCell<EdgeInfrastructure>>, ctx: SimulationContext) -> Self {
        Self {
            infrastructure,
            executed_tasks: 0,
            ctx,
        }
    }

    pub fn executed_tasks(&self) -> u64 {
        self.executed_tasks
    }

    fn on_execute(&mut self, task_id: TaskId, vm_id: VmId, length: u64, cpu_demand: f64, requester: Id) {
        let mips = self.infrastructure.borrow().vm(vm_id).map(|vm| vm.mips);
        let duration = match mips {
            Some(mips) if mips > 0. => length as f64 / mips,
            _ => {
                log_error!(self.ctx, "task {} is bound to unknown VM {}", task_id, vm_id);
                0.
            }
        };
        self.infrastructure.borrow_mut().allocate(vm_id, cpu_demand);
        log_debug!(
            self.ctx,
            "started task {} on VM {} for {:.3} s",
            task_id,
            vm_id,
            duration
        );
        self.ctx.emit_self(
            ExecutionFinished {
                task_id,
                vm_id,
                cpu_demand,
                requester,
            },
            duration,
        );
    }

    fn on_finished(&mut self, task_id: TaskId, vm_id: VmId, cpu_demand: f64, requester: Id) {
        self.infrastructure.borrow_mut().release(vm_id, cpu_demand);
        self.executed_tasks += 1;
        log_debug!(self.ctx, "finished task {} on VM {}", task_id, vm_id);
        self.ctx.emit_now(RemoteExecutionCompleted { task_id }, requester);
    }
}

impl EventHandler for TaskExecutor {
    fn on(&mut self, event: Event) {
        let src = event.src;
        cast!(match event.data {
            ExecuteTask {
                task_id,
                vm_id,
                length,
                cpu_demand,
            } => {
                self.on_execute(task_id, vm_id, length, cpu_demand, src);
            }
            ExecutionFinished {
                task_id,
                vm_id,
                cpu_demand,
                requester,
            } => {
                self.on_finished(task_id, vm_id, cpu_demand, requester);
            }
        })
    }
}
