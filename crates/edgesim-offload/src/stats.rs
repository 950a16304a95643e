//! Task outcome records and aggregated statistics.

use std::fs::File;
use std::ops::AddAssign;

use indexmap::IndexMap;
use num::{ToPrimitive, Zero};
use serde::Serialize;

use crate::congestion::LinkClass;
use crate::infrastructure::{HostId, VmId};
use crate::mobility::AccessPointId;
use crate::task::{DeviceId, Leg, Task, TaskId, Tier};

#[derive(Clone, Debug, Default)]
pub struct SampleMetric<T> {
    data: Vec<T>,
}

impl<T> SampleMetric<T> {
    pub fn add(&mut self, x: T) {
        self.data.push(x);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero,
{
    pub fn sum(&self) -> T {
        let mut s = T::zero();
        for x in self.data.iter().copied() {
            s += x;
        }
        s
    }
}

impl<T> SampleMetric<T>
where
    T: AddAssign + Copy + Zero + ToPrimitive,
{
    /// Mean value, zero for an empty sample.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.;
        }
        self.sum().to_f64().unwrap_or(f64::NAN) / (self.data.len() as f64)
    }
}

/// Final or current status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Submitted,
    Started,
    Executed,
    Completed,
    RejectedCapacity,
    RejectedBandwidth,
}

/// Per-task outcome record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub device_id: DeviceId,
    pub task_type: usize,
    pub status: TaskStatus,
    pub failed_leg: Option<Leg>,
    pub tier: Option<Tier>,
    pub host_id: Option<HostId>,
    pub vm_id: Option<VmId>,
    pub access_point: Option<AccessPointId>,
    pub submit_time: f64,
    pub upload_link: Option<LinkClass>,
    pub upload_delay: Option<f64>,
    pub execution_finish_time: Option<f64>,
    pub download_link: Option<LinkClass>,
    pub download_delay: Option<f64>,
    pub finish_time: Option<f64>,
}

impl TaskRecord {
    fn new(task: &Task, time: f64) -> Self {
        Self {
            task_id: task.id(),
            device_id: task.request.device_id,
            task_type: task.request.task_type,
            status: TaskStatus::Submitted,
            failed_leg: None,
            tier: None,
            host_id: None,
            vm_id: None,
            access_point: task.submitted_from,
            submit_time: time,
            upload_link: None,
            upload_delay: None,
            execution_finish_time: None,
            download_link: None,
            download_delay: None,
            finish_time: None,
        }
    }

    fn update_assignment(&mut self, task: &Task) {
        self.tier = task.tier;
        self.host_id = task.host_id;
        self.vm_id = task.vm_id;
        self.access_point = task.submitted_from;
        if let Some(upload) = &task.upload {
            self.upload_link = Some(upload.link);
            self.upload_delay = Some(upload.delay);
        }
        if let Some(download) = &task.download {
            self.download_link = Some(download.link);
            self.download_delay = Some(download.delay);
        }
    }

    /// Time from submission to delivery of the result.
    pub fn service_time(&self) -> Option<f64> {
        self.finish_time.map(|t| t - self.submit_time)
    }
}

/// Counts of task outcomes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub submitted: u64,
    pub completed: u64,
    pub rejected_capacity: u64,
    pub rejected_bandwidth_upload: u64,
    /// Tasks that were executed but whose result could not be delivered.
    pub rejected_bandwidth_download: u64,
    /// Tasks still in progress when statistics were collected.
    pub unfinished: u64,
}

impl OutcomeCounts {
    pub fn rejected(&self) -> u64 {
        self.rejected_capacity + self.rejected_bandwidth_upload + self.rejected_bandwidth_download
    }
}

#[derive(Clone, Debug, Default)]
pub struct TierStats {
    pub counts: OutcomeCounts,
    pub upload_delay: SampleMetric<f64>,
    pub download_delay: SampleMetric<f64>,
    pub service_time: SampleMetric<f64>,
}

impl TierStats {
    fn update(&mut self, record: &TaskRecord) {
        self.counts.submitted += 1;
        match record.status {
            TaskStatus::Completed => self.counts.completed += 1,
            TaskStatus::RejectedCapacity => self.counts.rejected_capacity += 1,
            TaskStatus::RejectedBandwidth => match record.failed_leg {
                Some(Leg::Download) => self.counts.rejected_bandwidth_download += 1,
                _ => self.counts.rejected_bandwidth_upload += 1,
            },
            _ => self.counts.unfinished += 1,
        }
        if let Some(delay) = record.upload_delay {
            self.upload_delay.add(delay);
        }
        if let Some(delay) = record.download_delay {
            self.download_delay.add(delay);
        }
        if let Some(time) = record.service_time() {
            self.service_time.add(time);
        }
    }

    fn summary(&self) -> IndexMap<String, f64> {
        let mut summary = IndexMap::new();
        summary.insert("submitted".to_string(), self.counts.submitted as f64);
        summary.insert("completed".to_string(), self.counts.completed as f64);
        summary.insert("rejected_capacity".to_string(), self.counts.rejected_capacity as f64);
        summary.insert(
            "rejected_bandwidth_upload".to_string(),
            self.counts.rejected_bandwidth_upload as f64,
        );
        summary.insert(
            "rejected_bandwidth_download".to_string(),
            self.counts.rejected_bandwidth_download as f64,
        );
        summary.insert("unfinished".to_string(), self.counts.unfinished as f64);
        summary.insert("mean_upload_delay".to_string(), self.upload_delay.mean());
        summary.insert("mean_download_delay".to_string(), self.download_delay.mean());
        summary.insert("mean_service_time".to_string(), self.service_time.mean());
        summary
    }
}

/// Aggregated statistics over all tasks submitted after the warm-up period.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub total: TierStats,
    pub per_tier: IndexMap<Tier, TierStats>,
}

impl Stats {
    /// Number of tasks that wasted remote compute because their result was not delivered.
    pub fn late_failures(&self) -> u64 {
        self.total.counts.rejected_bandwidth_download
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierStats> {
        self.per_tier.get(&tier)
    }

    /// Flat summary of the statistics, keys of per-tier values are prefixed with the tier name.
    pub fn summary(&self) -> IndexMap<String, f64> {
        let mut summary = self.total.summary();
        summary.insert("late_failures".to_string(), self.late_failures() as f64);
        for (tier, stats) in &self.per_tier {
            for (key, value) in stats.summary() {
                summary.insert(format!("{}_{}", tier, key), value);
            }
        }
        summary
    }

    pub fn print_summary(&self, name: &str) {
        println!("describing {}", name);
        for (key, value) in self.summary() {
            println!("- {}: {:.4}", key, value);
        }
    }
}

/// Receives lifecycle outcomes of all tasks.
#[derive(Debug, Default)]
pub struct OutcomeLog {
    records: IndexMap<TaskId, TaskRecord>,
    warm_up_period: f64,
}

impl OutcomeLog {
    pub fn new(warm_up_period: f64) -> Self {
        Self {
            records: IndexMap::new(),
            warm_up_period,
        }
    }

    fn record_mut(&mut self, task: &Task, time: f64) -> &mut TaskRecord {
        self.records
            .entry(task.id())
            .or_insert_with(|| TaskRecord::new(task, time))
    }

    pub fn submitted(&mut self, task: &Task, time: f64) {
        self.records.insert(task.id(), TaskRecord::new(task, time));
    }

    /// Upload of the task has started.
    pub fn started(&mut self, task: &Task, time: f64) {
        let record = self.record_mut(task, time);
        record.update_assignment(task);
        record.status = TaskStatus::Started;
    }

    pub fn rejected_capacity(&mut self, task: &Task, time: f64) {
        let record = self.record_mut(task, time);
        record.update_assignment(task);
        record.status = TaskStatus::RejectedCapacity;
    }

    pub fn rejected_bandwidth(&mut self, task: &Task, leg: Leg, link: LinkClass, time: f64) {
        let record = self.record_mut(task, time);
        record.update_assignment(task);
        record.status = TaskStatus::RejectedBandwidth;
        record.failed_leg = Some(leg);
        match leg {
            Leg::Upload => record.upload_link = Some(link),
            Leg::Download => record.download_link = Some(link),
        }
    }

    pub fn executed(&mut self, task: &Task, time: f64) {
        let record = self.record_mut(task, time);
        record.status = TaskStatus::Executed;
        record.execution_finish_time = Some(time);
    }

    pub fn completed(&mut self, task: &Task, time: f64) {
        let record = self.record_mut(task, time);
        record.update_assignment(task);
        record.status = TaskStatus::Completed;
        record.finish_time = Some(time);
    }

    pub fn record(&self, task_id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&task_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for record in self.records.values() {
            if record.submit_time < self.warm_up_period {
                continue;
            }
            stats.total.update(record);
            if let Some(tier) = record.tier {
                stats.per_tier.entry(tier).or_default().update(record);
            }
        }
        stats
    }

    /// Writes per-task records to a CSV file.
    pub fn save_csv(&self, path: &str) -> Result<(), std::io::Error> {
        let file = File::create(path)?;
        let mut wtr = csv::Writer::from_writer(file);
        for record in self.records.values() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
