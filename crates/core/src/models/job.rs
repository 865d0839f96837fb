use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AtomicProgress, ClientId, Progress, ProgressDelta, Task, WorkerId};
use crate::{SchedulerError, SchedulerResult};

pub type JobId = String;

/// 作业
///
/// 由客户端提交的一组有序任务，带优先级与截止时间。进度保存在
/// [`AtomicProgress`] 中，任务生命周期调用（下发 / 完成 / 重做）
/// 以无锁方式替换进度快照，调度线程读取时不会被阻塞。
///
/// 优先级数值的方向由具体调度算法解释。
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "JobRecord", into = "JobRecord")]
pub struct Job {
    pub id: Option<JobId>,
    pub priority: i64,
    pub deadline: DateTime<Utc>,
    pub tasks: Vec<Task>,
    /// Worker -> 该Worker执行本作业单个任务的预估耗时（秒）
    pub worker_timings: HashMap<WorkerId, f64>,
    /// 本作业已观测到的平均任务耗时（秒）
    pub average_running_time: Option<f64>,
    /// 提交方的消息邮箱，作业结束时通知
    pub client_id: Option<ClientId>,
    progress: AtomicProgress,
}

impl Job {
    pub fn new(priority: i64, deadline: DateTime<Utc>, tasks: Vec<Task>) -> SchedulerResult<Self> {
        let progress = Progress::new(Self::task_count(&tasks)?, 0, 0)?;
        let mut job = Self {
            id: None,
            priority,
            deadline,
            tasks,
            worker_timings: HashMap::new(),
            average_running_time: None,
            client_id: None,
            progress: AtomicProgress::new(progress),
        };
        job.bind_tasks();
        Ok(job)
    }

    pub fn with_id<S: Into<JobId>>(mut self, id: S) -> Self {
        self.assign_id(id.into());
        self
    }

    pub fn with_worker_timing<S: Into<WorkerId>>(mut self, worker_id: S, seconds: f64) -> Self {
        self.worker_timings.insert(worker_id.into(), seconds);
        self
    }

    pub fn with_client<S: Into<ClientId>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// 设置作业ID，并同步写入每个任务的父作业引用
    pub fn assign_id(&mut self, id: JobId) {
        self.id = Some(id);
        self.bind_tasks();
    }

    pub fn progress(&self) -> Progress {
        self.progress.load()
    }

    pub fn undone(&self) -> usize {
        self.progress().undone() as usize
    }

    pub fn is_finished(&self) -> bool {
        self.progress().is_finished()
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// 一个排队任务被下发给Worker
    pub fn task_sent(&self) -> SchedulerResult<Progress> {
        self.progress.update(ProgressDelta::TASK_SENT).map_err(|e| {
            SchedulerError::ProgressInvariant(format!("task_sent 时没有排队中的任务: {e}"))
        })
    }

    /// 一个已下发任务执行完成
    pub fn task_done(&self) -> SchedulerResult<Progress> {
        self.progress.update(ProgressDelta::TASK_DONE).map_err(|e| {
            SchedulerError::ProgressInvariant(format!("task_done 时没有已下发的任务: {e}"))
        })
    }

    /// Worker中途失败，已下发任务退回排队状态
    pub fn task_redo(&self) -> SchedulerResult<Progress> {
        self.progress.update(ProgressDelta::TASK_REDO).map_err(|e| {
            SchedulerError::ProgressInvariant(format!("task_redo 时没有已下发的任务: {e}"))
        })
    }

    /// 距截止时间的剩余秒数，已过期时为非正数
    pub fn seconds_until_deadline(&self, now: DateTime<Utc>) -> f64 {
        (self.deadline - now).num_milliseconds() as f64 / 1000.0
    }

    fn bind_tasks(&mut self) {
        for (index, task) in self.tasks.iter_mut().enumerate() {
            task.id = Some(index);
            task.job_id = self.id.clone();
        }
    }

    fn task_count(tasks: &[Task]) -> SchedulerResult<u32> {
        u32::try_from(tasks.len())
            .ok()
            .filter(|count| *count <= Progress::MAX_COUNT)
            .ok_or_else(|| {
                SchedulerError::InvalidMessage(format!("作业任务数过多: {}", tasks.len()))
            })
    }
}

impl Clone for Job {
    /// 深拷贝，新作业持有独立的进度单元，初值为当前快照
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            priority: self.priority,
            deadline: self.deadline,
            tasks: self.tasks.clone(),
            worker_timings: self.worker_timings.clone(),
            average_running_time: self.average_running_time,
            client_id: self.client_id.clone(),
            progress: AtomicProgress::new(self.progress()),
        }
    }
}

/// 作业的传输形式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobRecord {
    id: Option<JobId>,
    priority: i64,
    deadline: DateTime<Utc>,
    tasks: Vec<Task>,
    #[serde(default)]
    worker_timings: HashMap<WorkerId, f64>,
    #[serde(default)]
    average_running_time: Option<f64>,
    #[serde(default)]
    client_id: Option<ClientId>,
    progress: Option<Progress>,
}

impl From<Job> for JobRecord {
    fn from(job: Job) -> Self {
        let progress = Some(job.progress());
        Self {
            id: job.id,
            priority: job.priority,
            deadline: job.deadline,
            tasks: job.tasks,
            worker_timings: job.worker_timings,
            average_running_time: job.average_running_time,
            client_id: job.client_id,
            progress,
        }
    }
}

impl TryFrom<JobRecord> for Job {
    type Error = SchedulerError;

    /// 反序列化时重建原子进度单元，使中途恢复的作业可以继续被并发修改
    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let count = Job::task_count(&record.tasks)?;
        let progress = match record.progress {
            Some(progress) if progress.total() != count => {
                return Err(SchedulerError::InvalidMessage(format!(
                    "进度总数 {} 与任务数 {} 不一致",
                    progress.total(),
                    count
                )));
            }
            Some(progress) => progress,
            None => Progress::new(count, 0, 0)?,
        };
        let mut job = Job {
            id: record.id,
            priority: record.priority,
            deadline: record.deadline,
            tasks: record.tasks,
            worker_timings: record.worker_timings,
            average_running_time: record.average_running_time,
            client_id: record.client_id,
            progress: AtomicProgress::new(progress),
        };
        job.bind_tasks();
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_job(tasks: usize) -> Job {
        Job::new(
            5,
            Utc::now() + Duration::seconds(60),
            (0..tasks).map(|_| Task::delay(0.1)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_job_binds_tasks() {
        let job = sample_job(3).with_id("job-1");
        assert_eq!(job.progress(), Progress::new(3, 0, 0).unwrap());
        for (index, task) in job.tasks.iter().enumerate() {
            assert_eq!(task.id, Some(index));
            assert_eq!(task.job_id.as_deref(), Some("job-1"));
        }
    }

    #[test]
    fn test_task_lifecycle() {
        let job = sample_job(2);
        job.task_sent().unwrap();
        job.task_sent().unwrap();
        assert!(job.task_sent().is_err());

        let redo = job.task_redo().unwrap();
        assert_eq!(redo, Progress::new(1, 1, 0).unwrap());
        assert_eq!(redo.total(), 2);

        job.task_done().unwrap();
        assert!(matches!(job.task_done(), Err(SchedulerError::ProgressInvariant(_))));
        job.task_sent().unwrap();
        job.task_done().unwrap();
        assert!(job.is_finished());
        assert_eq!(job.progress().done(), 2);
    }

    #[test]
    fn test_clone_has_independent_progress() {
        let job = sample_job(2);
        job.task_sent().unwrap();
        let copy = job.clone();
        job.task_done().unwrap();
        assert_eq!(copy.progress(), Progress::new(1, 1, 0).unwrap());
        assert_eq!(job.progress(), Progress::new(1, 0, 1).unwrap());
    }

    #[test]
    fn test_serialization_preserves_progress() {
        let job = sample_job(3)
            .with_id("job-7")
            .with_worker_timing("w1", 2.5)
            .with_client("client-1");
        job.task_sent().unwrap();
        job.task_done().unwrap();

        let json = serde_json::to_string(&job).unwrap();
        let restored: Job = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id.as_deref(), Some("job-7"));
        assert_eq!(restored.priority, 5);
        assert_eq!(restored.deadline, job.deadline);
        assert_eq!(restored.worker_timings.get("w1"), Some(&2.5));
        assert_eq!(restored.client_id.as_deref(), Some("client-1"));
        assert_eq!(restored.progress(), Progress::new(2, 0, 1).unwrap());

        restored.task_sent().unwrap();
        assert_eq!(restored.progress().sent(), 1);
    }

    #[test]
    fn test_deserialization_rejects_inconsistent_progress() {
        let mut value = serde_json::to_value(sample_job(2)).unwrap();
        value["progress"] = serde_json::json!({"queued": 5, "sent": 0, "done": 0});
        assert!(serde_json::from_value::<Job>(value).is_err());
    }

    #[test]
    fn test_deserialization_without_progress() {
        let value = serde_json::json!({
            "id": null,
            "priority": 1,
            "deadline": "2030-01-01T00:00:00Z",
            "tasks": [{"id": null, "job_id": null, "spec": {"kind": "delay", "seconds": 1.0}}]
        });
        let job: Job = serde_json::from_value(value).unwrap();
        assert_eq!(job.progress(), Progress::new(1, 0, 0).unwrap());
    }
}
