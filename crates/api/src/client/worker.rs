use std::time::Duration;

use serde_json::json;

use scheduler_core::{
    models::{JobId, Task, TaskResult, WorkerId, WorkerStatus},
    traits::WorkerClient,
    SchedulerResult,
};
use scheduler_worker::WorkerSnapshot;

use super::transport::HttpTransport;

/// 需要经由Dispatcher回调的请求（校验占用、拉取工作）的超时
const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// 远程Worker的HTTP客户端
///
/// 状态读取与占用/释放按探测超时处理，超时即视为通信失败；
/// 任务执行请求会一直等到任务结束。
#[derive(Debug, Clone)]
pub struct WorkerHttpClient {
    worker_id: WorkerId,
    transport: HttpTransport,
    probe_timeout: Duration,
}

impl WorkerHttpClient {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        base_url: &str,
        probe_timeout: Duration,
    ) -> SchedulerResult<Self> {
        Ok(Self {
            worker_id: worker_id.into(),
            transport: HttpTransport::new(base_url)?,
            probe_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    fn probe(&self) -> Option<Duration> {
        Some(self.probe_timeout)
    }

    pub fn snapshot(&self) -> SchedulerResult<WorkerSnapshot> {
        self.transport
            .get(&["api", "v1", "worker", "info"], self.probe())
    }

    /// 取消Worker上正在执行的任务
    pub fn cancel(&self) -> SchedulerResult<bool> {
        self.transport
            .post(&["api", "v1", "worker", "cancel"], self.probe())
    }
}

impl WorkerClient for WorkerHttpClient {
    fn id(&self) -> &str {
        &self.worker_id
    }

    fn status(&self) -> SchedulerResult<WorkerStatus> {
        self.transport
            .get(&["api", "v1", "worker", "status"], self.probe())
    }

    fn average_running_time(&self) -> SchedulerResult<Option<f64>> {
        self.transport
            .get(&["api", "v1", "worker", "average"], self.probe())
    }

    fn occupy(&self, job_id: &str) -> SchedulerResult<bool> {
        self.transport.post_json(
            &["api", "v1", "worker", "occupy"],
            &json!({ "job_id": job_id }),
            self.probe(),
        )
    }

    fn release(&self) -> SchedulerResult<()> {
        self.transport
            .post(&["api", "v1", "worker", "release"], self.probe())
    }

    fn validate_occupation(&self) -> SchedulerResult<bool> {
        self.transport
            .post(&["api", "v1", "worker", "validate"], Some(RELAY_TIMEOUT))
    }

    fn pull_work(&self) -> SchedulerResult<()> {
        self.transport
            .post(&["api", "v1", "worker", "pull"], Some(RELAY_TIMEOUT))
    }

    fn run_task(&self, task: &Task) -> SchedulerResult<TaskResult> {
        self.transport
            .post_json(&["api", "v1", "worker", "run"], task, None)
    }

    fn occupied_for(&self) -> SchedulerResult<Option<JobId>> {
        self.transport
            .get(&["api", "v1", "worker", "occupied-for"], self.probe())
    }
}
