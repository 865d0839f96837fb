use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, info};

use scheduler_core::{
    models::{ClientMessage, Job, JobId, Progress, TaskResult, WorkerId, WorkerStatus},
    traits::{JobService, Rescheduler, WorkerCoordinator},
    SchedulerResult,
};
use scheduler_dispatcher::CollectionReport;

use super::transport::HttpTransport;
use crate::handlers::{
    jobs::{JobSummary, SubmitJobsRequest},
    workers::ScheduleView,
};

/// 普通请求的默认超时
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 远程Dispatcher的HTTP客户端
///
/// 客户端进程用它提交作业、领取Worker、上报任务进度；Worker进程用它
/// 报告空闲和校验占用。领取Worker与拉取消息可能长时间阻塞，这两类请求不设超时。
#[derive(Debug, Clone)]
pub struct DispatcherHttpClient {
    transport: HttpTransport,
    request_timeout: Duration,
}

impl DispatcherHttpClient {
    pub fn new(base_url: &str) -> SchedulerResult<Self> {
        Ok(Self {
            transport: HttpTransport::new(base_url)?,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.request_timeout)
    }

    pub fn jobs(&self) -> SchedulerResult<Vec<JobSummary>> {
        self.transport.get(&["api", "v1", "jobs"], self.timeout())
    }

    pub fn job(&self, job_id: &str) -> SchedulerResult<JobSummary> {
        self.transport.get(&["api", "v1", "jobs", job_id], self.timeout())
    }

    pub fn worker_statuses(&self) -> SchedulerResult<BTreeMap<WorkerId, WorkerStatus>> {
        self.transport.get(&["api", "v1", "workers"], self.timeout())
    }

    pub fn schedule(&self) -> SchedulerResult<ScheduleView> {
        self.transport.get(&["api", "v1", "schedule"], self.timeout())
    }

    pub fn recollect_status(&self) -> SchedulerResult<CollectionReport> {
        self.transport
            .post(&["api", "v1", "workers", "recollect"], self.timeout())
    }
}

impl JobService for DispatcherHttpClient {
    fn submit_jobs(&self, jobs: Vec<Job>) -> SchedulerResult<Vec<JobId>> {
        info!("向 {} 提交 {} 个作业", self.base_url(), jobs.len());
        let request = SubmitJobsRequest { jobs };
        self.transport
            .post_json(&["api", "v1", "jobs"], &request, self.timeout())
    }

    fn require_worker(&self, job_id: &str) -> SchedulerResult<WorkerId> {
        debug!("为作业 {} 等待空闲Worker", job_id);
        self.transport
            .post(&["api", "v1", "jobs", job_id, "worker"], None)
    }

    fn task_sent(&self, job_id: &str) -> SchedulerResult<Progress> {
        self.transport
            .post(&["api", "v1", "jobs", job_id, "tasks", "sent"], self.timeout())
    }

    fn task_done(&self, job_id: &str, result: &TaskResult) -> SchedulerResult<Progress> {
        self.transport.post_json(
            &["api", "v1", "jobs", job_id, "tasks", "done"],
            result,
            self.timeout(),
        )
    }

    fn task_redo(&self, job_id: &str) -> SchedulerResult<Progress> {
        self.transport
            .post(&["api", "v1", "jobs", job_id, "tasks", "redo"], self.timeout())
    }

    fn return_worker(&self, job_id: &str, worker_id: &str) -> SchedulerResult<()> {
        self.transport.post(
            &["api", "v1", "jobs", job_id, "workers", worker_id, "return"],
            self.timeout(),
        )
    }

    fn job_done(&self, job_id: &str) -> SchedulerResult<()> {
        self.transport
            .post(&["api", "v1", "jobs", job_id, "done"], self.timeout())
    }

    fn register_client(&self, client_id: &str) -> SchedulerResult<()> {
        self.transport
            .post(&["api", "v1", "clients", client_id], self.timeout())
    }

    fn unregister_client(&self, client_id: &str) -> SchedulerResult<()> {
        self.transport
            .delete(&["api", "v1", "clients", client_id], self.timeout())
    }

    fn push_message(&self, client_id: &str, message: ClientMessage) -> SchedulerResult<()> {
        self.transport.post_json(
            &["api", "v1", "clients", client_id, "messages"],
            &message,
            self.timeout(),
        )
    }

    fn get_messages(
        &self,
        client_id: &str,
        timeout: Duration,
    ) -> SchedulerResult<Vec<ClientMessage>> {
        let request = self
            .transport
            .request(
                Method::GET,
                &["api", "v1", "clients", client_id, "messages"],
                None,
            )?
            .query(&[("timeout_ms", timeout.as_millis().to_string())]);
        self.transport.send(request)
    }
}

impl WorkerCoordinator for DispatcherHttpClient {
    fn on_worker_available(&self, worker_id: &str) -> SchedulerResult<()> {
        self.transport.post(
            &["api", "v1", "workers", worker_id, "available"],
            self.timeout(),
        )
    }

    fn check_assignment(&self, worker_id: &str, job_id: &str) -> SchedulerResult<bool> {
        self.transport.get(
            &["api", "v1", "workers", worker_id, "assignment", job_id],
            self.timeout(),
        )
    }
}

impl Rescheduler for DispatcherHttpClient {
    fn reschedule(&self) -> SchedulerResult<()> {
        self.transport
            .post(&["api", "v1", "schedule", "reschedule"], self.timeout())
    }
}
