use std::time::Duration;

use crate::{
    models::{ClientMessage, Job, JobId, Progress, TaskResult, WorkerId},
    SchedulerResult,
};

/// Dispatcher面向Worker的接口
pub trait WorkerCoordinator: Send + Sync {
    /// Worker报告自己空闲
    fn on_worker_available(&self, worker_id: &str) -> SchedulerResult<()>;

    /// Worker校验自己对某作业的占用是否仍然有效
    fn check_assignment(&self, worker_id: &str, job_id: &str) -> SchedulerResult<bool>;
}

/// Dispatcher面向客户端的接口
pub trait JobService: Send + Sync {
    /// 提交一批作业，返回按输入顺序排列的作业ID
    fn submit_jobs(&self, jobs: Vec<Job>) -> SchedulerResult<Vec<JobId>>;

    /// 阻塞直到该作业的队列中出现空闲Worker
    fn require_worker(&self, job_id: &str) -> SchedulerResult<WorkerId>;

    fn task_sent(&self, job_id: &str) -> SchedulerResult<Progress>;

    fn task_done(&self, job_id: &str, result: &TaskResult) -> SchedulerResult<Progress>;

    fn task_redo(&self, job_id: &str) -> SchedulerResult<Progress>;

    /// 归还 `require_worker` 取得但未能交付任务的Worker
    fn return_worker(&self, job_id: &str, worker_id: &str) -> SchedulerResult<()>;

    /// 作业全部完成，从注册表中移除
    fn job_done(&self, job_id: &str) -> SchedulerResult<()>;

    fn register_client(&self, client_id: &str) -> SchedulerResult<()>;

    fn unregister_client(&self, client_id: &str) -> SchedulerResult<()>;

    fn push_message(&self, client_id: &str, message: ClientMessage) -> SchedulerResult<()>;

    /// 最多等待 `timeout` 取走该客户端当前的全部消息，超时返回空列表
    fn get_messages(&self, client_id: &str, timeout: Duration)
        -> SchedulerResult<Vec<ClientMessage>>;
}
