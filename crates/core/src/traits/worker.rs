use crate::{
    models::{JobId, Task, TaskResult, WorkerStatus},
    SchedulerResult,
};

/// Worker远程接口
///
/// 状态检查器、Dispatcher和客户端都通过它访问Worker。实现可能是
/// 进程内对象，也可能是跨网络的代理；网络不可达时返回
/// [`SchedulerError::Connectivity`](crate::SchedulerError::Connectivity)。
pub trait WorkerClient: Send + Sync {
    fn id(&self) -> &str;

    /// 健康探测，返回Worker自报的状态
    fn status(&self) -> SchedulerResult<WorkerStatus>;

    /// Worker自报的平均任务耗时（秒），尚未执行过任务时为None
    fn average_running_time(&self) -> SchedulerResult<Option<f64>>;

    /// 原子占用：只有处于 AVAILABLE 时才成功，成功后Worker记住占用它的作业
    fn occupy(&self, job_id: &str) -> SchedulerResult<bool>;

    /// 放弃占用，回到 AVAILABLE
    fn release(&self) -> SchedulerResult<()>;

    /// 校验当前占用是否仍然有效，无效时Worker自行释放；返回是否仍被占用
    fn validate_occupation(&self) -> SchedulerResult<bool>;

    /// 空闲时向Dispatcher报告可用，申请新的工作
    fn pull_work(&self) -> SchedulerResult<()>;

    /// 执行一个任务
    fn run_task(&self, task: &Task) -> SchedulerResult<TaskResult>;

    /// 当前占用它的作业
    fn occupied_for(&self) -> SchedulerResult<Option<JobId>>;
}
