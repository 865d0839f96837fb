use std::collections::{BTreeSet, HashMap};

use crate::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    SchedulerResult,
};

/// 调度算法接口
///
/// 约定：
/// - 返回值必须包含输入中每一个作业ID（可以是空列表）
/// - 同一个Worker在一次结果中最多分配给一个作业
/// - 不修改输入的作业表
/// - Worker集合为空时返回全空分配，不得失败
pub trait SchedulingAlgorithm: Send + Sync {
    /// 算法名称，与配置中的算法名一致
    fn name(&self) -> &str;

    /// 计算作业 -> Worker 的分配
    fn schedule_job(
        &self,
        jobs: &HashMap<JobId, Job>,
        workers: &BTreeSet<WorkerId>,
        context: &SchedulingContext,
    ) -> Assignment;
}

/// 重新调度触发接口
///
/// 状态检查器的周期任务通过它要求Dispatcher重新计算调度。
pub trait Rescheduler: Send + Sync {
    fn reschedule(&self) -> SchedulerResult<()>;
}
