//! 调度算法
//!
//! 五种策略实现同一个 [`SchedulingAlgorithm`] 约定，区别在于作业排序键和分配规则：
//!
//! | 算法 | 作业顺序 | 分配规则 |
//! |---|---|---|
//! | [`PriorityStrategy`] | 优先级降序 | 先每个作业一个最快Worker，再按剩余任务数补足 |
//! | [`DeadlineStrategy`] | 优先级数值升序 | 累加吞吐量直到满足 `剩余任务数 / 剩余秒数` |
//! | [`PreemptiveDeadlineStrategy`] | 截止时间升序 | 同上，已过期作业尽力分配，剩余Worker第二轮补给 |
//! | [`EdfStrategy`] | (截止时间, 优先级) 升序 | 每个作业至多 `min(剩余Worker, 剩余任务数)` 个 |
//! | [`WorkloadStrategy`] | 工作量降序 | 保底一个，按工作量比例分配，余量给工作量最大者 |
//!
//! 所有策略都按预估单任务耗时从快到慢挑选Worker，耗时相同时按Worker ID排序，
//! 因此结果是确定的。

pub mod deadline;
pub mod edf;
pub mod preemptive_deadline;
pub mod priority;
pub mod workload;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
    SchedulerError, SchedulerResult,
};

pub use deadline::DeadlineStrategy;
pub use edf::EdfStrategy;
pub use preemptive_deadline::PreemptiveDeadlineStrategy;
pub use priority::PriorityStrategy;
pub use workload::WorkloadStrategy;

/// 没有任何耗时信息时使用的单任务耗时初始猜测（秒）
pub const INITIAL_RUNTIME_GUESS: f64 = 10.0;

/// 预估 `worker_id` 执行作业 `job_id` 单个任务的耗时
///
/// 优先级：作业给出的该Worker耗时 → 作业自身平均耗时 → 历史记录中该作业的平均耗时
/// → 全系统平均耗时 → [`INITIAL_RUNTIME_GUESS`]。非正数或非有限值被视为缺失。
pub fn estimate_runtime(
    job_id: &str,
    job: &Job,
    worker_id: &str,
    context: &SchedulingContext,
) -> f64 {
    let usable = |value: f64| value.is_finite() && value > 0.0;

    job.worker_timings
        .get(worker_id)
        .copied()
        .filter(|t| usable(*t))
        .or(job.average_running_time.filter(|t| usable(*t)))
        .or(context.job_average(job_id).filter(|t| usable(*t)))
        .or(context.system_average.filter(|t| usable(*t)))
        .unwrap_or(INITIAL_RUNTIME_GUESS)
}

/// 每个作业一个空列表
pub(crate) fn empty_assignment(jobs: &HashMap<JobId, Job>) -> Assignment {
    jobs.keys().map(|id| (id.clone(), Vec::new())).collect()
}

/// 一次调度计算中尚未分配的Worker
pub(crate) struct WorkerPool {
    remaining: BTreeSet<WorkerId>,
}

impl WorkerPool {
    pub(crate) fn new(workers: &BTreeSet<WorkerId>) -> Self {
        Self {
            remaining: workers.clone(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.remaining.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// 剩余Worker按对该作业的预估耗时从快到慢排序
    pub(crate) fn ranked(
        &self,
        job_id: &str,
        job: &Job,
        context: &SchedulingContext,
    ) -> Vec<(WorkerId, f64)> {
        let mut ranked: Vec<(WorkerId, f64)> = self
            .remaining
            .iter()
            .map(|worker| (worker.clone(), estimate_runtime(job_id, job, worker, context)))
            .collect();
        ranked.sort_by(|(a_id, a_time), (b_id, b_time)| {
            a_time.total_cmp(b_time).then_with(|| a_id.cmp(b_id))
        });
        ranked
    }

    /// 取走对该作业最快的Worker
    pub(crate) fn take_fastest(
        &mut self,
        job_id: &str,
        job: &Job,
        context: &SchedulingContext,
    ) -> Option<(WorkerId, f64)> {
        let fastest = self.ranked(job_id, job, context).into_iter().next()?;
        self.remaining.remove(&fastest.0);
        Some(fastest)
    }

    /// 取走对该作业最快的至多 `count` 个Worker
    pub(crate) fn take_fastest_n(
        &mut self,
        job_id: &str,
        job: &Job,
        context: &SchedulingContext,
        count: usize,
    ) -> Vec<WorkerId> {
        let taken: Vec<WorkerId> = self
            .ranked(job_id, job, context)
            .into_iter()
            .take(count)
            .map(|(worker, _)| worker)
            .collect();
        for worker in &taken {
            self.remaining.remove(worker);
        }
        taken
    }

    /// 按从快到慢累加吞吐量，直到达到 `required` 或Worker数达到 `max_count`
    pub(crate) fn take_for_throughput(
        &mut self,
        job_id: &str,
        job: &Job,
        context: &SchedulingContext,
        required: f64,
        max_count: usize,
    ) -> Vec<WorkerId> {
        let mut taken = Vec::new();
        let mut throughput = 0.0;
        for (worker, runtime) in self.ranked(job_id, job, context) {
            if throughput >= required || taken.len() >= max_count {
                break;
            }
            throughput += 1.0 / runtime;
            taken.push(worker);
        }
        for worker in &taken {
            self.remaining.remove(worker);
        }
        taken
    }
}

/// 满足截止时间所需的吞吐量（任务/秒），已过期时为无穷大
pub(crate) fn required_throughput(job: &Job, context: &SchedulingContext) -> f64 {
    let seconds = job.seconds_until_deadline(context.now);
    if seconds <= 0.0 {
        f64::INFINITY
    } else {
        job.undone() as f64 / seconds
    }
}

/// 可配置的调度算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Priority,
    Deadline,
    PreemptiveDeadline,
    Edf,
    Workload,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 5] = [
        AlgorithmKind::Priority,
        AlgorithmKind::Deadline,
        AlgorithmKind::PreemptiveDeadline,
        AlgorithmKind::Edf,
        AlgorithmKind::Workload,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::Priority => "priority",
            AlgorithmKind::Deadline => "deadline",
            AlgorithmKind::PreemptiveDeadline => "preemptive_deadline",
            AlgorithmKind::Edf => "edf",
            AlgorithmKind::Workload => "workload",
        }
    }

    pub fn build(&self) -> Arc<dyn SchedulingAlgorithm> {
        match self {
            AlgorithmKind::Priority => Arc::new(PriorityStrategy::new()),
            AlgorithmKind::Deadline => Arc::new(DeadlineStrategy::new()),
            AlgorithmKind::PreemptiveDeadline => Arc::new(PreemptiveDeadlineStrategy::new()),
            AlgorithmKind::Edf => Arc::new(EdfStrategy::new()),
            AlgorithmKind::Workload => Arc::new(WorkloadStrategy::new()),
        }
    }
}

impl FromStr for AlgorithmKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| SchedulerError::config_error(format!("未知的调度算法: {s}")))
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 按配置名称创建调度算法
pub fn create_algorithm(name: &str) -> SchedulerResult<Arc<dyn SchedulingAlgorithm>> {
    Ok(name.parse::<AlgorithmKind>()?.build())
}
