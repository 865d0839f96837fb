use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
};

use super::{empty_assignment, required_throughput, WorkerPool};

/// 可抢占的截止时间调度（不考虑优先级）
///
/// 作业按截止时间升序处理：
/// 1. 已过期的作业尽力而为，分配 `min(剩余Worker数, 剩余任务数)` 个Worker；
///    未过期的作业从最快的Worker开始累加吞吐量直到满足需求或覆盖剩余任务数
/// 2. 第一轮之后剩下的Worker按同样顺序补给仍有未覆盖任务的作业
#[derive(Debug, Default)]
pub struct PreemptiveDeadlineStrategy;

impl PreemptiveDeadlineStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingAlgorithm for PreemptiveDeadlineStrategy {
    fn name(&self) -> &str {
        "preemptive_deadline"
    }

    fn schedule_job(
        &self,
        jobs: &HashMap<JobId, Job>,
        workers: &BTreeSet<WorkerId>,
        context: &SchedulingContext,
    ) -> Assignment {
        let mut assignment = empty_assignment(jobs);
        let mut pool = WorkerPool::new(workers);

        let mut order: Vec<(&JobId, &Job)> = jobs.iter().collect();
        order.sort_by(|(a_id, a), (b_id, b)| {
            a.deadline.cmp(&b.deadline).then_with(|| a_id.cmp(b_id))
        });

        for (job_id, job) in &order {
            if pool.is_empty() {
                break;
            }
            let undone = job.undone();
            if undone == 0 {
                continue;
            }
            let taken = if job.seconds_until_deadline(context.now) <= 0.0 {
                pool.take_fastest_n(job_id, job, context, undone)
            } else {
                let required = required_throughput(job, context);
                pool.take_for_throughput(job_id, job, context, required, undone)
            };
            assignment.insert((*job_id).clone(), taken);
        }

        for (job_id, job) in &order {
            if pool.is_empty() {
                break;
            }
            let allocated = assignment.get(*job_id).map_or(0, Vec::len);
            let wanted = job.undone().saturating_sub(allocated);
            if wanted == 0 {
                continue;
            }
            let extra = pool.take_fastest_n(job_id, job, context, wanted);
            debug!("截止时间调度第二轮: 作业 {} 追加 {:?}", job_id, extra);
            assignment.entry((*job_id).clone()).or_default().extend(extra);
        }

        assignment
    }
}
