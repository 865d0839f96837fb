use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
};

use super::{empty_assignment, required_throughput, WorkerPool};

/// 基于截止时间的调度（优先级数值越小越紧急）
///
/// 作业按优先级数值升序处理。每个作业需要的吞吐量为
/// `剩余任务数 / 距截止时间秒数`，从最快的Worker开始累加 `1 / 单任务耗时`，
/// 达到需求或Worker数覆盖剩余任务数时停止。
#[derive(Debug, Default)]
pub struct DeadlineStrategy;

impl DeadlineStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingAlgorithm for DeadlineStrategy {
    fn name(&self) -> &str {
        "deadline"
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
            a.priority.cmp(&b.priority).then_with(|| a_id.cmp(b_id))
        });

        for (job_id, job) in order {
            if pool.is_empty() {
                break;
            }
            let undone = job.undone();
            if undone == 0 {
                continue;
            }
            let required = required_throughput(job, context);
            let taken = pool.take_for_throughput(job_id, job, context, required, undone);
            debug!(
                "截止时间调度: 作业 {} 需要吞吐量 {:.3}/s，分配 {:?}",
                job_id, required, taken
            );
            assignment.insert(job_id.clone(), taken);
        }

        assignment
    }
}
