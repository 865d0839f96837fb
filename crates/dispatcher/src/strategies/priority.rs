use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
};

use super::{empty_assignment, WorkerPool};

/// 基于优先级的调度（数值越大优先级越高）
///
/// 第一轮按优先级从高到低给每个有剩余任务的作业分配一个最快的Worker；
/// 第二轮仍按优先级顺序，把剩余Worker补给各作业，直到其剩余任务数。
#[derive(Debug, Default)]
pub struct PriorityStrategy;

impl PriorityStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingAlgorithm for PriorityStrategy {
    fn name(&self) -> &str {
        "priority"
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
        order.sort_by(|(a_id, a), (b_id, b)| b.priority.cmp(&a.priority).then_with(|| a_id.cmp(b_id)));

        for (job_id, job) in &order {
            if job.undone() == 0 {
                continue;
            }
            let Some((worker, _)) = pool.take_fastest(job_id, job, context) else {
                break;
            };
            debug!("优先级调度第一轮: 作业 {} (优先级 {}) <- {}", job_id, job.priority, worker);
            assignment.entry((*job_id).clone()).or_default().push(worker);
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
            assignment.entry((*job_id).clone()).or_default().extend(extra);
        }

        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::*;
    use chrono::Utc;

    #[test]
    fn test_highest_priority_served_before_second_round() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("low".to_string(), job_due_in(now, 1, 60, 5));
        jobs.insert("mid".to_string(), job_due_in(now, 2, 60, 5));
        jobs.insert("high".to_string(), job_due_in(now, 3, 60, 5));
        let workers: BTreeSet<WorkerId> =
            ["w1", "w2", "w3", "w4"].iter().map(|w| w.to_string()).collect();

        let assignment = PriorityStrategy::new().schedule_job(&jobs, &workers, &context);

        assert_eq!(assignment["high"].len(), 2);
        assert_eq!(assignment["mid"].len(), 1);
        assert_eq!(assignment["low"].len(), 1);
        // 所有Worker耗时相同，按ID顺序分配
        assert_eq!(assignment["high"], vec!["w1", "w4"]);
        assert_eq!(assignment["mid"], vec!["w2"]);
        assert_eq!(assignment["low"], vec!["w3"]);
    }

    #[test]
    fn test_scarce_workers_go_to_highest_priority() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("low".to_string(), job_due_in(now, 1, 60, 3));
        jobs.insert("high".to_string(), job_due_in(now, 9, 60, 3));
        let workers: BTreeSet<WorkerId> = ["w1"].iter().map(|w| w.to_string()).collect();

        let assignment = PriorityStrategy::new().schedule_job(&jobs, &workers, &context);
        assert_eq!(assignment["high"], vec!["w1"]);
        assert!(assignment["low"].is_empty());
    }

    #[test]
    fn test_fastest_worker_first_and_capped_by_undone() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert(
            "only".to_string(),
            job_due_in(now, 1, 60, 2)
                .with_worker_timing("slow", 30.0)
                .with_worker_timing("fast", 1.0)
                .with_worker_timing("medium", 5.0),
        );
        let workers: BTreeSet<WorkerId> =
            ["slow", "fast", "medium"].iter().map(|w| w.to_string()).collect();

        let assignment = PriorityStrategy::new().schedule_job(&jobs, &workers, &context);
        assert_eq!(assignment["only"], vec!["fast", "medium"]);
    }
}
