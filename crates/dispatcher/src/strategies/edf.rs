use std::collections::{BTreeSet, HashMap};

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
};

use super::{empty_assignment, WorkerPool};

/// 最早截止时间优先
///
/// 作业按 (截止时间, 优先级数值) 升序处理，每个作业依次拿走
/// `min(剩余Worker数, 剩余任务数)` 个最快的Worker，直到Worker用完。
#[derive(Debug, Default)]
pub struct EdfStrategy;

impl EdfStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingAlgorithm for EdfStrategy {
    fn name(&self) -> &str {
        "edf"
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
            a.deadline
                .cmp(&b.deadline)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a_id.cmp(b_id))
        });

        for (job_id, job) in order {
            if pool.is_empty() {
                break;
            }
            let count = pool.len().min(job.undone());
            let taken = pool.take_fastest_n(job_id, job, context, count);
            assignment.insert(job_id.clone(), taken);
        }

        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::*;
    use chrono::Utc;

    fn workers(ids: &[&str]) -> BTreeSet<WorkerId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_earliest_deadline_takes_what_it_needs() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("first".to_string(), job_due_in(now, 5, 10, 2));
        jobs.insert("second".to_string(), job_due_in(now, 1, 20, 4));

        let assignment =
            EdfStrategy::new().schedule_job(&jobs, &workers(&["w1", "w2", "w3"]), &context);
        assert_eq!(assignment["first"], vec!["w1", "w2"]);
        assert_eq!(assignment["second"], vec!["w3"]);
    }

    #[test]
    fn test_equal_deadlines_broken_by_priority() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let deadline = now + chrono::Duration::seconds(30);
        let mut jobs = HashMap::new();
        jobs.insert("b-low".to_string(), job(2, deadline, 1));
        jobs.insert("a-high".to_string(), job(1, deadline, 1));

        let assignment = EdfStrategy::new().schedule_job(&jobs, &workers(&["w1"]), &context);
        assert_eq!(assignment["a-high"], vec!["w1"]);
        assert!(assignment["b-low"].is_empty());
    }

    #[test]
    fn test_finished_jobs_get_nothing() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("done".to_string(), job_due_in(now, 0, 1, 0));
        jobs.insert("open".to_string(), job_due_in(now, 0, 2, 1));

        let assignment =
            EdfStrategy::new().schedule_job(&jobs, &workers(&["w1", "w2"]), &context);
        assert!(assignment["done"].is_empty());
        assert_eq!(assignment["open"], vec!["w1"]);
    }
}
