use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use scheduler_core::{
    models::{mean, Assignment, Job, JobId, SchedulingContext, WorkerId},
    traits::SchedulingAlgorithm,
};

use super::{empty_assignment, estimate_runtime, WorkerPool};

/// 基于工作量的调度
///
/// 工作量 = 剩余任务数 × 在所有可用Worker上的平均预估耗时。作业按工作量降序：
/// 1. 供给允许时每个作业先拿一个Worker
/// 2. 剩余Worker按工作量占比向下取整分配，不超过作业的剩余任务数
/// 3. 仍未分配的Worker从工作量最大的作业开始补给，同样不超过剩余任务数
#[derive(Debug, Default)]
pub struct WorkloadStrategy;

impl WorkloadStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SchedulingAlgorithm for WorkloadStrategy {
    fn name(&self) -> &str {
        "workload"
    }

    fn schedule_job(
        &self,
        jobs: &HashMap<JobId, Job>,
        workers: &BTreeSet<WorkerId>,
        context: &SchedulingContext,
    ) -> Assignment {
        let mut assignment = empty_assignment(jobs);
        if workers.is_empty() {
            return assignment;
        }
        let mut pool = WorkerPool::new(workers);

        let mut order: Vec<(&JobId, &Job, f64)> = jobs
            .iter()
            .filter(|(_, job)| job.undone() > 0)
            .map(|(job_id, job)| {
                let average = mean(
                    workers
                        .iter()
                        .map(|worker| estimate_runtime(job_id, job, worker, context)),
                )
                .unwrap_or(0.0);
                (job_id, job, job.undone() as f64 * average)
            })
            .collect();
        order.sort_by(|(a_id, _, a_load), (b_id, _, b_load)| {
            b_load.total_cmp(a_load).then_with(|| a_id.cmp(b_id))
        });

        for (job_id, job, _) in &order {
            let Some((worker, _)) = pool.take_fastest(job_id, job, context) else {
                break;
            };
            assignment.entry((*job_id).clone()).or_default().push(worker);
        }

        let budget = pool.len();
        let total_load: f64 = order.iter().map(|(_, _, load)| load).sum();
        if budget > 0 && total_load > 0.0 {
            for (job_id, job, load) in &order {
                let share = (budget as f64 * load / total_load).floor() as usize;
                let allocated = assignment.get(*job_id).map_or(0, Vec::len);
                let count = share.min(job.undone().saturating_sub(allocated));
                if count == 0 {
                    continue;
                }
                let extra = pool.take_fastest_n(job_id, job, context, count);
                debug!("工作量调度: 作业 {} (工作量 {:.1}) 按比例追加 {:?}", job_id, load, extra);
                assignment.entry((*job_id).clone()).or_default().extend(extra);
            }
        }

        for (job_id, job, _) in &order {
            if pool.is_empty() {
                break;
            }
            let allocated = assignment.get(*job_id).map_or(0, Vec::len);
            let wanted = job.undone().saturating_sub(allocated);
            if wanted > 0 {
                let extra = pool.take_fastest_n(job_id, job, context, wanted);
                assignment.entry((*job_id).clone()).or_default().extend(extra);
            }
        }

        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::fixtures::*;
    use chrono::Utc;

    fn workers(count: usize) -> BTreeSet<WorkerId> {
        (1..=count).map(|i| format!("w{i:02}")).collect()
    }

    #[test]
    fn test_proportional_shares() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        // 工作量 30:10（耗时相同，任务数 3:1 的比例放大）
        jobs.insert("heavy".to_string(), job_due_in(now, 0, 60, 30));
        jobs.insert("light".to_string(), job_due_in(now, 0, 60, 10));

        let assignment = WorkloadStrategy::new().schedule_job(&jobs, &workers(10), &context);
        // 保底各1个，剩余8个按 3:1 分为 6 和 2
        assert_eq!(assignment["heavy"].len(), 7);
        assert_eq!(assignment["light"].len(), 3);
    }

    #[test]
    fn test_every_job_gets_one_before_shares() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("huge".to_string(), job_due_in(now, 0, 60, 100));
        jobs.insert("tiny".to_string(), job_due_in(now, 0, 60, 1));

        let assignment = WorkloadStrategy::new().schedule_job(&jobs, &workers(2), &context);
        assert_eq!(assignment["huge"].len(), 1);
        assert_eq!(assignment["tiny"].len(), 1);
    }

    #[test]
    fn test_leftovers_to_highest_workload_capped_by_undone() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        jobs.insert("big".to_string(), job_due_in(now, 0, 60, 2));
        jobs.insert("small".to_string(), job_due_in(now, 0, 60, 1));

        let assignment = WorkloadStrategy::new().schedule_job(&jobs, &workers(5), &context);
        assert_eq!(assignment["big"].len(), 2);
        assert_eq!(assignment["small"].len(), 1);
    }

    #[test]
    fn test_slower_estimates_raise_workload() {
        let now = Utc::now();
        let context = SchedulingContext::new(now);
        let mut jobs = HashMap::new();
        let mut slow = job_due_in(now, 0, 60, 2);
        slow.average_running_time = Some(100.0);
        let mut quick = job_due_in(now, 0, 60, 2);
        quick.average_running_time = Some(1.0);
        jobs.insert("slow".to_string(), slow);
        jobs.insert("quick".to_string(), quick);

        let assignment = WorkloadStrategy::new().schedule_job(&jobs, &workers(1), &context);
        assert_eq!(assignment["slow"].len(), 1);
        assert!(assignment["quick"].is_empty());
    }
}
