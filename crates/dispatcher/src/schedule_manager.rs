use tracing::info;

use scheduler_core::{
    models::{JobId, ScheduleTables},
    sync::RwLock,
};

use crate::{decision_maker::DecisionMaker, job_registry::JobRegistry, status_checker::StatusChecker};

/// 调度表管理
///
/// 每次重新计算都在同一个写锁作用域内完成：快照作业注册表、读取存活
/// Worker和调度上下文、调用决策器、成对替换两张调度表。读者不会看到只
/// 更新了一半的调度表，并发的重新计算被串行化。
pub struct ScheduleManager {
    decision_maker: DecisionMaker,
    tables: RwLock<ScheduleTables>,
}

impl ScheduleManager {
    pub fn new(decision_maker: DecisionMaker) -> Self {
        Self {
            decision_maker,
            tables: RwLock::new(ScheduleTables::default()),
        }
    }

    pub fn algorithm_name(&self) -> &str {
        self.decision_maker.algorithm_name()
    }

    /// 重新计算调度表
    pub fn recompute(&self, registry: &JobRegistry, status_checker: &StatusChecker) {
        self.tables.with_write_lock(|tables| {
            let mut jobs = registry.snapshot();
            for (job_id, job) in jobs.iter_mut() {
                if job.average_running_time.is_none() {
                    job.average_running_time = status_checker.job_average(job_id);
                }
            }
            let worker_status = status_checker.worker_statuses();
            let context = status_checker.scheduling_context();

            let assignment = self
                .decision_maker
                .schedule_job(&jobs, &worker_status, &context);
            *tables = ScheduleTables::from_assignment(assignment);

            info!(
                "调度表已更新: {} 个作业, {} 个Worker已分配",
                tables.job_to_workers.len(),
                tables.worker_to_job.len()
            );
        });
    }

    /// Worker当前被分配到的作业
    pub fn job_of(&self, worker_id: &str) -> Option<JobId> {
        self.tables
            .with_read_lock(|tables| tables.job_of(worker_id).cloned())
    }

    pub fn is_assigned(&self, worker_id: &str, job_id: &str) -> bool {
        self.tables
            .with_read_lock(|tables| tables.job_of(worker_id).is_some_and(|id| id == job_id))
    }

    pub fn tables(&self) -> ScheduleTables {
        self.tables.with_read_lock(|tables| tables.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_checker::StatusCheckerConfig;
    use crate::test_utils::FakeWorker;
    use chrono::{Duration, Utc};
    use scheduler_core::models::{Job, Task};
    use scheduler_core::traits::WorkerClient;
    use std::sync::Arc;

    #[test]
    fn test_recompute_replaces_both_tables() {
        let registry = JobRegistry::new();
        let workers: Vec<Arc<dyn WorkerClient>> = vec![
            FakeWorker::new("w1"),
            FakeWorker::new("w2"),
            FakeWorker::new("w3"),
        ];
        let checker = StatusChecker::new(workers, StatusCheckerConfig::default());
        checker.collect_status();
        checker.set_worker_status("w3", scheduler_core::models::WorkerStatus::Down);

        let manager = ScheduleManager::new(DecisionMaker::from_name("edf").unwrap());
        manager.recompute(&registry, &checker);
        assert!(manager.tables().job_to_workers.is_empty());

        let deadline = Utc::now() + Duration::seconds(60);
        registry
            .insert_all(vec![
                Job::new(1, deadline, vec![Task::delay(1.0); 5])
                    .unwrap()
                    .with_id("a"),
            ])
            .unwrap();
        manager.recompute(&registry, &checker);

        let tables = manager.tables();
        assert_eq!(tables.workers_of("a"), ["w1", "w2"]);
        assert_eq!(manager.job_of("w2").as_deref(), Some("a"));
        assert!(manager.job_of("w3").is_none());
        assert!(manager.is_assigned("w1", "a"));
        assert!(!manager.is_assigned("w1", "b"));

        registry.remove("a").unwrap();
        manager.recompute(&registry, &checker);
        assert!(manager.job_of("w1").is_none());
        assert!(manager.tables().worker_to_job.is_empty());
    }
}
