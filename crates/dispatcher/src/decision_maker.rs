use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use scheduler_core::{
    models::{Assignment, Job, JobId, SchedulingContext, WorkerId, WorkerStatus},
    traits::SchedulingAlgorithm,
    SchedulerResult,
};

use crate::strategies::create_algorithm;

/// 决策器
///
/// 持有一个配置好的调度算法，把Dispatcher的调度调用转发给它。
pub struct DecisionMaker {
    algorithm: Arc<dyn SchedulingAlgorithm>,
}

impl DecisionMaker {
    pub fn new(algorithm: Arc<dyn SchedulingAlgorithm>) -> Self {
        info!("调度算法: {}", algorithm.name());
        Self { algorithm }
    }

    /// 按配置名称创建
    pub fn from_name(name: &str) -> SchedulerResult<Self> {
        Ok(Self::new(create_algorithm(name)?))
    }

    pub fn algorithm_name(&self) -> &str {
        self.algorithm.name()
    }

    /// 以非 DOWN 的Worker为候选计算分配，结果原样返回
    pub fn schedule_job(
        &self,
        jobs: &HashMap<JobId, Job>,
        worker_status: &HashMap<WorkerId, WorkerStatus>,
        context: &SchedulingContext,
    ) -> Assignment {
        let workers: BTreeSet<WorkerId> = worker_status
            .iter()
            .filter(|(_, status)| status.is_live())
            .map(|(id, _)| id.clone())
            .collect();

        let started = Instant::now();
        let assignment = self.algorithm.schedule_job(jobs, &workers, context);
        let elapsed = started.elapsed();

        let algorithm = self.algorithm.name().to_string();
        metrics::counter!("scheduler_scheduling_passes_total", "algorithm" => algorithm.clone())
            .increment(1);
        metrics::histogram!("scheduler_scheduling_duration_seconds", "algorithm" => algorithm)
            .record(elapsed.as_secs_f64());
        debug!(
            "调度计算完成: {} 个作业, {} 个候选Worker, 耗时 {:?}",
            jobs.len(),
            workers.len(),
            elapsed
        );
        assignment
    }
}

impl std::fmt::Debug for DecisionMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionMaker")
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use scheduler_core::models::Task;

    #[test]
    fn test_down_workers_are_not_candidates() {
        let decision_maker = DecisionMaker::from_name("edf").unwrap();
        assert_eq!(decision_maker.algorithm_name(), "edf");

        let now = Utc::now();
        let mut jobs = HashMap::new();
        jobs.insert(
            "a".to_string(),
            Job::new(1, now + Duration::seconds(30), vec![Task::delay(1.0); 3]).unwrap(),
        );
        let mut status = HashMap::new();
        status.insert("w1".to_string(), WorkerStatus::Available);
        status.insert("w2".to_string(), WorkerStatus::Down);
        status.insert("w3".to_string(), WorkerStatus::Busy);

        let assignment = decision_maker.schedule_job(&jobs, &status, &SchedulingContext::new(now));
        assert_eq!(assignment["a"], vec!["w1", "w3"]);
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert!(DecisionMaker::from_name("fifo").is_err());
    }
}
