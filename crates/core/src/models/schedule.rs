use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobId, WorkerId};

/// 一次调度计算的结果：作业 -> 有序Worker列表
pub type Assignment = HashMap<JobId, Vec<WorkerId>>;

/// 调度表及其逆表，总是成对替换
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTables {
    pub job_to_workers: Assignment,
    pub worker_to_job: HashMap<WorkerId, JobId>,
}

impl ScheduleTables {
    pub fn from_assignment(assignment: Assignment) -> Self {
        let worker_to_job = assignment
            .iter()
            .flat_map(|(job_id, workers)| {
                workers
                    .iter()
                    .map(move |worker_id| (worker_id.clone(), job_id.clone()))
            })
            .collect();
        Self {
            job_to_workers: assignment,
            worker_to_job,
        }
    }

    pub fn job_of(&self, worker_id: &str) -> Option<&JobId> {
        self.worker_to_job.get(worker_id)
    }

    pub fn workers_of(&self, job_id: &str) -> &[WorkerId] {
        self.job_to_workers
            .get(job_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// 调度算法的辅助输入
///
/// 携带每个作业的历史耗时与全系统平均耗时，用于在作业没有为某个
/// Worker给出显式耗时时估算吞吐量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingContext {
    pub now: DateTime<Utc>,
    pub job_running_times: HashMap<JobId, Vec<f64>>,
    pub system_average: Option<f64>,
}

impl SchedulingContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            job_running_times: HashMap::new(),
            system_average: None,
        }
    }

    pub fn with_history(mut self, job_running_times: HashMap<JobId, Vec<f64>>) -> Self {
        self.system_average = mean(job_running_times.values().flatten().copied());
        self.job_running_times = job_running_times;
        self
    }

    pub fn job_average(&self, job_id: &str) -> Option<f64> {
        self.job_running_times
            .get(job_id)
            .and_then(|times| mean(times.iter().copied()))
    }
}

impl Default for SchedulingContext {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// 算术平均，空序列返回None
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_inverse() {
        let mut assignment = Assignment::new();
        assignment.insert("a".to_string(), vec!["w1".to_string(), "w2".to_string()]);
        assignment.insert("b".to_string(), vec![]);
        let tables = ScheduleTables::from_assignment(assignment);

        assert_eq!(tables.job_of("w1").map(String::as_str), Some("a"));
        assert_eq!(tables.job_of("w2").map(String::as_str), Some("a"));
        assert!(tables.job_of("w3").is_none());
        assert!(tables.workers_of("b").is_empty());
        assert!(tables.workers_of("missing").is_empty());
    }

    #[test]
    fn test_context_averages() {
        let mut history = HashMap::new();
        history.insert("a".to_string(), vec![1.0, 3.0]);
        history.insert("b".to_string(), vec![8.0]);
        history.insert("c".to_string(), vec![]);
        let context = SchedulingContext::new(Utc::now()).with_history(history);

        assert_eq!(context.job_average("a"), Some(2.0));
        assert_eq!(context.job_average("c"), None);
        assert_eq!(context.job_average("zzz"), None);
        assert_eq!(context.system_average, Some(4.0));
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(Vec::new()), None);
    }
}
