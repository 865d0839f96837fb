use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error};

use scheduler_core::{
    models::{Job, JobId},
    sync::RwLock,
    SchedulerError, SchedulerResult,
};

/// 作业注册表事件的订阅者
///
/// 回调在注册表写锁释放之后、修改调用返回之前同步执行。
pub trait JobListener: Send + Sync {
    fn on_jobs_submitted(&self, job_ids: &[JobId]) -> SchedulerResult<()>;

    fn on_jobs_deleted(&self, job_ids: &[JobId]) -> SchedulerResult<()>;
}

/// 作业注册表
///
/// 作业以 `Arc<Job>` 保存，任务生命周期调用只需要读锁查找，随后在锁外
/// 以无锁方式修改进度。
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    listeners: RwLock<Vec<Arc<dyn JobListener>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn JobListener>) {
        self.listeners.with_write_lock(|listeners| listeners.push(listener));
    }

    /// 插入一批已带ID的作业
    ///
    /// 任一ID与注册表中或本批次中的其他作业重复时整批拒绝。
    pub fn insert_all(&self, jobs: Vec<Job>) -> SchedulerResult<Vec<JobId>> {
        let ids = self.jobs.with_write_lock(|registered| {
            let mut batch = HashSet::new();
            for job in &jobs {
                let id = job.id.as_ref().ok_or_else(|| {
                    SchedulerError::InvalidMessage("提交的作业缺少ID".to_string())
                })?;
                if registered.contains_key(id) || !batch.insert(id.clone()) {
                    return Err(SchedulerError::DuplicateJob { id: id.clone() });
                }
            }

            let mut ids = Vec::with_capacity(jobs.len());
            for job in jobs {
                if let Some(id) = job.id.clone() {
                    registered.insert(id.clone(), Arc::new(job));
                    ids.push(id);
                }
            }
            Ok(ids)
        })?;

        debug!("注册作业: {:?}", ids);
        self.publish(|listener| listener.on_jobs_submitted(&ids))?;
        Ok(ids)
    }

    /// 移除作业并发布删除事件
    pub fn remove(&self, job_id: &str) -> SchedulerResult<Arc<Job>> {
        let job = self
            .jobs
            .with_write_lock(|registered| registered.remove(job_id))
            .ok_or_else(|| SchedulerError::job_not_found(job_id))?;

        debug!("移除作业: {}", job_id);
        let ids = vec![job_id.to_string()];
        self.publish(|listener| listener.on_jobs_deleted(&ids))?;
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> SchedulerResult<Arc<Job>> {
        self.jobs
            .with_read_lock(|registered| registered.get(job_id).cloned())
            .ok_or_else(|| SchedulerError::job_not_found(job_id))
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs
            .with_read_lock(|registered| registered.contains_key(job_id))
    }

    /// 深拷贝当前全部作业，拷贝与注册表中的进度互不影响
    pub fn snapshot(&self) -> HashMap<JobId, Job> {
        self.jobs.with_read_lock(|registered| {
            registered
                .iter()
                .map(|(id, job)| (id.clone(), Job::clone(job)))
                .collect()
        })
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .jobs
            .with_read_lock(|registered| registered.keys().cloned().collect());
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs.with_read_lock(|registered| registered.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 依次通知所有订阅者，全部通知完后返回第一个错误
    fn publish(
        &self,
        notify: impl Fn(&dyn JobListener) -> SchedulerResult<()>,
    ) -> SchedulerResult<()> {
        let listeners = self.listeners.with_read_lock(|listeners| listeners.clone());
        let mut first_error = None;
        for listener in listeners {
            if let Err(e) = notify(listener.as_ref()) {
                error!("作业事件处理失败: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
