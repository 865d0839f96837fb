use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use scheduler_core::{
    models::{
        ClientMessage, Job, JobId, Progress, ScheduleTables, TaskResult, WorkerId, WorkerStatus,
    },
    sync::{BlockingQueue, RwLock},
    traits::{JobService, Rescheduler, WorkerClient, WorkerCoordinator},
    SchedulerError, SchedulerResult,
};

use crate::{
    decision_maker::DecisionMaker,
    job_registry::{JobListener, JobRegistry},
    mailbox::Mailbox,
    schedule_manager::ScheduleManager,
    status_checker::StatusChecker,
};

type WorkerQueue = BlockingQueue<WorkerId>;

/// 作业ID -> Worker队列
///
/// 作业删除后其队列转入 `retired`，只保留弱引用。同一ID再次提交时，
/// 若仍有线程阻塞在旧队列上，则原地清空并复用该队列对象。
#[derive(Default)]
struct QueueTable {
    active: HashMap<JobId, Arc<WorkerQueue>>,
    retired: HashMap<JobId, Weak<WorkerQueue>>,
}

impl QueueTable {
    fn get(&self, job_id: &str) -> Option<&Arc<WorkerQueue>> {
        self.active.get(job_id)
    }

    /// 为新提交的作业准备队列，返回被清出的Worker
    fn open(&mut self, job_id: &str) -> Vec<WorkerId> {
        if let Some(queue) = self.active.get(job_id) {
            return queue.clear();
        }
        let queue = self
            .retired
            .remove(job_id)
            .and_then(|weak| weak.upgrade())
            .unwrap_or_else(|| Arc::new(WorkerQueue::new()));
        let drained = queue.clear();
        self.active.insert(job_id.to_string(), queue);
        self.prune();
        drained
    }

    /// 删除作业的队列，返回未被使用的Worker
    fn close(&mut self, job_id: &str) -> Vec<WorkerId> {
        let drained = match self.active.remove(job_id) {
            Some(queue) => {
                let drained = queue.clear();
                self.retired
                    .insert(job_id.to_string(), Arc::downgrade(&queue));
                drained
            }
            None => Vec::new(),
        };
        self.prune();
        drained
    }

    fn prune(&mut self) {
        self.retired.retain(|_, weak| weak.strong_count() > 0);
    }
}

/// Worker不在任何队列中、却仍为某个作业保留的原因
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hold {
    /// 已占用成功，正在进入队列
    Joining(JobId),
    /// 已被任务执行方通过 `require_worker` 取走，`checks` 为此后经历的占用检查次数
    Leased { job_id: JobId, checks: u32 },
}

impl Hold {
    fn job_id(&self) -> &str {
        match self {
            Hold::Joining(job_id) | Hold::Leased { job_id, .. } => job_id,
        }
    }
}

/// 取走后经过这么多次占用检查仍未开始执行的Worker视为被遗弃
const LEASE_EXPIRY_CHECKS: u32 = 3;

/// 调度中心
///
/// 持有作业注册表、每个作业的Worker队列、客户端邮箱和调度表管理器。
/// Worker进入某个作业的队列之前必须先被自己原子占用成功，因此同一个Worker
/// 不会同时出现在两个队列中。
pub struct Dispatcher {
    registry: JobRegistry,
    queues: RwLock<QueueTable>,
    schedule: ScheduleManager,
    status_checker: Arc<StatusChecker>,
    mailbox: Mailbox,
    holds: Mutex<HashMap<WorkerId, Hold>>,
}

/// 注册到作业注册表上的Dispatcher回调
struct DispatcherHandle(Weak<Dispatcher>);

impl JobListener for DispatcherHandle {
    fn on_jobs_submitted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        match self.0.upgrade() {
            Some(dispatcher) => dispatcher.on_jobs_submitted(job_ids),
            None => Ok(()),
        }
    }

    fn on_jobs_deleted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        match self.0.upgrade() {
            Some(dispatcher) => dispatcher.on_jobs_deleted(job_ids),
            None => Ok(()),
        }
    }
}

impl Dispatcher {
    /// 创建Dispatcher并完成事件订阅
    ///
    /// 状态检查器先于Dispatcher收到作业事件，保证耗时记录在调度前登记。
    pub fn new(decision_maker: DecisionMaker, status_checker: Arc<StatusChecker>) -> Arc<Self> {
        let dispatcher = Arc::new_cyclic(|weak: &Weak<Dispatcher>| {
            let registry = JobRegistry::new();
            registry.subscribe(status_checker.clone());
            registry.subscribe(Arc::new(DispatcherHandle(weak.clone())));
            Self {
                registry,
                queues: RwLock::new(QueueTable::default()),
                schedule: ScheduleManager::new(decision_maker),
                status_checker: Arc::clone(&status_checker),
                mailbox: Mailbox::new(),
                holds: Mutex::new(HashMap::new()),
            }
        });

        let rescheduler: Weak<dyn Rescheduler> = Arc::downgrade(&dispatcher) as Weak<dyn Rescheduler>;
        dispatcher.status_checker.set_rescheduler(rescheduler);
        info!(
            "Dispatcher已创建，调度算法: {}",
            dispatcher.schedule.algorithm_name()
        );
        dispatcher
    }

    /// 启动周期状态检查
    pub fn start(&self) -> SchedulerResult<()> {
        self.status_checker.start()
    }

    pub fn stop(&self) {
        self.status_checker.stop();
    }

    pub fn status_checker(&self) -> &Arc<StatusChecker> {
        &self.status_checker
    }

    fn on_jobs_submitted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        let mut drained = Vec::new();
        self.queues.with_write_lock(|queues| {
            for job_id in job_ids {
                drained.extend(queues.open(job_id));
            }
        });
        self.release_workers(drained);

        self.status_checker.require_recollect_status();
        self.schedule.recompute(&self.registry, &self.status_checker);
        self.offer_available_workers();
        Ok(())
    }

    fn on_jobs_deleted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        let mut drained = Vec::new();
        self.queues.with_write_lock(|queues| {
            for job_id in job_ids {
                drained.extend(queues.close(job_id));
            }
        });
        self.holds()
            .retain(|_, hold| !job_ids.iter().any(|job_id| job_id == hold.job_id()));
        self.release_workers(drained);

        self.schedule.recompute(&self.registry, &self.status_checker);
        self.status_checker.require_recollect_status();
        self.offer_available_workers();
        Ok(())
    }

    /// 把未被使用的Worker放回 AVAILABLE
    fn release_workers(&self, workers: Vec<WorkerId>) {
        for worker_id in workers {
            let released = self
                .status_checker
                .worker(&worker_id)
                .and_then(|worker| worker.release());
            match released {
                Ok(()) => {
                    debug!("释放队列中未使用的Worker: {}", worker_id);
                    self.status_checker
                        .set_worker_status(&worker_id, WorkerStatus::Available);
                }
                Err(e) if e.is_connectivity() => {
                    warn!("释放Worker {} 失败，标记为DOWN: {}", worker_id, e);
                    self.status_checker
                        .set_worker_status(&worker_id, WorkerStatus::Down);
                }
                Err(e) => warn!("释放Worker {} 失败: {}", worker_id, e),
            }
        }
    }

    /// 让当前所有空闲Worker走一遍可用通知流程
    fn offer_available_workers(&self) {
        for worker_id in self
            .status_checker
            .workers_with_status(WorkerStatus::Available)
        {
            if let Err(e) = self.on_worker_available(&worker_id) {
                warn!("向Worker {} 分配作业失败: {}", worker_id, e);
                if e.is_connectivity() {
                    self.status_checker
                        .set_worker_status(&worker_id, WorkerStatus::Down);
                }
            }
        }
    }

    /// 手动触发一次重新调度
    pub fn reschedule(&self) -> SchedulerResult<()> {
        self.schedule.recompute(&self.registry, &self.status_checker);
        self.offer_available_workers();
        Ok(())
    }

    pub fn algorithm_name(&self) -> &str {
        self.schedule.algorithm_name()
    }

    pub fn schedule_tables(&self) -> ScheduleTables {
        self.schedule.tables()
    }

    pub fn worker_statuses(&self) -> HashMap<WorkerId, WorkerStatus> {
        self.status_checker.worker_statuses()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.registry.job_ids()
    }

    pub fn job(&self, job_id: &str) -> SchedulerResult<Arc<Job>> {
        self.registry.get(job_id)
    }

    /// 各作业队列中等待的Worker
    pub fn queued_workers(&self) -> HashMap<JobId, Vec<WorkerId>> {
        self.queues.with_read_lock(|queues| {
            queues
                .active
                .iter()
                .map(|(job_id, queue)| (job_id.clone(), queue.snapshot()))
                .collect()
        })
    }

    fn queue(&self, job_id: &str) -> SchedulerResult<Arc<WorkerQueue>> {
        self.queues
            .with_read_lock(|queues| queues.get(job_id).cloned())
            .ok_or_else(|| SchedulerError::job_not_found(job_id))
    }

    fn holds(&self) -> MutexGuard<'_, HashMap<WorkerId, Hold>> {
        self.holds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 只在Worker仍被该作业租用时结束租用
    fn end_lease(&self, worker_id: &str, job_id: &str) {
        let mut holds = self.holds();
        if matches!(holds.get(worker_id), Some(Hold::Leased { job_id: held, .. }) if held == job_id)
        {
            holds.remove(worker_id);
        }
    }

    /// 占用检查时调用：Worker是否仍为该作业保留，过期的租用在此移除
    fn hold_survives_check(&self, worker_id: &str, job_id: &str) -> bool {
        let mut holds = self.holds();
        let expired = match holds.get_mut(worker_id) {
            Some(Hold::Joining(held)) => return held.as_str() == job_id,
            Some(Hold::Leased { job_id: held, checks }) if held.as_str() == job_id => {
                *checks += 1;
                *checks >= LEASE_EXPIRY_CHECKS
            }
            _ => return false,
        };
        if expired {
            holds.remove(worker_id);
        }
        !expired
    }

    /// Worker是否在某个作业的队列中或被保留
    fn is_accounted(&self, worker_id: &str) -> bool {
        if self.holds().contains_key(worker_id) {
            return true;
        }
        let worker_id = worker_id.to_string();
        self.queues.with_read_lock(|queues| {
            queues
                .active
                .values()
                .any(|queue| queue.contains(&worker_id))
        })
    }

    /// 占用Worker并放入作业队列，返回是否占用成功
    fn enqueue(&self, worker_id: &str, job_id: &str) -> SchedulerResult<bool> {
        let worker = self.status_checker.worker(worker_id)?;
        if !worker.occupy(job_id)? {
            debug!("Worker {} 已被占用，忽略可用通知", worker_id);
            return Ok(false);
        }

        let queued = self.queues.with_read_lock(|queues| match queues.get(job_id) {
            Some(queue) => {
                self.status_checker
                    .set_worker_status(worker_id, WorkerStatus::Occupied);
                queue.push(worker_id.to_string());
                true
            }
            None => false,
        });

        if queued {
            debug!("Worker {} 进入作业 {} 的队列", worker_id, job_id);
        } else {
            debug!("作业 {} 已结束，释放Worker {}", job_id, worker_id);
            worker.release()?;
        }
        Ok(true)
    }

    fn notify_client(&self, job: &Job, message: ClientMessage) {
        let Some(client_id) = &job.client_id else {
            return;
        };
        if let Err(e) = self.mailbox.push_message(client_id, message) {
            debug!("通知客户端 {} 失败: {}", client_id, e);
        }
    }
}

impl WorkerCoordinator for Dispatcher {
    fn on_worker_available(&self, worker_id: &str) -> SchedulerResult<()> {
        let Some(job_id) = self.schedule.job_of(worker_id) else {
            debug!("Worker {} 当前没有分配作业", worker_id);
            return Ok(());
        };

        let joining = Hold::Joining(job_id.clone());
        let previous = self.holds().insert(worker_id.to_string(), joining.clone());
        let claimed = self.enqueue(worker_id, &job_id);

        let mut holds = self.holds();
        if holds.get(worker_id) == Some(&joining) {
            match (&claimed, previous) {
                // 占用成功说明之前的租用已经结束
                (Ok(true), _) | (_, None) => {
                    holds.remove(worker_id);
                }
                (_, Some(previous)) => {
                    holds.insert(worker_id.to_string(), previous);
                }
            }
        }
        claimed.map(|_| ())
    }

    fn check_assignment(&self, worker_id: &str, job_id: &str) -> SchedulerResult<bool> {
        let Some(queue) = self
            .queues
            .with_read_lock(|queues| queues.get(job_id).cloned())
        else {
            return Ok(false);
        };
        let worker = worker_id.to_string();

        if !self.schedule.is_assigned(worker_id, job_id) && queue.remove(&worker) {
            // 仍在队列中却已不属于该作业，撤出后由Worker自行释放
            return Ok(false);
        }
        if queue.contains(&worker) {
            return Ok(true);
        }
        // 出队与登记租用在同一把队列锁内完成，这里不会漏看
        let held = self.hold_survives_check(worker_id, job_id);
        if !held {
            info!(
                "Worker {} 声称占用作业 {}，但既不在队列中也没有有效租用",
                worker_id, job_id
            );
        }
        Ok(held)
    }
}

impl JobService for Dispatcher {
    fn submit_jobs(&self, jobs: Vec<Job>) -> SchedulerResult<Vec<JobId>> {
        let jobs: Vec<Job> = jobs
            .into_iter()
            .map(|mut job| {
                if job.id.is_none() {
                    job.assign_id(Uuid::new_v4().to_string());
                }
                job
            })
            .collect();

        let ids = self.registry.insert_all(jobs)?;
        info!("提交作业 {} 个: {:?}", ids.len(), ids);
        for job_id in &ids {
            if let Ok(job) = self.registry.get(job_id) {
                self.notify_client(
                    &job,
                    ClientMessage::JobSubmitted {
                        job_id: job_id.clone(),
                    },
                );
            }
        }
        Ok(ids)
    }

    fn require_worker(&self, job_id: &str) -> SchedulerResult<WorkerId> {
        let queue = self.queue(job_id)?;
        let lease = Hold::Leased {
            job_id: job_id.to_string(),
            checks: 0,
        };
        let worker_id = queue.pop_with(|worker_id| {
            self.holds().insert(worker_id.clone(), lease);
        });
        self.status_checker
            .set_worker_status(&worker_id, WorkerStatus::Busy);
        debug!("作业 {} 取得Worker {}", job_id, worker_id);
        Ok(worker_id)
    }

    fn task_sent(&self, job_id: &str) -> SchedulerResult<Progress> {
        self.registry.get(job_id)?.task_sent()
    }

    fn task_done(&self, job_id: &str, result: &TaskResult) -> SchedulerResult<Progress> {
        let progress = self.registry.get(job_id)?.task_done()?;
        self.status_checker
            .log_running_time(job_id, result.duration_seconds);
        Ok(progress)
    }

    fn task_redo(&self, job_id: &str) -> SchedulerResult<Progress> {
        self.registry.get(job_id)?.task_redo()
    }

    fn return_worker(&self, job_id: &str, worker_id: &str) -> SchedulerResult<()> {
        self.end_lease(worker_id, job_id);
        let worker = self.status_checker.worker(worker_id)?;
        let status = match worker.status() {
            Ok(status) => status,
            Err(e) if e.is_connectivity() => {
                warn!("归还的Worker {} 不可达，标记为DOWN: {}", worker_id, e);
                self.status_checker
                    .set_worker_status(worker_id, WorkerStatus::Down);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        // 已开始执行或已重新入队的Worker由它自己的流程负责
        if status != WorkerStatus::Occupied || self.is_accounted(worker_id) {
            return Ok(());
        }

        info!("作业 {} 归还未使用的Worker {}", job_id, worker_id);
        worker.release()?;
        self.status_checker
            .set_worker_status(worker_id, WorkerStatus::Available);
        self.on_worker_available(worker_id)
    }

    fn job_done(&self, job_id: &str) -> SchedulerResult<()> {
        let job = self.registry.remove(job_id)?;
        info!("作业 {} 完成，进度 {:?}", job_id, job.progress());
        self.notify_client(
            &job,
            ClientMessage::JobCompleted {
                job_id: job_id.to_string(),
            },
        );
        Ok(())
    }

    fn register_client(&self, client_id: &str) -> SchedulerResult<()> {
        self.mailbox.register_client(client_id);
        Ok(())
    }

    fn unregister_client(&self, client_id: &str) -> SchedulerResult<()> {
        self.mailbox.unregister_client(client_id)
    }

    fn push_message(&self, client_id: &str, message: ClientMessage) -> SchedulerResult<()> {
        self.mailbox.push_message(client_id, message)
    }

    fn get_messages(
        &self,
        client_id: &str,
        timeout: Duration,
    ) -> SchedulerResult<Vec<ClientMessage>> {
        self.mailbox.get_messages(client_id, timeout)
    }
}

impl Rescheduler for Dispatcher {
    fn reschedule(&self) -> SchedulerResult<()> {
        Dispatcher::reschedule(self)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.status_checker.stop();
    }
}
