use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use scheduler_core::{
    models::{mean, JobId, SchedulingContext, WorkerId, WorkerStatus},
    sync::RwLock,
    traits::{Rescheduler, WorkerClient},
    SchedulerError, SchedulerResult,
};

use crate::job_registry::JobListener;

/// 状态检查配置
#[derive(Debug, Clone)]
pub struct StatusCheckerConfig {
    /// 周期检查间隔，最小1秒
    pub check_interval: Duration,
}

impl Default for StatusCheckerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct StatusTables {
    status: HashMap<WorkerId, WorkerStatus>,
    average_running_time: HashMap<WorkerId, f64>,
}

#[derive(Debug)]
struct TimerState {
    next_run: Instant,
    stopped: bool,
}

/// 周期检查计时器，可被重新计时或停止
#[derive(Debug)]
struct Timer {
    state: Mutex<TimerState>,
    changed: Condvar,
    interval: Duration,
}

impl Timer {
    fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(TimerState {
                next_run: Instant::now() + interval,
                stopped: false,
            }),
            changed: Condvar::new(),
            interval,
        }
    }

    /// 等到下一次检查时间，被停止时返回false
    fn wait_for_next_run(&self) -> bool {
        let mut state = self.lock();
        loop {
            if state.stopped {
                return false;
            }
            let now = Instant::now();
            if now >= state.next_run {
                state.next_run = now + self.interval;
                return true;
            }
            let wait = state.next_run - now;
            let (guard, _) = self
                .changed
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    fn rearm(&self) {
        self.lock().next_run = Instant::now() + self.interval;
        self.changed.notify_all();
    }

    fn stop(&self) {
        self.lock().stopped = true;
        self.changed.notify_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 一次状态收集的结果
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub probed: usize,
    pub marked_down: Vec<WorkerId>,
    pub zombies_released: Vec<WorkerId>,
    /// 空闲Worker拉取工作失败，需要重新调度
    pub needs_reschedule: bool,
}

/// Worker健康与吞吐量监控
///
/// 维护三张表，各自由一把读写锁保护：
/// - Worker状态表
/// - Worker平均任务耗时表
/// - 作业历史耗时表（调度算法估算吞吐量用）
///
/// 远程探测期间不持有任何表锁。
pub struct StatusChecker {
    workers: BTreeMap<WorkerId, Arc<dyn WorkerClient>>,
    tables: RwLock<StatusTables>,
    history: RwLock<HashMap<JobId, Vec<f64>>>,
    rescheduler: Mutex<Option<Weak<dyn Rescheduler>>>,
    collecting: Mutex<()>,
    timer: Arc<Timer>,
    timer_thread: Mutex<Option<JoinHandle<()>>>,
    config: StatusCheckerConfig,
}

impl StatusChecker {
    pub fn new(workers: Vec<Arc<dyn WorkerClient>>, config: StatusCheckerConfig) -> Self {
        let config = StatusCheckerConfig {
            check_interval: config.check_interval.max(Duration::from_secs(1)),
        };
        let workers: BTreeMap<WorkerId, Arc<dyn WorkerClient>> = workers
            .into_iter()
            .map(|worker| (worker.id().to_string(), worker))
            .collect();
        let status = workers
            .keys()
            .map(|id| (id.clone(), WorkerStatus::Unknown))
            .collect();

        Self {
            workers,
            tables: RwLock::new(StatusTables {
                status,
                average_running_time: HashMap::new(),
            }),
            history: RwLock::new(HashMap::new()),
            rescheduler: Mutex::new(None),
            collecting: Mutex::new(()),
            timer: Arc::new(Timer::new(config.check_interval)),
            timer_thread: Mutex::new(None),
            config,
        }
    }

    /// 设置周期检查后需要通知的重新调度方
    pub fn set_rescheduler(&self, rescheduler: Weak<dyn Rescheduler>) {
        *self
            .rescheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(rescheduler);
    }

    pub fn worker(&self, worker_id: &str) -> SchedulerResult<Arc<dyn WorkerClient>> {
        self.workers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| SchedulerError::worker_not_found(worker_id))
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.keys().cloned().collect()
    }

    /// 启动周期检查线程
    pub fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        let mut slot = self
            .timer_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }

        let checker = Arc::downgrade(self);
        let timer = Arc::clone(&self.timer);
        let handle = thread::Builder::new()
            .name("status-checker".to_string())
            .spawn(move || Self::timer_loop(timer, checker))
            .map_err(|e| SchedulerError::Internal(format!("启动状态检查线程失败: {e}")))?;
        *slot = Some(handle);
        info!(
            "状态检查器已启动，检查间隔 {:?}，Worker数 {}",
            self.config.check_interval,
            self.workers.len()
        );
        Ok(())
    }

    /// 停止周期检查线程并等待其退出
    pub fn stop(&self) {
        self.timer.stop();

        let handle = self
            .timer_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("状态检查线程异常退出");
            }
        }
        info!("状态检查器已停止");
    }

    fn timer_loop(timer: Arc<Timer>, checker: Weak<StatusChecker>) {
        while timer.wait_for_next_run() {
            match checker.upgrade() {
                Some(checker) => checker.periodic_check(),
                None => break,
            }
        }
        debug!("状态检查线程退出");
    }

    /// 周期检查：收集状态，然后要求Dispatcher重新调度
    pub fn periodic_check(&self) {
        self.collect_status();

        let rescheduler = self
            .rescheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        match rescheduler {
            Some(rescheduler) => {
                if let Err(e) = rescheduler.reschedule() {
                    error!("周期检查触发重新调度失败: {}", e);
                }
            }
            None => debug!("尚未设置重新调度方，跳过"),
        }
    }

    /// 立即收集一次状态，并从此刻起重新计时
    pub fn require_recollect_status(&self) -> CollectionReport {
        let report = self.collect_status();
        self.timer.rearm();
        report
    }

    /// 依次探测所有Worker，之后处理僵尸Worker并催促空闲Worker拉取工作
    pub fn collect_status(&self) -> CollectionReport {
        let _pass = self
            .collecting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut report = CollectionReport::default();

        for (worker_id, worker) in &self.workers {
            report.probed += 1;
            let probe = worker
                .status()
                .and_then(|status| Ok((status, worker.average_running_time()?)));
            match probe {
                Ok((status, average)) => self.tables.with_write_lock(|tables| {
                    tables.status.insert(worker_id.clone(), status);
                    if let Some(average) = average {
                        tables.average_running_time.insert(worker_id.clone(), average);
                    }
                }),
                Err(e) => {
                    self.mark_down(worker_id, &e);
                    report.marked_down.push(worker_id.clone());
                }
            }
        }

        for worker_id in self.workers_with_status(WorkerStatus::Occupied) {
            let Some(worker) = self.workers.get(&worker_id) else {
                continue;
            };
            match worker.validate_occupation() {
                Ok(true) => {}
                Ok(false) => {
                    info!("释放僵尸Worker: {}", worker_id);
                    metrics::counter!("scheduler_zombie_workers_released_total").increment(1);
                    self.set_worker_status(&worker_id, WorkerStatus::Available);
                    report.zombies_released.push(worker_id);
                }
                Err(e) => {
                    self.mark_down(&worker_id, &e);
                    report.marked_down.push(worker_id);
                }
            }
        }

        for worker_id in self.workers_with_status(WorkerStatus::Available) {
            let Some(worker) = self.workers.get(&worker_id) else {
                continue;
            };
            if let Err(e) = worker.pull_work() {
                self.mark_down(&worker_id, &e);
                report.marked_down.push(worker_id);
                report.needs_reschedule = true;
            }
        }

        debug!(
            "状态收集完成: 探测 {} 个, DOWN {:?}, 僵尸 {:?}",
            report.probed, report.marked_down, report.zombies_released
        );
        report
    }

    fn mark_down(&self, worker_id: &str, cause: &SchedulerError) {
        warn!("Worker {} 通信失败，标记为DOWN: {}", worker_id, cause);
        metrics::counter!("scheduler_workers_marked_down_total").increment(1);
        self.set_worker_status(worker_id, WorkerStatus::Down);
    }

    pub fn set_worker_status(&self, worker_id: &str, status: WorkerStatus) {
        self.tables.with_write_lock(|tables| {
            if let Some(current) = tables.status.get_mut(worker_id) {
                *current = status;
            }
        });
    }

    pub fn worker_status(&self, worker_id: &str) -> Option<WorkerStatus> {
        self.tables
            .with_read_lock(|tables| tables.status.get(worker_id).copied())
    }

    pub fn worker_statuses(&self) -> HashMap<WorkerId, WorkerStatus> {
        self.tables.with_read_lock(|tables| tables.status.clone())
    }

    pub fn workers_with_status(&self, wanted: WorkerStatus) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = self.tables.with_read_lock(|tables| {
            tables
                .status
                .iter()
                .filter(|(_, status)| **status == wanted)
                .map(|(id, _)| id.clone())
                .collect()
        });
        ids.sort();
        ids
    }

    pub fn worker_average_running_times(&self) -> HashMap<WorkerId, f64> {
        self.tables
            .with_read_lock(|tables| tables.average_running_time.clone())
    }

    /// 开始记录作业耗时
    pub fn register_job(&self, job_id: &str) {
        self.history.with_write_lock(|history| {
            history.entry(job_id.to_string()).or_default();
        });
    }

    /// 停止记录作业耗时并丢弃其历史
    pub fn delete_job_from_logging(&self, job_id: &str) {
        self.history.with_write_lock(|history| {
            history.remove(job_id);
        });
    }

    /// 记录一次任务完成的耗时（秒）
    pub fn log_running_time(&self, job_id: &str, seconds: f64) {
        let logged = self.history.with_write_lock(|history| match history.get_mut(job_id) {
            Some(times) => {
                times.push(seconds);
                true
            }
            None => false,
        });
        if !logged {
            debug!("作业 {} 未登记耗时记录，忽略耗时 {:.3}s", job_id, seconds);
        }
    }

    pub fn job_running_times(&self, job_id: &str) -> Vec<f64> {
        self.history
            .with_read_lock(|history| history.get(job_id).cloned().unwrap_or_default())
    }

    pub fn job_average(&self, job_id: &str) -> Option<f64> {
        mean(self.job_running_times(job_id))
    }

    /// 调度上下文：作业历史耗时与全系统平均耗时
    ///
    /// 没有任何作业历史时，全系统平均退化为Worker自报平均耗时的平均值。
    pub fn scheduling_context(&self) -> SchedulingContext {
        let history = self.history.with_read_lock(|history| history.clone());
        let mut context = SchedulingContext::new(Utc::now()).with_history(history);
        if context.system_average.is_none() {
            context.system_average = mean(self.worker_average_running_times().into_values());
        }
        context
    }
}

impl JobListener for StatusChecker {
    fn on_jobs_submitted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        for job_id in job_ids {
            self.register_job(job_id);
        }
        Ok(())
    }

    fn on_jobs_deleted(&self, job_ids: &[JobId]) -> SchedulerResult<()> {
        for job_id in job_ids {
            self.delete_job_from_logging(job_id);
        }
        Ok(())
    }
}

impl Drop for StatusChecker {
    fn drop(&mut self) {
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeWorker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn checker_with(workers: &[Arc<FakeWorker>]) -> StatusChecker {
        StatusChecker::new(
            workers
                .iter()
                .map(|w| w.clone() as Arc<dyn WorkerClient>)
                .collect(),
            StatusCheckerConfig::default(),
        )
    }

    #[test]
    fn test_collect_status_marks_unreachable_worker_down() {
        let healthy = FakeWorker::new("w1");
        let broken = FakeWorker::new("w2");
        broken.set_reachable(false);
        let checker = checker_with(&[healthy.clone(), broken.clone()]);

        assert_eq!(checker.worker_status("w1"), Some(WorkerStatus::Unknown));
        let report = checker.collect_status();

        assert_eq!(report.probed, 2);
        assert_eq!(report.marked_down, vec!["w2".to_string()]);
        assert_eq!(checker.worker_status("w1"), Some(WorkerStatus::Available));
        assert_eq!(checker.worker_status("w2"), Some(WorkerStatus::Down));

        broken.set_reachable(true);
        checker.collect_status();
        assert_eq!(checker.worker_status("w2"), Some(WorkerStatus::Available));
    }

    #[test]
    fn test_available_worker_is_nudged_to_pull() {
        let worker = FakeWorker::new("w1");
        let checker = checker_with(&[worker.clone()]);
        checker.collect_status();
        assert_eq!(worker.pull_count(), 1);
    }

    #[test]
    fn test_zombie_worker_released() {
        let worker = FakeWorker::new("w1");
        worker.occupy_unchecked("gone-job");
        worker.set_assignment_valid(false);
        let checker = checker_with(&[worker.clone()]);

        let report = checker.collect_status();
        assert_eq!(report.zombies_released, vec!["w1".to_string()]);
        assert_eq!(worker.current_status(), WorkerStatus::Available);
        assert_eq!(checker.worker_status("w1"), Some(WorkerStatus::Available));
    }

    #[test]
    fn test_running_time_history_lifecycle() {
        let checker = checker_with(&[]);
        checker.log_running_time("job", 1.0);
        assert!(checker.job_running_times("job").is_empty());

        checker.register_job("job");
        checker.log_running_time("job", 2.0);
        checker.log_running_time("job", 4.0);
        assert_eq!(checker.job_average("job"), Some(3.0));
        assert_eq!(checker.scheduling_context().system_average, Some(3.0));

        checker.delete_job_from_logging("job");
        assert_eq!(checker.job_average("job"), None);
    }

    #[test]
    fn test_system_average_falls_back_to_worker_reports() {
        let worker = FakeWorker::new("w1");
        worker.set_average_running_time(Some(6.0));
        let checker = checker_with(&[worker]);
        checker.collect_status();
        assert_eq!(checker.scheduling_context().system_average, Some(6.0));
    }

    struct CountingRescheduler(AtomicUsize);

    impl Rescheduler for CountingRescheduler {
        fn reschedule(&self) -> SchedulerResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(SchedulerError::connectivity("dispatcher unreachable"))
        }
    }

    #[test]
    fn test_periodic_thread_keeps_running_after_reschedule_failure() {
        let checker = Arc::new(StatusChecker::new(
            vec![FakeWorker::new("w1") as Arc<dyn WorkerClient>],
            StatusCheckerConfig {
                check_interval: Duration::from_millis(10),
            },
        ));
        let rescheduler = Arc::new(CountingRescheduler(AtomicUsize::new(0)));
        let weak: Weak<dyn Rescheduler> = Arc::downgrade(&rescheduler) as Weak<dyn Rescheduler>;
        checker.set_rescheduler(weak);

        checker.start().unwrap();
        // 间隔被提升到1秒，等待两次触发
        let deadline = Instant::now() + Duration::from_secs(5);
        while rescheduler.0.load(Ordering::SeqCst) < 2 {
            assert!(Instant::now() < deadline, "周期检查没有持续触发");
            thread::sleep(Duration::from_millis(50));
        }
        checker.stop();
    }

    #[test]
    fn test_require_recollect_status_runs_immediately() {
        let worker = FakeWorker::new("w1");
        let checker = checker_with(&[worker.clone()]);
        let report = checker.require_recollect_status();
        assert_eq!(report.probed, 1);
        assert_eq!(checker.worker_status("w1"), Some(WorkerStatus::Available));
    }
}
