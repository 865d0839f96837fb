//! 测试用的进程内Worker
//!
//! [`FakeWorker`] 按真实Worker的状态机实现 [`WorkerClient`]，并允许注入
//! 网络不可达、占用校验结果和任务耗时。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use scheduler_core::{
    models::{JobId, Task, TaskResult, WorkerId, WorkerStatus},
    traits::{WorkerClient, WorkerCoordinator},
    SchedulerError, SchedulerResult,
};

#[derive(Debug)]
struct FakeState {
    status: WorkerStatus,
    occupied_for: Option<JobId>,
    average_running_time: Option<f64>,
    assignment_valid: Option<bool>,
    task_delay: Duration,
}

pub struct FakeWorker {
    id: WorkerId,
    state: Mutex<FakeState>,
    coordinator: Mutex<Option<Weak<dyn WorkerCoordinator>>>,
    reachable: AtomicBool,
    pulls: AtomicUsize,
    tasks_run: AtomicUsize,
    failing_runs: AtomicUsize,
}

impl FakeWorker {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            state: Mutex::new(FakeState {
                status: WorkerStatus::Available,
                occupied_for: None,
                average_running_time: None,
                assignment_valid: None,
                task_delay: Duration::ZERO,
            }),
            coordinator: Mutex::new(None),
            reachable: AtomicBool::new(true),
            pulls: AtomicUsize::new(0),
            tasks_run: AtomicUsize::new(0),
            failing_runs: AtomicUsize::new(0),
        })
    }

    pub fn set_coordinator(&self, coordinator: Weak<dyn WorkerCoordinator>) {
        *self
            .coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(coordinator);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_average_running_time(&self, average: Option<f64>) {
        self.lock().average_running_time = average;
    }

    /// 固定占用校验结果，不再询问协调方
    pub fn set_assignment_valid(&self, valid: bool) {
        self.lock().assignment_valid = Some(valid);
    }

    pub fn set_task_delay(&self, delay: Duration) {
        self.lock().task_delay = delay;
    }

    /// 接下来的 `count` 次任务执行以网络错误失败
    pub fn fail_next_runs(&self, count: usize) {
        self.failing_runs.store(count, Ordering::SeqCst);
    }

    /// 绕过状态检查直接进入占用状态
    pub fn occupy_unchecked(&self, job_id: &str) {
        let mut state = self.lock();
        state.status = WorkerStatus::Occupied;
        state.occupied_for = Some(job_id.to_string());
    }

    pub fn current_status(&self) -> WorkerStatus {
        self.lock().status
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn tasks_run(&self) -> usize {
        self.tasks_run.load(Ordering::SeqCst)
    }

    fn coordinator(&self) -> Option<Arc<dyn WorkerCoordinator>> {
        self.coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn ensure_reachable(&self) -> SchedulerResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SchedulerError::connectivity(format!(
                "worker {} unreachable",
                self.id
            )))
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkerClient for FakeWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> SchedulerResult<WorkerStatus> {
        self.ensure_reachable()?;
        Ok(self.lock().status)
    }

    fn average_running_time(&self) -> SchedulerResult<Option<f64>> {
        self.ensure_reachable()?;
        Ok(self.lock().average_running_time)
    }

    fn occupy(&self, job_id: &str) -> SchedulerResult<bool> {
        self.ensure_reachable()?;
        let mut state = self.lock();
        if state.status != WorkerStatus::Available {
            return Ok(false);
        }
        state.status = WorkerStatus::Occupied;
        state.occupied_for = Some(job_id.to_string());
        Ok(true)
    }

    fn release(&self) -> SchedulerResult<()> {
        self.ensure_reachable()?;
        let mut state = self.lock();
        state.status = WorkerStatus::Available;
        state.occupied_for = None;
        Ok(())
    }

    fn validate_occupation(&self) -> SchedulerResult<bool> {
        self.ensure_reachable()?;
        let (job_id, forced) = {
            let state = self.lock();
            match (&state.status, &state.occupied_for) {
                (WorkerStatus::Occupied, Some(job_id)) => (job_id.clone(), state.assignment_valid),
                _ => return Ok(false),
            }
        };

        let valid = match (forced, self.coordinator()) {
            (Some(valid), _) => valid,
            (None, Some(coordinator)) => coordinator.check_assignment(&self.id, &job_id)?,
            (None, None) => true,
        };
        if !valid {
            self.release()?;
        }
        Ok(valid)
    }

    fn pull_work(&self) -> SchedulerResult<()> {
        self.ensure_reachable()?;
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.lock().status != WorkerStatus::Available {
            return Ok(());
        }
        match self.coordinator() {
            Some(coordinator) => coordinator.on_worker_available(&self.id),
            None => Ok(()),
        }
    }

    fn run_task(&self, task: &Task) -> SchedulerResult<TaskResult> {
        self.ensure_reachable()?;
        let injected = self
            .failing_runs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            // 连接在任务开始前断开，Worker保持占用状态
            return Err(SchedulerError::connectivity(format!(
                "worker {} dropped the connection",
                self.id
            )));
        }
        let delay = {
            let mut state = self.lock();
            state.status = WorkerStatus::Busy;
            state.task_delay
        };

        let started = Instant::now();
        thread::sleep(delay);
        let result = TaskResult {
            task_id: task.id.unwrap_or_default(),
            job_id: task.job_id.clone().unwrap_or_default(),
            duration_seconds: started.elapsed().as_secs_f64(),
            exit_code: Some(0),
            stdout: format!("ran on {}", self.id),
            stderr: String::new(),
        };
        self.tasks_run.fetch_add(1, Ordering::SeqCst);

        {
            let mut state = self.lock();
            state.status = WorkerStatus::Available;
            state.occupied_for = None;
        }
        // 与真实Worker一致：执行完立即申请新工作
        let _ = self.pull_work();
        Ok(result)
    }

    fn occupied_for(&self) -> SchedulerResult<Option<JobId>> {
        self.ensure_reachable()?;
        Ok(self.lock().occupied_for.clone())
    }
}
