use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use scheduler_core::{
    models::{JobId, Task, TaskResult, WorkerId, WorkerStatus},
    traits::{CancellationFlag, TaskExecutor, WorkerClient, WorkerCoordinator},
    SchedulerError, SchedulerResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::executors::{DelayExecutor, ShellExecutor};

/// Worker服务构建器
pub struct WorkerServiceBuilder {
    worker_id: WorkerId,
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
    coordinator: Option<Weak<dyn WorkerCoordinator>>,
}

impl WorkerServiceBuilder {
    pub fn new(worker_id: impl Into<WorkerId>) -> Self {
        Self {
            worker_id: worker_id.into(),
            executors: HashMap::new(),
            coordinator: None,
        }
    }

    /// 注册任务执行器，按执行器名称匹配任务类型
    pub fn register_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        let name = executor.name().to_string();
        info!("注册任务执行器: {}", name);
        self.executors.insert(name, executor);
        self
    }

    /// 注册命令和延时两种默认执行器
    pub fn with_default_executors(self) -> Self {
        self.register_executor(Arc::new(ShellExecutor::new()))
            .register_executor(Arc::new(DelayExecutor::new()))
    }

    pub fn coordinator(mut self, coordinator: Weak<dyn WorkerCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> Arc<WorkerService> {
        Arc::new(WorkerService {
            worker_id: self.worker_id,
            executors: self.executors,
            state: Mutex::new(WorkerState::default()),
            stats: Mutex::new(RunningStats::default()),
            coordinator: Mutex::new(self.coordinator),
            cancel: CancellationFlag::new(),
        })
    }
}

#[derive(Debug, Clone)]
struct WorkerState {
    status: WorkerStatus,
    occupied_for: Option<JobId>,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self {
            status: WorkerStatus::Available,
            occupied_for: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    completed: u64,
    average: f64,
}

impl RunningStats {
    fn record(&mut self, seconds: f64) {
        self.completed += 1;
        self.average += (seconds - self.average) / self.completed as f64;
    }

    fn average(&self) -> Option<f64> {
        (self.completed > 0).then_some(self.average)
    }
}

/// Worker对外暴露的状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub occupied_for: Option<JobId>,
    pub average_running_time: Option<f64>,
    pub tasks_completed: u64,
    pub supported_task_types: Vec<String>,
}

/// Worker服务
///
/// 状态机：
///
/// ```text
/// AVAILABLE ──occupy──→ OCCUPIED ──run_task──→ BUSY ──完成──→ AVAILABLE
///     ↑                    │
///     └──release / 僵尸校验─┘
/// ```
///
/// `occupy` 在同一把锁内检查并修改状态，同一时刻只会有一个作业占用成功。
pub struct WorkerService {
    worker_id: WorkerId,
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
    state: Mutex<WorkerState>,
    stats: Mutex<RunningStats>,
    coordinator: Mutex<Option<Weak<dyn WorkerCoordinator>>>,
    cancel: CancellationFlag,
}

impl WorkerService {
    pub fn builder(worker_id: impl Into<WorkerId>) -> WorkerServiceBuilder {
        WorkerServiceBuilder::new(worker_id)
    }

    pub fn set_coordinator(&self, coordinator: Weak<dyn WorkerCoordinator>) {
        *self
            .coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(coordinator);
    }

    pub fn supported_task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let state = self.state().clone();
        let stats = *self.stats();
        WorkerSnapshot {
            worker_id: self.worker_id.clone(),
            status: state.status,
            occupied_for: state.occupied_for,
            average_running_time: stats.average(),
            tasks_completed: stats.completed,
            supported_task_types: self.supported_task_types(),
        }
    }

    /// 取消正在执行的任务，返回当前是否有任务在执行
    pub fn cancel_current(&self) -> bool {
        let busy = self.state().status == WorkerStatus::Busy;
        if busy {
            warn!("Worker {} 收到取消请求", self.worker_id);
            self.cancel.cancel();
        }
        busy
    }

    fn coordinator(&self) -> Option<Arc<dyn WorkerCoordinator>> {
        self.coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> MutexGuard<'_, RunningStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn become_available(&self) {
        let mut state = self.state();
        state.status = WorkerStatus::Available;
        state.occupied_for = None;
    }

    fn execute(&self, task: &Task) -> SchedulerResult<TaskResult> {
        let executor = self.executors.get(task.spec.kind()).ok_or_else(|| {
            SchedulerError::TaskExecution(format!("不支持的任务类型: {}", task.spec.kind()))
        })?;
        executor.execute(task, &self.cancel)
    }
}

impl WorkerClient for WorkerService {
    fn id(&self) -> &str {
        &self.worker_id
    }

    fn status(&self) -> SchedulerResult<WorkerStatus> {
        Ok(self.state().status)
    }

    fn average_running_time(&self) -> SchedulerResult<Option<f64>> {
        Ok(self.stats().average())
    }

    fn occupy(&self, job_id: &str) -> SchedulerResult<bool> {
        let mut state = self.state();
        if state.status != WorkerStatus::Available {
            debug!(
                "Worker {} 处于 {}，拒绝作业 {} 的占用",
                self.worker_id, state.status, job_id
            );
            return Ok(false);
        }
        state.status = WorkerStatus::Occupied;
        state.occupied_for = Some(job_id.to_string());
        info!("Worker {} 被作业 {} 占用", self.worker_id, job_id);
        Ok(true)
    }

    fn release(&self) -> SchedulerResult<()> {
        let mut state = self.state();
        if state.status == WorkerStatus::Busy {
            warn!("Worker {} 正在执行任务，忽略释放请求", self.worker_id);
            return Ok(());
        }
        state.status = WorkerStatus::Available;
        state.occupied_for = None;
        debug!("Worker {} 已释放", self.worker_id);
        Ok(())
    }

    fn validate_occupation(&self) -> SchedulerResult<bool> {
        let job_id = {
            let state = self.state();
            match (state.status, &state.occupied_for) {
                (WorkerStatus::Busy, _) => return Ok(true),
                (WorkerStatus::Occupied, Some(job_id)) => job_id.clone(),
                _ => return Ok(false),
            }
        };

        let Some(coordinator) = self.coordinator() else {
            return Ok(true);
        };
        let valid = coordinator.check_assignment(&self.worker_id, &job_id)?;
        if !valid {
            info!(
                "Worker {} 对作业 {} 的占用已失效，自行释放",
                self.worker_id, job_id
            );
            let mut state = self.state();
            // 校验期间可能已被任务执行方取走
            if state.status == WorkerStatus::Occupied
                && state.occupied_for.as_deref() == Some(job_id.as_str())
            {
                state.status = WorkerStatus::Available;
                state.occupied_for = None;
            }
        }
        Ok(valid)
    }

    fn pull_work(&self) -> SchedulerResult<()> {
        if self.state().status != WorkerStatus::Available {
            return Ok(());
        }
        match self.coordinator() {
            Some(coordinator) => coordinator.on_worker_available(&self.worker_id),
            None => {
                debug!("Worker {} 尚未连接Dispatcher", self.worker_id);
                Ok(())
            }
        }
    }

    fn run_task(&self, task: &Task) -> SchedulerResult<TaskResult> {
        {
            let mut state = self.state();
            if state.status == WorkerStatus::Busy {
                return Err(SchedulerError::TaskExecution(format!(
                    "Worker {} 正在执行其他任务",
                    self.worker_id
                )));
            }
            self.cancel.reset();
            state.status = WorkerStatus::Busy;
        }

        let started = Instant::now();
        let outcome = self.execute(task);
        let elapsed = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(result) => self.stats().record(result.duration_seconds),
            Err(e) => warn!(
                "Worker {} 执行任务失败 ({:.3}s): {}",
                self.worker_id, elapsed, e
            ),
        }

        self.become_available();
        if let Err(e) = self.pull_work() {
            warn!("Worker {} 拉取新工作失败: {}", self.worker_id, e);
        }
        outcome
    }

    fn occupied_for(&self) -> SchedulerResult<Option<JobId>> {
        Ok(self.state().occupied_for.clone())
    }
}
