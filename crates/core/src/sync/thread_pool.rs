use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info};

use crate::{SchedulerError, SchedulerResult};

type Work = Box<dyn FnOnce() + Send + 'static>;

/// 线程池工作单元句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkHandle(u64);

impl WorkHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Pending,
    Finished,
    Abandoned,
}

struct Completion {
    state: Mutex<UnitState>,
    changed: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            state: Mutex::new(UnitState::Pending),
            changed: Condvar::new(),
        }
    }

    fn settle(&self, outcome: UnitState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == UnitState::Pending {
            *state = outcome;
            self.changed.notify_all();
        }
    }

    fn wait(&self) -> UnitState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == UnitState::Pending {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state
    }
}

struct Unit {
    handle: u64,
    work: Work,
    completion: Arc<Completion>,
}

/// 固定大小的线程池
///
/// 工作单元按提交顺序（FIFO）被空闲线程取走执行。单元内的panic会被
/// 捕获并记录，执行线程继续处理后续单元。`shutdown` 之后仍在排队的
/// 单元被放弃，对其 `join` 返回 [`SchedulerError::WorkAbandoned`]。
pub struct ThreadPool {
    sender: Mutex<Option<Sender<Unit>>>,
    receiver: Receiver<Unit>,
    completions: Mutex<HashMap<u64, Arc<Completion>>>,
    next_handle: AtomicU64,
    shutting_down: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl ThreadPool {
    /// 创建包含 `size` 个执行线程的线程池，`size` 为0时按1处理
    pub fn new(size: usize) -> SchedulerResult<Self> {
        let size = size.max(1);
        let (sender, receiver) = channel::unbounded::<Unit>();
        let shutting_down = Arc::new(AtomicBool::new(false));

        let mut threads = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let shutting_down = Arc::clone(&shutting_down);
            let thread = thread::Builder::new()
                .name(format!("pool-worker-{index}"))
                .spawn(move || Self::run_worker(receiver, shutting_down))
                .map_err(|e| SchedulerError::Internal(format!("创建线程池线程失败: {e}")))?;
            threads.push(thread);
        }
        info!("线程池已启动，线程数: {}", size);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            completions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            shutting_down,
            threads: Mutex::new(threads),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 提交一个工作单元，立即返回句柄
    pub fn schedule<F>(&self, work: F) -> SchedulerResult<WorkHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(SchedulerError::Internal("线程池已关闭".to_string()));
        };

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let completion = Arc::new(Completion::new());
        self.lock(&self.completions)
            .insert(handle, Arc::clone(&completion));

        let unit = Unit {
            handle,
            work: Box::new(work),
            completion,
        };
        if sender.send(unit).is_err() {
            self.lock(&self.completions).remove(&handle);
            return Err(SchedulerError::Internal("线程池已关闭".to_string()));
        }
        Ok(WorkHandle(handle))
    }

    /// 阻塞直到对应的工作单元结束，之后句柄失效
    pub fn join(&self, handle: WorkHandle) -> SchedulerResult<()> {
        let completion = self
            .lock(&self.completions)
            .get(&handle.0)
            .cloned()
            .ok_or(SchedulerError::UnknownHandle(handle.0))?;

        let outcome = completion.wait();
        self.lock(&self.completions).remove(&handle.0);

        match outcome {
            UnitState::Abandoned => Err(SchedulerError::WorkAbandoned(handle.0)),
            _ => Ok(()),
        }
    }

    /// 停止接收新单元并放弃所有排队中的单元
    ///
    /// 线程无法被强行终止，已开始执行的单元会继续跑完，对它的 `join`
    /// 仍返回 `Ok(())`。只有尚未开始的单元在 `join` 时返回
    /// [`SchedulerError::WorkAbandoned`]。
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lock(&self.sender).take();

        let mut abandoned = 0usize;
        while let Ok(unit) = self.receiver.try_recv() {
            unit.completion.settle(UnitState::Abandoned);
            abandoned += 1;
        }
        info!("线程池关闭，放弃排队中的工作单元 {} 个", abandoned);
    }

    /// 关闭线程池并等待所有执行线程退出
    pub fn shutdown_and_wait(&self) {
        self.shutdown();
        let threads: Vec<_> = self.lock(&self.threads).drain(..).collect();
        for thread in threads {
            if thread.join().is_err() {
                error!("线程池线程异常退出");
            }
        }
    }

    fn run_worker(receiver: Receiver<Unit>, shutting_down: Arc<AtomicBool>) {
        for unit in receiver.iter() {
            if shutting_down.load(Ordering::SeqCst) {
                unit.completion.settle(UnitState::Abandoned);
                continue;
            }
            debug!("开始执行工作单元 {}", unit.handle);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(unit.work)) {
                error!(
                    "工作单元 {} 执行时发生panic: {}",
                    unit.handle,
                    panic_message(payload.as_ref())
                );
            }
            unit.completion.settle(UnitState::Finished);
        }
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.size)
            .field("shutting_down", &self.shutting_down.load(Ordering::Relaxed))
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_schedule_and_join() {
        let pool = ThreadPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let counter = Arc::clone(&counter);
                pool.schedule(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            pool.join(handle).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_join_twice_fails() {
        let pool = ThreadPool::new(1).unwrap();
        let handle = pool.schedule(|| {}).unwrap();
        pool.join(handle).unwrap();
        assert!(matches!(
            pool.join(handle),
            Err(SchedulerError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_fifo_order_single_thread() {
        let pool = ThreadPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.schedule(move || order.lock().unwrap().push(i)).unwrap()
            })
            .collect();
        for handle in handles {
            pool.join(handle).unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_does_not_kill_worker_thread() {
        let pool = ThreadPool::new(1).unwrap();
        let failing = pool.schedule(|| panic!("故意失败")).unwrap();
        pool.join(failing).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = pool.schedule(move || tx.send(7).unwrap()).unwrap();
        pool.join(handle).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 7);
    }

    #[test]
    fn test_shutdown_abandons_queued_work() {
        let pool = ThreadPool::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let finished = Arc::new(AtomicUsize::new(0));

        let running = {
            let finished = Arc::clone(&finished);
            pool.schedule(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let queued = pool.schedule(|| {}).unwrap();
        pool.shutdown();
        release_tx.send(()).unwrap();

        // 正在执行的单元跑完，join正常返回
        pool.join(running).unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pool.join(queued),
            Err(SchedulerError::WorkAbandoned(_))
        ));
        assert!(pool.schedule(|| {}).is_err());
        pool.shutdown_and_wait();
    }
}
