//! 任务执行器接口定义
//!
//! Worker通过 [`TaskExecutor`] 真正执行一个任务。执行器必须：
//! - 返回包含耗时、退出码和捕获输出的 [`TaskResult`]
//! - 在 [`CancellationFlag`] 被置位时终止底层进程并返回
//!   [`SchedulerError::Cancelled`](crate::SchedulerError::Cancelled)
//!
//! ## 使用示例
//!
//! ```rust
//! use scheduler_core::traits::{CancellationFlag, TaskExecutor};
//! use scheduler_core::models::{Task, TaskResult};
//! use scheduler_core::SchedulerResult;
//!
//! struct NoopExecutor;
//!
//! impl TaskExecutor for NoopExecutor {
//!     fn name(&self) -> &str {
//!         "noop"
//!     }
//!
//!     fn execute(&self, task: &Task, _cancel: &CancellationFlag) -> SchedulerResult<TaskResult> {
//!         Ok(TaskResult {
//!             task_id: task.id.unwrap_or_default(),
//!             job_id: task.job_id.clone().unwrap_or_default(),
//!             duration_seconds: 0.0,
//!             exit_code: Some(0),
//!             stdout: String::new(),
//!             stderr: String::new(),
//!         })
//!     }
//! }
//!
//! let result = NoopExecutor.execute(&Task::delay(0.0), &CancellationFlag::new()).unwrap();
//! assert!(result.is_success());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{
    models::{Task, TaskResult},
    SchedulerResult,
};

/// 任务执行器
pub trait TaskExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// 执行任务，阻塞直到完成或被取消
    fn execute(&self, task: &Task, cancel: &CancellationFlag) -> SchedulerResult<TaskResult>;
}

/// 跨线程共享的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 清除取消标记，供下一个任务复用
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_flag_shared_between_clones() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
        observer.reset();
        assert!(!flag.is_cancelled());
    }
}
