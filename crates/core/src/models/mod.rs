//! # 数据模型
//!
//! 调度系统中流转的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Job - 作业
//! 客户端提交的一组有序任务，带优先级、截止时间、每个Worker的预估耗时，
//! 以及一个原子替换的进度快照。
//!
//! ### Task / TaskResult - 任务与执行结果
//! 作业中一个可独立执行的单元（外部命令或合成延时）及其执行结果。
//!
//! ### Progress - 进度
//! 不可变的 (排队, 已下发, 已完成) 三元组：
//!
//! ```text
//! queued ──task_sent──→ sent ──task_done──→ done
//!    ↑                    │
//!    └──────task_redo─────┘
//! ```
//!
//! ### WorkerStatus - Worker状态
//! 见 [`WorkerStatus`] 上的状态流转图。
//!
//! ### ScheduleTables / SchedulingContext - 调度表与调度上下文
//! 作业 -> Worker 的分配结果及其逆表，以及调度算法使用的历史耗时。
//!
//! ## 使用示例
//!
//! ```rust
//! use scheduler_core::models::{Job, Task};
//! use chrono::{Duration, Utc};
//!
//! let job = Job::new(
//!     3,
//!     Utc::now() + Duration::minutes(5),
//!     vec![Task::command("echo", vec!["hello".to_string()]), Task::delay(0.5)],
//! )
//! .unwrap()
//! .with_worker_timing("worker-001", 1.5);
//!
//! job.task_sent().unwrap();
//! assert_eq!(job.progress().sent(), 1);
//! assert_eq!(job.undone(), 2);
//! ```

pub mod job;
pub mod message;
pub mod progress;
pub mod schedule;
pub mod task;
pub mod worker;

pub use job::*;
pub use message::*;
pub use progress::*;
pub use schedule::*;
pub use task::*;
pub use worker::*;
