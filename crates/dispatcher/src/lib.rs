//! 调度中心
//!
//! 作业注册表、五种调度算法、决策器、Worker状态检查器、调度表管理、
//! Dispatcher本体、客户端邮箱，以及客户端侧的作业执行器。
//!
//! 组件之间的引用关系：
//!
//! ```text
//! JobRegistry ──submitted/deleted──→ StatusChecker (耗时记录)
//!      │                        └──→ Dispatcher (队列 + 重新调度)
//!      ↓
//! ScheduleManager ──→ DecisionMaker ──→ SchedulingAlgorithm
//!      ↑
//! StatusChecker ──periodic_check──→ Rescheduler (Dispatcher)
//! ```

pub mod decision_maker;
pub mod dispatcher;
pub mod job_registry;
pub mod job_runner;
pub mod mailbox;
pub mod schedule_manager;
pub mod status_checker;
pub mod strategies;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use decision_maker::DecisionMaker;
pub use dispatcher::Dispatcher;
pub use job_registry::{JobListener, JobRegistry};
pub use job_runner::JobRunner;
pub use mailbox::Mailbox;
pub use schedule_manager::ScheduleManager;
pub use status_checker::{CollectionReport, StatusChecker, StatusCheckerConfig};
pub use strategies::{create_algorithm, AlgorithmKind};
