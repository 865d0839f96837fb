//! # Grid Scheduler
//!
//! 分布式作业调度与资源分配系统的进程装配：按运行模式构建
//! Dispatcher或Worker组件、提供HTTP服务并处理优雅关闭。
//!
//! 各组件的实现见工作区内的crate：
//!
//! - [`scheduler_core`]: 数据模型、并发原语与跨进程接口
//! - [`scheduler_dispatcher`]: 调度算法、状态检查、Dispatcher与作业执行器
//! - [`scheduler_worker`]: Worker状态机与任务执行器
//! - [`scheduler_api`]: HTTP路由与远程客户端
//! - [`scheduler_config`]: 配置加载与校验

pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application};
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
