//! # Scheduler API
//!
//! 调度系统跨进程边界的HTTP+JSON实现。
//!
//! - 服务端：Dispatcher与Worker两种角色各自的axum路由。调度核心是同步的，
//!   处理器通过 `spawn_blocking` 调用它，领取Worker等长时间阻塞的请求不会占住异步线程。
//! - 客户端：[`DispatcherHttpClient`] 与 [`WorkerHttpClient`] 用阻塞reqwest实现核心的
//!   `JobService`/`WorkerCoordinator`/`Rescheduler` 与 `WorkerClient`，
//!   远程组件与进程内组件可以互换。
//!
//! ## 响应格式
//!
//! 成功：
//! ```json
//! { "success": true, "data": ..., "message": null, "timestamp": "2024-01-01T00:00:00Z" }
//! ```
//!
//! 失败（`type` 供客户端还原错误种类）：
//! ```json
//! {
//!   "success": false,
//!   "error": { "type": "JOB_NOT_FOUND", "message": "...", "code": 404, "detail": "job-1" },
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use scheduler_api::create_dispatcher_app;
//! use scheduler_dispatcher::{DecisionMaker, Dispatcher, StatusChecker, StatusCheckerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let checker = Arc::new(StatusChecker::new(vec![], StatusCheckerConfig::default()));
//! let dispatcher = Dispatcher::new(DecisionMaker::from_name("edf")?, checker);
//! let app = create_dispatcher_app(dispatcher);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;

use middleware::request_logging;
use routes::{create_dispatcher_routes, create_worker_routes, DispatcherState, WorkerNodeState};
use scheduler_dispatcher::Dispatcher;
use scheduler_worker::WorkerService;

pub use client::{DispatcherHttpClient, WorkerHttpClient};
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;

/// 创建Dispatcher角色的HTTP应用
pub fn create_dispatcher_app(dispatcher: Arc<Dispatcher>) -> Router {
    create_dispatcher_routes(DispatcherState { dispatcher })
        .layer(axum::middleware::from_fn(request_logging))
}

/// 创建Worker角色的HTTP应用
pub fn create_worker_app(worker: Arc<WorkerService>) -> Router {
    create_worker_routes(WorkerNodeState { worker })
        .layer(axum::middleware::from_fn(request_logging))
}
