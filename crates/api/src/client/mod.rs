//! 访问远程Dispatcher与Worker的阻塞HTTP客户端
//!
//! 两者分别实现调度核心的 `JobService`/`WorkerCoordinator` 与 `WorkerClient`，
//! 进程内实现与远程实现可以互换。服务端返回的错误按 `error.type` 还原为
//! [`SchedulerError`](scheduler_core::SchedulerError)，传输失败一律是连通性错误。
//!
//! 阻塞客户端内部自带运行时，不能在异步上下文中创建或销毁。

mod dispatcher;
mod transport;
mod worker;

pub use dispatcher::{DispatcherHttpClient, DEFAULT_REQUEST_TIMEOUT};
pub use worker::WorkerHttpClient;
