pub mod clients;
pub mod health;
pub mod jobs;
pub mod root;
pub mod worker_node;
pub mod workers;

use scheduler_core::SchedulerResult;

use crate::error::{ApiError, ApiResult};

/// 在阻塞线程池上执行调度核心的同步操作
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> SchedulerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("阻塞任务异常结束: {e}")))?
        .map_err(ApiError::from)
}
