use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use scheduler_core::{
    models::{JobId, Task, TaskResult, WorkerStatus},
    traits::WorkerClient,
};
use scheduler_worker::WorkerSnapshot;

use super::blocking;
use crate::{error::ApiResult, response::ApiResponse, routes::WorkerNodeState};

#[derive(Debug, Serialize, Deserialize)]
pub struct OccupyRequest {
    pub job_id: JobId,
}

pub async fn info(State(state): State<WorkerNodeState>) -> ApiResult<ApiResponse<WorkerSnapshot>> {
    Ok(ApiResponse::success(state.worker.snapshot()))
}

pub async fn status(State(state): State<WorkerNodeState>) -> ApiResult<ApiResponse<WorkerStatus>> {
    Ok(ApiResponse::success(state.worker.status()?))
}

pub async fn average_running_time(
    State(state): State<WorkerNodeState>,
) -> ApiResult<ApiResponse<Option<f64>>> {
    Ok(ApiResponse::success(state.worker.average_running_time()?))
}

pub async fn occupied_for(
    State(state): State<WorkerNodeState>,
) -> ApiResult<ApiResponse<Option<JobId>>> {
    Ok(ApiResponse::success(state.worker.occupied_for()?))
}

pub async fn occupy(
    State(state): State<WorkerNodeState>,
    payload: Result<Json<OccupyRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<bool>> {
    let Json(request) = payload?;
    Ok(ApiResponse::success(state.worker.occupy(&request.job_id)?))
}

pub async fn release(State(state): State<WorkerNodeState>) -> ApiResult<ApiResponse<()>> {
    state.worker.release()?;
    Ok(ApiResponse::success_empty())
}

/// 校验占用是否仍有效，需要回调Dispatcher
pub async fn validate_occupation(
    State(state): State<WorkerNodeState>,
) -> ApiResult<ApiResponse<bool>> {
    let valid = blocking(move || state.worker.validate_occupation()).await?;
    Ok(ApiResponse::success(valid))
}

pub async fn pull_work(State(state): State<WorkerNodeState>) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.worker.pull_work()).await?;
    Ok(ApiResponse::success_empty())
}

/// 执行任务，阻塞到任务结束
pub async fn run_task(
    State(state): State<WorkerNodeState>,
    payload: Result<Json<Task>, JsonRejection>,
) -> ApiResult<ApiResponse<TaskResult>> {
    let Json(task) = payload?;
    let result = blocking(move || state.worker.run_task(&task)).await?;
    Ok(ApiResponse::success(result))
}

pub async fn cancel(State(state): State<WorkerNodeState>) -> ApiResult<ApiResponse<bool>> {
    Ok(ApiResponse::success(state.worker.cancel_current()))
}
