use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use scheduler_core::{
    models::{Job, JobId, Progress, TaskResult, WorkerId},
    traits::JobService,
};

use super::blocking;
use crate::{
    error::ApiResult,
    response::{created, ApiResponse},
    routes::DispatcherState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitJobsRequest {
    pub jobs: Vec<Job>,
}

/// 作业概要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub priority: i64,
    pub deadline: DateTime<Utc>,
    pub progress: Progress,
    pub client_id: Option<String>,
    pub assigned_workers: Vec<WorkerId>,
}

fn summarize(state: &DispatcherState, job_id: &str) -> ApiResult<JobSummary> {
    let job = state.dispatcher.job(job_id)?;
    let tables = state.dispatcher.schedule_tables();
    Ok(JobSummary {
        id: job_id.to_string(),
        priority: job.priority,
        deadline: job.deadline,
        progress: job.progress(),
        client_id: job.client_id.clone(),
        assigned_workers: tables.workers_of(job_id).to_vec(),
    })
}

/// 提交一批作业
pub async fn submit_jobs(
    State(state): State<DispatcherState>,
    payload: Result<Json<SubmitJobsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    info!("收到作业提交请求: {} 个作业", request.jobs.len());
    let ids = blocking(move || state.dispatcher.submit_jobs(request.jobs)).await?;
    Ok(created(ids))
}

pub async fn list_jobs(State(state): State<DispatcherState>) -> ApiResult<ApiResponse<Vec<JobSummary>>> {
    let summaries = state
        .dispatcher
        .job_ids()
        .iter()
        // 列举与读取之间作业可能已结束
        .filter_map(|id| summarize(&state, id).ok())
        .collect();
    Ok(ApiResponse::success(summaries))
}

pub async fn get_job(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<JobSummary>> {
    Ok(ApiResponse::success(summarize(&state, &job_id)?))
}

/// 阻塞直到该作业获得一个空闲Worker
pub async fn require_worker(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<WorkerId>> {
    let worker_id = blocking(move || state.dispatcher.require_worker(&job_id)).await?;
    Ok(ApiResponse::success(worker_id))
}

pub async fn task_sent(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<Progress>> {
    let progress = blocking(move || state.dispatcher.task_sent(&job_id)).await?;
    Ok(ApiResponse::success(progress))
}

pub async fn task_done(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
    payload: Result<Json<TaskResult>, JsonRejection>,
) -> ApiResult<ApiResponse<Progress>> {
    let Json(result) = payload?;
    let progress = blocking(move || state.dispatcher.task_done(&job_id, &result)).await?;
    Ok(ApiResponse::success(progress))
}

pub async fn task_redo(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<Progress>> {
    let progress = blocking(move || state.dispatcher.task_redo(&job_id)).await?;
    Ok(ApiResponse::success(progress))
}

/// 归还未能交付任务的Worker
pub async fn return_worker(
    State(state): State<DispatcherState>,
    Path((job_id, worker_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.return_worker(&job_id, &worker_id)).await?;
    Ok(ApiResponse::success_empty())
}

pub async fn job_done(
    State(state): State<DispatcherState>,
    Path(job_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.job_done(&job_id)).await?;
    Ok(ApiResponse::success_empty())
}
