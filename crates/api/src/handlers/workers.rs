use std::collections::BTreeMap;

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use scheduler_core::{
    models::{ScheduleTables, WorkerId, WorkerStatus},
    traits::WorkerCoordinator,
};
use scheduler_dispatcher::CollectionReport;

use super::blocking;
use crate::{error::ApiResult, response::ApiResponse, routes::DispatcherState};

/// 调度表及所用算法
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub algorithm: String,
    pub tables: ScheduleTables,
    pub queued_workers: BTreeMap<String, Vec<WorkerId>>,
}

/// 获取所有Worker的状态
pub async fn list_workers(
    State(state): State<DispatcherState>,
) -> ApiResult<ApiResponse<BTreeMap<WorkerId, WorkerStatus>>> {
    let statuses = state.dispatcher.worker_statuses().into_iter().collect();
    Ok(ApiResponse::success(statuses))
}

/// Worker报告空闲
pub async fn worker_available(
    State(state): State<DispatcherState>,
    Path(worker_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.on_worker_available(&worker_id)).await?;
    Ok(ApiResponse::success_empty())
}

/// Worker校验自己对某作业的占用
pub async fn check_assignment(
    State(state): State<DispatcherState>,
    Path((worker_id, job_id)): Path<(String, String)>,
) -> ApiResult<ApiResponse<bool>> {
    let valid = blocking(move || state.dispatcher.check_assignment(&worker_id, &job_id)).await?;
    Ok(ApiResponse::success(valid))
}

/// 立即重新收集Worker状态
pub async fn recollect_status(
    State(state): State<DispatcherState>,
) -> ApiResult<ApiResponse<CollectionReport>> {
    let report = blocking(move || Ok(state.dispatcher.status_checker().require_recollect_status()))
        .await?;
    Ok(ApiResponse::success(report))
}

pub async fn get_schedule(State(state): State<DispatcherState>) -> ApiResult<ApiResponse<ScheduleView>> {
    Ok(ApiResponse::success(ScheduleView {
        algorithm: state.dispatcher.algorithm_name().to_string(),
        tables: state.dispatcher.schedule_tables(),
        queued_workers: state.dispatcher.queued_workers().into_iter().collect(),
    }))
}

/// 手动触发重新调度
pub async fn reschedule(State(state): State<DispatcherState>) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.reschedule()).await?;
    Ok(ApiResponse::success_empty())
}
