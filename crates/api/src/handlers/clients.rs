use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use scheduler_core::{models::ClientMessage, traits::JobService};

use super::blocking;
use crate::{error::ApiResult, response::ApiResponse, routes::DispatcherState};

const DEFAULT_WAIT_MS: u64 = 1_000;
const MAX_WAIT_MS: u64 = 60_000;

#[derive(Debug, Deserialize)]
pub struct MessageQueryParams {
    /// 最长等待时间（毫秒）
    pub timeout_ms: Option<u64>,
}

pub async fn register_client(
    State(state): State<DispatcherState>,
    Path(client_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.register_client(&client_id)).await?;
    Ok(ApiResponse::success_empty())
}

pub async fn unregister_client(
    State(state): State<DispatcherState>,
    Path(client_id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    blocking(move || state.dispatcher.unregister_client(&client_id)).await?;
    Ok(ApiResponse::success_empty())
}

pub async fn push_message(
    State(state): State<DispatcherState>,
    Path(client_id): Path<String>,
    payload: Result<Json<ClientMessage>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(message) = payload?;
    blocking(move || state.dispatcher.push_message(&client_id, message)).await?;
    Ok(ApiResponse::success_empty())
}

/// 取走客户端的全部消息，最多等待 `timeout_ms`，超时返回空列表
pub async fn get_messages(
    State(state): State<DispatcherState>,
    Path(client_id): Path<String>,
    Query(params): Query<MessageQueryParams>,
) -> ApiResult<ApiResponse<Vec<ClientMessage>>> {
    let wait = Duration::from_millis(params.timeout_ms.unwrap_or(DEFAULT_WAIT_MS).min(MAX_WAIT_MS));
    let messages = blocking(move || state.dispatcher.get_messages(&client_id, wait)).await?;
    Ok(ApiResponse::success(messages))
}
