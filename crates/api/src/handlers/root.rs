use axum::{http::Uri, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemInfo {
    pub name: String,
    pub version: String,
    pub role: String,
    pub api_version: String,
    pub endpoints: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

fn system_info(role: &str, endpoints: &[&str]) -> SystemInfo {
    SystemInfo {
        name: "grid-scheduler".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        role: role.to_string(),
        api_version: "v1".to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        timestamp: chrono::Utc::now(),
    }
}

/// Dispatcher根路径 - 返回可用的API端点
pub async fn dispatcher_root() -> Json<SystemInfo> {
    Json(system_info(
        "dispatcher",
        &[
            "GET /health",
            "POST /api/v1/jobs",
            "GET /api/v1/jobs",
            "GET /api/v1/jobs/{id}",
            "POST /api/v1/jobs/{id}/worker",
            "POST /api/v1/jobs/{id}/tasks/sent",
            "POST /api/v1/jobs/{id}/tasks/done",
            "POST /api/v1/jobs/{id}/tasks/redo",
            "POST /api/v1/jobs/{id}/done",
            "GET /api/v1/workers",
            "POST /api/v1/workers/recollect",
            "POST /api/v1/workers/{id}/available",
            "GET /api/v1/workers/{id}/assignment/{job_id}",
            "GET /api/v1/schedule",
            "POST /api/v1/schedule/reschedule",
            "POST /api/v1/clients/{id}",
            "DELETE /api/v1/clients/{id}",
            "POST /api/v1/clients/{id}/messages",
            "GET /api/v1/clients/{id}/messages",
        ],
    ))
}

/// Worker根路径 - 返回可用的API端点
pub async fn worker_root() -> Json<SystemInfo> {
    Json(system_info(
        "worker",
        &[
            "GET /health",
            "GET /api/v1/worker/info",
            "GET /api/v1/worker/status",
            "GET /api/v1/worker/average",
            "GET /api/v1/worker/occupied-for",
            "POST /api/v1/worker/occupy",
            "POST /api/v1/worker/release",
            "POST /api/v1/worker/validate",
            "POST /api/v1/worker/pull",
            "POST /api/v1/worker/run",
            "POST /api/v1/worker/cancel",
        ],
    ))
}

/// 未匹配任何路由的请求
pub async fn fallback(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
