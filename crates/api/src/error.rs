use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scheduler_core::SchedulerError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源: {0}")]
    NotFound(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// 错误响应体中的 `error` 字段
///
/// `type` 供客户端还原错误种类，`detail` 保存还原所需的原始内容
/// （ID或错误描述）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub code: u16,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiError {
    /// (状态码, 错误类型, 还原用的原始内容)
    pub fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            ApiError::Scheduler(e) => match e {
                SchedulerError::JobNotFound { id } => {
                    (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", Some(id.clone()))
                }
                SchedulerError::WorkerNotFound { id } => {
                    (StatusCode::NOT_FOUND, "WORKER_NOT_FOUND", Some(id.clone()))
                }
                SchedulerError::ClientNotFound { id } => {
                    (StatusCode::NOT_FOUND, "CLIENT_NOT_FOUND", Some(id.clone()))
                }
                SchedulerError::DuplicateJob { id } => {
                    (StatusCode::CONFLICT, "DUPLICATE_JOB", Some(id.clone()))
                }
                SchedulerError::ProgressInvariant(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "PROGRESS_INVARIANT",
                    Some(msg.clone()),
                ),
                SchedulerError::InvalidMessage(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_MESSAGE", Some(msg.clone()))
                }
                SchedulerError::Serialization(msg) => (
                    StatusCode::BAD_REQUEST,
                    "SERIALIZATION_ERROR",
                    Some(msg.clone()),
                ),
                SchedulerError::Connectivity(msg) => {
                    (StatusCode::BAD_GATEWAY, "CONNECTIVITY", Some(msg.clone()))
                }
                SchedulerError::Remote(msg) => {
                    (StatusCode::BAD_GATEWAY, "REMOTE_ERROR", Some(msg.clone()))
                }
                SchedulerError::TaskExecution(msg) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TASK_EXECUTION",
                    Some(msg.clone()),
                ),
                SchedulerError::Cancelled => (StatusCode::CONFLICT, "CANCELLED", None),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    Some(e.to_string()),
                ),
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", Some(msg.clone())),
            ApiError::NotFound(path) => (StatusCode::NOT_FOUND, "NOT_FOUND", Some(path.clone())),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                Some(msg.clone()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, detail) = self.parts();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        } else {
            warn!("请求被拒绝: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": ErrorBody {
                error_type: error_type.to_string(),
                message: self.to_string(),
                code: status.as_u16(),
                detail,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

/// 把错误响应还原为调度器错误
pub fn decode_error(status: StatusCode, body: Option<ErrorBody>) -> SchedulerError {
    let Some(body) = body else {
        return match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                SchedulerError::connectivity(format!("上游不可用: {status}"))
            }
            _ => SchedulerError::Remote(format!("无法解析的错误响应: {status}")),
        };
    };

    let detail = body.detail.unwrap_or_else(|| body.message.clone());
    match body.error_type.as_str() {
        "JOB_NOT_FOUND" => SchedulerError::job_not_found(detail),
        "WORKER_NOT_FOUND" => SchedulerError::worker_not_found(detail),
        "CLIENT_NOT_FOUND" => SchedulerError::client_not_found(detail),
        "DUPLICATE_JOB" => SchedulerError::DuplicateJob { id: detail },
        "PROGRESS_INVARIANT" => SchedulerError::ProgressInvariant(detail),
        "INVALID_MESSAGE" | "SERIALIZATION_ERROR" | "BAD_REQUEST" => {
            SchedulerError::InvalidMessage(detail)
        }
        "CONNECTIVITY" => SchedulerError::Connectivity(detail),
        "TASK_EXECUTION" => SchedulerError::TaskExecution(detail),
        "CANCELLED" => SchedulerError::Cancelled,
        _ => SchedulerError::Remote(format!("{}: {}", status, body.message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(error: SchedulerError) -> SchedulerError {
        let api_error = ApiError::from(error);
        let (status, error_type, detail) = api_error.parts();
        decode_error(
            status,
            Some(ErrorBody {
                error_type: error_type.to_string(),
                message: api_error.to_string(),
                code: status.as_u16(),
                detail,
            }),
        )
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SchedulerError::job_not_found("a"), StatusCode::NOT_FOUND),
            (
                SchedulerError::DuplicateJob { id: "a".into() },
                StatusCode::CONFLICT,
            ),
            (
                SchedulerError::ProgressInvariant("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SchedulerError::InvalidMessage("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (SchedulerError::connectivity("x"), StatusCode::BAD_GATEWAY),
            (
                SchedulerError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).parts().0, expected);
        }
    }

    #[test]
    fn test_errors_survive_the_wire() {
        assert!(matches!(
            round_trip(SchedulerError::job_not_found("job-1")),
            SchedulerError::JobNotFound { id } if id == "job-1"
        ));
        assert!(matches!(
            round_trip(SchedulerError::ProgressInvariant("没有排队任务".into())),
            SchedulerError::ProgressInvariant(msg) if msg == "没有排队任务"
        ));
        assert!(round_trip(SchedulerError::connectivity("down")).is_connectivity());
        assert!(matches!(
            round_trip(SchedulerError::Internal("boom".into())),
            SchedulerError::Remote(_)
        ));
    }

    #[test]
    fn test_unparsable_gateway_error_is_connectivity() {
        assert!(decode_error(StatusCode::GATEWAY_TIMEOUT, None).is_connectivity());
        assert!(matches!(
            decode_error(StatusCode::INTERNAL_SERVER_ERROR, None),
            SchedulerError::Remote(_)
        ));
    }
}
