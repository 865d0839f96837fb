use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("连接失败: {0}")]
    Connectivity(String),

    #[error("远端调用返回错误: {0}")]
    Remote(String),

    #[error("进度不变量被破坏: {0}")]
    ProgressInvariant(String),

    #[error("无效的消息: {0}")]
    InvalidMessage(String),

    #[error("作业未找到: {id}")]
    JobNotFound { id: String },

    #[error("作业ID重复: {id}")]
    DuplicateJob { id: String },

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("客户端未注册: {id}")]
    ClientNotFound { id: String },

    #[error("未知的线程池句柄: {0}")]
    UnknownHandle(u64),

    #[error("线程池已关闭，工作单元 {0} 被放弃")]
    WorkAbandoned(u64),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("任务被取消")]
    Cancelled,

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn connectivity<S: Into<String>>(msg: S) -> Self {
        Self::Connectivity(msg.into())
    }
    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound { id: id.into() }
    }
    pub fn worker_not_found<S: Into<String>>(id: S) -> Self {
        Self::WorkerNotFound { id: id.into() }
    }
    pub fn client_not_found<S: Into<String>>(id: S) -> Self {
        Self::ClientNotFound { id: id.into() }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 对端不可达（含超时），调用方应降级处理而不是中止
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SchedulerError::Connectivity(_))
    }

    /// 调度状态已不可信的错误，禁止吞掉
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::ProgressInvariant(_)
                | SchedulerError::Internal(_)
                | SchedulerError::Configuration(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulerError::Connectivity(_))
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::connectivity("refused").is_connectivity());
        assert!(SchedulerError::connectivity("refused").is_retryable());
        assert!(!SchedulerError::connectivity("refused").is_fatal());

        let invariant = SchedulerError::ProgressInvariant("sent == 0".to_string());
        assert!(invariant.is_fatal());
        assert!(!invariant.is_retryable());

        assert!(!SchedulerError::job_not_found("job-1").is_connectivity());
    }

    #[test]
    fn test_error_display() {
        let err = SchedulerError::worker_not_found("w1");
        assert_eq!(err.to_string(), "Worker未找到: w1");

        let err = SchedulerError::DuplicateJob {
            id: "job-9".to_string(),
        };
        assert!(err.to_string().contains("job-9"));
    }

    #[test]
    fn test_from_serde_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: SchedulerError = parse.unwrap_err().into();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}
