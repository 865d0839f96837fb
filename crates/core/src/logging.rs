use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{SchedulerError, SchedulerResult};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(format: &str) -> SchedulerResult<Self> {
        match format.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(SchedulerError::config_error(format!(
                "不支持的日志格式: {other}"
            ))),
        }
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量存在时优先于 `log_level`。重复调用会返回错误，
/// 调用方（测试、嵌入方）可以忽略。
pub fn init_logging(log_level: &str, format: LogFormat) -> SchedulerResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| SchedulerError::config_error(format!("初始化日志系统失败: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(LogFormat::parse("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY").unwrap(), LogFormat::Pretty);
        assert!(LogFormat::parse("xml").is_err());
    }

    #[test]
    fn test_double_init_is_reported() {
        let _ = init_logging("info", LogFormat::Pretty);
        assert!(init_logging("info", LogFormat::Pretty).is_err());
    }
}
