use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    dispatcher_worker::{
        validate_workers, ClientConfig, DispatcherConfig, StatusCheckerConfig, WorkerConfig,
        WorkerEndpoint,
    },
    observability::ObservabilityConfig,
};
use crate::validation::ConfigValidator;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub status_checker: StatusCheckerConfig,
    pub workers: Vec<WorkerEndpoint>,
    pub worker: WorkerConfig,
    pub client: ClientConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置：配置文件（显式指定或默认路径）+ `SCHEDULER_` 前缀的环境变量
    ///
    /// 环境变量用双下划线分隔层级，例如 `SCHEDULER_DISPATCHER__ALGORITHM=edf`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/scheduler.toml",
                "scheduler.toml",
                "/etc/scheduler/config.toml",
            ];
            if let Some(path) = default_paths.iter().find(|path| Path::new(path).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEDULER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn worker_endpoint(&self, worker_id: &str) -> Option<&WorkerEndpoint> {
        self.workers.iter().find(|worker| worker.id == worker_id)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.dispatcher.validate()?;
        self.status_checker.validate()?;
        validate_workers(&self.workers)?;
        self.worker.validate()?;
        self.client.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
