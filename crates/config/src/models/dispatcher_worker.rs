use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// Scheduling algorithm names accepted by `dispatcher.algorithm`
pub const SUPPORTED_ALGORITHMS: [&str; 5] =
    ["priority", "deadline", "preemptive_deadline", "edf", "workload"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub bind_address: String,
    pub algorithm: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            algorithm: "preemptive_deadline".to_string(),
        }
    }
}

impl ConfigValidator for DispatcherConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_bind_address(&self.bind_address, "dispatcher.bind_address")?;
        ValidationUtils::validate_not_empty(&self.algorithm, "dispatcher.algorithm")?;

        if !SUPPORTED_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "Invalid scheduling algorithm: {}. Valid options: {:?}",
                self.algorithm, SUPPORTED_ALGORITHMS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCheckerConfig {
    pub check_interval_seconds: u64,
    pub probe_timeout_ms: u64,
}

impl Default for StatusCheckerConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 5,
            probe_timeout_ms: 2000,
        }
    }
}

impl ConfigValidator for StatusCheckerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_seconds(
            self.check_interval_seconds,
            "status_checker.check_interval_seconds",
        )?;
        if self.probe_timeout_ms == 0 {
            return Err(crate::ConfigError::Validation(
                "status_checker.probe_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One entry of the static worker table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerEndpoint {
    pub id: String,
    /// Base url of the worker's HTTP endpoint
    pub address: String,
}

impl ConfigValidator for WorkerEndpoint {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.id, "workers.id")?;
        ValidationUtils::validate_url(&self.address, "workers.address")
    }
}

/// Validate the worker table as a whole
pub fn validate_workers(workers: &[WorkerEndpoint]) -> crate::ConfigResult<()> {
    let mut seen = HashSet::new();
    for worker in workers {
        worker.validate()?;
        if !seen.insert(worker.id.as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "Duplicate worker id: {}",
                worker.id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub bind_address: String,
    pub dispatcher_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-001".to_string(),
            bind_address: "0.0.0.0:9101".to_string(),
            dispatcher_url: "http://127.0.0.1:9000".to_string(),
        }
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.worker_id, "worker.worker_id")?;
        ValidationUtils::validate_bind_address(&self.bind_address, "worker.bind_address")?;
        ValidationUtils::validate_url(&self.dispatcher_url, "worker.dispatcher_url")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub dispatcher_url: String,
    pub thread_pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatcher_url: "http://127.0.0.1:9000".to_string(),
            thread_pool_size: 8,
        }
    }
}

impl ConfigValidator for ClientConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.dispatcher_url, "client.dispatcher_url")?;
        ValidationUtils::validate_count(self.thread_pool_size, "client.thread_pool_size", 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_validation() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());

        for algorithm in SUPPORTED_ALGORITHMS {
            let mut config = config.clone();
            config.algorithm = algorithm.to_string();
            assert!(config.validate().is_ok());
        }

        let mut invalid_config = config.clone();
        invalid_config.algorithm = "round_robin".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config;
        invalid_config.bind_address = "nowhere".to_string();
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_status_checker_config_validation() {
        let config = StatusCheckerConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.check_interval_seconds = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config;
        invalid_config.probe_timeout_ms = 0;
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_worker_table_validation() {
        let workers = vec![
            WorkerEndpoint {
                id: "w1".to_string(),
                address: "http://127.0.0.1:9101".to_string(),
            },
            WorkerEndpoint {
                id: "w2".to_string(),
                address: "http://127.0.0.1:9102".to_string(),
            },
        ];
        assert!(validate_workers(&workers).is_ok());

        let mut duplicated = workers.clone();
        duplicated[1].id = "w1".to_string();
        assert!(validate_workers(&duplicated).is_err());

        let mut empty_id = workers;
        empty_id[0].id = String::new();
        assert!(validate_workers(&empty_id).is_err());
    }

    #[test]
    fn test_worker_and_client_config_validation() {
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(ClientConfig::default().validate().is_ok());

        let mut client = ClientConfig::default();
        client.thread_pool_size = 0;
        assert!(client.validate().is_err());

        let mut worker = WorkerConfig::default();
        worker.dispatcher_url = "ftp://dispatcher".to_string();
        assert!(worker.validate().is_err());
    }
}
