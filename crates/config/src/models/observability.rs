use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: String,
    /// Prometheus exporter listen address, disabled when absent
    pub metrics_bind_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_bind_address: None,
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "Invalid observability.log_level: {}. Valid options: {:?}",
                self.log_level, valid_levels
            )));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(crate::ConfigError::Validation(format!(
                "Invalid observability.log_format: {}. Valid options: {:?}",
                self.log_format, valid_formats
            )));
        }

        if let Some(address) = &self.metrics_bind_address {
            ValidationUtils::validate_bind_address(address, "observability.metrics_bind_address")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_config_validation() {
        let config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.log_level = "loud".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.log_format = "xml".to_string();
        assert!(invalid.validate().is_err());

        let mut with_metrics = config;
        with_metrics.metrics_bind_address = Some("0.0.0.0:9100".to_string());
        assert!(with_metrics.validate().is_ok());
    }
}
