use std::net::SocketAddr;

use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate a `host:port` listen address
    pub fn validate_bind_address(address: &str, field_name: &str) -> ConfigResult<()> {
        address.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
            ConfigError::Validation(format!("{field_name} is not a valid address '{address}': {e}"))
        })
    }

    /// Validate an http(s) base url
    pub fn validate_url(url: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "{field_name} must start with http:// or https://, got '{url}'"
            )));
        }
        Ok(())
    }

    /// Validate an interval of at least one second
    pub fn validate_interval_seconds(seconds: u64, field_name: &str) -> ConfigResult<()> {
        if seconds == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be at least 1 second"
            )));
        }
        if seconds > 3600 {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot exceed 3600 seconds"
            )));
        }
        Ok(())
    }

    /// Validate that a count is within `1..=max`
    pub fn validate_count(count: usize, field_name: &str, max: usize) -> ConfigResult<()> {
        if count == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot exceed {max}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("w1", "id").is_ok());
        assert!(ValidationUtils::validate_not_empty("  ", "id").is_err());
    }

    #[test]
    fn test_validate_bind_address() {
        assert!(ValidationUtils::validate_bind_address("127.0.0.1:8080", "addr").is_ok());
        assert!(ValidationUtils::validate_bind_address("localhost", "addr").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(ValidationUtils::validate_url("http://127.0.0.1:9000", "url").is_ok());
        assert!(ValidationUtils::validate_url("127.0.0.1:9000", "url").is_err());
    }

    #[test]
    fn test_validate_interval_and_count() {
        assert!(ValidationUtils::validate_interval_seconds(1, "interval").is_ok());
        assert!(ValidationUtils::validate_interval_seconds(0, "interval").is_err());
        assert!(ValidationUtils::validate_count(4, "size", 16).is_ok());
        assert!(ValidationUtils::validate_count(0, "size", 16).is_err());
        assert!(ValidationUtils::validate_count(17, "size", 16).is_err());
    }
}
