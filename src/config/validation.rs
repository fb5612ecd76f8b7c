use crate::config::Config;
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.visited_store_address.is_empty() {
        return Err(ConfigError::Validation(
            "visited_store_address cannot be empty".to_string(),
        ));
    }

    if config.queue_address.is_empty() {
        return Err(ConfigError::Validation(
            "queue_address cannot be empty".to_string(),
        ));
    }

    if config.worker_concurrency < 1 || config.worker_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "worker_concurrency must be between 1 and 100, got {}",
            config.worker_concurrency
        )));
    }

    if config.max_delivery_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_delivery_attempts must be >= 1, got {}",
            config.max_delivery_attempts
        )));
    }

    if config.visibility_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "visibility_timeout_secs must be >= 1, got {}",
            config.visibility_timeout_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            worker_concurrency: 0,
            ..Config::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = Config {
            max_delivery_attempts: 0,
            ..Config::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_addresses() {
        let config = Config {
            queue_address: String::new(),
            ..Config::default()
        };
        assert!(validate(&config).is_err());

        let config = Config {
            visited_store_address: String::new(),
            ..Config::default()
        };
        assert!(validate(&config).is_err());
    }
}
