//! Execution engine endpoint configuration.
//!
//! Configures where pipeline submissions and remote builds are sent,
//! how they are authenticated, and how long network calls may take.

use std::time::Duration;

use crate::error::ConfigError;

/// Default engine API endpoint.
const DEFAULT_ENGINE_URL: &str = "http://localhost:8080";

/// Default timeout for engine and descriptor-fetch requests, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Configuration for the pipeline execution engine client.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the engine API (the `/api/...` paths are joined onto this).
    pub base_url: String,
    /// Username for basic authentication, if set.
    pub user: Option<String>,
    /// Password for basic authentication.
    pub password: Option<String>,
    /// Bearer token. Basic auth wins when both are configured.
    pub token: Option<String>,
    /// Timeout applied to every engine request.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENGINE_URL.to_string(),
            user: None,
            password: None,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MLFORGE_ENGINE_URL`: Engine base URL (default: http://localhost:8080)
    /// - `MLFORGE_ENGINE_USER`: Basic-auth username
    /// - `MLFORGE_ENGINE_PASSWORD`: Basic-auth password
    /// - `MLFORGE_ENGINE_TOKEN`: Bearer token
    /// - `MLFORGE_TIMEOUT_SECS`: Request timeout in seconds (default: 20)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the timeout is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MLFORGE_ENGINE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(user) = std::env::var("MLFORGE_ENGINE_USER") {
            config.user = Some(user);
        }
        if let Ok(password) = std::env::var("MLFORGE_ENGINE_PASSWORD") {
            config.password = Some(password);
        }
        if let Ok(token) = std::env::var("MLFORGE_ENGINE_TOKEN") {
            config.token = Some(token);
        }
        if let Ok(secs) = std::env::var("MLFORGE_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MLFORGE_TIMEOUT_SECS".to_string(),
                message: format!("'{}' is not a valid number of seconds", secs),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the base URL, trimming any trailing slash.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert!(config.user.is_none());
        assert!(config.token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let config = EngineConfig::default().with_base_url("http://engine:9000/");
        assert_eq!(config.base_url, "http://engine:9000");
    }

    #[test]
    fn test_from_env_timeout_parsing() {
        // Single test owns the variable to avoid races between tests.
        std::env::set_var("MLFORGE_TIMEOUT_SECS", "not-a-number");
        let result = EngineConfig::from_env();
        assert!(matches!(
            result,
            Err(crate::error::ConfigError::InvalidValue { .. })
        ));

        std::env::set_var("MLFORGE_TIMEOUT_SECS", "5");
        let config = EngineConfig::from_env().expect("config should load");
        assert_eq!(config.timeout, Duration::from_secs(5));

        std::env::remove_var("MLFORGE_TIMEOUT_SECS");
    }
}
