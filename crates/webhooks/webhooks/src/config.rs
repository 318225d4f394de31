//! Webhook engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WebhookError, WebhookResult};

/// Webhook engine configuration.
///
/// Every field has a default, so a config file only needs to list the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Maximum delivery attempts per subscription per trigger.
    pub max_attempts: u32,
    /// Delay before each retry, in milliseconds. The last entry is reused
    /// when there are more retries than entries.
    pub retry_delays_ms: Vec<u64>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Consecutive failures after which a subscription is disabled.
    pub failure_threshold: u32,
    /// Maximum stored length of a response body, in characters.
    pub response_body_limit: usize,
    /// Maximum stored length of an error message, in characters.
    pub error_message_limit: usize,
    /// Prefix for generated subscription secrets.
    pub secret_prefix: String,
    /// Random bytes per generated secret.
    pub secret_bytes: usize,
    /// User-Agent sent with deliveries.
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delays_ms: vec![1_000, 5_000, 30_000],
            timeout_secs: 30,
            failure_threshold: 10,
            response_body_limit: 1000,
            error_message_limit: 500,
            secret_prefix: "whsec_".to_string(),
            secret_bytes: 32,
            user_agent: concat!("vault-webhooks/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl WebhookConfig {
    /// Creates a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sets the retry delay schedule.
    pub fn retry_delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.retry_delays_ms = delays.into_iter().map(|d| d.as_millis() as u64).collect();
        self
    }

    /// Sets the request timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the auto-disable threshold.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the User-Agent header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the retry schedule as durations.
    pub fn retry_schedule(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks that the configuration can drive the engine.
    pub fn validate(&self) -> WebhookResult<()> {
        if self.max_attempts == 0 {
            return Err(WebhookError::ConfigError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > 1 && self.retry_delays_ms.is_empty() {
            return Err(WebhookError::ConfigError(
                "retry_delays_ms must not be empty when retries are enabled".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(WebhookError::ConfigError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(WebhookError::ConfigError(
                "failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.secret_bytes < 16 {
            return Err(WebhookError::ConfigError(
                "secret_bytes must be at least 16".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses configuration from TOML.
    ///
    /// Accepts either a document with a `[webhooks]` table or a bare table
    /// of webhook settings.
    pub fn from_toml_str(content: &str) -> WebhookResult<Self> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| WebhookError::ConfigError(e.to_string()))?;

        let table = value.get("webhooks").cloned().unwrap_or(value);
        let config: WebhookConfig = table
            .try_into()
            .map_err(|e: toml::de::Error| WebhookError::ConfigError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<std::path::Path>) -> WebhookResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| WebhookError::ConfigError(e.to_string()))?;
        Self::from_toml_str(&content)
    }
}
