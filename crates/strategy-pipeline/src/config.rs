//! Pipeline configuration
//!
//! Values come from `Default`, environment variables (`from_env`) or a TOML
//! document (`from_toml_str`), and can be overridden through the builder.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

/// Largest accepted jitter bound, in milliseconds
pub const MAX_JITTER_MS: u64 = 60_000;

/// Retry policy for the Synthesizer's decorated operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Maximum backoff delay in milliseconds (before jitter)
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            multiplier: 2.0,
            max_delay_ms: 5000,
            max_jitter_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Retry policy without waiting, for tests and batch tools
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            multiplier: 1.0,
            max_delay_ms: 0,
            max_jitter_ms: 0,
        }
    }

    /// Backoff before retry number `attempt` (0-based), excluding jitter
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let delay = (self.base_delay_ms as f64 * factor).round();
        if delay >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }
}

/// Configuration shared by all pipeline components
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Policy-mode version recorded on decisions and documents
    pub policy_mode_version: String,

    /// Domain-pack version recorded on documents and audit records
    pub domain_pack_version: String,

    /// Schema version of the document contract
    pub schema_version: String,

    /// Secret used to sign audit checksums. Empty unless configured.
    pub signing_secret: String,

    /// Retention policy tag stored with each audit record
    pub retention_policy: String,

    /// SQLite database holding the audit log
    pub audit_db_path: PathBuf,

    /// Synthesizer retry policy
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy_mode_version: "policy-mode-v1".to_string(),
            domain_pack_version: "domain-pack-re-1.0".to_string(),
            schema_version: "1.0.0".to_string(),
            signing_secret: String::new(),
            retention_policy: "retain-7y".to_string(),
            audit_db_path: PathBuf::from("decision_audit.sqlite"),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry_defaults = RetryConfig::default();
        Self {
            policy_mode_version: std::env::var("STRATEGY_POLICY_MODE")
                .unwrap_or(defaults.policy_mode_version),
            domain_pack_version: std::env::var("STRATEGY_DOMAIN_PACK")
                .unwrap_or(defaults.domain_pack_version),
            schema_version: std::env::var("STRATEGY_SCHEMA_VERSION")
                .unwrap_or(defaults.schema_version),
            signing_secret: std::env::var("AUDIT_SIGNING_SECRET").unwrap_or_default(),
            retention_policy: std::env::var("AUDIT_RETENTION_POLICY")
                .unwrap_or(defaults.retention_policy),
            audit_db_path: std::env::var("AUDIT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_db_path),
            retry: RetryConfig {
                max_attempts: std::env::var("SYNTH_MAX_ATTEMPTS")
                    .map(|v| v.parse().unwrap_or(retry_defaults.max_attempts))
                    .unwrap_or(retry_defaults.max_attempts),
                base_delay_ms: std::env::var("SYNTH_BASE_DELAY_MS")
                    .map(|v| v.parse().unwrap_or(retry_defaults.base_delay_ms))
                    .unwrap_or(retry_defaults.base_delay_ms),
                ..retry_defaults
            },
        }
    }

    /// Parse config from a TOML document; missing keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PipelineError::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the pipeline unusable
    pub fn validate(&self) -> Result<()> {
        if self.signing_secret.trim().is_empty() {
            return Err(PipelineError::config("signing_secret must not be empty"));
        }
        if self.policy_mode_version.trim().is_empty() {
            return Err(PipelineError::config("policy_mode_version must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.max_jitter_ms > MAX_JITTER_MS {
            return Err(PipelineError::config(format!(
                "retry.max_jitter_ms must not exceed {}",
                MAX_JITTER_MS
            )));
        }
        Ok(())
    }
}

/// Builder for PipelineConfig
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn policy_mode_version(mut self, version: impl Into<String>) -> Self {
        self.config.policy_mode_version = version.into();
        self
    }

    pub fn domain_pack_version(mut self, version: impl Into<String>) -> Self {
        self.config.domain_pack_version = version.into();
        self
    }

    pub fn signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.signing_secret = secret.into();
        self
    }

    pub fn retention_policy(mut self, policy: impl Into<String>) -> Self {
        self.config.retention_policy = policy.into();
        self
    }

    pub fn audit_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.audit_db_path = path.into();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert!(config.signing_secret.is_empty());
        assert!(config.validate().is_err());

        let config = PipelineConfig::builder().signing_secret("s3cret").build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_without_secret_is_unsigned() {
        std::env::remove_var("AUDIT_SIGNING_SECRET");
        let config = PipelineConfig::from_env();
        assert!(config.signing_secret.is_empty());
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_ms(0), 100);
        assert_eq!(retry.backoff_ms(1), 200);
        assert_eq!(retry.backoff_ms(2), 400);
        assert_eq!(retry.backoff_ms(10), 5000);
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::builder()
            .policy_mode_version("policy-mode-v2")
            .domain_pack_version("pack-x")
            .signing_secret("s3cret")
            .retention_policy("retain-1y")
            .retry(RetryConfig::immediate(2))
            .build();

        assert_eq!(config.policy_mode_version, "policy-mode-v2");
        assert_eq!(config.domain_pack_version, "pack-x");
        assert_eq!(config.signing_secret, "s3cret");
        assert_eq!(config.retention_policy, "retain-1y");
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_ms(1), 0);
    }

    #[test]
    fn test_from_toml_with_partial_keys() {
        let config = PipelineConfig::from_toml_str(
            r#"
            policy_mode_version = "policy-mode-v3"
            signing_secret = "s3cret"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.policy_mode_version, "policy-mode-v3");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.schema_version, "1.0.0");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = PipelineConfig::from_toml_str("signing_secret = \"\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineConfig::from_toml_str("schema_version = \"1.0.0\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_oversized_jitter_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            signing_secret = "s3cret"

            [retry]
            max_jitter_ms = 9223372036854775807
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_jitter_ms"));
    }
}
