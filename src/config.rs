//! Harness configuration, read from TOML.

use crate::context::Operator;
use crate::error::{Result, TckError};
use crate::params::SetupParams;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
    /// When set, delays double from `delay_ms` up to this cap.
    pub max_delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 10,
            delay_ms: 1_000,
            max_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TckConfig {
    pub server_url: String,
    pub mirror_url: String,
    pub operator_account_id: Option<String>,
    pub operator_private_key: Option<String>,
    pub node_ip: Option<String>,
    pub node_account_id: Option<String>,
    pub request_timeout_ms: u64,
    pub case_timeout_ms: u64,
    pub retry: RetrySettings,
}

impl Default for TckConfig {
    fn default() -> Self {
        TckConfig {
            server_url: "http://localhost:8544".into(),
            mirror_url: "http://127.0.0.1:5551".into(),
            operator_account_id: None,
            operator_private_key: None,
            node_ip: None,
            node_account_id: None,
            request_timeout_ms: 30_000,
            case_timeout_ms: 120_000,
            retry: RetrySettings::default(),
        }
    }
}

impl TckConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TckConfig =
            toml::from_str(text).map_err(|e| TckError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        TckConfig::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(TckError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.case_timeout_ms == 0 {
            return Err(TckError::Config("case_timeout_ms must be positive".into()));
        }
        let budget = self.worst_case_retry_wait();
        if budget >= self.case_timeout() {
            warn!(
                ?budget,
                case_timeout = ?self.case_timeout(),
                "retry budget is not smaller than the per-case timeout"
            );
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry.delay_ms);
        let backoff = match self.retry.max_delay_ms {
            Some(max) => Backoff::Exponential {
                base: delay,
                max: Duration::from_millis(max),
            },
            None => Backoff::Fixed(delay),
        };
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff,
        }
    }

    /// Sum of the sleeps a fully exhausted retry loop performs.
    pub fn worst_case_retry_wait(&self) -> Duration {
        let policy = self.retry_policy();
        (0..policy.max_attempts.saturating_sub(1))
            .map(|n| policy.backoff.delay(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }

    /// Operator credentials; both fields must be configured.
    pub fn operator(&self) -> Result<Operator> {
        match (&self.operator_account_id, &self.operator_private_key) {
            (Some(id), Some(key)) => Ok(Operator {
                account_id: id.parse()?,
                private_key: key.clone(),
            }),
            _ => Err(TckError::Config(
                "operator_account_id and operator_private_key are required".into(),
            )),
        }
    }

    /// `setup` parameters for the configured operator and node.
    pub fn setup_params(&self) -> Result<SetupParams> {
        let mut params = self.operator()?.setup_params();
        params.node_ip = self.node_ip.clone();
        params.node_account_id = self
            .node_account_id
            .as_deref()
            .map(str::parse::<crate::types::EntityId>)
            .transpose()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = TckConfig::from_toml_str(
            r#"
            server_url = "http://server:9000"
            operator_account_id = "0.0.2"
            operator_private_key = "302e020100300506032b657004220420aa"

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://server:9000");
        assert_eq!(config.mirror_url, TckConfig::default().mirror_url);
        assert_eq!(config.retry_policy(), RetryPolicy::fixed(3, Duration::from_secs(1)));
        assert_eq!(config.operator().unwrap().account_id.num, 2);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = TckConfig::from_toml_str("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, TckError::Config(_)));
    }

    #[test]
    fn test_worst_case_wait() {
        let mut config = TckConfig::default();
        config.retry.max_attempts = 4;
        config.retry.delay_ms = 100;
        assert_eq!(config.worst_case_retry_wait(), Duration::from_millis(300));

        config.retry.max_delay_ms = Some(250);
        assert_eq!(config.worst_case_retry_wait(), Duration::from_millis(100 + 200 + 250));
    }

    #[test]
    fn test_missing_operator() {
        assert!(TckConfig::default().operator().is_err());
    }
}
