//! Pool configuration.
//!
//! Policy constants (shutdown deadline, reconnect backoff, pool size) are
//! configurable defaults rather than hard-coded numbers; the defaults
//! match long-standing production values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SupervisorError};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker processes to maintain.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Bound on how long a graceful shutdown may drain before remaining
    /// workers are forcefully killed.
    #[serde(default = "default_shutdown_timeout")]
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Sleep between retries when the job broker has no active
    /// connections.
    #[serde(default = "default_reconnect_backoff")]
    #[serde(with = "humantime_serde")]
    pub reconnect_backoff: Duration,

    /// Maximum lifetime of a single worker process before it exits and is
    /// replaced. `None` lets workers run unbounded.
    #[serde(default = "default_max_run_duration")]
    #[serde(with = "humantime_serde_opt")]
    pub max_run_duration: Option<Duration>,

    /// Identity to assume when daemonized and privileged.
    #[serde(default)]
    pub user: Option<String>,
}

fn default_worker_count() -> usize {
    5
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_reconnect_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_max_run_duration() -> Option<Duration> {
    Some(Duration::from_secs(3600))
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            shutdown_timeout: default_shutdown_timeout(),
            reconnect_backoff: default_reconnect_backoff(),
            max_run_duration: default_max_run_duration(),
            user: None,
        }
    }
}

impl PoolConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for values the supervisor cannot
    /// honor.
    pub fn validate(&self) -> Result<()> {
        if self.shutdown_timeout < Duration::from_secs(1) {
            // The deadline is armed via alarm(2), which has whole-second
            // granularity and treats zero as "cancel".
            return Err(SupervisorError::config(
                "shutdown_timeout must be at least 1 second",
            ));
        }
        if self.reconnect_backoff.is_zero() {
            return Err(SupervisorError::config(
                "reconnect_backoff must be non-zero",
            ));
        }
        if let Some(max_run) = self.max_run_duration {
            if max_run < Duration::from_secs(1) {
                return Err(SupervisorError::config(
                    "max_run_duration must be at least 1 second",
                ));
            }
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SupervisorError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SupervisorError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for optional humantime durations.
mod humantime_serde_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect_backoff, Duration::from_secs(5));
        assert_eq!(config.max_run_duration, Some(Duration::from_secs(3600)));
        assert!(config.user.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_subsecond_timeout() {
        let config = PoolConfig {
            shutdown_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_backoff() {
        let config = PoolConfig {
            reconnect_backoff: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_subsecond_max_run() {
        let config = PoolConfig {
            max_run_duration: Some(Duration::from_millis(10)),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            max_run_duration: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PoolConfig::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: PoolConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.worker_count, config.worker_count);
        assert_eq!(parsed.shutdown_timeout, config.shutdown_timeout);
        assert_eq!(parsed.max_run_duration, config.max_run_duration);
    }

    #[test]
    fn test_parse_humantime_fields() {
        let config: PoolConfig = toml::from_str(
            r#"
            worker_count = 3
            shutdown_timeout = "2s"
            reconnect_backoff = "500ms"
            max_run_duration = "1h"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.reconnect_backoff, Duration::from_millis(500));
        assert_eq!(config.max_run_duration, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: PoolConfig = toml::from_str("").unwrap();
        assert_eq!(config.worker_count, 5);
    }
}
