use crate::error::{ChargenError, Result};
use crate::models::DuplicatePolicy;
use std::time::Duration;

/// Tunables for a batch run. Values, not files: callers construct this
/// directly or start from `Default` and override via environment variables.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of records per shard.
    pub max_shard_size: usize,
    /// Ceiling on the serialized payload size for a single job.
    pub max_payload_bytes: usize,
    /// First poll delay after submission.
    pub poll_initial_interval: Duration,
    /// Upper bound for the doubling poll interval.
    pub poll_max_interval: Duration,
    /// Multiplier applied to the poll interval after each poll.
    pub poll_backoff_multiplier: f64,
    /// Wall-clock budget per job; unresolved jobs expire past this.
    pub max_job_wait: Duration,
    /// Submission attempts before a job is downgraded to failed.
    pub max_submit_attempts: u32,
    /// Base delay for submission retry backoff.
    pub submit_base_delay: Duration,
    /// Cap for submission retry backoff.
    pub submit_max_delay: Duration,
    /// Add jitter to retry delays.
    pub jitter: bool,
    /// Concurrent poll task limit.
    pub max_concurrent_polls: usize,
    /// How duplicate record identifiers are handled.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_shard_size: 500,
            max_payload_bytes: 32 * 1024 * 1024,
            poll_initial_interval: Duration::from_secs(30),
            poll_max_interval: Duration::from_secs(300),
            poll_backoff_multiplier: 2.0,
            max_job_wait: Duration::from_secs(24 * 60 * 60),
            max_submit_attempts: 3,
            submit_base_delay: Duration::from_secs(1),
            submit_max_delay: Duration::from_secs(60),
            jitter: true,
            max_concurrent_polls: 16,
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

impl BatchConfig {
    /// Build a configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("CHARGEN_MAX_SHARD_SIZE") {
            config.max_shard_size = size.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid max_shard_size: {e}"))
            })?;
        }

        if let Ok(bytes) = std::env::var("CHARGEN_MAX_PAYLOAD_BYTES") {
            config.max_payload_bytes = bytes.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid max_payload_bytes: {e}"))
            })?;
        }

        if let Ok(secs) = std::env::var("CHARGEN_POLL_INITIAL_SECONDS") {
            config.poll_initial_interval = Duration::from_secs(secs.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid poll_initial_seconds: {e}"))
            })?);
        }

        if let Ok(secs) = std::env::var("CHARGEN_POLL_MAX_SECONDS") {
            config.poll_max_interval = Duration::from_secs(secs.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid poll_max_seconds: {e}"))
            })?);
        }

        if let Ok(secs) = std::env::var("CHARGEN_MAX_JOB_WAIT_SECONDS") {
            config.max_job_wait = Duration::from_secs(secs.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid max_job_wait_seconds: {e}"))
            })?);
        }

        if let Ok(attempts) = std::env::var("CHARGEN_MAX_SUBMIT_ATTEMPTS") {
            config.max_submit_attempts = attempts.parse().map_err(|e| {
                ChargenError::configuration(format!("Invalid max_submit_attempts: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on invalid tunables, before any shard is produced or any
    /// job is submitted.
    pub fn validate(&self) -> Result<()> {
        if self.max_shard_size == 0 {
            return Err(ChargenError::configuration(
                "max_shard_size must be greater than zero",
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(ChargenError::configuration(
                "max_payload_bytes must be greater than zero",
            ));
        }
        if self.max_submit_attempts == 0 {
            return Err(ChargenError::configuration(
                "max_submit_attempts must be at least one",
            ));
        }
        if self.poll_initial_interval.is_zero() {
            return Err(ChargenError::configuration(
                "poll_initial_interval must be greater than zero",
            ));
        }
        if self.poll_max_interval < self.poll_initial_interval {
            return Err(ChargenError::configuration(
                "poll_max_interval must not be below poll_initial_interval",
            ));
        }
        if self.poll_backoff_multiplier < 1.0 {
            return Err(ChargenError::configuration(
                "poll_backoff_multiplier must be at least 1.0",
            ));
        }
        if self.max_concurrent_polls == 0 {
            return Err(ChargenError::configuration(
                "max_concurrent_polls must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_shard_size_rejected() {
        let config = BatchConfig {
            max_shard_size: 0,
            ..BatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChargenError::Configuration { .. })
        ));
    }

    #[test]
    fn test_poll_interval_ordering_enforced() {
        let config = BatchConfig {
            poll_initial_interval: Duration::from_secs(60),
            poll_max_interval: Duration::from_secs(30),
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = BatchConfig {
            max_submit_attempts: 0,
            ..BatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
