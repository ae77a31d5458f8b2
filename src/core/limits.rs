//! Engine limits for queue processing.
//!
//! Bounds on how much a single run may do and how long any external call
//! may take:
//! - Attempts per job
//! - Jobs per run
//! - Agent readiness and extraction timeouts
//! - Backoff between retries

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Limits applied by the queue processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Extraction attempts per job before it fails (default: 2, minimum: 1)
    #[serde(default = "default_max_attempts", deserialize_with = "at_least_one")]
    pub max_attempts: u32,

    /// Pending jobs picked up by one run (default: 200)
    #[serde(default = "default_queue_limit_per_run")]
    pub queue_limit_per_run: usize,

    /// Agent extraction timeout in milliseconds (default: 45s)
    #[serde(default = "default_item_timeout_ms")]
    pub item_timeout_ms: u64,

    /// Time allowed for an agent session to become ready (default: 15s)
    #[serde(default = "default_session_ready_timeout_ms")]
    pub session_ready_timeout_ms: u64,

    /// Pause after a retryable failure in milliseconds (default: 5s)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}
fn at_least_one<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(u32::deserialize(deserializer)?.max(1))
}
fn default_queue_limit_per_run() -> usize {
    200
}
fn default_item_timeout_ms() -> u64 {
    45_000
}
fn default_session_ready_timeout_ms() -> u64 {
    15_000
}
fn default_backoff_ms() -> u64 {
    5_000
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            queue_limit_per_run: default_queue_limit_per_run(),
            item_timeout_ms: default_item_timeout_ms(),
            session_ready_timeout_ms: default_session_ready_timeout_ms(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl EngineLimits {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    pub fn session_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.session_ready_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Raise `max_attempts` to one if it was set lower
    pub fn clamped(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self
    }

    /// Whether a job that just failed its `attempts`-th attempt gets another
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = EngineLimits::default();
        assert_eq!(limits.max_attempts, 2);
        assert_eq!(limits.queue_limit_per_run, 200);
        assert_eq!(limits.item_timeout(), Duration::from_secs(45));
        assert_eq!(limits.session_ready_timeout(), Duration::from_secs(15));
        assert_eq!(limits.backoff(), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry() {
        let limits = EngineLimits {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(limits.should_retry(1));
        assert!(limits.should_retry(2));
        assert!(!limits.should_retry(3));
        assert!(!limits.should_retry(4));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let limits: EngineLimits = serde_yaml::from_str("max_attempts: 4\nbackoff_ms: 10\n").unwrap();
        assert_eq!(limits.max_attempts, 4);
        assert_eq!(limits.backoff_ms, 10);
        assert_eq!(limits.item_timeout_ms, 45_000);
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let limits: EngineLimits = serde_yaml::from_str("max_attempts: 0\n").unwrap();
        assert_eq!(limits.max_attempts, 1);

        let limits = EngineLimits {
            max_attempts: 0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(limits.max_attempts, 1);
        assert!(!limits.should_retry(1));
    }
}
