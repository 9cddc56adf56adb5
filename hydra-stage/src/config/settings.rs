//! Runtime settings for the coordinator client and the worker loop.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

/// Configuration for talking to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry configuration for document writes and failure reports.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    format!("hydra-stage/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new coordinator configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Gets timeout as Duration.
    ///
    /// A negative, zero, or non-finite setting falls back to the default.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        positive_seconds(self.timeout_seconds).unwrap_or_else(|| {
            warn!(
                timeout_seconds = self.timeout_seconds,
                "Invalid coordinator timeout, using default"
            );
            Duration::from_secs_f64(default_timeout())
        })
    }
}

/// Retry configuration for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Initial delay between retries in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum delay between retries.
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
    /// Status codes that should trigger a retry.
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: HashSet<u16>,
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    30.0
}

fn default_retry_status_codes() -> HashSet<u16> {
    [429, 500, 502, 503, 504].into_iter().collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_seconds: default_max_delay(),
            retry_status_codes: default_retry_status_codes(),
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculates the delay for a given attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.retry_delay_seconds * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_seconds);
        positive_seconds(capped).unwrap_or(Duration::ZERO)
    }

    /// Whether a status code should trigger a retry.
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }
}

/// Configuration for the worker loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How long to wait before polling again when no document is available.
    #[serde(default = "default_hold_interval_ms")]
    pub hold_interval_ms: u64,
}

fn default_hold_interval_ms() -> u64 {
    2000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            hold_interval_ms: default_hold_interval_ms(),
        }
    }
}

impl WorkerConfig {
    /// Sets the hold interval.
    #[must_use]
    pub fn with_hold_interval(mut self, interval: Duration) -> Self {
        self.hold_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Gets the hold interval as Duration.
    #[must_use]
    pub const fn hold_interval(&self) -> Duration {
        Duration::from_millis(self.hold_interval_ms)
    }
}

/// All runtime settings, with environment overrides applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Coordinator client settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Worker loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl RuntimeSettings {
    /// Loads defaults and applies `HYDRA_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults and applies overrides from `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(ms) = parse_override::<u64>(&lookup, "HYDRA_HOLD_INTERVAL_MS") {
            settings.worker.hold_interval_ms = ms;
        }
        if let Some(seconds) = parse_override::<f64>(&lookup, "HYDRA_HTTP_TIMEOUT_SECONDS") {
            if positive_seconds(seconds).is_some() {
                settings.coordinator.timeout_seconds = seconds;
            } else {
                warn!(
                    key = "HYDRA_HTTP_TIMEOUT_SECONDS",
                    value = seconds,
                    "Ignoring non-positive environment override"
                );
            }
        }
        if let Some(retries) = parse_override::<usize>(&lookup, "HYDRA_MAX_RETRIES") {
            settings.coordinator.retry.max_retries = retries;
        }

        settings
    }
}

/// Converts seconds to a Duration if finite and greater than zero.
fn positive_seconds(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_status_codes() {
        let retry = RetryConfig::default();
        assert!(retry.should_retry_status(503));
        assert!(!retry.should_retry_status(404));
        assert_eq!(RetryConfig::disabled().max_retries, 0);
    }

    #[test]
    fn test_serde_defaults() {
        let settings: RuntimeSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.worker.hold_interval(), Duration::from_millis(2000));
        assert!((settings.coordinator.timeout_seconds - 30.0).abs() < f64::EPSILON);
        assert!(settings.coordinator.user_agent.starts_with("hydra-stage/"));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("HYDRA_HOLD_INTERVAL_MS", "250"),
            ("HYDRA_HTTP_TIMEOUT_SECONDS", "2.5"),
            ("HYDRA_MAX_RETRIES", "lots"),
        ]
        .into_iter()
        .collect();

        let settings = RuntimeSettings::from_lookup(|key| env.get(key).map(ToString::to_string));

        assert_eq!(settings.worker.hold_interval_ms, 250);
        assert_eq!(settings.coordinator.timeout(), Duration::from_millis(2500));
        // unparseable values fall back to the default
        assert_eq!(settings.coordinator.retry.max_retries, 3);
    }

    #[test]
    fn test_invalid_timeout_override_is_ignored() {
        for raw in ["-1", "0", "NaN", "inf"] {
            let settings = RuntimeSettings::from_lookup(|key| {
                (key == "HYDRA_HTTP_TIMEOUT_SECONDS").then(|| raw.to_string())
            });
            assert!((settings.coordinator.timeout_seconds - 30.0).abs() < f64::EPSILON, "{raw}");
            assert_eq!(settings.coordinator.timeout(), Duration::from_secs(30));
        }
    }

    #[test]
    fn test_invalid_durations_do_not_panic() {
        let config = CoordinatorConfig::new().with_timeout(-1.0);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(CoordinatorConfig::new().with_timeout(f64::NAN).timeout(), Duration::from_secs(30));

        let retry = RetryConfig {
            retry_delay_seconds: -5.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.delay_for_attempt(1), Duration::ZERO);
    }
}
