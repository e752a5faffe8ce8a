//! Configuration for a test run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default iteration count, enough samples for basic normal-distribution statistics.
pub const DEFAULT_ITERATIONS: usize = 30;

/// Configuration for a [`Test`](crate::Test) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Number of times every step is executed.
    pub iterations: usize,
    /// Give up on an event-driven step after this long. `None` waits forever.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::result::opt_duration_serde"
    )]
    pub event_timeout: Option<Duration>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            event_timeout: None,
        }
    }
}

impl TestConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `BENCH_ITERATIONS`: iterations per test (default: 30)
    /// - `BENCH_EVENT_TIMEOUT_MS`: per-iteration wait limit for event steps
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("BENCH_ITERATIONS") {
            if let Ok(n) = v.parse() {
                cfg.iterations = n;
            }
        }
        if let Ok(v) = std::env::var("BENCH_EVENT_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.event_timeout = Some(Duration::from_millis(ms));
            }
        }

        cfg
    }

    /// Set the number of iterations.
    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    /// Fail event-driven steps that take longer than `timeout` to complete.
    pub fn event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = Some(timeout);
        self
    }

    /// Wait for events indefinitely.
    pub fn no_event_timeout(mut self) -> Self {
        self.event_timeout = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_thirty_iterations_by_default() {
        let cfg = TestConfig::default();
        assert_eq!(cfg.iterations, 30);
        assert!(cfg.event_timeout.is_none());
    }

    #[test]
    fn should_build_config_with_builder() {
        let cfg = TestConfig::new()
            .iterations(5)
            .event_timeout(Duration::from_millis(250));

        assert_eq!(cfg.iterations, 5);
        assert_eq!(cfg.event_timeout, Some(Duration::from_millis(250)));
        assert!(cfg.no_event_timeout().event_timeout.is_none());
    }

    #[test]
    fn should_omit_timeout_from_json_when_unset() {
        let json = serde_json::to_value(TestConfig::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "iterations": 30 }));

        let cfg = TestConfig::new().event_timeout(Duration::from_micros(3));
        let back: TestConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}
