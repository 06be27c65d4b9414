//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BenchError, Result};

/// One service under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Label used in tables and reports ("Current", "New", "Direct", "Proxy")
    pub label: String,
    /// Base URL; endpoint paths are appended verbatim
    pub base_url: String,
}

impl Target {
    pub fn new(label: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            base_url: base_url.into(),
        }
    }

    /// Join the base URL with a resolved path (and query)
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{}{}", base, path_and_query)
        } else {
            format!("{}/{}", base, path_and_query)
        }
    }
}

/// Traffic shape of a single (target, endpoint) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    /// Simulated concurrent users
    pub concurrent_users: usize,
    /// Seconds each simulated user waits between requests
    pub think_time_secs: f64,
    /// Length of the linear ramp-up phase in seconds (0 disables it)
    pub ramp_up_secs: f64,
    /// Length of the steady-state phase in seconds
    pub steady_secs: f64,
    /// Requests launched together per ramp-up step
    pub batch_size: usize,
    /// Optional cap on requests in flight at once
    pub max_in_flight: Option<usize>,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            concurrent_users: 100,
            think_time_secs: 2.0,
            ramp_up_secs: 10.0,
            steady_secs: 60.0,
            batch_size: 10,
            max_in_flight: None,
        }
    }
}

impl LoadProfile {
    /// Steady-state issuance rate in requests per second
    pub fn rate(&self) -> f64 {
        self.concurrent_users as f64 / self.think_time_secs
    }

    pub fn ramp_up(&self) -> Duration {
        Duration::from_secs_f64(self.ramp_up_secs)
    }

    pub fn steady(&self) -> Duration {
        Duration::from_secs_f64(self.steady_secs)
    }

    /// Requests the ramp-up phase launches under an exact linear schedule
    pub fn expected_ramp_requests(&self) -> f64 {
        self.rate() * self.ramp_up_secs / 2.0
    }

    /// Requests the steady-state phase launches
    pub fn expected_steady_requests(&self) -> f64 {
        (self.rate() * self.steady_secs).ceil()
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrent_users == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrent users must be at least 1".to_string(),
            ));
        }
        if !(self.think_time_secs.is_finite() && self.think_time_secs > 0.0) {
            return Err(BenchError::InvalidConfig(format!(
                "think time must be a positive number of seconds, got {}",
                self.think_time_secs
            )));
        }
        if !(self.steady_secs.is_finite() && self.steady_secs > 0.0) {
            return Err(BenchError::InvalidConfig(format!(
                "steady-state duration must be positive, got {}",
                self.steady_secs
            )));
        }
        if !(self.ramp_up_secs.is_finite() && self.ramp_up_secs >= 0.0) {
            return Err(BenchError::InvalidConfig(format!(
                "ramp-up duration cannot be negative, got {}",
                self.ramp_up_secs
            )));
        }
        if self.batch_size == 0 {
            return Err(BenchError::InvalidConfig(
                "ramp-up batch size must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight == Some(0) {
            return Err(BenchError::InvalidConfig(
                "max in-flight requests must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Liveness polling before the suite starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Path probed on every target
    pub path: String,
    /// Overall time allowed for a target to answer 200
    pub timeout_secs: u64,
    /// Delay between probes
    pub poll_interval_ms: u64,
    /// Skip the check entirely
    pub skip: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            timeout_secs: 30,
            poll_interval_ms: 500,
            skip: false,
        }
    }
}

/// Configuration for a comparative benchmark suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Baseline target ("current" or direct path)
    pub baseline: Target,
    /// Candidate target ("new" or proxied path)
    pub candidate: Target,
    pub profile: LoadProfile,
    /// Pause between consecutive runs in seconds
    pub cooldown_secs: f64,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Idle connections kept per host in the run's pool
    pub pool_max_idle_per_host: usize,
    pub liveness: LivenessConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            baseline: Target::new("Current", "http://127.0.0.1:3001"),
            candidate: Target::new("New", "http://127.0.0.1:3002"),
            profile: LoadProfile::default(),
            cooldown_secs: 5.0,
            request_timeout_secs: 30,
            pool_max_idle_per_host: 500,
            liveness: LivenessConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;
        if !(self.cooldown_secs.is_finite() && self.cooldown_secs >= 0.0) {
            return Err(BenchError::InvalidConfig(format!(
                "cooldown cannot be negative, got {}",
                self.cooldown_secs
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(BenchError::InvalidConfig(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        for target in [&self.baseline, &self.candidate] {
            if !(target.base_url.starts_with("http://") || target.base_url.starts_with("https://"))
            {
                return Err(BenchError::InvalidConfig(format!(
                    "target '{}' base URL must start with http:// or https://: {}",
                    target.label, target.base_url
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for the mock target server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Simulated processing latency per request in milliseconds
    pub latency_ms: u64,
    /// Error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Whether `/health` answers 200
    pub healthy: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            latency_ms: 10,
            error_rate: 0.0,
            healthy: true,
        }
    }
}
