//! Sample collection and aggregate statistics for one (target, endpoint) run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Example messages kept per failure kind
pub const MAX_FAILURE_EXAMPLES: usize = 5;

/// Why a request did not count as a success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// `timeout`, `connection_failed`, `status_500`, ...
    pub kind: String,
    pub message: String,
}

/// One completed (or failed) request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// Wall-clock seconds from dispatch to full body; `None` when no response arrived
    pub elapsed_secs: Option<f64>,
    /// True iff a response arrived with status 200
    pub succeeded: bool,
    pub failure: Option<Failure>,
}

impl RequestOutcome {
    pub fn success(elapsed: Duration) -> Self {
        Self {
            elapsed_secs: Some(elapsed.as_secs_f64()),
            succeeded: true,
            failure: None,
        }
    }

    /// A response arrived with a status other than 200
    pub fn rejected(elapsed: Duration, status: u16, message: impl Into<String>) -> Self {
        Self {
            elapsed_secs: Some(elapsed.as_secs_f64()),
            succeeded: false,
            failure: Some(Failure {
                kind: format!("status_{}", status),
                message: message.into(),
            }),
        }
    }

    /// No response at all (timeout, refused connection, DNS failure...)
    pub fn network_failure(kind: &str, message: impl Into<String>) -> Self {
        Self {
            elapsed_secs: None,
            succeeded: false,
            failure: Some(Failure {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn failure_kind(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.kind.as_str())
    }
}

/// Failures of one kind within a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub count: u64,
    /// The first few distinct messages seen
    #[serde(default)]
    pub examples: Vec<String>,
}

impl FailureSummary {
    fn add(&mut self, message: &str) {
        self.count += 1;
        if self.examples.len() < MAX_FAILURE_EXAMPLES && !self.examples.iter().any(|e| e == message) {
            self.examples.push(message.to_string());
        }
    }
}

/// Append-only sink for the outcomes of one run.
///
/// Completions arrive from many tasks in arbitrary order, so recording only
/// needs `&self`.
pub struct ResultAggregator {
    /// Latencies of successful requests, in completion order (seconds)
    latencies: Mutex<Vec<f64>>,
    /// Requests that did not succeed
    error_count: AtomicU64,
    failures: Mutex<BTreeMap<String, FailureSummary>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            latencies: Mutex::new(Vec::new()),
            error_count: AtomicU64::new(0),
            failures: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record one outcome
    pub fn record(&self, outcome: RequestOutcome) {
        match (outcome.succeeded, outcome.elapsed_secs) {
            (true, Some(elapsed)) if elapsed.is_finite() && elapsed >= 0.0 => {
                self.latencies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(elapsed);
            }
            _ => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                let (kind, message) = match &outcome.failure {
                    Some(failure) => (failure.kind.as_str(), failure.message.as_str()),
                    None => ("unknown", "invalid latency sample"),
                };
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(kind.to_string())
                    .or_default()
                    .add(message);
            }
        }
    }

    pub fn success_count(&self) -> u64 {
        self.latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.success_count() + self.error_count()
    }

    /// Freeze the samples collected so far into a [`BenchmarkResult`]
    pub fn finalize(&self, name: &str, window: Duration) -> BenchmarkResult {
        let latencies = self
            .latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let failures = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        BenchmarkResult::finalize(name, latencies, self.error_count(), window.as_secs_f64())
            .with_failures(failures)
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate over one (target, endpoint, run).
///
/// Latency fields are in seconds and are `None` when the run produced no
/// successful samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    /// Successful latencies, ascending
    #[serde(skip)]
    pub latencies: Vec<f64>,
    pub error_count: u64,
    pub total_requests: u64,
    /// Length of the measurement window in seconds
    pub window_secs: f64,
    pub rps: f64,
    pub avg_latency: Option<f64>,
    pub p50_latency: Option<f64>,
    pub p95_latency: Option<f64>,
    pub p99_latency: Option<f64>,
    pub min_latency: Option<f64>,
    pub max_latency: Option<f64>,
    pub error_rate_percent: f64,
    /// Failed requests grouped by kind
    #[serde(default)]
    pub failures: BTreeMap<String, FailureSummary>,
}

impl BenchmarkResult {
    /// Derive every metric from an immutable sample set.
    ///
    /// Pure: the same input always produces the same output.
    pub fn finalize(
        name: &str,
        mut latencies: Vec<f64>,
        error_count: u64,
        window_secs: f64,
    ) -> Self {
        latencies.retain(|l| l.is_finite() && *l >= 0.0);
        latencies.sort_by(f64::total_cmp);

        let success_count = latencies.len() as u64;
        let total_requests = success_count + error_count;

        let rps = if window_secs > 0.0 {
            success_count as f64 / window_secs
        } else {
            0.0
        };

        let avg_latency = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let error_rate_percent = if total_requests == 0 {
            0.0
        } else {
            error_count as f64 / total_requests as f64 * 100.0
        };

        Self {
            name: name.to_string(),
            p50_latency: percentile(&latencies, 50.0),
            p95_latency: percentile(&latencies, 95.0),
            p99_latency: percentile(&latencies, 99.0),
            min_latency: latencies.first().copied(),
            max_latency: latencies.last().copied(),
            latencies,
            error_count,
            total_requests,
            window_secs,
            rps,
            avg_latency,
            error_rate_percent,
            failures: BTreeMap::new(),
        }
    }

    /// Attach the failure breakdown collected during the run
    pub fn with_failures(mut self, failures: BTreeMap<String, FailureSummary>) -> Self {
        self.failures = failures;
        self
    }

    pub fn success_count(&self) -> u64 {
        self.total_requests - self.error_count
    }

    /// True when no request succeeded
    pub fn is_empty(&self) -> bool {
        self.success_count() == 0
    }

    pub fn avg_latency_ms(&self) -> Option<f64> {
        self.avg_latency.map(|s| s * 1000.0)
    }

    pub fn p50_latency_ms(&self) -> Option<f64> {
        self.p50_latency.map(|s| s * 1000.0)
    }

    pub fn min_latency_ms(&self) -> Option<f64> {
        self.min_latency.map(|s| s * 1000.0)
    }

    pub fn max_latency_ms(&self) -> Option<f64> {
        self.max_latency.map(|s| s * 1000.0)
    }

    pub fn p95_latency_ms(&self) -> Option<f64> {
        self.p95_latency.map(|s| s * 1000.0)
    }

    pub fn p99_latency_ms(&self) -> Option<f64> {
        self.p99_latency.map(|s| s * 1000.0)
    }
}

/// Percentile of an ascending slice, interpolating linearly between ranks
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            let value = sorted[lower] + (sorted[upper] - sorted[lower]) * weight;
            Some(value.clamp(sorted[lower], sorted[upper]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_aggregator_counts() {
        let aggregator = ResultAggregator::new();
        aggregator.record(RequestOutcome::success(Duration::from_millis(100)));
        aggregator.record(RequestOutcome::success(Duration::from_millis(150)));
        aggregator.record(RequestOutcome::success(Duration::from_millis(200)));
        aggregator.record(RequestOutcome::rejected(
            Duration::from_millis(5),
            500,
            "500 Internal Server Error",
        ));
        aggregator.record(RequestOutcome::network_failure("timeout", "no response within 5s"));

        assert_eq!(aggregator.success_count(), 3);
        assert_eq!(aggregator.error_count(), 2);
        assert_eq!(aggregator.total_requests(), 5);

        let result = aggregator.finalize("Ping", Duration::from_secs(1));
        assert_eq!(result.success_count(), 3);
        assert!((result.rps - 3.0).abs() < 1e-9);
        assert!((result.error_rate_percent - 40.0).abs() < 1e-9);
        assert!((result.avg_latency.unwrap() - 0.15).abs() < 1e-9);
        assert_eq!(result.failures["status_500"].count, 1);
        assert_eq!(result.failures["timeout"].count, 1);
    }

    #[test]
    fn test_failure_breakdown_keeps_few_examples() {
        let aggregator = ResultAggregator::new();
        for i in 0..8 {
            aggregator.record(RequestOutcome::network_failure(
                "connection_failed",
                format!("connection refused ({})", i),
            ));
        }
        for _ in 0..3 {
            aggregator.record(RequestOutcome::rejected(
                Duration::from_millis(1),
                503,
                "503 Service Unavailable",
            ));
        }
        aggregator.record(RequestOutcome {
            elapsed_secs: Some(f64::NAN),
            succeeded: true,
            failure: None,
        });

        let result = aggregator.finalize("Ping", Duration::from_secs(1));
        assert_eq!(result.error_count, 12);
        let refused = &result.failures["connection_failed"];
        assert_eq!(refused.count, 8);
        assert_eq!(refused.examples.len(), MAX_FAILURE_EXAMPLES);
        assert_eq!(refused.examples[0], "connection refused (0)");

        // Repeated messages are kept once
        let unavailable = &result.failures["status_503"];
        assert_eq!(unavailable.count, 3);
        assert_eq!(unavailable.examples, vec!["503 Service Unavailable".to_string()]);
        assert_eq!(result.failures["unknown"].count, 1);

        let counted: u64 = result.failures.values().map(|f| f.count).sum();
        assert_eq!(counted, result.error_count);
    }

    #[test]
    fn test_median_and_range() {
        let result = BenchmarkResult::finalize("x", vec![0.4, 0.1, 0.3, 0.2], 0, 1.0);
        assert_eq!(result.min_latency, Some(0.1));
        assert_eq!(result.max_latency, Some(0.4));
        assert!((result.p50_latency.unwrap() - 0.25).abs() < 1e-9);
        assert!((result.min_latency_ms().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_completion_order_does_not_matter() {
        let a = BenchmarkResult::finalize("x", vec![0.3, 0.1, 0.2], 1, 2.0);
        let b = BenchmarkResult::finalize("x", vec![0.1, 0.2, 0.3], 1, 2.0);
        assert_eq!(a, b);
        assert_eq!(a.latencies, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let samples: Vec<f64> = (1..=500).map(|i| (i as f64 * 0.37) % 1.3 + 0.001).collect();
        let first = BenchmarkResult::finalize("Ping", samples.clone(), 7, 10.0);
        let second = BenchmarkResult::finalize("Ping", samples, 7, 10.0);

        assert_eq!(first.rps.to_bits(), second.rps.to_bits());
        assert_eq!(
            first.avg_latency.unwrap().to_bits(),
            second.avg_latency.unwrap().to_bits()
        );
        assert_eq!(
            first.p95_latency.unwrap().to_bits(),
            second.p95_latency.unwrap().to_bits()
        );
        assert_eq!(
            first.p99_latency.unwrap().to_bits(),
            second.p99_latency.unwrap().to_bits()
        );
        assert_eq!(
            first.error_rate_percent.to_bits(),
            second.error_rate_percent.to_bits()
        );

        // Refinalizing from a frozen result's own samples changes nothing
        let again = BenchmarkResult::finalize(
            &first.name,
            first.latencies.clone(),
            first.error_count,
            first.window_secs,
        );
        assert_eq!(first, again);
    }

    #[test]
    fn test_empty_result_set_degrades() {
        let result = BenchmarkResult::finalize("Ping", vec![], 12, 5.0);
        assert!(result.is_empty());
        assert_eq!(result.rps, 0.0);
        assert_eq!(result.avg_latency, None);
        assert_eq!(result.p95_latency, None);
        assert_eq!(result.p99_latency, None);
        assert_eq!(result.p50_latency, None);
        assert_eq!(result.min_latency, None);
        assert_eq!(result.max_latency, None);
        assert!((result.error_rate_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_samples_at_all() {
        let result = BenchmarkResult::finalize("Ping", vec![], 0, 0.0);
        assert_eq!(result.total_requests, 0);
        assert_eq!(result.error_rate_percent, 0.0);
        assert_eq!(result.rps, 0.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        // rank = 0.95 * 9 = 8.55 -> 9 + 0.55 * (10 - 9)
        assert!((percentile(&sorted, 95.0).unwrap() - 9.55).abs() < 1e-9);
        assert!((percentile(&sorted, 50.0).unwrap() - 5.5).abs() < 1e-9);
        assert_eq!(percentile(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile(&sorted, 100.0), Some(10.0));
        assert_eq!(percentile(&[4.2], 99.0), Some(4.2));
        assert_eq!(percentile(&[], 99.0), None);
    }

    #[test]
    fn test_tail_above_mean_for_spread_distribution() {
        let samples: Vec<f64> = (1..=200).map(|i| i as f64 / 1000.0).collect();
        let result = BenchmarkResult::finalize("Spread", samples, 0, 1.0);
        let avg = result.avg_latency.unwrap();
        let p95 = result.p95_latency.unwrap();
        let p99 = result.p99_latency.unwrap();
        assert!(p99 >= p95);
        assert!(p95 >= avg);
    }

    #[test]
    fn test_non_finite_samples_are_dropped() {
        let result = BenchmarkResult::finalize("x", vec![0.1, f64::NAN, -1.0, 0.3], 0, 1.0);
        assert_eq!(result.latencies, vec![0.1, 0.3]);
    }

    proptest! {
        #[test]
        fn prop_p99_not_below_p95(samples in prop::collection::vec(0.0001f64..10.0, 1..400)) {
            let result = BenchmarkResult::finalize("prop", samples, 0, 1.0);
            let p95 = result.p95_latency.unwrap();
            let p99 = result.p99_latency.unwrap();
            prop_assert!(p99 >= p95);
            prop_assert!(p99 <= *result.latencies.last().unwrap());
            prop_assert!(result.min_latency.unwrap() <= result.p50_latency.unwrap());
            prop_assert!(result.p50_latency.unwrap() <= p95);
            prop_assert_eq!(result.max_latency, result.latencies.last().copied());
        }

        #[test]
        fn prop_error_rate_bounded(successes in 0usize..200, errors in 0u64..200) {
            let samples = vec![0.01; successes];
            let result = BenchmarkResult::finalize("prop", samples, errors, 1.0);
            prop_assert!(result.error_rate_percent >= 0.0);
            prop_assert!(result.error_rate_percent <= 100.0);
            if successes == 0 && errors == 0 {
                prop_assert_eq!(result.error_rate_percent, 0.0);
            }
        }
    }
}
