// Integration tests for Feature Bench
//
// These tests drive the whole engine against in-process mock targets:
// liveness check, scheduling, execution, aggregation, comparison and
// history recording.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use feature_bench::app::{run_suite, RunStatus};
use feature_bench::bench::{
    BenchmarkConfig, BenchmarkRunner, ComparisonReport, Delta, EndpointDescriptor, LoadProfile,
    LoadScheduler, Method, MockServerConfig, MockTargetServer, RequestExecutor, Target,
};
use feature_bench::config::{Config, LogFormat};
use feature_bench::decision::{DecisionMode, DecisionProvider, FixedDecision};
use feature_bench::error::BenchError;
use feature_bench::history::{FeatureHistoryEntry, FeatureHistoryRecorder, YamlHistoryStore};
use feature_bench::http_client::build_client;
use feature_bench::sink::{MarkdownFileSink, ReportSink, REPORT_PREFIX};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

async fn start_target(latency_ms: u64, error_rate: f64) -> MockTargetServer {
    let mut server = MockTargetServer::new(MockServerConfig {
        latency_ms,
        error_rate,
        ..Default::default()
    });
    server.start().await.expect("Failed to start mock target");
    server
}

fn profile(users: usize, think_time: f64, ramp_up: f64, steady: f64) -> LoadProfile {
    LoadProfile {
        concurrent_users: users,
        think_time_secs: think_time,
        ramp_up_secs: ramp_up,
        steady_secs: steady,
        batch_size: 10,
        max_in_flight: None,
    }
}

fn config(baseline: &MockTargetServer, candidate: &MockTargetServer, profile: LoadProfile) -> BenchmarkConfig {
    let mut config = BenchmarkConfig {
        baseline: Target::new("Current", baseline.url()),
        candidate: Target::new("New", candidate.url()),
        profile,
        cooldown_secs: 0.1,
        request_timeout_secs: 5,
        ..Default::default()
    };
    config.liveness.timeout_secs = 5;
    config.liveness.poll_interval_ms = 50;
    config
}

fn suite_config(baseline: &MockTargetServer, candidate: &MockTargetServer, dir: &Path) -> Config {
    let results_dir = dir.join("results");
    Config {
        feature: "Request Batching".to_string(),
        bench: config(baseline, candidate, profile(10, 1.0, 0.0, 0.5)),
        suite: vec![EndpointDescriptor::new("Simple Ping", Method::Get, "/ping")],
        suite_file: None,
        history_file: results_dir.join("feature_history.yaml"),
        results_dir,
        clean_results: false,
        json: true,
        decision: DecisionMode::Yes,
        log_level: "info".to_string(),
        log_format: LogFormat::Text,
    }
}

/// Report files with `extension` in `dir`; zero when the directory is missing
fn report_files(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with(REPORT_PREFIX) && name.ends_with(&format!(".{}", extension))
        })
        .count()
}

// ==================================================================================================
// End-to-end scenarios
// ==================================================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thousand_pings_against_ten_ms_target() {
    let target = start_target(10, 0.0).await;

    // 100 users / 0.1s think time = 1000 req/s for one second
    let load = profile(100, 0.1, 0.0, 1.0);
    let timeout = Duration::from_secs(5);
    let executor = RequestExecutor::new(build_client(500, timeout).unwrap(), timeout);
    let request = std::sync::Arc::new(
        executor
            .prepare(
                &Target::new("Mock", target.url()),
                &EndpointDescriptor::new("Ping", Method::Get, "/ping"),
            )
            .unwrap(),
    );

    let run = LoadScheduler::new(load)
        .run("Ping", || {
            let executor = executor.clone();
            let request = request.clone();
            async move { executor.execute_prepared(&request).await }
        })
        .await;

    let result = &run.result;
    assert!(run.wall_clock >= Duration::from_secs(1));
    assert!(run.launched() >= 900 && run.launched() <= 1000, "launched {}", run.launched());
    assert_eq!(result.total_requests, run.launched());
    assert_eq!(result.error_rate_percent, 0.0);

    let avg = result.avg_latency.unwrap();
    assert!(avg >= 0.010, "avg latency {} below the target's own delay", avg);
    assert!(avg < 0.1, "avg latency {} too far from 10ms", avg);
    assert!(result.p99_latency.unwrap() >= result.p95_latency.unwrap());
    assert!(result.rps > 700.0 && result.rps <= 1000.0, "rps {}", result.rps);
    assert_eq!(target.requests_served(), run.launched());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_suite_comparison_and_history() {
    let current = start_target(20, 0.0).await;
    let new = start_target(5, 0.0).await;

    let suite = vec![
        EndpointDescriptor::new("Simple Ping", Method::Get, "/ping"),
        EndpointDescriptor::new("Complex Process", Method::Post, "/api/v1/process")
            .with_payload(serde_json::json!({"data": "test", "array": [1, 2, 3]})),
    ];
    let config = config(&current, &new, profile(20, 0.5, 0.5, 1.0));
    let runner = BenchmarkRunner::new(config.clone(), suite).unwrap();
    runner.check_targets().await.unwrap();

    let pairs = runner.run().await.unwrap();
    assert_eq!(pairs.len(), 2);

    let report = ComparisonReport::from_results("Request Batching", &config, pairs);
    assert!(report.empty_runs().is_empty());
    for row in &report.rows {
        assert_eq!(row.baseline.error_count, 0);
        assert_eq!(row.candidate.error_count, 0);
        // 5ms target beats 20ms target
        match row.avg_latency_delta {
            Delta::Percent(d) => assert!(d < 0.0, "{}: latency delta {}", row.endpoint, d),
            other => panic!("expected a latency delta, got {:?}", other),
        }
    }
    assert!(report.summary.impact_summary().contains("improved latency"));

    let dir = tempfile::tempdir().unwrap();
    let sink = MarkdownFileSink::new(dir.path());
    sink.emit(&report).unwrap();
    let markdown = std::fs::read_to_string(sink.path_for(&report)).unwrap();
    assert!(markdown.contains("## Simple Ping"));
    assert!(markdown.contains("## Complex Process"));

    let implemented = DecisionMode::Yes.provider().decide(&report.summary).unwrap();
    let report = report.with_decision(implemented);
    let store = YamlHistoryStore::new(dir.path().join("feature_history.yaml"));
    store
        .upsert(&report.feature, FeatureHistoryEntry::from_decision(&report, implemented))
        .unwrap();

    let stored = store.get("request_batching").unwrap().unwrap();
    assert!(stored.implemented);
    assert_eq!(
        stored.test_approach,
        "Compared current vs new implementation across 2 endpoints"
    );
    assert_eq!(stored.impact, "Implemented based on performance results");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_candidate_yields_empty_result_set() {
    let current = start_target(1, 0.0).await;
    let new = start_target(1, 1.0).await;

    let config = config(&current, &new, profile(10, 1.0, 0.0, 0.5));
    let runner = BenchmarkRunner::new(
        config.clone(),
        vec![EndpointDescriptor::new("Simple Ping", Method::Get, "/ping")],
    )
    .unwrap();
    let pairs = runner.run().await.unwrap();
    let report = ComparisonReport::from_results("Broken Feature", &config, pairs);

    let row = &report.rows[0];
    assert_eq!(row.candidate.error_rate_percent, 100.0);
    assert_eq!(row.candidate.avg_latency, None);
    assert_eq!(row.rps_delta, Delta::NotAvailable);

    let empty = report.empty_runs();
    assert_eq!(empty.len(), 1);
    assert!(matches!(&empty[0], BenchError::EmptyResultSet { target, .. } if target == "New"));
}

#[tokio::test]
async fn test_unreachable_target_aborts_before_running() {
    let current = start_target(1, 0.0).await;

    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = BenchmarkConfig {
        baseline: Target::new("Current", current.url()),
        candidate: Target::new("New", format!("http://127.0.0.1:{}", port)),
        ..Default::default()
    };
    config.liveness.timeout_secs = 1;
    config.liveness.poll_interval_ms = 100;

    let runner = BenchmarkRunner::new(
        config,
        vec![EndpointDescriptor::new("Simple Ping", Method::Get, "/ping")],
    )
    .unwrap();
    match runner.check_targets().await {
        Err(BenchError::TargetUnreachable { url, waited_secs }) => {
            assert_eq!(url, format!("http://127.0.0.1:{}/health", port));
            assert_eq!(waited_secs, 1);
        }
        other => panic!("expected TargetUnreachable, got {:?}", other),
    }
    assert_eq!(current.requests_served(), 0);
}

// ==================================================================================================
// Full flow: reports, decision, history, exit status
// ==================================================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_suite_records_decision() {
    let current = start_target(5, 0.0).await;
    let new = start_target(1, 0.0).await;
    let dir = tempfile::tempdir().unwrap();
    let config = suite_config(&current, &new, dir.path());

    let status = run_suite(&config, Arc::new(FixedDecision(true))).await.unwrap();
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(status.code(), 0);

    assert_eq!(report_files(&config.results_dir, "md"), 1);
    assert_eq!(report_files(&config.results_dir, "yaml"), 1);
    let stored = YamlHistoryStore::new(&config.history_file)
        .get("request-batching")
        .unwrap()
        .unwrap();
    assert!(stored.implemented);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_suite_with_corrupt_history_still_writes_reports() {
    let current = start_target(1, 0.0).await;
    let new = start_target(1, 0.0).await;
    let dir = tempfile::tempdir().unwrap();
    let config = suite_config(&current, &new, dir.path());

    std::fs::create_dir_all(&config.results_dir).unwrap();
    std::fs::write(&config.history_file, "feature_history: [unclosed").unwrap();

    let status = run_suite(&config, Arc::new(FixedDecision(false))).await.unwrap();
    assert_eq!(status, RunStatus::HistoryFailed);
    assert_eq!(status.code(), 1);

    assert_eq!(report_files(&config.results_dir, "md"), 1);
    assert_eq!(report_files(&config.results_dir, "yaml"), 1);
    assert_eq!(
        std::fs::read_to_string(&config.history_file).unwrap(),
        "feature_history: [unclosed"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_suite_with_empty_run_skips_decision_and_history() {
    let current = start_target(1, 0.0).await;
    let new = start_target(1, 1.0).await;
    let dir = tempfile::tempdir().unwrap();
    let config = suite_config(&current, &new, dir.path());

    /// Fails the test if the flow ever asks for a decision
    struct NeverAsked;
    impl DecisionProvider for NeverAsked {
        fn decide(&self, _summary: &feature_bench::bench::SuiteSummary) -> anyhow::Result<bool> {
            anyhow::bail!("decision requested for a suite with empty runs")
        }
    }

    let status = run_suite(&config, Arc::new(NeverAsked)).await.unwrap();
    assert_eq!(status, RunStatus::EmptyRuns);
    assert_eq!(status.code(), 2);

    assert_eq!(report_files(&config.results_dir, "md"), 1);
    assert_eq!(report_files(&config.results_dir, "yaml"), 1);
    assert!(!config.history_file.exists());
}

#[tokio::test]
async fn test_run_suite_fails_on_unreachable_target() {
    let current = start_target(1, 0.0).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = suite_config(&current, &current, dir.path());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    config.bench.candidate = Target::new("New", format!("http://127.0.0.1:{}", port));
    config.bench.liveness.timeout_secs = 1;
    config.bench.liveness.poll_interval_ms = 100;

    let err = run_suite(&config, Arc::new(FixedDecision(true))).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BenchError>(),
        Some(BenchError::TargetUnreachable { .. })
    ));
    assert_eq!(current.requests_served(), 0);
    assert_eq!(report_files(&config.results_dir, "md"), 0);
    assert!(!config.history_file.exists());
}
