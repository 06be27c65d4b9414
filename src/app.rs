//! End-to-end suite flow shared by the binary and the integration tests.

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;

use crate::bench::{BenchmarkRunner, ComparisonReport};
use crate::config::Config;
use crate::decision::{decide_blocking, DecisionProvider};
use crate::history::{FeatureHistoryEntry, FeatureHistoryRecorder, YamlHistoryStore};
use crate::sink::{clean_results, ConsoleSink, MarkdownFileSink, ReportSink, YamlResultsSink};

/// How a completed suite ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// At least one run produced no successful sample
    EmptyRuns,
    /// Report written, but the decision could not be recorded
    HistoryFailed,
}

impl RunStatus {
    /// Process exit status: 0, 1 when history failed, 2 for empty runs
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::HistoryFailed => 1,
            RunStatus::EmptyRuns => 2,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

/// Run the whole suite described by `config` and record the decision.
///
/// Errors (invalid configuration, unreachable target, unwritable report)
/// abort before anything is recorded.
pub async fn run_suite(config: &Config, decision: Arc<dyn DecisionProvider>) -> Result<RunStatus> {
    config.validate()?;

    if config.clean_results {
        clean_results(&config.results_dir).context("Failed to clean results directory")?;
    }

    let runner = BenchmarkRunner::new(config.bench.clone(), config.suite.clone())?;

    runner
        .check_targets()
        .await
        .context("Targets must be running before the benchmark starts")?;

    tracing::info!(
        feature = %config.feature,
        endpoints = config.suite.len(),
        "🚀 Starting benchmark suite"
    );
    let pairs = runner.run().await?;

    let report = ComparisonReport::from_results(&config.feature, &config.bench, pairs);

    ConsoleSink { json: config.json }.emit(&report)?;
    MarkdownFileSink::new(&config.results_dir)
        .emit(&report)
        .context("Failed to write Markdown report")?;

    let empty = report.empty_runs();
    if !empty.is_empty() {
        for e in &empty {
            tracing::error!("❌ {}", e);
        }
        YamlResultsSink::new(&config.results_dir)
            .emit(&report)
            .context("Failed to write detailed results")?;
        tracing::warn!("No decision recorded: at least one run had no successful requests");
        return Ok(RunStatus::EmptyRuns);
    }

    let implemented = decide_blocking(decision, report.summary.clone()).await?;
    let report = report.with_decision(implemented);

    // The report is written even when the history store is unusable
    let store = YamlHistoryStore::new(&config.history_file);
    let entry = FeatureHistoryEntry::from_decision(&report, implemented);
    let status = match store.upsert(&config.feature, entry) {
        Ok(()) => RunStatus::Completed,
        Err(e) => {
            tracing::error!("❌ Failed to record feature history: {}", e);
            RunStatus::HistoryFailed
        }
    };

    YamlResultsSink::new(&config.results_dir)
        .emit(&report)
        .context("Failed to write detailed results")?;

    if !config.json {
        println!(
            "  Decision:    {}",
            if implemented { "implement" } else { "reject" }
        );
        println!("  Results:     {}", config.results_dir.display());
        println!("  History:     {}", config.history_file.display());
        println!();
    }

    Ok(status)
}
