//! Comparative reporting: pairs baseline and candidate aggregates per endpoint.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::config::BenchmarkConfig;
use super::metrics::{BenchmarkResult, FailureSummary};
use std::collections::BTreeMap;
use crate::error::BenchError;

/// Baseline and candidate results for one endpoint
#[derive(Debug, Clone)]
pub struct ResultPair {
    pub endpoint: String,
    pub baseline: BenchmarkResult,
    pub candidate: BenchmarkResult,
}

/// Difference between a candidate and a baseline metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delta {
    /// `(candidate - baseline) / baseline * 100`
    Percent(f64),
    /// `candidate - baseline`, in percentage points
    Points(f64),
    /// Baseline is zero or either side has no data
    NotAvailable,
}

impl Delta {
    pub fn value(&self) -> Option<f64> {
        match self {
            Delta::Percent(v) | Delta::Points(v) => Some(*v),
            Delta::NotAvailable => None,
        }
    }
}

impl std::fmt::Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delta::Percent(v) => write!(f, "{:+.1}%", v),
            Delta::Points(v) => write!(f, "{:+.2} pp", v),
            Delta::NotAvailable => write!(f, "N/A"),
        }
    }
}

/// Relative change; N/A when the baseline is missing or zero
pub fn relative_delta(baseline: Option<f64>, candidate: Option<f64>) -> Delta {
    match (baseline, candidate) {
        (Some(b), Some(c)) if b != 0.0 && b.is_finite() && c.is_finite() => {
            Delta::Percent((c - b) / b * 100.0)
        }
        _ => Delta::NotAvailable,
    }
}

/// Absolute change in percentage points
pub fn points_delta(baseline: Option<f64>, candidate: Option<f64>) -> Delta {
    match (baseline, candidate) {
        (Some(b), Some(c)) => Delta::Points(c - b),
        _ => Delta::NotAvailable,
    }
}

/// One line of a comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: String,
    pub baseline: Option<f64>,
    pub candidate: Option<f64>,
    pub delta: Delta,
}

/// Per-endpoint comparison.
///
/// RPS delta: positive means the candidate served more. Latency deltas are
/// raw `(candidate - baseline) / baseline`, so negative means faster. Error
/// rate delta is in absolute percentage points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub endpoint: String,
    pub baseline: BenchmarkResult,
    pub candidate: BenchmarkResult,
    pub rps_delta: Delta,
    pub avg_latency_delta: Delta,
    pub p50_latency_delta: Delta,
    pub p95_latency_delta: Delta,
    pub p99_latency_delta: Delta,
    pub error_rate_delta: Delta,
}

impl ComparisonRow {
    pub fn from_pair(pair: ResultPair) -> Self {
        let ResultPair {
            endpoint,
            baseline,
            candidate,
        } = pair;

        // An empty run is "no data", never zero throughput
        let rps = |r: &BenchmarkResult| (!r.is_empty()).then_some(r.rps);
        let error_rate = |r: &BenchmarkResult| (r.total_requests > 0).then_some(r.error_rate_percent);

        Self {
            rps_delta: relative_delta(rps(&baseline), rps(&candidate)),
            avg_latency_delta: relative_delta(baseline.avg_latency, candidate.avg_latency),
            p50_latency_delta: relative_delta(baseline.p50_latency, candidate.p50_latency),
            p95_latency_delta: relative_delta(baseline.p95_latency, candidate.p95_latency),
            p99_latency_delta: relative_delta(baseline.p99_latency, candidate.p99_latency),
            error_rate_delta: points_delta(error_rate(&baseline), error_rate(&candidate)),
            endpoint,
            baseline,
            candidate,
        }
    }

    /// Table rows: metric, baseline value, candidate value, delta
    pub fn metric_rows(&self) -> Vec<MetricRow> {
        let (b, c) = (&self.baseline, &self.candidate);
        vec![
            MetricRow {
                metric: "RPS".to_string(),
                baseline: Some(b.rps),
                candidate: Some(c.rps),
                delta: self.rps_delta,
            },
            MetricRow {
                metric: "Avg Latency (ms)".to_string(),
                baseline: b.avg_latency_ms(),
                candidate: c.avg_latency_ms(),
                delta: self.avg_latency_delta,
            },
            MetricRow {
                metric: "P50 Latency (ms)".to_string(),
                baseline: b.p50_latency_ms(),
                candidate: c.p50_latency_ms(),
                delta: self.p50_latency_delta,
            },
            MetricRow {
                metric: "P95 Latency (ms)".to_string(),
                baseline: b.p95_latency_ms(),
                candidate: c.p95_latency_ms(),
                delta: self.p95_latency_delta,
            },
            MetricRow {
                metric: "P99 Latency (ms)".to_string(),
                baseline: b.p99_latency_ms(),
                candidate: c.p99_latency_ms(),
                delta: self.p99_latency_delta,
            },
            MetricRow {
                metric: "Min Latency (ms)".to_string(),
                baseline: b.min_latency_ms(),
                candidate: c.min_latency_ms(),
                delta: relative_delta(b.min_latency, c.min_latency),
            },
            MetricRow {
                metric: "Max Latency (ms)".to_string(),
                baseline: b.max_latency_ms(),
                candidate: c.max_latency_ms(),
                delta: relative_delta(b.max_latency, c.max_latency),
            },
            MetricRow {
                metric: "Error Rate (%)".to_string(),
                baseline: Some(b.error_rate_percent),
                candidate: Some(c.error_rate_percent),
                delta: self.error_rate_delta,
            },
        ]
    }
}

/// Suite-level totals and deltas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub endpoints: usize,
    /// Endpoints where neither run was empty
    pub comparable_endpoints: usize,
    pub total_baseline_rps: f64,
    pub total_candidate_rps: f64,
    pub rps_delta: Delta,
    /// Mean of per-endpoint average latencies, seconds
    pub mean_baseline_latency: Option<f64>,
    pub mean_candidate_latency: Option<f64>,
    pub latency_delta: Delta,
}

impl SuiteSummary {
    /// Totals and means cover only endpoints where both runs have data, so
    /// an empty run never reads as zero throughput.
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        let comparable: Vec<&ComparisonRow> = rows
            .iter()
            .filter(|r| !r.baseline.is_empty() && !r.candidate.is_empty())
            .collect();

        let total_baseline_rps: f64 = comparable.iter().map(|r| r.baseline.rps).sum();
        let total_candidate_rps: f64 = comparable.iter().map(|r| r.candidate.rps).sum();
        let mean_baseline_latency = mean(comparable.iter().filter_map(|r| r.baseline.avg_latency));
        let mean_candidate_latency = mean(comparable.iter().filter_map(|r| r.candidate.avg_latency));

        Self {
            endpoints: rows.len(),
            comparable_endpoints: comparable.len(),
            total_baseline_rps,
            total_candidate_rps,
            rps_delta: relative_delta(Some(total_baseline_rps), Some(total_candidate_rps)),
            mean_baseline_latency,
            mean_candidate_latency,
            latency_delta: relative_delta(mean_baseline_latency, mean_candidate_latency),
        }
    }

    /// Latency improvement in percent (positive = candidate faster)
    pub fn latency_improvement(&self) -> Option<f64> {
        self.latency_delta.value().map(|d| -d)
    }

    /// One-line description of the candidate's impact
    pub fn impact_summary(&self) -> String {
        let (rps, latency) = match (self.rps_delta.value(), self.latency_improvement()) {
            (Some(rps), Some(latency)) => (rps, latency),
            _ => return "Insufficient data for comparison".to_string(),
        };

        if rps.abs() < 1.0 && latency.abs() < 1.0 {
            return "No significant impact".to_string();
        }

        let mut parts = Vec::new();
        if rps.abs() >= 1.0 {
            parts.push(format!(
                "{} throughput by {:.1}%",
                if rps > 0.0 { "improved" } else { "reduced" },
                rps.abs()
            ));
        }
        if latency.abs() >= 1.0 {
            parts.push(format!(
                "{} latency by {:.1}%",
                if latency > 0.0 { "improved" } else { "increased" },
                latency.abs()
            ));
        }
        parts.join(" and ")
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Load settings echoed into every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub concurrent_users: usize,
    pub think_time_secs: f64,
    pub target_rps: f64,
    pub ramp_up_secs: f64,
    pub steady_secs: f64,
    pub cooldown_secs: f64,
    pub max_in_flight: Option<usize>,
    pub request_timeout_secs: u64,
}

impl From<&BenchmarkConfig> for LoadSummary {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            concurrent_users: config.profile.concurrent_users,
            think_time_secs: config.profile.think_time_secs,
            target_rps: config.profile.rate(),
            ramp_up_secs: config.profile.ramp_up_secs,
            steady_secs: config.profile.steady_secs,
            cooldown_secs: config.cooldown_secs,
            max_in_flight: config.profile.max_in_flight,
            request_timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Complete comparison of a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub feature: String,
    pub generated_at: DateTime<Local>,
    pub baseline_label: String,
    pub candidate_label: String,
    pub load: LoadSummary,
    pub rows: Vec<ComparisonRow>,
    pub summary: SuiteSummary,
    /// Implement/reject decision, once one was taken
    pub implemented: Option<bool>,
}

impl ComparisonReport {
    /// Create a report from paired benchmark results
    pub fn from_results(feature: &str, config: &BenchmarkConfig, pairs: Vec<ResultPair>) -> Self {
        let rows: Vec<ComparisonRow> = pairs.into_iter().map(ComparisonRow::from_pair).collect();
        let summary = SuiteSummary::from_rows(&rows);

        Self {
            feature: feature.to_string(),
            generated_at: Local::now(),
            baseline_label: config.baseline.label.clone(),
            candidate_label: config.candidate.label.clone(),
            load: LoadSummary::from(config),
            rows,
            summary,
            implemented: None,
        }
    }

    pub fn with_decision(mut self, implemented: bool) -> Self {
        self.implemented = Some(implemented);
        self
    }

    /// One error per run that produced no successful samples
    pub fn empty_runs(&self) -> Vec<BenchError> {
        let mut empty = Vec::new();
        for row in &self.rows {
            for (label, result) in [
                (&self.baseline_label, &row.baseline),
                (&self.candidate_label, &row.candidate),
            ] {
                if result.is_empty() {
                    empty.push(BenchError::EmptyResultSet {
                        endpoint: row.endpoint.clone(),
                        target: label.clone(),
                    });
                }
            }
        }
        empty
    }

    fn table_headers(&self) -> Vec<String> {
        vec![
            "Metric".to_string(),
            self.baseline_label.clone(),
            self.candidate_label.clone(),
            "Change".to_string(),
        ]
    }

    fn table_rows(&self) -> Vec<Vec<String>> {
        let mut lines = Vec::new();
        for row in &self.rows {
            for metric in row.metric_rows() {
                lines.push(vec![
                    format!("{} {}", row.endpoint, metric.metric),
                    format_value(metric.baseline),
                    format_value(metric.candidate),
                    metric.delta.to_string(),
                ]);
            }
        }
        lines
    }

    fn summary_rows(&self) -> Vec<Vec<String>> {
        let s = &self.summary;
        vec![
            vec![
                "Total RPS".to_string(),
                format!("{:.1}", s.total_baseline_rps),
                format!("{:.1}", s.total_candidate_rps),
                s.rps_delta.to_string(),
            ],
            vec![
                "Avg Latency (ms)".to_string(),
                format_value(s.mean_baseline_latency.map(|l| l * 1000.0)),
                format_value(s.mean_candidate_latency.map(|l| l * 1000.0)),
                s.latency_delta.to_string(),
            ],
        ]
    }

    /// Render the per-endpoint and summary tables with box drawing
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Benchmark Results: {} ({} vs {})\n",
            self.feature, self.baseline_label, self.candidate_label
        ));
        out.push_str(&render_box_table(&self.table_headers(), &self.table_rows()));
        out.push('\n');
        out.push_str("Performance Summary:\n");
        out.push_str(&render_box_table(&self.table_headers(), &self.summary_rows()));
        out.push_str(&format!("Impact: {}\n", self.summary.impact_summary()));
        out
    }

    /// Print the report as an ASCII table
    pub fn print_table(&self) {
        println!();
        print!("{}", self.render_table());
        println!();
    }

    /// Render the report as a Markdown document
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("# Benchmark Comparison: {}\n\n", self.feature));
        md.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));

        md.push_str("## Load Profile\n\n");
        md.push_str(&format!(
            "- Concurrent users: {}\n- Think time: {:.2}s (target {:.1} req/s)\n- Ramp-up: {:.1}s\n- Steady state: {:.1}s\n- Cooldown: {:.1}s\n- Request timeout: {}s\n",
            self.load.concurrent_users,
            self.load.think_time_secs,
            self.load.target_rps,
            self.load.ramp_up_secs,
            self.load.steady_secs,
            self.load.cooldown_secs,
            self.load.request_timeout_secs,
        ));
        match self.load.max_in_flight {
            Some(cap) => md.push_str(&format!("- Max in flight: {}\n\n", cap)),
            None => md.push_str("- Max in flight: unbounded\n\n"),
        }

        let headers = self.table_headers();
        for row in &self.rows {
            md.push_str(&format!("## {}\n\n", row.endpoint));
            let lines: Vec<Vec<String>> = row
                .metric_rows()
                .into_iter()
                .map(|m| {
                    vec![
                        m.metric,
                        format_value(m.baseline),
                        format_value(m.candidate),
                        m.delta.to_string(),
                    ]
                })
                .collect();
            md.push_str(&render_markdown_table(&headers, &lines));
            md.push_str(&format!(
                "\nRequests: {} {} ({} failed), {} {} ({} failed)\n\n",
                self.baseline_label,
                row.baseline.total_requests,
                row.baseline.error_count,
                self.candidate_label,
                row.candidate.total_requests,
                row.candidate.error_count,
            ));
            for (label, result) in [
                (&self.baseline_label, &row.baseline),
                (&self.candidate_label, &row.candidate),
            ] {
                md.push_str(&render_failures(label, &result.failures));
            }
        }

        md.push_str("## Summary\n\n");
        md.push_str(&render_markdown_table(&headers, &self.summary_rows()));
        md.push_str(&format!("\nImpact: {}\n", self.summary.impact_summary()));
        if let Some(implemented) = self.implemented {
            md.push_str(&format!(
                "\nDecision: {}\n",
                if implemented { "implement" } else { "reject" }
            ));
        }
        md
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Metrics of one run as written to the detailed results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub rps: f64,
    pub avg_latency_ms: Option<f64>,
    pub p50_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
    pub p99_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub error_rate_percent: f64,
    pub total_requests: u64,
    pub errors: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, FailureSummary>,
}

impl From<&BenchmarkResult> for ResultRecord {
    fn from(r: &BenchmarkResult) -> Self {
        Self {
            name: r.name.clone(),
            rps: round2(r.rps),
            avg_latency_ms: r.avg_latency_ms().map(round2),
            p50_latency_ms: r.p50_latency_ms().map(round2),
            p95_latency_ms: r.p95_latency_ms().map(round2),
            p99_latency_ms: r.p99_latency_ms().map(round2),
            min_latency_ms: r.min_latency_ms().map(round2),
            max_latency_ms: r.max_latency_ms().map(round2),
            error_rate_percent: round2(r.error_rate_percent),
            total_requests: r.total_requests,
            errors: r.error_count,
            failures: r.failures.clone(),
        }
    }
}

/// Structured results document, one per suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedResults {
    pub feature: String,
    pub timestamp: String,
    pub implemented: Option<bool>,
    pub config: LoadSummary,
    pub baseline_label: String,
    pub candidate_label: String,
    pub baseline_results: Vec<ResultRecord>,
    pub candidate_results: Vec<ResultRecord>,
    pub impact: String,
}

impl From<&ComparisonReport> for DetailedResults {
    fn from(report: &ComparisonReport) -> Self {
        Self {
            feature: report.feature.clone(),
            timestamp: report.generated_at.format("%Y%m%d_%H%M%S").to_string(),
            implemented: report.implemented,
            config: report.load.clone(),
            baseline_label: report.baseline_label.clone(),
            candidate_label: report.candidate_label.clone(),
            baseline_results: report.rows.iter().map(|r| ResultRecord::from(&r.baseline)).collect(),
            candidate_results: report
                .rows
                .iter()
                .map(|r| ResultRecord::from(&r.candidate))
                .collect(),
            impact: report.summary.impact_summary(),
        }
    }
}

/// Failure breakdown of one run as Markdown bullets; empty when nothing failed
fn render_failures(label: &str, failures: &BTreeMap<String, FailureSummary>) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = format!("Failures ({}):\n\n", label);
    for (kind, summary) in failures {
        out.push_str(&format!("- `{}`: {}", kind, summary.count));
        if !summary.examples.is_empty() {
            out.push_str(&format!(" (e.g. {})", summary.examples.join("; ")));
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.1}", v))
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

fn render_box_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let border = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(mid), right)
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (c, w))| {
                if i == 0 {
                    format!(" {:<w$} ", c, w = *w)
                } else {
                    format!(" {:>w$} ", c, w = *w)
                }
            })
            .collect();
        format!("│{}│\n", padded.join("│"))
    };

    let mut out = border("┌", "┬", "┐");
    out.push_str(&line(headers));
    out.push_str(&border("├", "┼", "┤"));
    for row in rows {
        out.push_str(&line(row));
    }
    out.push_str(&border("└", "┴", "┘"));
    out
}

fn render_markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = format!("| {} |\n", headers.join(" | "));
    out.push_str(&format!(
        "|{}|\n",
        headers
            .iter()
            .enumerate()
            .map(|(i, _)| if i == 0 { " --- " } else { " ---: " })
            .collect::<Vec<_>>()
            .join("|")
    ));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}
