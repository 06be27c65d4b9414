//! Report sinks: console, Markdown report and detailed YAML results.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bench::report::{ComparisonReport, DetailedResults};
use crate::error::{BenchError, Result};
use crate::history::normalize_feature_key;

/// Prefix shared by every generated report file
pub const REPORT_PREFIX: &str = "benchmark_comparison_";

/// Accepts a finished comparison and persists or prints it
pub trait ReportSink {
    fn emit(&self, report: &ComparisonReport) -> Result<()>;
}

/// Prints the table, or pretty JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    pub json: bool,
}

impl ReportSink for ConsoleSink {
    fn emit(&self, report: &ComparisonReport) -> Result<()> {
        if self.json {
            println!("{}", report.to_json());
        } else {
            report.print_table();
        }
        Ok(())
    }
}

/// File name for a report artifact: `benchmark_comparison_<key>_<timestamp>.<ext>`
pub fn report_file_name(report: &ComparisonReport, extension: &str) -> String {
    format!(
        "{}{}_{}.{}",
        REPORT_PREFIX,
        normalize_feature_key(&report.feature),
        report.generated_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// Writes the Markdown report into a results directory
#[derive(Debug, Clone)]
pub struct MarkdownFileSink {
    dir: PathBuf,
}

impl MarkdownFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, report: &ComparisonReport) -> PathBuf {
        self.dir.join(report_file_name(report, "md"))
    }
}

impl ReportSink for MarkdownFileSink {
    fn emit(&self, report: &ComparisonReport) -> Result<()> {
        let path = self.path_for(report);
        write_file(&path, report.to_markdown().as_bytes())?;
        tracing::info!(path = %path.display(), "Markdown report written");
        Ok(())
    }
}

/// Writes the detailed results document as YAML
#[derive(Debug, Clone)]
pub struct YamlResultsSink {
    dir: PathBuf,
}

impl YamlResultsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, report: &ComparisonReport) -> PathBuf {
        self.dir.join(report_file_name(report, "yaml"))
    }
}

impl ReportSink for YamlResultsSink {
    fn emit(&self, report: &ComparisonReport) -> Result<()> {
        let yaml = serde_yaml::to_string(&DetailedResults::from(report))
            .map_err(|e| BenchError::Serialization(e.to_string()))?;
        let path = self.path_for(report);
        write_file(&path, yaml.as_bytes())?;
        tracing::info!(path = %path.display(), "Detailed results written");
        Ok(())
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}

/// Remove earlier report files from `dir`; returns how many were deleted.
///
/// Only files carrying the report prefix are touched, so the history store
/// survives even when it lives in the same directory.
pub fn clean_results(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let is_report = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(REPORT_PREFIX))
            .unwrap_or(false);
        if is_report && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    tracing::info!(dir = %dir.display(), removed = removed, "Cleaned previous results");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::config::BenchmarkConfig;
    use crate::bench::metrics::BenchmarkResult;
    use crate::bench::report::ResultPair;

    fn report() -> ComparisonReport {
        ComparisonReport::from_results(
            "Request Batching",
            &BenchmarkConfig::default(),
            vec![ResultPair {
                endpoint: "Simple Ping".to_string(),
                baseline: BenchmarkResult::finalize("Simple Ping", vec![0.02; 20], 0, 1.0),
                candidate: BenchmarkResult::finalize("Simple Ping", vec![0.01; 20], 1, 1.0),
            }],
        )
    }

    #[test]
    fn test_report_file_name() {
        let report = report();
        let name = report_file_name(&report, "md");
        assert!(name.starts_with("benchmark_comparison_request-batching_"));
        assert!(name.ends_with(".md"));
    }

    #[test]
    fn test_file_sinks_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let report = report().with_decision(false);

        let markdown = MarkdownFileSink::new(dir.path().join("results"));
        markdown.emit(&report).unwrap();
        let md = fs::read_to_string(markdown.path_for(&report)).unwrap();
        assert!(md.contains("## Simple Ping"));

        let yaml = YamlResultsSink::new(dir.path().join("results"));
        yaml.emit(&report).unwrap();
        let content = fs::read_to_string(yaml.path_for(&report)).unwrap();
        let detailed: DetailedResults = serde_yaml::from_str(&content).unwrap();
        assert_eq!(detailed.feature, "Request Batching");
        assert_eq!(detailed.implemented, Some(false));
        assert_eq!(detailed.candidate_results[0].errors, 1);
    }

    #[test]
    fn test_clean_results_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("benchmark_comparison_a_1.md"), "x").unwrap();
        fs::write(dir.path().join("benchmark_comparison_a_1.yaml"), "x").unwrap();
        fs::write(dir.path().join("feature_history.yaml"), "feature_history: {}").unwrap();

        assert_eq!(clean_results(dir.path()).unwrap(), 2);
        assert!(dir.path().join("feature_history.yaml").exists());
        assert_eq!(clean_results(&dir.path().join("missing")).unwrap(), 0);
    }
}
