use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::bench::config::{BenchmarkConfig, LivenessConfig, LoadProfile, Target};
use crate::bench::endpoint::{default_suite, validate_suite, EndpointDescriptor};
use crate::decision::DecisionMode;

/// Feature Bench - compare a current and a new implementation under load
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Name of the feature under evaluation
    pub feature: String,

    /// Base URL of the current (baseline) implementation
    #[arg(long, env = "BENCH_CURRENT_URL", default_value = "http://127.0.0.1:3001")]
    pub current_url: String,

    /// Base URL of the new (candidate) implementation
    #[arg(long, env = "BENCH_NEW_URL", default_value = "http://127.0.0.1:3002")]
    pub new_url: String,

    /// Label for the baseline in reports
    #[arg(long, default_value = "Current")]
    pub current_label: String,

    /// Label for the candidate in reports
    #[arg(long, default_value = "New")]
    pub new_label: String,

    /// Simulated concurrent users
    #[arg(short = 'c', long, env = "BENCH_CONCURRENCY", default_value = "100")]
    pub concurrency: usize,

    /// Steady-state duration in seconds
    #[arg(short = 'd', long, env = "BENCH_DURATION", default_value = "60")]
    pub duration: f64,

    /// Ramp-up duration in seconds
    #[arg(long, env = "BENCH_RAMP_UP", default_value = "10")]
    pub ramp_up: f64,

    /// Seconds each simulated user waits between requests
    #[arg(long, env = "BENCH_THINK_TIME", default_value = "2.0")]
    pub think_time: f64,

    /// Requests launched together per ramp-up step
    #[arg(long, default_value = "10")]
    pub batch_size: usize,

    /// Pause between consecutive runs in seconds
    #[arg(long, env = "BENCH_COOLDOWN", default_value = "5")]
    pub cooldown: f64,

    /// Cap on requests in flight at once (unbounded when absent)
    #[arg(long, env = "BENCH_MAX_IN_FLIGHT")]
    pub max_in_flight: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "BENCH_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Liveness path polled on both targets before the suite starts
    #[arg(long, default_value = "/health")]
    pub health_path: String,

    /// Seconds to wait for each target to become live
    #[arg(long, default_value = "30")]
    pub startup_timeout: u64,

    /// Delay between liveness probes in milliseconds
    #[arg(long, default_value = "500")]
    pub poll_interval_ms: u64,

    /// Do not wait for the targets to become live
    #[arg(long)]
    pub skip_health_check: bool,

    /// Endpoint suite file (YAML, TOML or JSON)
    #[arg(long, env = "BENCH_SUITE")]
    pub suite: Option<String>,

    /// Directory for report files
    #[arg(long, env = "BENCH_RESULTS_DIR", default_value = "results")]
    pub results_dir: String,

    /// Feature history store (defaults to <results-dir>/feature_history.yaml)
    #[arg(long, env = "BENCH_HISTORY_FILE")]
    pub history_file: Option<String>,

    /// Implement/reject decision: yes, no or prompt
    #[arg(long, env = "BENCH_DECISION", default_value = "prompt")]
    pub decision: DecisionMode,

    /// Delete earlier report files before running
    #[arg(long)]
    pub clean_results: bool,

    /// Print the comparison as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

/// How log lines are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub feature: String,

    // Engine
    pub bench: BenchmarkConfig,
    pub suite: Vec<EndpointDescriptor>,
    pub suite_file: Option<PathBuf>,

    // Output
    pub results_dir: PathBuf,
    pub history_file: PathBuf,
    pub clean_results: bool,
    pub json: bool,

    pub decision: DecisionMode,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Top-level layout of a suite file
#[derive(Debug, Deserialize)]
struct SuiteFile {
    endpoints: Vec<EndpointDescriptor>,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build the configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let suite_file = args.suite.as_deref().map(expand_tilde);
        let suite = match &suite_file {
            Some(path) => load_suite(path)?,
            None => default_suite(),
        };

        let results_dir = expand_tilde(&args.results_dir);
        let history_file = args
            .history_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| results_dir.join("feature_history.yaml"));

        let bench = BenchmarkConfig {
            baseline: Target::new(args.current_label, args.current_url),
            candidate: Target::new(args.new_label, args.new_url),
            profile: LoadProfile {
                concurrent_users: args.concurrency,
                think_time_secs: args.think_time,
                ramp_up_secs: args.ramp_up,
                steady_secs: args.duration,
                batch_size: args.batch_size,
                max_in_flight: args.max_in_flight,
            },
            cooldown_secs: args.cooldown,
            request_timeout_secs: args.request_timeout,
            liveness: LivenessConfig {
                path: args.health_path,
                timeout_secs: args.startup_timeout,
                poll_interval_ms: args.poll_interval_ms,
                skip: args.skip_health_check,
            },
            ..Default::default()
        };

        Ok(Config {
            feature: args.feature,
            bench,
            suite,
            suite_file,
            results_dir,
            history_file,
            clean_results: args.clean_results,
            json: args.json,
            decision: args.decision,
            log_level: args.log_level,
            log_format: args.log_format,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.feature.trim().is_empty() {
            anyhow::bail!("Feature name cannot be empty");
        }
        if !self.bench.liveness.path.starts_with('/') {
            anyhow::bail!(
                "Health path must start with '/': {}",
                self.bench.liveness.path
            );
        }
        self.bench.validate()?;
        validate_suite(&self.suite)?;
        Ok(())
    }
}

/// Read an endpoint suite; the format follows the file extension
pub fn load_suite(path: &Path) -> Result<Vec<EndpointDescriptor>> {
    if !path.exists() {
        anyhow::bail!("Suite file does not exist: {}", path.display());
    }

    let settings = ::config::Config::builder()
        .add_source(::config::File::from(path))
        .build()
        .with_context(|| format!("Failed to read suite file {}", path.display()))?;
    let suite: SuiteFile = settings
        .try_deserialize()
        .with_context(|| format!("Invalid suite file {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        endpoints = suite.endpoints.len(),
        "Loaded endpoint suite"
    );
    Ok(suite.endpoints)
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
