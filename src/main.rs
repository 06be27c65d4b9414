use anyhow::Result;
use std::process::ExitCode;

use feature_bench::app::{run_suite, RunStatus};
use feature_bench::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunStatus> {
    // Load configuration first (for log level)
    let config = Config::load()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    config.validate()?;

    if !config.json {
        print_startup_banner(&config);
    }

    run_suite(&config, config.decision.provider()).await
}

/// Print startup banner
fn print_startup_banner(config: &Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                 📊 Feature Bench                          ║
║                                                           ║
║  Comparative load testing: current vs new                 ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    let profile = &config.bench.profile;
    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("  Feature:     {}", config.feature);
    println!(
        "  {}: {}",
        config.bench.baseline.label, config.bench.baseline.base_url
    );
    println!(
        "  {}: {}",
        config.bench.candidate.label, config.bench.candidate.base_url
    );
    println!(
        "  Load:        {} users, {:.1}s think time ({:.1} req/s)",
        profile.concurrent_users,
        profile.think_time_secs,
        profile.rate()
    );
    println!(
        "  Phases:      {:.0}s ramp-up, {:.0}s steady state, {:.0}s cooldown",
        profile.ramp_up_secs, profile.steady_secs, config.bench.cooldown_secs
    );
    match &config.suite_file {
        Some(path) => println!("  Suite:       {} endpoints from {}", config.suite.len(), path.display()),
        None => println!("  Suite:       {} built-in endpoints", config.suite.len()),
    }
    println!("  Log Level:   {} ({})", config.log_level, config.log_format);
    println!();
}
