//! Benchmark runner: drives the suite against both targets.

use std::sync::Arc;
use std::time::Duration;

use super::config::{BenchmarkConfig, Target};
use super::endpoint::{validate_suite, EndpointDescriptor};
use super::executor::{PreparedRequest, RequestExecutor};
use super::report::ResultPair;
use super::scheduler::{LoadScheduler, ScheduledRun};
use crate::error::Result;
use crate::http_client::{build_client, wait_until_live};

/// Runs every endpoint against the baseline and then the candidate
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    suite: Vec<EndpointDescriptor>,
}

impl BenchmarkRunner {
    /// Create a runner; fails on an invalid configuration or suite.
    ///
    /// Every descriptor is resolved against both targets here, so a bad
    /// header or payload is rejected before the first run starts.
    pub fn new(config: BenchmarkConfig, suite: Vec<EndpointDescriptor>) -> Result<Self> {
        config.validate()?;
        validate_suite(&suite)?;
        for endpoint in &suite {
            for target in [&config.baseline, &config.candidate] {
                PreparedRequest::build(target, endpoint)?;
            }
        }
        Ok(Self { config, suite })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn suite(&self) -> &[EndpointDescriptor] {
        &self.suite
    }

    /// Wait for both targets to answer the liveness path
    pub async fn check_targets(&self) -> Result<()> {
        let liveness = &self.config.liveness;
        if liveness.skip {
            tracing::warn!("Liveness check skipped");
            return Ok(());
        }

        let client = build_client(2, self.config.request_timeout())?;
        for target in [&self.config.baseline, &self.config.candidate] {
            let url = target.url_for(&liveness.path);
            wait_until_live(
                &client,
                &url,
                Duration::from_secs(liveness.timeout_secs),
                Duration::from_millis(liveness.poll_interval_ms),
            )
            .await?;
        }
        Ok(())
    }

    /// One scheduled run of `endpoint` against `target`.
    ///
    /// Each run gets its own connection pool so runs never share warm
    /// connections.
    pub async fn run_endpoint(
        &self,
        target: &Target,
        endpoint: &EndpointDescriptor,
    ) -> Result<ScheduledRun> {
        let client = build_client(
            self.config.pool_max_idle_per_host,
            self.config.request_timeout(),
        )?;
        let executor = RequestExecutor::new(client, self.config.request_timeout());
        let request = Arc::new(executor.prepare(target, endpoint)?);

        tracing::info!(
            endpoint = %endpoint.name,
            target = %target.label,
            url = %request.url,
            rate = self.config.profile.rate(),
            "Starting run"
        );

        let scheduler = LoadScheduler::new(self.config.profile.clone());
        let run = scheduler
            .run(&endpoint.name, || {
                let executor = executor.clone();
                let request = request.clone();
                async move { executor.execute_prepared(&request).await }
            })
            .await;

        let result = &run.result;
        tracing::info!(
            endpoint = %endpoint.name,
            target = %target.label,
            launched = run.launched(),
            succeeded = result.success_count(),
            errors = result.error_count,
            rps = %format!("{:.1}", result.rps),
            avg_ms = ?result.avg_latency_ms(),
            p95_ms = ?result.p95_latency_ms(),
            window_secs = run.window.as_secs_f64(),
            drain_ms = run.wall_clock.saturating_sub(run.window).as_millis() as u64,
            "Run complete"
        );
        if result.is_empty() {
            tracing::warn!(
                endpoint = %endpoint.name,
                target = %target.label,
                "Every request of this run failed"
            );
        }

        Ok(run)
    }

    /// Run the whole suite: for each endpoint the baseline, then the
    /// candidate, with a cooldown between consecutive runs.
    pub async fn run(&self) -> Result<Vec<ResultPair>> {
        let mut pairs = Vec::with_capacity(self.suite.len());
        let mut first = true;

        for endpoint in &self.suite {
            let mut results = Vec::with_capacity(2);
            for target in [&self.config.baseline, &self.config.candidate] {
                if !first {
                    self.cool_down().await;
                }
                first = false;
                results.push(self.run_endpoint(target, endpoint).await?.result);
            }

            let candidate = results.pop();
            let baseline = results.pop();
            if let (Some(baseline), Some(candidate)) = (baseline, candidate) {
                pairs.push(ResultPair {
                    endpoint: endpoint.name.clone(),
                    baseline,
                    candidate,
                });
            }
        }

        Ok(pairs)
    }

    async fn cool_down(&self) {
        let cooldown = self.config.cooldown();
        if !cooldown.is_zero() {
            tracing::debug!(cooldown_secs = self.config.cooldown_secs, "Cooling down");
            tokio::time::sleep(cooldown).await;
        }
    }
}
