//! Load scheduler: decides when each request of a run is launched.
//!
//! A run has two phases:
//! - ramp-up, where the issuance rate grows linearly from 0 to the
//!   steady-state rate and requests are launched in batches;
//! - steady state, where one request is launched every `1 / rate` seconds.
//!
//! Launch times are absolute deadlines from the phase start, so sleeping
//! never accumulates drift. Every launched request runs as its own task and
//! is awaited after the launch window closes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::LoadProfile;
use super::metrics::{BenchmarkResult, RequestOutcome, ResultAggregator};

/// Offsets from the ramp-up start at which each batch is launched.
///
/// With a linear rate `R(t) = R * t / T`, the cumulative count launched by
/// `t` is `R * t^2 / (2T)`, so batch `k` (1-based) goes out at
/// `sqrt(2 * T * k * batch / R)`. Gaps between batches therefore shrink as
/// `batch / R(t)`.
pub fn ramp_offsets(profile: &LoadProfile) -> impl Iterator<Item = Duration> {
    let ramp = profile.ramp_up_secs;
    let rate = profile.rate();
    let batch = profile.batch_size as f64;

    (1u64..)
        .map(move |k| (2.0 * ramp * k as f64 * batch / rate).sqrt())
        .take_while(move |t| *t < ramp)
        .map(Duration::from_secs_f64)
}

/// Offsets from the steady-state start at which each request is launched
pub fn steady_offsets(profile: &LoadProfile) -> impl Iterator<Item = Duration> {
    let steady = profile.steady_secs;
    let rate = profile.rate();

    (0u64..)
        .map(move |i| i as f64 / rate)
        .take_while(move |t| *t < steady)
        .map(Duration::from_secs_f64)
}

/// Result of one scheduled run
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub result: BenchmarkResult,
    pub ramp_launched: u64,
    pub steady_launched: u64,
    /// Length of the launch window (ramp-up + steady state)
    pub window: Duration,
    /// Launch window plus the time spent draining in-flight requests
    pub wall_clock: Duration,
}

impl ScheduledRun {
    pub fn launched(&self) -> u64 {
        self.ramp_launched + self.steady_launched
    }
}

/// Drives one (target, endpoint) run according to a [`LoadProfile`]
pub struct LoadScheduler {
    profile: LoadProfile,
}

impl LoadScheduler {
    pub fn new(profile: LoadProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    /// Run both phases, launching `dispatch()` for every scheduled request.
    ///
    /// The launch window closes at `ramp_up + steady` regardless of how many
    /// requests are still in flight; those are awaited before the aggregate
    /// is frozen. There is no forced cancellation here: per-request timeouts
    /// belong to the dispatched future.
    pub async fn run<F, Fut>(&self, name: &str, dispatch: F) -> ScheduledRun
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RequestOutcome> + Send + 'static,
    {
        let aggregator = Arc::new(ResultAggregator::new());
        let limiter = self
            .profile
            .max_in_flight
            .map(|permits| Arc::new(Semaphore::new(permits)));
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let start = Instant::now();

        // Phase 1: linear ramp-up in batches
        let ramp_end = start + self.profile.ramp_up();
        let mut ramp_launched = 0u64;
        if !self.profile.ramp_up().is_zero() {
            tracing::debug!(
                endpoint = %name,
                ramp_up_secs = self.profile.ramp_up_secs,
                batch_size = self.profile.batch_size,
                "Starting ramp-up"
            );
        }
        'ramp: for offset in ramp_offsets(&self.profile) {
            tokio::time::sleep_until(start + offset).await;
            for _ in 0..self.profile.batch_size {
                if Instant::now() >= ramp_end {
                    break 'ramp;
                }
                match launch(&dispatch, &aggregator, limiter.as_ref()).await {
                    Some(handle) => handles.push(handle),
                    None => break 'ramp,
                }
                ramp_launched += 1;
            }
        }
        tokio::time::sleep_until(ramp_end).await;

        // Phase 2: fixed rate until the deadline
        let steady_start = Instant::now();
        let steady_end = steady_start + self.profile.steady();
        let mut steady_launched = 0u64;
        tracing::debug!(
            endpoint = %name,
            rate = self.profile.rate(),
            steady_secs = self.profile.steady_secs,
            ramp_launched = ramp_launched,
            "Starting steady state"
        );
        for offset in steady_offsets(&self.profile) {
            tokio::time::sleep_until(steady_start + offset).await;
            if Instant::now() >= steady_end {
                break;
            }
            match launch(&dispatch, &aggregator, limiter.as_ref()).await {
                Some(handle) => handles.push(handle),
                None => break,
            }
            steady_launched += 1;
        }
        tokio::time::sleep_until(steady_end).await;
        let window = start.elapsed();

        // Drain: completions may arrive in any order
        let pending = aggregator.total_requests();
        tracing::debug!(
            endpoint = %name,
            launched = ramp_launched + steady_launched,
            completed = pending,
            "Launch window closed, awaiting in-flight requests"
        );
        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                tracing::warn!(endpoint = %name, error = %e, "Request task did not complete");
                aggregator.record(RequestOutcome::network_failure("task_failed", e.to_string()));
            }
        }

        let result = aggregator.finalize(name, window);
        ScheduledRun {
            result,
            ramp_launched,
            steady_launched,
            window,
            wall_clock: start.elapsed(),
        }
    }
}

/// Spawn one request, waiting for an in-flight permit first when capped
async fn launch<F, Fut>(
    dispatch: &F,
    aggregator: &Arc<ResultAggregator>,
    limiter: Option<&Arc<Semaphore>>,
) -> Option<JoinHandle<()>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = RequestOutcome> + Send + 'static,
{
    let permit = match limiter {
        Some(semaphore) => Some(semaphore.clone().acquire_owned().await.ok()?),
        None => None,
    };

    let request = dispatch();
    let aggregator = aggregator.clone();
    Some(tokio::spawn(async move {
        let outcome = request.await;
        aggregator.record(outcome);
        drop(permit);
    }))
}
