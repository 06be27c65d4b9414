use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{BenchError, Result};

/// Build the connection-pooling client shared by every request of one run.
///
/// No retries: a failed request is a failed sample.
pub fn build_client(pool_max_idle_per_host: usize, request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .connect_timeout(request_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| BenchError::HttpClient(e.to_string()))
}

/// Categorize a transport error for diagnostics
pub fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}

/// Poll `url` until it answers 200 or `timeout` elapses.
///
/// Each probe gets at most one second (or the poll interval, if longer).
pub async fn wait_until_live(
    client: &Client,
    url: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();
    let probe_timeout = poll_interval.max(Duration::from_secs(1));
    let mut attempts = 0u32;

    tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "Waiting for target to become live");

    loop {
        attempts += 1;
        match client.get(url).timeout(probe_timeout).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::info!(
                    url = %url,
                    attempts = attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Target is live"
                );
                return Ok(());
            }
            Ok(response) => {
                tracing::debug!(
                    url = %url,
                    status = %response.status(),
                    attempt = attempts,
                    "Liveness probe returned non-200"
                );
            }
            Err(e) => {
                tracing::debug!(
                    url = %url,
                    error_kind = error_kind(&e),
                    error = %e,
                    attempt = attempts,
                    "Liveness probe failed"
                );
            }
        }

        if start.elapsed() + poll_interval > timeout {
            tracing::error!(url = %url, attempts = attempts, "Target never became live");
            return Err(BenchError::TargetUnreachable {
                url: url.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }

        tokio::time::sleep(poll_interval).await;
    }
}
