//! Request executor: issues one concrete request and classifies the outcome.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::Instant;

use super::config::Target;
use super::endpoint::{EndpointDescriptor, Method};
use super::metrics::RequestOutcome;
use crate::error::{BenchError, Result};
use crate::http_client::error_kind;

/// A descriptor resolved against one target, built once per run
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub endpoint: String,
    pub method: reqwest::Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Issues requests over a shared pooled client
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    timeout: Duration,
}

impl PreparedRequest {
    /// Resolve the descriptor against a target: URL, headers and body.
    ///
    /// Needs no client, so a whole suite can be checked before any request
    /// goes out.
    pub fn build(target: &Target, endpoint: &EndpointDescriptor) -> Result<Self> {
        let url = target.url_for(&endpoint.path_and_query()?);

        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                BenchError::InvalidConfig(format!(
                    "endpoint '{}' has invalid header name '{}': {}",
                    endpoint.name, name, e
                ))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                BenchError::InvalidConfig(format!(
                    "endpoint '{}' has invalid value for header '{}': {}",
                    endpoint.name, name, e
                ))
            })?;
            headers.insert(name, value);
        }

        let body = match (&endpoint.payload, endpoint.method) {
            (Some(payload), method) if method != Method::Get => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(
                    serde_json::to_vec(payload)
                        .map_err(|e| BenchError::Serialization(e.to_string()))?,
                )
            }
            _ => None,
        };

        Ok(PreparedRequest {
            endpoint: endpoint.name.clone(),
            method: endpoint.method.as_reqwest(),
            url,
            headers,
            body,
        })
    }
}

impl RequestExecutor {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn prepare(&self, target: &Target, endpoint: &EndpointDescriptor) -> Result<PreparedRequest> {
        PreparedRequest::build(target, endpoint)
    }

    /// Issue one request for `endpoint` against `target`.
    ///
    /// Never fails: anything that goes wrong becomes a failed outcome.
    pub async fn execute(&self, target: &Target, endpoint: &EndpointDescriptor) -> RequestOutcome {
        match self.prepare(target, endpoint) {
            Ok(request) => self.execute_prepared(&request).await,
            Err(e) => {
                tracing::debug!(endpoint = %endpoint.name, error = %e, "Request could not be prepared");
                RequestOutcome::network_failure("invalid_request", e.to_string())
            }
        }
    }

    /// Issue an already prepared request.
    ///
    /// The timer covers dispatch through the last byte of the body.
    pub async fn execute_prepared(&self, request: &PreparedRequest) -> RequestOutcome {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, async {
            let response = builder.send().await?;
            let status = response.status();
            response.bytes().await?;
            Ok::<_, reqwest::Error>(status)
        })
        .await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(status)) if status == StatusCode::OK => RequestOutcome::success(elapsed),
            Ok(Ok(status)) => {
                tracing::trace!(
                    endpoint = %request.endpoint,
                    url = %request.url,
                    status = %status,
                    "Request returned non-200"
                );
                RequestOutcome::rejected(elapsed, status.as_u16(), status.to_string())
            }
            Ok(Err(e)) => {
                tracing::trace!(
                    endpoint = %request.endpoint,
                    url = %request.url,
                    error_kind = error_kind(&e),
                    error = %e,
                    "Request failed"
                );
                RequestOutcome::network_failure(error_kind(&e), e.to_string())
            }
            Err(_) => {
                tracing::trace!(
                    endpoint = %request.endpoint,
                    url = %request.url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Request timed out"
                );
                RequestOutcome::network_failure(
                    "timeout",
                    format!("no response within {}ms", self.timeout.as_millis()),
                )
            }
        }
    }
}
