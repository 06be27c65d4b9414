//! Mock target service with configurable latency and error injection.

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::config::MockServerConfig;

struct MockState {
    config: MockServerConfig,
    served: AtomicU64,
}

/// Mock target server for benchmarking and tests
pub struct MockTargetServer {
    config: MockServerConfig,
    state: Option<Arc<MockState>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockTargetServer {
    /// Create a new mock server with the given configuration
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            state: None,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the mock server and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let state = Arc::new(MockState {
            config: self.config.clone(),
            served: AtomicU64::new(0),
        });
        self.state = Some(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new()
            .route("/health", get(handle_health))
            .fallback(handle_any)
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::debug!(port = port, latency_ms = self.config.latency_ms, "Mock target started");
        Ok(port)
    }

    /// Get the server's port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the server's URL
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Requests answered so far, health checks excluded
    pub fn requests_served(&self) -> u64 {
        self.state
            .as_ref()
            .map(|s| s.served.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockTargetServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_health(State(state): State<Arc<MockState>>) -> Response {
    if state.config.healthy {
        (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting").into_response()
    }
}

/// Answer any other request after the configured latency
async fn handle_any(State(state): State<Arc<MockState>>, method: Method, uri: Uri) -> Response {
    if state.config.latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(state.config.latency_ms)).await;
    }
    state.served.fetch_add(1, Ordering::Relaxed);

    if state.config.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < state.config.error_rate {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
        })),
    )
        .into_response()
}
