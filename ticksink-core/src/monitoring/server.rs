//! HTTP server for Prometheus metrics export
//!
//! Exposes `/metrics` for scraping and `/health` for liveness. Health turns
//! 503 once the subscription lifecycle is exhausted, so an orchestrator can
//! see that manual intervention is required.
//!
//! The ingestion pipeline itself is synchronous; [`MetricsServer::spawn`]
//! runs the server on a single-threaded tokio runtime in a side thread.

use super::MetricsRegistry;
use crate::lifecycle::LifecyclePhase;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Configuration for metrics HTTP server
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind to (e.g., "0.0.0.0:9184")
    pub listen_addr: SocketAddr,
    /// Path to serve metrics (default: "/metrics")
    pub metrics_path: String,
}

impl MetricsServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            metrics_path: "/metrics".to_string(),
        }
    }
}

/// HTTP server for Prometheus metrics
pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: MetricsRegistry,
}

/// A server running in its own thread
pub struct MetricsServerHandle {
    /// Address actually bound (useful when the port was 0)
    pub local_addr: SocketAddr,
    pub thread: JoinHandle<()>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self { config, registry }
    }

    /// Bind synchronously, then serve forever on a side thread
    ///
    /// Binding happens on the caller's thread so an occupied port is
    /// reported as an error instead of a log line from the background.
    pub fn spawn(self) -> Result<MetricsServerHandle> {
        let listener = std::net::TcpListener::bind(self.config.listen_addr)
            .with_context(|| format!("Failed to bind metrics server to {}", self.config.listen_addr))?;
        listener
            .set_nonblocking(true)
            .context("Failed to make metrics listener non-blocking")?;
        let local_addr = listener.local_addr().context("Failed to read metrics listener address")?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build metrics runtime")?;

        let thread = thread::Builder::new()
            .name("metrics-server".to_string())
            .spawn(move || {
                let result = runtime.block_on(async move {
                    let listener = TcpListener::from_std(listener)?;
                    self.serve_on(listener).await
                });
                if let Err(e) = result {
                    error!(error = %e, "Metrics server stopped");
                }
            })
            .context("Failed to spawn metrics thread")?;

        Ok(MetricsServerHandle { local_addr, thread })
    }

    async fn serve_on(self, listener: TcpListener) -> Result<()> {
        info!(
            "Metrics server listening on http://{}{}",
            listener.local_addr().unwrap_or(self.config.listen_addr),
            self.config.metrics_path
        );

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let registry = self.registry.clone();
            let metrics_path = self.config.metrics_path.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let registry = registry.clone();
                    let metrics_path = metrics_path.clone();
                    async move { Ok::<_, hyper::Error>(route(req.uri().path(), &registry, &metrics_path)) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

fn respond(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn route(path: &str, registry: &MetricsRegistry, metrics_path: &str) -> Response<Full<Bytes>> {
    debug!("Metrics request: {}", path);

    if path == "/health" || path == "/healthz" {
        let phase = LifecyclePhase::from_code(registry.lifecycle().state.get());
        return match phase {
            Some(LifecyclePhase::Exhausted) => respond(StatusCode::SERVICE_UNAVAILABLE, "EXHAUSTED"),
            Some(phase) => respond(StatusCode::OK, phase.as_str().to_ascii_uppercase()),
            None => respond(StatusCode::OK, "OK"),
        };
    }

    if path == metrics_path {
        return match encode_metrics(registry) {
            Ok(text) => {
                let mut response = respond(StatusCode::OK, text);
                if let Ok(value) = "text/plain; version=0.0.4".parse() {
                    response.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
                }
                response
            }
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
            }
        };
    }

    if path == "/" {
        return respond(
            StatusCode::OK,
            format!("ticksink\n\nEndpoints:\n  {metrics_path} - Prometheus metrics\n  /health - Health check\n"),
        );
    }

    warn!("Unknown metrics endpoint requested: {}", path);
    respond(StatusCode::NOT_FOUND, "Not Found")
}

/// Encode metrics to Prometheus text format
pub fn encode_metrics(registry: &MetricsRegistry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;

    String::from_utf8(buffer).context("Invalid UTF-8 in metrics")
}
