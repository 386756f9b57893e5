// MCP3008 Exporter - Prometheus exporter for MCP3008 ADC channels
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # MCP3008 Exporter
//!
//! Serves the raw count of each MCP3008 channel as a Prometheus gauge.
//! Every scrape of `/metrics` performs a fresh 8-channel sweep on the SPI bus.
//!
//! ## Usage
//!
//! ```bash
//! # First SPI port, default listen address (0.0.0.0:8088)
//! mcp3008-exporter
//!
//! # Second chip-select on SPI0, custom address
//! mcp3008-exporter --spi-port SPI0.1 --listen 127.0.0.1:9100
//! ```

mod metrics;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use mcp3008::{InitError, RppalBus, SampleCollector, SpiBus, SpiPort, CLOCK_HZ};
use metrics::{channel_registry, encode_metrics, MetricsError};
use prometheus::Registry;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// MCP3008 Prometheus Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SPI port the ADC is attached to (e.g. "0.0", "SPI0.1", "/dev/spidev0.0").
    /// Empty selects the first port.
    #[arg(long, default_value = "")]
    spi_port: String,

    /// Address to serve metrics on
    #[arg(short, long, default_value = "0.0.0.0:8088")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Fatal startup and serving errors.
#[derive(Error, Debug)]
enum ExporterError {
    /// The SPI bus could not be opened
    #[error(transparent)]
    Init(#[from] InitError),

    /// The channel gauges could not be registered
    #[error("Failed to register channel gauges: {0}")]
    Metrics(#[from] MetricsError),

    /// The listen address is unavailable
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The HTTP server stopped abnormally
    #[error("Server stopped with error: {0}")]
    Serve(std::io::Error),
}

/// Application state shared across handlers.
struct AppState<B> {
    registry: Registry,
    collector: Arc<SampleCollector<B>>,
    port: SpiPort,
    start_time: Instant,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("MCP3008 Exporter v{}", env!("CARGO_PKG_VERSION"));

    // Every resource opened by `run` is dropped before we get here
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Open the bus and serve it until a shutdown signal arrives.
async fn run(args: Args) -> Result<(), ExporterError> {
    // Without a working bus there is nothing to serve
    let port = args.spi_port.parse::<SpiPort>()?;
    let bus = RppalBus::open(port)?;
    info!("Opened {} ({}) at {} Hz", port, port.device_path(), CLOCK_HZ);

    serve(bus, port, args.listen, shutdown_signal()).await
}

/// Serve `bus` on `listen` until `shutdown` resolves, then release it.
///
/// On every error path the collector and the bus it owns are dropped
/// before returning.
async fn serve<B, F>(
    bus: B,
    port: SpiPort,
    listen: SocketAddr,
    shutdown: F,
) -> Result<(), ExporterError>
where
    B: SpiBus + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let collector = Arc::new(SampleCollector::new(bus));
    let registry = channel_registry(Arc::clone(&collector))?;

    let state = Arc::new(AppState {
        registry,
        collector,
        port,
        start_time: Instant::now(),
    });

    let listener = match TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(source) => {
            release_bus(state);
            return Err(ExporterError::Bind {
                addr: listen,
                source,
            });
        }
    };

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler::<B>))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler::<B>))
        .with_state(Arc::clone(&state));

    info!("Starting server on http://{}", listen);
    info!("Metrics endpoint: http://{}/metrics", listen);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ExporterError::Serve);

    release_bus(state);
    served
}

/// Close the SPI device once no handler can reach it anymore.
fn release_bus<B: SpiBus>(state: Arc<AppState<B>>) {
    let Ok(state) = Arc::try_unwrap(state) else {
        warn!("Handlers still hold the bus, it will be released on exit");
        return;
    };
    let AppState {
        registry,
        collector,
        port,
        ..
    } = state;
    // The registry holds the other reference to the collector
    drop(registry);

    match Arc::try_unwrap(collector) {
        Ok(collector) => {
            drop(collector.into_bus());
            info!("Released {}", port);
        }
        Err(_) => warn!("Collector still shared, {} will be released on exit", port),
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt signal, exiting..."),
        _ = terminate => info!("Received terminate signal, exiting..."),
    }
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>MCP3008 Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>MCP3008 Exporter</h1>
    <p>Prometheus exporter for the raw channels of an MCP3008 ADC.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>mcp3008_channel_0</code> .. <code>mcp3008_channel_7</code> - Raw 10-bit count (0-1023)</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - sweeps the ADC and returns Prometheus text format.
///
/// The sweep runs on this task; the collector serializes concurrent scrapes.
async fn metrics_handler<B: SpiBus + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> impl IntoResponse {
    match encode_metrics(&state.registry) {
        Ok(metrics) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
            metrics,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    spi_port: String,
    clock_hz: u32,
    sweeps: u64,
    failed_sweeps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// Status handler - returns JSON status information.
async fn status_handler<B: SpiBus + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<StatusResponse> {
    let stats = state.collector.stats();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        spi_port: state.port.to_string(),
        clock_hz: CLOCK_HZ,
        sweeps: stats.sweeps,
        failed_sweeps: stats.failed_sweeps,
        last_error: stats.last_error,
    })
}
