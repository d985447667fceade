//! Logging, the metrics endpoint and the memory monitor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use loadtest_framework::EngineMetrics;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the memory monitor samples resident memory.
pub const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// Logs go to stderr so the stdout sink stays machine-readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Routes for `/metrics`, `/live` and `/ready`.
pub fn metrics_router(metrics: EngineMetrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/live", get(|| async { "ok" }))
        .route("/ready", get(|| async { "ok" }))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<EngineMetrics>) -> (StatusCode, String) {
    match metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        ),
    }
}

/// Serve the metrics routes on `listener` until `shutdown` fires.
pub async fn serve_metrics(
    listener: TcpListener,
    metrics: EngineMetrics,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving metrics on http://{}/metrics", addr);
    }
    axum::serve(listener, metrics_router(metrics))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Sample this process's resident memory into the gauge until `shutdown`.
///
/// Logs a warning on every sample above `soft_limit`.
pub async fn monitor_memory(
    metrics: EngineMetrics,
    soft_limit: Option<u64>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            warn!("Memory monitor disabled: {}", e);
            return;
        }
    };
    let mut system = System::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        let Some(resident) = system.process(pid).map(|p| p.memory()) else {
            debug!("Memory monitor: process {} not found", pid);
            continue;
        };
        metrics
            .process_resident_bytes
            .set(i64::try_from(resident).unwrap_or(i64::MAX));

        if let Some(limit) = soft_limit {
            if resident > limit {
                warn!(
                    resident_bytes = resident,
                    soft_limit_bytes = limit,
                    "Resident memory above SOFT_MEMORY_LIMIT"
                );
            }
        }
    }
}
