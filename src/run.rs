//! Wiring of one load-test run.

use crate::config::Settings;
use crate::observability::{monitor_memory, serve_metrics, MEMORY_SAMPLE_INTERVAL};
use anyhow::Context;
use loadtest_framework::{
    limiter_for_rate, BodyContains, EngineMetrics, PublishingEngine, RunReport,
};
use loadtest_generator::{MessageFactory, TemplateStore};
use loadtest_transport::{connect, Publisher, TransportError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the load test until `cancel` fires, `DURATION` elapses or every
/// worker has stopped.
///
/// All configuration errors surface before the first message is generated.
pub async fn run(settings: Settings, cancel: CancellationToken) -> anyhow::Result<RunReport> {
    let store = TemplateStore::load_dir(&settings.templates_path).with_context(|| {
        format!(
            "Failed to load templates from {}",
            settings.templates_path.display()
        )
    })?;
    let factory = MessageFactory::build(settings.factory.clone(), &store)
        .context("Invalid message generation settings")?;

    let metrics = EngineMetrics::new().context("Failed to register metrics")?;
    let listener = TcpListener::bind(settings.metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {}", settings.metrics_addr))?;

    match &settings.identity {
        Some(identity) => info!(
            "Replica {} of '{}' publishing for {} sources",
            identity.index,
            identity.name,
            settings.factory.sources.len()
        ),
        None => info!(
            "Shared sources: publishing for all {} sources",
            settings.factory.sources.len()
        ),
    }
    info!(
        "Mode {}, {} events/sec limit, run id {}",
        settings.transport.mode(),
        settings.max_events_per_second,
        factory.run_id()
    );

    let observers = CancellationToken::new();
    let server = tokio::spawn({
        let metrics = metrics.clone();
        let shutdown = observers.clone();
        async move {
            if let Err(e) = serve_metrics(listener, metrics, shutdown).await {
                error!("Metrics server failed: {}", e);
            }
        }
    });
    let monitor = tokio::spawn(monitor_memory(
        metrics.clone(),
        settings.soft_memory_limit,
        MEMORY_SAMPLE_INTERVAL,
        observers.clone(),
    ));

    if let Some(duration) = settings.duration {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    info!("Run duration of {:?} elapsed, stopping", duration);
                    cancel.cancel();
                }
            }
        });
    }

    let mut engine = PublishingEngine::new(
        settings.engine.clone(),
        Arc::new(factory),
        limiter_for_rate(settings.max_events_per_second),
        metrics,
    );
    if let Some(expected) = &settings.response_body_expected {
        engine = engine.with_validator(Arc::new(BodyContains::new(expected.clone())));
    }

    let transport = settings.transport.clone();
    let open = move |slot: usize| -> Result<Arc<dyn Publisher>, TransportError> {
        connect(&transport, slot)
    };
    let result = engine.run(&open, cancel.clone()).await;

    observers.cancel();
    tokio::join!(
        join_observer("Metrics server", server),
        join_observer("Memory monitor", monitor)
    );

    result.context("Publishing engine failed")
}

/// Await a background task, logging a panic or abort. `false` if it failed.
async fn join_observer(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!("{} task failed: {}", name, e);
            false
        }
    }
}

/// Cancel `cancel` on SIGINT or SIGTERM.
pub fn spawn_shutdown_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = interrupt => info!("Received interrupt signal (Ctrl+C)"),
            _ = terminate => info!("Received SIGTERM"),
            _ = cancel.cancelled() => return,
        }
        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_observer_reports_panics() {
        assert!(join_observer("quiet", tokio::spawn(async {})).await);

        let panicking = tokio::spawn(async { panic!("observer crashed") });
        assert!(!join_observer("panicking", panicking).await);
    }
}
