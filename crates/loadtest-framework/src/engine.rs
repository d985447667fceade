//! Publishing engine orchestration.
//!
//! ```text
//!  generator x MESSAGE_GENERATORS
//!        │ send (blocks when full)
//!        ▼
//!  bounded queue (depth CONCURRENCY)
//!        │ recv (blocks when empty)
//!        ▼
//!  worker x CONCURRENCY ──▶ RateLimiter ──▶ Publisher ──▶ endpoint
//! ```
//!
//! Every blocking point also waits on the run's cancellation token. After
//! cancellation the engine joins all tasks, closes each distinct publisher
//! once and only then reads the run counters.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::log_throttle::LogThrottle;
use crate::metrics::{EngineMetrics, ERROR_FATAL, ERROR_RETRYABLE, ERROR_VALIDATION};
use crate::rate_limiter::{Admission, RateLimiter};
use crate::report::RunReport;
use crate::run_state::RunState;
use crate::validator::ResponseValidator;
use async_channel::{Receiver, Sender, TryRecvError};
use loadtest_generator::{Message, MessageSource};
use loadtest_transport::{Publisher, TransportError, EXTRA_ANONYMOUS_ID, EXTRA_AUTH};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Queue wait above which a dequeue counts as generation lag.
pub const GENERATION_LAG_THRESHOLD: Duration = Duration::from_millis(1);

/// Opens the publisher used by a worker slot.
pub trait PublisherFactory: Send + Sync {
    fn open(&self, slot: usize) -> Result<Arc<dyn Publisher>, TransportError>;
}

impl<F> PublisherFactory for F
where
    F: Fn(usize) -> Result<Arc<dyn Publisher>, TransportError> + Send + Sync,
{
    fn open(&self, slot: usize) -> Result<Arc<dyn Publisher>, TransportError> {
        self(slot)
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The run was cancelled.
    Cancelled,
    /// The queue was closed and empty.
    Drained,
    /// A non-retryable publish error.
    Fatal(String),
}

/// Generator and worker pools around one message source.
pub struct PublishingEngine {
    config: EngineConfig,
    source: Arc<dyn MessageSource>,
    limiter: Arc<dyn RateLimiter>,
    metrics: EngineMetrics,
    validator: Option<Arc<dyn ResponseValidator>>,
    state: Arc<RunState>,
}

impl PublishingEngine {
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn MessageSource>,
        limiter: Arc<dyn RateLimiter>,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            config,
            source,
            limiter,
            metrics,
            validator: None,
            state: Arc::new(RunState::new()),
        }
    }

    /// Check every successful response body with `validator`.
    pub fn with_validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Run until `cancel` fires or every worker has stopped.
    ///
    /// Publishers are opened through `factory` before any task starts and
    /// closed after all of them have returned.
    pub async fn run(
        &self,
        factory: &dyn PublisherFactory,
        cancel: CancellationToken,
    ) -> Result<RunReport, EngineError> {
        self.config.validate()?;
        let (handles, slots) = self.open_publishers(factory).await?;

        info!(
            "Starting engine: {} generators, {} workers, {} publisher handle(s)",
            self.config.message_generators,
            self.config.concurrency,
            handles.len()
        );

        let (tx, rx) = async_channel::bounded::<Message>(self.config.concurrency);

        let generators: Vec<JoinHandle<()>> = (0..self.config.message_generators)
            .map(|id| {
                tokio::spawn(generate(
                    id,
                    Arc::clone(&self.source),
                    tx.clone(),
                    Arc::clone(&self.state),
                    cancel.clone(),
                ))
            })
            .collect();
        drop(tx);

        let workers: Vec<JoinHandle<WorkerExit>> = slots
            .into_iter()
            .enumerate()
            .map(|(slot, publisher)| {
                let worker = Worker {
                    slot,
                    publisher,
                    limiter: Arc::clone(&self.limiter),
                    metrics: self.metrics.clone(),
                    validator: self.validator.clone(),
                    state: Arc::clone(&self.state),
                    cancel: cancel.clone(),
                    log_throttle: LogThrottle::new(self.config.log_throttle_interval),
                };
                tokio::spawn(worker.run(rx.clone()))
            })
            .collect();
        drop(rx);

        for (id, handle) in generators.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Generator {} failed: {}", id, e);
            }
        }

        let mut fatal = 0usize;
        for (slot, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(WorkerExit::Fatal(reason)) => {
                    debug!("Worker {} stopped: {}", slot, reason);
                    fatal += 1;
                }
                Ok(exit) => debug!("Worker {} stopped: {:?}", slot, exit),
                Err(e) => error!("Worker {} failed: {}", slot, e),
            }
        }

        close_all(&handles).await;

        let report = self.state.report();
        info!(
            "Engine drained: {} messages published in {:?} ({:.2} msg/sec), {} workers stopped on fatal errors",
            report.published_messages,
            report.elapsed,
            report.messages_per_second(),
            fatal
        );
        Ok(report)
    }

    /// Open the publishers and map them to slots.
    ///
    /// Returns the distinct handles and the handle for each slot.
    async fn open_publishers(
        &self,
        factory: &dyn PublisherFactory,
    ) -> Result<(Vec<Arc<dyn Publisher>>, Vec<Arc<dyn Publisher>>), EngineError> {
        let concurrency = self.config.concurrency;

        if !self.config.one_client_per_slot {
            let shared = factory
                .open(0)
                .map_err(|source| EngineError::Publisher { slot: 0, source })?;
            let slots = vec![Arc::clone(&shared); concurrency];
            return Ok((vec![shared], slots));
        }

        let mut distinct: Vec<Arc<dyn Publisher>> = Vec::new();
        let mut slots = Vec::with_capacity(concurrency);
        for slot in 0..concurrency {
            match factory.open(slot) {
                Ok(publisher) => {
                    if !distinct.iter().any(|d| Arc::ptr_eq(d, &publisher)) {
                        distinct.push(Arc::clone(&publisher));
                    }
                    slots.push(publisher);
                }
                Err(source) => {
                    close_all(&distinct).await;
                    return Err(EngineError::Publisher { slot, source });
                }
            }
        }
        Ok((distinct, slots))
    }
}

async fn close_all(handles: &[Arc<dyn Publisher>]) {
    for handle in handles {
        if let Err(e) = handle.close().await {
            warn!("Failed to close {} publisher: {}", handle.name(), e);
        }
    }
}

/// Generator task: produce messages until cancelled or nobody is receiving.
async fn generate(
    id: usize,
    source: Arc<dyn MessageSource>,
    tx: Sender<Message>,
    state: Arc<RunState>,
    cancel: CancellationToken,
) {
    let mut rng = StdRng::from_os_rng();
    debug!("Generator {} started", id);

    while !cancel.is_cancelled() {
        let message = source.next_message(&mut rng);
        state.record_generated(message.payload.len());

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(message) => {
                if sent.is_err() {
                    debug!("Generator {} stopping: queue closed", id);
                    break;
                }
            }
        }
    }
}

struct Worker {
    slot: usize,
    publisher: Arc<dyn Publisher>,
    limiter: Arc<dyn RateLimiter>,
    metrics: EngineMetrics,
    validator: Option<Arc<dyn ResponseValidator>>,
    state: Arc<RunState>,
    cancel: CancellationToken,
    log_throttle: LogThrottle,
}

impl Worker {
    async fn run(mut self, rx: Receiver<Message>) -> WorkerExit {
        self.metrics.active_workers.inc();
        let exit = self.work(&rx).await;
        self.metrics.active_workers.dec();
        exit
    }

    async fn work(&mut self, rx: &Receiver<Message>) -> WorkerExit {
        loop {
            let Some(message) = self.dequeue(rx).await else {
                return if self.cancel.is_cancelled() {
                    WorkerExit::Cancelled
                } else {
                    WorkerExit::Drained
                };
            };

            if !self.wait_for_admission(message.no_of_events).await {
                return WorkerExit::Cancelled;
            }

            if let Some(exit) = self.publish(message).await {
                return exit;
            }
        }
    }

    /// Next queued message, or `None` once cancelled or closed.
    async fn dequeue(&self, rx: &Receiver<Message>) -> Option<Message> {
        if self.cancel.is_cancelled() {
            return None;
        }
        match rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Closed) => None,
            Err(TryRecvError::Empty) => {
                let waiting = Instant::now();
                let message = tokio::select! {
                    _ = self.cancel.cancelled() => return None,
                    received = rx.recv() => received.ok()?,
                };
                if waiting.elapsed() > GENERATION_LAG_THRESHOLD {
                    self.state.record_generation_lag();
                    self.metrics.generation_lag.inc();
                }
                Some(message)
            }
        }
    }

    /// Block until the limiter admits `events`. `false` if cancelled.
    async fn wait_for_admission(&self, events: u64) -> bool {
        loop {
            match self.limiter.admit(events) {
                Admission::Admitted => return true,
                Admission::Throttled { retry_after } => {
                    self.state.record_throttled();
                    self.metrics.throttled.inc();
                    tokio::select! {
                        _ = self.cancel.cancelled() => return false,
                        _ = tokio::time::sleep(retry_after) => {}
                    }
                }
            }
        }
    }

    /// Publish one message. Returns an exit when the worker must stop.
    async fn publish(&mut self, message: Message) -> Option<WorkerExit> {
        let extras = [
            (EXTRA_AUTH, &*message.write_key),
            (EXTRA_ANONYMOUS_ID, message.user_id.as_str()),
        ];

        let started = Instant::now();
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Some(WorkerExit::Cancelled),
            result = self.publisher.publish_to(
                &self.cancel,
                &message.user_id,
                &message.payload,
                &extras,
            ) => result,
        };
        self.metrics
            .publish_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(body) => {
                if let Some(validator) = &self.validator {
                    if let Err(reason) = validator.validate(&body) {
                        self.state.record_failed();
                        self.metrics.record_error(ERROR_VALIDATION);
                        if let Some(suppressed) = self.log_throttle.check() {
                            warn!(
                                slot = self.slot,
                                suppressed, "Response validation failed: {}", reason
                            );
                        }
                        return None;
                    }
                }
                self.state
                    .record_published(message.no_of_events, message.payload.len());
                self.metrics.messages_published.inc();
                self.metrics.events_published.inc_by(message.no_of_events);
                self.metrics
                    .payload_size_bytes
                    .observe(message.payload.len() as f64);
                None
            }
            Err(TransportError::Cancelled) => Some(WorkerExit::Cancelled),
            Err(e) if e.is_retryable() => {
                self.state.record_failed();
                self.metrics.record_error(ERROR_RETRYABLE);
                if let Some(suppressed) = self.log_throttle.check() {
                    warn!(
                        slot = self.slot,
                        suppressed, "Retryable publish error: {}", e
                    );
                }
                None
            }
            Err(e) => {
                self.state.record_failed();
                self.state.record_fatal_worker();
                self.metrics.record_error(ERROR_FATAL);
                error!(
                    slot = self.slot,
                    kind = %e.kind(),
                    "Non-retryable publish error, stopping worker: {}",
                    e
                );
                Some(WorkerExit::Fatal(e.to_string()))
            }
        }
    }
}
