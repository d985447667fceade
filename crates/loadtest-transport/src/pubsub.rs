//! Pub/sub publisher.
//!
//! Built on rdkafka's `FutureProducer`; the broker is reached through its
//! Kafka protocol listener. The delivery future is awaited under the run's
//! cancellation token, so a cancelled run stops waiting immediately while
//! the producer keeps the message queued until `close` flushes it.

use crate::config::PubSubConfig;
use crate::error::TransportError;
use crate::{Extras, Publisher};
use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long `close` waits for queued messages to be delivered.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes payloads to one topic.
pub struct PubSubPublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl PubSubPublisher {
    /// Create a producer for worker `slot`.
    ///
    /// # Arguments
    ///
    /// * `config` - Broker, topic, batching and compression settings
    /// * `slot` - Worker slot, used for the topic when `topic_per_slot` is set
    pub fn new(config: &PubSubConfig, slot: usize) -> Result<Self, TransportError> {
        let topic = if config.topic_per_slot {
            slot_topic(&config.topic, slot)
        } else {
            config.topic.clone()
        };

        let producer: FutureProducer = producer_config(config).create()?;

        info!(
            "pubsub publisher ready: broker={}, topic={}, batching={}, compression={}",
            config.url,
            topic,
            config.batching_enabled,
            config.compression.producer_codec()
        );

        Ok(Self {
            producer,
            topic,
            send_timeout: config.send_timeout,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Producer properties for `config`.
pub fn producer_config(config: &PubSubConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.url)
        .set("message.timeout.ms", config.send_timeout.as_millis().to_string())
        .set("compression.type", config.compression.producer_codec())
        .set("queue.buffering.max.messages", "100000")
        .set("queue.buffering.max.kbytes", "1048576");

    if config.batching_enabled {
        client
            .set(
                "linger.ms",
                config.batching_max_publish_delay.as_millis().to_string(),
            )
            .set(
                "batch.num.messages",
                config.batching_max_messages.max(1).to_string(),
            )
            .set("batch.size", config.batching_max_size.max(1).to_string());
    } else {
        client.set("linger.ms", "0").set("batch.num.messages", "1");
    }
    client
}

/// Per-slot topic: the configured topic's namespace plus `{name}-{slot}`.
pub fn slot_topic(topic: &str, slot: usize) -> String {
    match topic.rsplit_once('/') {
        Some((namespace, name)) => format!("{namespace}/{name}-{slot}"),
        None => format!("{topic}-{slot}"),
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish_to(
        &self,
        cancel: &CancellationToken,
        key: &str,
        payload: &[u8],
        extras: &Extras<'_>,
    ) -> Result<Vec<u8>, TransportError> {
        let headers = extras.iter().fold(OwnedHeaders::new(), |headers, (k, v)| {
            headers.insert(Header {
                key: *k,
                value: Some(*v),
            })
        });
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .payload(payload)
            .headers(headers);

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            delivery = self.producer.send(record, Timeout::After(self.send_timeout)) => {
                match delivery {
                    Ok(_) => Ok(Vec::new()),
                    Err((err, _)) => Err(TransportError::Broker(err)),
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let flushed =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
                .await
                .map_err(|e| TransportError::Other(format!("flush task failed: {e}")))?;
        match flushed {
            Ok(()) => {
                debug!("pubsub publisher for '{}' flushed", topic);
                Ok(())
            }
            Err(e) => {
                warn!("pubsub publisher for '{}' failed to flush: {}", topic, e);
                Err(TransportError::Broker(e))
            }
        }
    }

    fn name(&self) -> &'static str {
        "pulsar"
    }
}
