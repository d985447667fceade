//! Environment configuration.
//!
//! Every setting is read from its environment variable and may also be
//! passed as a `--flag`. [`Args::build`] validates the whole surface before
//! any traffic is generated; template-dependent checks (event types, hot
//! percentages) run when the message factory is built.

pub mod duration;

use crate::identity::ReplicaIdentity;
use anyhow::Context;
use clap::{ArgAction, Parser};
use duration::{parse_byte_size, parse_duration};
use loadtest_framework::EngineConfig;
use loadtest_generator::{
    parse_event_types, parse_int_list, parse_percentages, partition_sources, FactoryConfig,
};
use loadtest_transport::{
    Http2Config, HttpConfig, Mode, PubSubCompression, PubSubConfig, TransportConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "event-loadtest")]
#[command(about = "Generate synthetic event traffic against an ingestion backend")]
#[command(long_about = None)]
pub struct Args {
    /// Publishing backend: stdout, http, http2 or pulsar
    #[arg(long, env = "MODE")]
    pub mode: String,

    /// Number of publish workers (also the queue depth)
    #[arg(long, env = "CONCURRENCY")]
    pub concurrency: usize,

    /// Number of message generator tasks
    #[arg(long, env = "MESSAGE_GENERATORS")]
    pub message_generators: usize,

    /// Number of simulated users
    #[arg(long, env = "TOTAL_USERS")]
    pub total_users: u64,

    /// Percentages splitting users into contiguous groups (e.g. "80,20")
    #[arg(long, env = "HOT_USER_GROUPS")]
    pub hot_user_groups: String,

    /// Event types, e.g. "track,page,batch(2,3)"
    #[arg(long, env = "EVENT_TYPES")]
    pub event_types: String,

    /// Percentage per event type
    #[arg(long, env = "HOT_EVENT_TYPES")]
    pub hot_event_types: String,

    /// Candidate batch sizes for plain `batch` events
    #[arg(long, env = "BATCH_SIZES")]
    pub batch_sizes: String,

    /// Percentage per batch size
    #[arg(long, env = "HOT_BATCH_SIZES")]
    pub hot_batch_sizes: String,

    /// Global event rate ceiling; 0 disables limiting
    #[arg(long, env = "MAX_EVENTS_PER_SECOND")]
    pub max_events_per_second: u64,

    /// Comma-separated source write keys
    #[arg(long, env = "SOURCES")]
    pub sources: String,

    /// Percentages for the first sources; the rest share the remainder
    #[arg(long, env = "HOT_SOURCES")]
    pub hot_sources: Option<String>,

    /// Every replica publishes for every source
    #[arg(long, env = "SHARED_SOURCES", action = ArgAction::Set, default_value_t = false)]
    pub shared_sources: bool,

    /// Number of replicas sharing SOURCES
    #[arg(long, env = "REPLICAS", default_value_t = 1)]
    pub replicas: usize,

    /// Hostname used for the replica index (defaults to the system hostname)
    #[arg(long, env = "HOSTNAME")]
    pub hostname: Option<String>,

    /// Directory with one template file per event type
    #[arg(long, env = "TEMPLATES_PATH", default_value = "./templates")]
    pub templates_path: PathBuf,

    /// Run length (e.g. "30s", "5m"); runs until interrupted when unset
    #[arg(long, env = "DURATION")]
    pub duration: Option<String>,

    /// Correlation id stamped into every payload (random when unset)
    #[arg(long, env = "RUN_ID")]
    pub run_id: Option<String>,

    /// Open one publisher per worker instead of a shared one
    #[arg(long, env = "USE_ONE_CLIENT_PER_SLOT", action = ArgAction::Set, default_value_t = false)]
    pub use_one_client_per_slot: bool,

    /// Draw a fresh UUID per message instead of sequential user ids
    #[arg(long, env = "USE_RANDOM_USER_IDS", action = ArgAction::Set, default_value_t = false)]
    pub use_random_user_ids: bool,

    /// Prefix of sequential user ids
    #[arg(long, env = "USER_ID_PREFIX", default_value = "user")]
    pub user_id_prefix: String,

    /// Resident memory above which a warning is logged (e.g. "512m")
    #[arg(long, env = "SOFT_MEMORY_LIMIT")]
    pub soft_memory_limit: Option<String>,

    /// Address of the /metrics, /live and /ready server
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9102")]
    pub metrics_addr: SocketAddr,

    /// Minimum interval between repeated error log lines per worker
    #[arg(long, env = "LOG_THROTTLE_INTERVAL", default_value = "1s")]
    pub log_throttle_interval: String,

    /// Substring every successful response body must contain
    #[arg(long, env = "RESPONSE_BODY_EXPECTED")]
    pub response_body_expected: Option<String>,

    // HTTP and HTTP/2
    /// Ingestion endpoint for http and http2 modes
    #[arg(long, env = "ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, env = "HTTP_COMPRESSION", action = ArgAction::Set, default_value_t = false)]
    pub http_compression: bool,

    #[arg(long, env = "HTTP_CONTENT_TYPE", default_value = "application/json")]
    pub http_content_type: String,

    /// Header carrying the partition key (the user id)
    #[arg(long, env = "HTTP_KEY_HEADER", default_value = "X-Partition-Key")]
    pub http_key_header: String,

    #[arg(long, env = "HTTP_TIMEOUT", default_value = "10s")]
    pub http_timeout: String,

    #[arg(long, env = "HTTP_MAX_IDLE_CONNS", default_value_t = 256)]
    pub http_max_idle_conns: usize,

    #[arg(long, env = "HTTP2_IDLE_TIMEOUT", default_value = "90s")]
    pub http2_idle_timeout: String,

    /// Use h2c without upgrade on http:// endpoints
    #[arg(long, env = "HTTP2_PRIOR_KNOWLEDGE", action = ArgAction::Set, default_value_t = true)]
    pub http2_prior_knowledge: bool,

    // Pub/sub
    #[arg(long, env = "PULSAR_URL", default_value = "localhost:9092")]
    pub pulsar_url: String,

    #[arg(long, env = "PULSAR_TOPIC")]
    pub pulsar_topic: Option<String>,

    #[arg(long, env = "PULSAR_BATCHING_ENABLED", action = ArgAction::Set, default_value_t = true)]
    pub pulsar_batching_enabled: bool,

    #[arg(long, env = "PULSAR_BATCHING_MAX_MESSAGES", default_value_t = 1000)]
    pub pulsar_batching_max_messages: u32,

    #[arg(long, env = "PULSAR_BATCHING_MAX_SIZE", default_value = "128k")]
    pub pulsar_batching_max_size: String,

    #[arg(long, env = "PULSAR_BATCHING_MAX_PUBLISH_DELAY", default_value = "10ms")]
    pub pulsar_batching_max_publish_delay: String,

    /// none, lz4, zlib, zstd or snappy
    #[arg(long, env = "PULSAR_COMPRESSION", default_value = "none")]
    pub pulsar_compression: String,

    /// Publish worker `n` to `<topic>-<n>`
    #[arg(long, env = "PULSAR_TOPIC_PER_SLOT", action = ArgAction::Set, default_value_t = false)]
    pub pulsar_topic_per_slot: bool,

    #[arg(long, env = "PULSAR_SEND_TIMEOUT", default_value = "30s")]
    pub pulsar_send_timeout: String,
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub factory: FactoryConfig,
    pub engine: EngineConfig,
    pub transport: TransportConfig,
    pub templates_path: PathBuf,
    pub max_events_per_second: u64,
    pub duration: Option<Duration>,
    pub soft_memory_limit: Option<u64>,
    pub metrics_addr: SocketAddr,
    pub response_body_expected: Option<String>,
    /// `None` when sources are shared.
    pub identity: Option<ReplicaIdentity>,
}

impl Args {
    /// Validate every setting and assemble the run's settings.
    pub fn build(&self) -> anyhow::Result<Settings> {
        let mode: Mode = self.mode.parse().context("Invalid MODE")?;

        let engine = EngineConfig::new(self.concurrency, self.message_generators)
            .with_one_client_per_slot(self.use_one_client_per_slot)
            .with_log_throttle_interval(
                parse_duration(&self.log_throttle_interval)
                    .context("Invalid LOG_THROTTLE_INTERVAL")?,
            );
        engine.validate().context("Invalid pool sizes")?;

        let all_sources = split_list(&self.sources);
        let (identity, sources) = if self.shared_sources {
            let sources = partition_sources(&all_sources, 0, 1, true).context("Invalid SOURCES")?;
            (None, sources)
        } else {
            let identity = ReplicaIdentity::resolve(self.hostname.as_deref())
                .context("Cannot determine the replica index")?;
            let sources =
                partition_sources(&all_sources, identity.index, self.replicas, false)
                    .context("Invalid SOURCES")?;
            (Some(identity), sources)
        };

        let hot_sources = self
            .hot_sources
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_percentages("HOT_SOURCES", s))
            .transpose()?;

        let factory = FactoryConfig {
            total_users: self.total_users,
            hot_user_groups: parse_percentages("HOT_USER_GROUPS", &self.hot_user_groups)?,
            random_user_ids: self.use_random_user_ids,
            user_id_prefix: self.user_id_prefix.clone(),
            event_types: parse_event_types(&self.event_types)?,
            hot_event_types: parse_percentages("HOT_EVENT_TYPES", &self.hot_event_types)?,
            batch_sizes: parse_int_list("BATCH_SIZES", &self.batch_sizes)?,
            hot_batch_sizes: parse_percentages("HOT_BATCH_SIZES", &self.hot_batch_sizes)?,
            sources,
            hot_sources,
            run_id: self
                .run_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };

        let duration = self
            .duration
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid DURATION")?;
        let soft_memory_limit = self
            .soft_memory_limit
            .as_deref()
            .map(parse_byte_size)
            .transpose()
            .context("Invalid SOFT_MEMORY_LIMIT")?;

        Ok(Settings {
            factory,
            engine,
            transport: self.transport_config(mode)?,
            templates_path: self.templates_path.clone(),
            max_events_per_second: self.max_events_per_second,
            duration,
            soft_memory_limit,
            metrics_addr: self.metrics_addr,
            response_body_expected: self.response_body_expected.clone(),
            identity,
        })
    }

    fn transport_config(&self, mode: Mode) -> anyhow::Result<TransportConfig> {
        Ok(match mode {
            Mode::Stdout => TransportConfig::Stdout,
            Mode::Http => TransportConfig::Http(self.http_config()?),
            Mode::Http2 => TransportConfig::Http2(Http2Config {
                http: self.http_config()?,
                idle_timeout: parse_duration(&self.http2_idle_timeout)
                    .context("Invalid HTTP2_IDLE_TIMEOUT")?,
                prior_knowledge: self.http2_prior_knowledge,
            }),
            Mode::Pulsar => TransportConfig::Pulsar(self.pubsub_config()?),
        })
    }

    fn http_config(&self) -> anyhow::Result<HttpConfig> {
        let endpoint = self
            .endpoint
            .clone()
            .context("ENDPOINT is required for http and http2 modes")?;
        Ok(HttpConfig {
            endpoint,
            compression: self.http_compression,
            content_type: self.http_content_type.clone(),
            key_header: self.http_key_header.clone(),
            timeout: parse_duration(&self.http_timeout).context("Invalid HTTP_TIMEOUT")?,
            max_idle_per_host: self.http_max_idle_conns,
        })
    }

    fn pubsub_config(&self) -> anyhow::Result<PubSubConfig> {
        let topic = self
            .pulsar_topic
            .clone()
            .context("PULSAR_TOPIC is required for pulsar mode")?;
        let compression: PubSubCompression = self
            .pulsar_compression
            .parse()
            .context("Invalid PULSAR_COMPRESSION")?;
        Ok(PubSubConfig {
            url: self.pulsar_url.clone(),
            topic,
            batching_enabled: self.pulsar_batching_enabled,
            batching_max_messages: self.pulsar_batching_max_messages,
            batching_max_size: parse_byte_size(&self.pulsar_batching_max_size)
                .context("Invalid PULSAR_BATCHING_MAX_SIZE")?,
            batching_max_publish_delay: parse_duration(&self.pulsar_batching_max_publish_delay)
                .context("Invalid PULSAR_BATCHING_MAX_PUBLISH_DELAY")?,
            compression,
            topic_per_slot: self.pulsar_topic_per_slot,
            send_timeout: parse_duration(&self.pulsar_send_timeout)
                .context("Invalid PULSAR_SEND_TIMEOUT")?,
        })
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &[&str] = &[
        "event-loadtest",
        "--mode=stdout",
        "--concurrency=200",
        "--message-generators=4",
        "--total-users=100",
        "--hot-user-groups=100",
        "--event-types=track",
        "--hot-event-types=100",
        "--batch-sizes=1,2,3",
        "--hot-batch-sizes=40,30,30",
        "--max-events-per-second=0",
        "--sources=wk-0,wk-1,wk-2,wk-3,wk-4",
    ];

    fn args(extra: &[&str]) -> Args {
        let key = |a: &str| a.split('=').next().unwrap_or(a).to_string();
        let base = BASE
            .iter()
            .filter(|b| !extra.iter().any(|e| key(e) == key(b)));
        Args::try_parse_from(base.chain(extra).copied()).unwrap()
    }

    #[test]
    fn test_build_stdout_settings() {
        let settings = args(&["--shared-sources=true", "--duration=30s"])
            .build()
            .unwrap();
        assert!(matches!(settings.transport, TransportConfig::Stdout));
        assert_eq!(settings.engine.concurrency, 200);
        assert_eq!(settings.engine.message_generators, 4);
        assert_eq!(settings.factory.sources.len(), 5);
        assert_eq!(settings.factory.batch_sizes, vec![1, 2, 3]);
        assert_eq!(settings.factory.hot_batch_sizes, vec![40, 30, 30]);
        assert_eq!(settings.duration, Some(Duration::from_secs(30)));
        assert!(settings.identity.is_none());
        assert!(!settings.factory.run_id.is_empty());
    }

    #[test]
    fn test_replica_owns_its_slice() {
        let settings = args(&["--hostname=loadtest-1", "--replicas=2"])
            .build()
            .unwrap();
        assert_eq!(settings.identity.unwrap().index, 1);
        assert_eq!(settings.factory.sources, vec!["wk-1", "wk-3"]);
    }

    #[test]
    fn test_bad_hostname_is_fatal() {
        let err = args(&["--hostname=not_a_pod", "--replicas=2"])
            .build()
            .unwrap_err();
        assert!(format!("{err:#}").contains("replica index"));
    }

    #[test]
    fn test_index_beyond_replicas_is_fatal() {
        assert!(args(&["--hostname=loadtest-3", "--replicas=2"])
            .build()
            .is_err());
    }

    #[test]
    fn test_http_settings() {
        let settings = args(&[
            "--shared-sources=true",
            "--mode=http2",
            "--endpoint=http://localhost:8080/v1/batch",
            "--http-compression=true",
            "--http-timeout=2s",
            "--http2-prior-knowledge=false",
        ])
        .build()
        .unwrap();
        match settings.transport {
            TransportConfig::Http2(config) => {
                assert!(config.http.compression);
                assert_eq!(config.http.timeout, Duration::from_secs(2));
                assert_eq!(config.http.key_header, "X-Partition-Key");
                assert!(!config.prior_knowledge);
                assert_eq!(config.idle_timeout, Duration::from_secs(90));
            }
            other => panic!("expected http2 settings, got {other:?}"),
        }

        assert!(args(&["--shared-sources=true", "--mode=http"])
            .build()
            .is_err());
    }

    #[test]
    fn test_pulsar_settings() {
        let settings = args(&[
            "--shared-sources=true",
            "--mode=pulsar",
            "--pulsar-topic=persistent://public/default/events",
            "--pulsar-compression=zlib",
            "--pulsar-batching-max-size=1m",
            "--pulsar-batching-max-publish-delay=5ms",
        ])
        .build()
        .unwrap();
        match settings.transport {
            TransportConfig::Pulsar(config) => {
                assert_eq!(config.compression, PubSubCompression::Zlib);
                assert_eq!(config.batching_max_size, 1024 * 1024);
                assert_eq!(
                    config.batching_max_publish_delay,
                    Duration::from_millis(5)
                );
            }
            other => panic!("expected pulsar settings, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(args(&["--shared-sources=true", "--mode=grpc"]).build().is_err());
        assert!(args(&["--shared-sources=true", "--concurrency=0"])
            .build()
            .is_err());
        assert!(args(&["--shared-sources=true", "--event-types=track("])
            .build()
            .is_err());
        assert!(args(&["--shared-sources=true", "--hot-event-types=ninety"])
            .build()
            .is_err());
        assert!(args(&["--shared-sources=true", "--soft-memory-limit=lots"])
            .build()
            .is_err());
    }
}
