use clap::Parser;
use queuebench_common::{check_http_url, ConfigError, EndpointRegistry, StageDescriptor};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::report::Thresholds;
use crate::sampler::{AdminCliProvider, ManagementApiProvider, QueueDepthProvider};

/// Queue sampler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub interval: Duration,
    /// Bound on a single provider query so one slow broker cannot stall a tick.
    pub provider_timeout: Duration,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(invalid("sample_interval", self.interval));
        }
        if self.provider_timeout.is_zero() {
            return Err(invalid("provider_timeout", self.provider_timeout));
        }
        Ok(())
    }
}

/// Drain detection rule and its hard ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainConfig {
    /// Consecutive all-zero/unknown ticks required to declare drain.
    pub threshold: u32,
    /// Maximum wait after the load matrix completes.
    pub hard_timeout: Duration,
}

impl DrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(invalid("drain_threshold", self.threshold));
        }
        if self.hard_timeout.is_zero() {
            return Err(invalid("drain_timeout", self.hard_timeout));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl std::fmt::Debug) -> ConfigError {
    ConfigError::InvalidValue(field.to_string(), format!("{value:?}"))
}

/// Command line and environment settings for the `queuebench` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "queuebench", about = "Sync vs broker-backed order submission load harness")]
pub struct Settings {
    /// Base URL of the order service
    #[arg(long, env = "QUEUEBENCH_BASE_URL", default_value = "http://localhost:8081")]
    pub base_url: String,

    /// Group counts of the stages to run, in order (comma separated)
    #[arg(long, env = "QUEUEBENCH_GROUPS", value_delimiter = ',', default_value = "2,4,6")]
    pub groups: Vec<u32>,

    /// Concurrent workers per group
    #[arg(long, env = "QUEUEBENCH_WORKERS_PER_GROUP", default_value_t = 100)]
    pub workers_per_group: u32,

    /// Sequential requests issued by each worker
    #[arg(long, env = "QUEUEBENCH_REQUESTS_PER_WORKER", default_value_t = 10)]
    pub requests_per_worker: u32,

    /// Per-request timeout (milliseconds)
    #[arg(long, env = "QUEUEBENCH_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Queue sampling interval (milliseconds)
    #[arg(long, env = "QUEUEBENCH_SAMPLE_INTERVAL_MS", default_value_t = 2000)]
    pub sample_interval_ms: u64,

    /// Per-provider query timeout (milliseconds). A timed-out query reads as unknown
    /// depth, which counts as drained; keep it above the Kafka admin command's start-up time.
    #[arg(long, env = "QUEUEBENCH_PROVIDER_TIMEOUT_MS", default_value_t = 5000)]
    pub provider_timeout_ms: u64,

    /// Consecutive empty samples required to declare the queues drained
    #[arg(long, env = "QUEUEBENCH_DRAIN_THRESHOLD", default_value_t = 3)]
    pub drain_threshold: u32,

    /// Give up waiting for drain after this many seconds
    #[arg(long, env = "QUEUEBENCH_DRAIN_TIMEOUT_SECS", default_value_t = 60)]
    pub drain_timeout_secs: u64,

    /// Directory receiving results.json and the queue series
    #[arg(long, env = "QUEUEBENCH_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    /// RabbitMQ management API URL for the monitored queue
    #[arg(
        long,
        env = "QUEUEBENCH_RABBITMQ_API",
        default_value = "http://localhost:15672/api/queues/%2F/orders"
    )]
    pub rabbitmq_api: String,

    #[arg(long, env = "QUEUEBENCH_RABBITMQ_USER", default_value = "guest")]
    pub rabbitmq_user: String,

    #[arg(long, env = "QUEUEBENCH_RABBITMQ_PASSWORD", default_value = "guest", hide_env_values = true)]
    pub rabbitmq_password: String,

    /// JSON field holding the queue depth
    #[arg(long, env = "QUEUEBENCH_RABBITMQ_FIELD", default_value = "messages_ready")]
    pub rabbitmq_field: String,

    /// Command printing Kafka consumer-group offsets (whitespace separated).
    /// `docker exec` plus the JVM start usually takes a few seconds; see --provider-timeout-ms.
    #[arg(
        long,
        env = "QUEUEBENCH_KAFKA_COMMAND",
        default_value = "docker exec kafka kafka-consumer-groups --bootstrap-server localhost:9092 --describe --group ecommerce-group"
    )]
    pub kafka_command: String,

    /// Kafka topic whose lag is summed
    #[arg(long, env = "QUEUEBENCH_KAFKA_TOPIC", default_value = "orders")]
    pub kafka_topic: String,

    /// Fail if any endpoint's error rate exceeds this fraction
    #[arg(long, env = "QUEUEBENCH_MAX_ERROR_RATE", default_value_t = 0.05)]
    pub max_error_rate: f64,

    /// Fail if the sync endpoint's 95th percentile latency exceeds this (milliseconds)
    #[arg(long, env = "QUEUEBENCH_SYNC_P95_MS", default_value_t = 500.0)]
    pub sync_p95_ms: f64,

    /// Fail if the Kafka endpoint's 95th percentile latency exceeds this (milliseconds)
    #[arg(long, env = "QUEUEBENCH_KAFKA_P95_MS", default_value_t = 200.0)]
    pub kafka_p95_ms: f64,

    /// Fail if the RabbitMQ endpoint's 95th percentile latency exceeds this (milliseconds)
    #[arg(long, env = "QUEUEBENCH_RABBITMQ_P95_MS", default_value_t = 200.0)]
    pub rabbitmq_p95_ms: f64,

    /// Serve the results on this address once the run completes
    #[arg(long, env = "QUEUEBENCH_SERVE")]
    pub serve: Option<SocketAddr>,
}

impl Settings {
    pub fn registry(&self) -> Result<EndpointRegistry, ConfigError> {
        check_http_url("base_url", &self.base_url)?;
        EndpointRegistry::order_paths(&self.base_url)
    }

    /// One stage per entry of `groups`, in the given order.
    pub fn stages(&self) -> Result<Vec<StageDescriptor>, ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::NoStages);
        }
        self.groups
            .iter()
            .map(|&g| StageDescriptor::new(g, self.workers_per_group, self.requests_per_worker))
            .collect()
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout", self.request_timeout_ms));
        }
        Ok(Duration::from_millis(self.request_timeout_ms))
    }

    pub fn sampler_config(&self) -> Result<SamplerConfig, ConfigError> {
        let config = SamplerConfig {
            interval: Duration::from_millis(self.sample_interval_ms),
            provider_timeout: Duration::from_millis(self.provider_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn drain_config(&self) -> Result<DrainConfig, ConfigError> {
        let config = DrainConfig {
            threshold: self.drain_threshold,
            hard_timeout: Duration::from_secs(self.drain_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Pass/fail limits checked after the run, keyed by endpoint name.
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        if !(0.0..=1.0).contains(&self.max_error_rate) {
            return Err(invalid("max_error_rate", self.max_error_rate));
        }
        let limits = [
            ("sync", "sync_p95_ms", self.sync_p95_ms),
            ("kafka", "kafka_p95_ms", self.kafka_p95_ms),
            ("rabbitmq", "rabbitmq_p95_ms", self.rabbitmq_p95_ms),
        ];
        let mut max_p95_millis = Vec::with_capacity(limits.len());
        for (endpoint, field, limit) in limits {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(invalid(field, limit));
            }
            max_p95_millis.push((endpoint.to_string(), limit));
        }
        Ok(Thresholds { max_error_rate: self.max_error_rate, max_p95_millis })
    }

    /// The RabbitMQ management-API provider and the Kafka admin-CLI provider.
    pub fn providers(&self) -> Result<Vec<Arc<dyn QueueDepthProvider>>, ConfigError> {
        let mut words = self.kafka_command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| invalid("kafka_command", &self.kafka_command))?;
        check_http_url("rabbitmq_api", &self.rabbitmq_api)?;
        let kafka = AdminCliProvider::new("kafka", program, words.collect(), self.kafka_topic.clone())?;

        let providers: Vec<Arc<dyn QueueDepthProvider>> = vec![
            Arc::new(ManagementApiProvider::new(
                "rabbitmq",
                self.rabbitmq_api.clone(),
                self.rabbitmq_user.clone(),
                self.rabbitmq_password.clone(),
                self.rabbitmq_field.clone(),
            )),
            Arc::new(kafka),
        ];
        Ok(providers)
    }
}
