use async_trait::async_trait;
use queuebench_common::{ConfigError, QueueSample, QueueSeries};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::SamplerConfig;
use crate::drain::DrainOutcome;

/// A source of queue depth. Implementations swallow their own failures and
/// answer `None` ("unknown") instead.
#[async_trait]
pub trait QueueDepthProvider: Send + Sync + 'static {
    /// Name of the monitored queue, used for logs and report file names.
    fn queue(&self) -> &str;

    async fn depth(&self) -> Option<u64>;
}

/// Reads a message-count field from a broker management API over basic auth.
pub struct ManagementApiProvider {
    queue: String,
    url: String,
    username: String,
    password: String,
    field: String,
    http_client: reqwest::Client,
}

impl ManagementApiProvider {
    pub fn new(
        queue: impl Into<String>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            url: url.into(),
            username: username.into(),
            password: password.into(),
            field: field.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl QueueDepthProvider for ManagementApiProvider {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn depth(&self) -> Option<u64> {
        let response = self
            .http_client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| warn!(queue = %self.queue, error = %e, "management API unreachable"))
            .ok()?;

        let status = response.status();
        if !status.is_success() {
            warn!(queue = %self.queue, %status, "management API rejected depth query");
            return None;
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| warn!(queue = %self.queue, error = %e, "management API returned invalid JSON"))
            .ok()?;

        let depth = body.get(&self.field).and_then(serde_json::Value::as_u64);
        if depth.is_none() {
            warn!(queue = %self.queue, field = %self.field, "depth field missing or not an integer");
        }
        depth
    }
}

/// Runs a broker admin command and sums consumer-group lag for one topic from its output.
pub struct AdminCliProvider {
    queue: String,
    program: String,
    args: Vec<String>,
    topic: String,
    lag_rows: Regex,
}

impl AdminCliProvider {
    pub fn new(
        queue: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        topic: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ConfigError::InvalidValue("kafka_topic".to_string(), String::new()));
        }
        let lag_rows = lag_pattern(&topic)
            .map_err(|e| ConfigError::InvalidValue("kafka_topic".to_string(), e.to_string()))?;
        Ok(Self { queue: queue.into(), program: program.into(), args, topic, lag_rows })
    }
}

#[async_trait]
impl QueueDepthProvider for AdminCliProvider {
    fn queue(&self) -> &str {
        &self.queue
    }

    async fn depth(&self) -> Option<u64> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| warn!(queue = %self.queue, error = %e, "admin command failed to start"))
            .ok()?;

        if !output.status.success() {
            warn!(queue = %self.queue, status = %output.status, "admin command exited unsuccessfully");
            return None;
        }

        let lag = parse_consumer_lag(&String::from_utf8_lossy(&output.stdout), &self.lag_rows);
        if lag.is_none() {
            warn!(queue = %self.queue, topic = %self.topic, "no lag rows for topic in admin output");
        }
        lag
    }
}

/// Matches `<topic> <partition> <current> <end>` rows of consumer-group output,
/// capturing the two offsets.
pub fn lag_pattern(topic: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?m)(?:^|\s){}\s+\d+\s+(\d+)\s+(\d+)", regex::escape(topic)))
}

/// Sum `max(end - current, 0)` over every row matched by `rows` (see [`lag_pattern`]).
///
/// Returns `None` when no row is present or an offset does not fit in `u64`.
/// Rows whose current offset is not numeric (no committed offset yet) are not matched.
pub fn parse_consumer_lag(output: &str, rows: &Regex) -> Option<u64> {
    let mut total: Option<u64> = None;
    for caps in rows.captures_iter(output) {
        let current: u64 = caps[1].parse().ok()?;
        let end: u64 = caps[2].parse().ok()?;
        let sum = total.get_or_insert(0);
        *sum = sum.saturating_add(end.saturating_sub(current));
    }
    total
}

/// Depths of every provider, in provider order, taken on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// When the depth queries were issued, not when they answered.
    pub at: Instant,
    pub depths: Vec<Option<u64>>,
}

/// Polls all providers on a fixed interval. Sole owner of the recorded series.
pub struct Sampler {
    providers: Vec<Arc<dyn QueueDepthProvider>>,
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(providers: Vec<Arc<dyn QueueDepthProvider>>, config: SamplerConfig) -> Self {
        Self { providers, config }
    }

    /// Tick until `shutdown` carries an outcome, forwarding each tick to `ticks`.
    /// Offsets are measured from `start`. Returns one series per provider.
    pub async fn run(
        self,
        start: Instant,
        ticks: mpsc::UnboundedSender<Tick>,
        mut shutdown: watch::Receiver<Option<DrainOutcome>>,
    ) -> Vec<QueueSeries> {
        let mut series: Vec<QueueSeries> =
            self.providers.iter().map(|p| QueueSeries::new(p.queue())).collect();

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    let at = Instant::now();
                    let depths = self.sample_all().await;
                    let offset_seconds = at.duration_since(start).as_secs_f64();
                    for (s, depth) in series.iter_mut().zip(&depths) {
                        s.record(QueueSample { offset_seconds, depth: *depth });
                        debug!(queue = %s.queue, offset_seconds, ?depth, "sampled");
                    }
                    // The drain detector may already be gone once the run is finalized.
                    let _ = ticks.send(Tick { at, depths });
                }
            }
        }
        series
    }

    /// Query every provider concurrently, each bounded by the provider timeout.
    pub async fn sample_all(&self) -> Vec<Option<u64>> {
        let mut queries = JoinSet::new();
        for (idx, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let limit = self.config.provider_timeout;
            queries.spawn(async move { (idx, query_with_timeout(provider, limit).await) });
        }

        let mut depths = vec![None; self.providers.len()];
        while let Some(joined) = queries.join_next().await {
            match joined {
                Ok((idx, depth)) => depths[idx] = depth,
                Err(e) => warn!(error = %e, "depth query task failed"),
            }
        }
        depths
    }
}

async fn query_with_timeout(provider: Arc<dyn QueueDepthProvider>, limit: Duration) -> Option<u64> {
    match tokio::time::timeout(limit, provider.depth()).await {
        Ok(depth) => depth,
        Err(_) => {
            warn!(queue = %provider.queue(), ?limit, "depth query timed out");
            None
        }
    }
}
