use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result, MAX_STAGE_REQUESTS};

/// Shape of one load stage: `group_count × workers_per_group` concurrent workers,
/// each issuing `requests_per_worker` sequential requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescriptor {
    pub group_count: u32,
    pub workers_per_group: u32,
    pub requests_per_worker: u32,
}

impl StageDescriptor {
    pub fn new(group_count: u32, workers_per_group: u32, requests_per_worker: u32) -> Result<Self> {
        let stage = Self { group_count, workers_per_group, requests_per_worker };
        stage.validate()?;
        Ok(stage)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("group_count", self.group_count),
            ("workers_per_group", self.workers_per_group),
            ("requests_per_worker", self.requests_per_worker),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroStageField(name.to_string()));
        }

        let requests = (self.group_count as u64)
            .checked_mul(self.workers_per_group as u64)
            .and_then(|workers| workers.checked_mul(self.requests_per_worker as u64));
        match requests {
            Some(n) if n <= MAX_STAGE_REQUESTS => Ok(()),
            Some(n) => Err(ConfigError::StageTooLarge(n.to_string())),
            None => Err(ConfigError::StageTooLarge(format!(
                "{} x {} x {}",
                self.group_count, self.workers_per_group, self.requests_per_worker
            ))),
        }
    }

    pub fn total_workers(&self) -> u64 {
        self.group_count as u64 * self.workers_per_group as u64
    }

    /// Saturates for descriptors that never passed [`validate`](Self::validate).
    pub fn total_requests(&self) -> u64 {
        self.total_workers().saturating_mul(self.requests_per_worker as u64)
    }
}

/// Result of one dispatched request. Failures carry the latency up to the failure point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOutcome {
    pub success: bool,
    pub latency_millis: f64,
}

impl RequestOutcome {
    pub fn success(latency_millis: f64) -> Self {
        Self { success: true, latency_millis }
    }

    pub fn failure(latency_millis: f64) -> Self {
        Self { success: false, latency_millis }
    }
}

/// Aggregated statistics for one endpoint × stage run.
///
/// Invariant: `success_count + failure_count == total_requests`. Latency figures cover
/// successful outcomes only and are `0.0` when nothing succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub endpoint: String,
    pub stage: StageDescriptor,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Percentage of requests that succeeded, `0.0..=100.0`.
    pub success_rate: f64,
    pub wall_clock_seconds: f64,
    pub avg_latency_millis: f64,
    pub p50_latency_millis: f64,
    pub p95_latency_millis: f64,
    pub p99_latency_millis: f64,
    pub throughput_per_second: f64,
}
