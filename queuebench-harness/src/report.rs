use queuebench_common::{is_valid_queue_name, queue_file_name, StageResult, RESULTS_FILE};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::drain::DrainOutcome;
use crate::orchestrator::RunReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Queue name {0:?} cannot be used as a file name")]
    InvalidQueueName(String),
}

/// Write `results.json` and one `queues-<name>.json` per monitored queue into `dir`,
/// replacing the previous run's files. Returns the paths written.
pub fn persist(report: &RunReport, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir).map_err(|source| ReportError::Io { path: dir.to_path_buf(), source })?;

    let mut written = vec![write_json_atomic(dir, RESULTS_FILE, &report.stages)?];
    for series in &report.queues {
        if !is_valid_queue_name(&series.queue) {
            return Err(ReportError::InvalidQueueName(series.queue.clone()));
        }
        written.push(write_json_atomic(dir, &queue_file_name(&series.queue), series)?);
    }
    Ok(written)
}

/// Serialize into a temp file in `dir`, then rename over `name` so readers never see a
/// partially written document.
fn write_json_atomic<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, ReportError> {
    let path = dir.join(name);
    let io_err = |source| ReportError::Io { path: path.clone(), source };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.persist(&path).map_err(|e| io_err(e.error))?;
    Ok(path)
}

/// Pass/fail limits applied to a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Highest acceptable failure ratio per endpoint, `0.0..=1.0`.
    pub max_error_rate: f64,
    /// Highest acceptable p95 latency per endpoint name. Endpoints without an entry are not checked.
    pub max_p95_millis: Vec<(String, f64)>,
}

impl Thresholds {
    fn p95_limit(&self, endpoint: &str) -> Option<f64> {
        self.max_p95_millis.iter().find(|(name, _)| name == endpoint).map(|(_, limit)| *limit)
    }
}

/// Fold `field` per endpoint in first-seen order.
fn per_endpoint<T: Copy>(
    stages: &[StageResult],
    field: impl Fn(&StageResult) -> T,
    fold: impl Fn(T, T) -> T,
) -> Vec<(String, T)> {
    let mut totals: Vec<(String, T)> = Vec::new();
    for s in stages {
        match totals.iter_mut().find(|(name, _)| *name == s.endpoint) {
            Some((_, acc)) => *acc = fold(*acc, field(s)),
            None => totals.push((s.endpoint.clone(), field(s))),
        }
    }
    totals
}

/// Failure ratio per endpoint across all of its stages, in first-seen order.
pub fn endpoint_error_rates(stages: &[StageResult]) -> Vec<(String, f64)> {
    per_endpoint(stages, |s| (s.failure_count, s.total_requests), |a, b| (a.0 + b.0, a.1 + b.1))
        .into_iter()
        .map(|(name, (failures, total))| {
            let rate = if total == 0 { 0.0 } else { failures as f64 / total as f64 };
            (name, rate)
        })
        .collect()
}

/// Worst stage p95 latency per endpoint, in first-seen order.
pub fn endpoint_p95_latencies(stages: &[StageResult]) -> Vec<(String, f64)> {
    per_endpoint(stages, |s| s.p95_latency_millis, f64::max)
}

/// Endpoints whose error rate is above `max_error_rate`.
pub fn endpoints_over_threshold(stages: &[StageResult], max_error_rate: f64) -> Vec<String> {
    endpoint_error_rates(stages)
        .into_iter()
        .filter(|(_, rate)| *rate > max_error_rate)
        .map(|(name, _)| name)
        .collect()
}

/// Endpoints whose worst stage p95 latency is above their configured limit.
pub fn endpoints_over_latency_limit(stages: &[StageResult], thresholds: &Thresholds) -> Vec<String> {
    endpoint_p95_latencies(stages)
        .into_iter()
        .filter(|(name, p95)| thresholds.p95_limit(name).is_some_and(|limit| *p95 > limit))
        .map(|(name, _)| name)
        .collect()
}

/// `true` when every endpoint is within both its error-rate and latency limits.
pub fn passes(stages: &[StageResult], thresholds: &Thresholds) -> bool {
    endpoints_over_threshold(stages, thresholds.max_error_rate).is_empty()
        && endpoints_over_latency_limit(stages, thresholds).is_empty()
}

pub fn print_report(report: &RunReport, thresholds: &Thresholds) {
    let max_error_rate = thresholds.max_error_rate;

    println!("Queuebench Results");
    println!("==================");
    println!(
        "{:<10} {:>6} {:>8} {:>8} {:>8} {:>9} {:>10} {:>10} {:>10}",
        "Endpoint", "Groups", "Requests", "Success", "Failed", "Rate", "Avg ms", "P95 ms", "Req/s"
    );
    for s in &report.stages {
        println!(
            "{:<10} {:>6} {:>8} {:>8} {:>8} {:>8.2}% {:>10.2} {:>10.2} {:>10.2}",
            s.endpoint,
            s.stage.group_count,
            s.total_requests,
            s.success_count,
            s.failure_count,
            s.success_rate,
            s.avg_latency_millis,
            s.p95_latency_millis,
            s.throughput_per_second,
        );
    }
    println!();

    for q in &report.queues {
        let peak = q.samples.iter().filter_map(|s| s.depth).max();
        let unknown = q.samples.iter().filter(|s| s.depth.is_none()).count();
        println!(
            "Queue {:<10} samples: {:>4}  peak depth: {:>6}  unknown: {}",
            q.queue,
            q.samples.len(),
            peak.map_or_else(|| "-".to_string(), |p| p.to_string()),
            unknown,
        );
    }
    match report.drain {
        DrainOutcome::Drained { after_seconds } => println!("Queues drained {after_seconds:.1} s after load finished"),
        DrainOutcome::TimedOut { after_seconds } => println!("Queues still busy after {after_seconds:.1} s; gave up"),
    }
    println!();

    for (name, rate) in endpoint_error_rates(&report.stages) {
        let mark = if rate > max_error_rate { "✗" } else { "✓" };
        println!(
            "Error rate {:<10} {:.3}%    [threshold: {:.3}%]  {}",
            name,
            rate * 100.0,
            max_error_rate * 100.0,
            mark
        );
    }
    for (name, p95) in endpoint_p95_latencies(&report.stages) {
        let Some(limit) = thresholds.p95_limit(&name) else {
            continue;
        };
        let mark = if p95 > limit { "✗" } else { "✓" };
        println!("P95 latency {:<9} {:.2} ms    [threshold: {:.2} ms]  {}", name, p95, limit, mark);
    }
    println!();
    println!("Result: {}", if passes(&report.stages, thresholds) { "PASS" } else { "FAIL" });
}
