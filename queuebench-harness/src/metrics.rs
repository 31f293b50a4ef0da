use queuebench_common::{RequestOutcome, StageDescriptor, StageResult};
use std::time::Duration;

/// Reduce every outcome of one stage into its [`StageResult`].
///
/// `wall_clock` is the time from the first worker starting to the last worker
/// finishing. Latency statistics cover successful outcomes only; with no successes
/// they are all `0.0`, as is the throughput.
pub fn reduce(
    endpoint: &str,
    stage: StageDescriptor,
    outcomes: &[RequestOutcome],
    wall_clock: Duration,
) -> StageResult {
    let total_requests = outcomes.len() as u64;
    let latencies: Vec<f64> = outcomes
        .iter()
        .filter(|o| o.success)
        .map(|o| o.latency_millis)
        .collect();
    let success_count = latencies.len() as u64;
    let wall_clock_seconds = wall_clock.as_secs_f64();

    StageResult {
        endpoint: endpoint.to_string(),
        stage,
        total_requests,
        success_count,
        failure_count: total_requests - success_count,
        success_rate: ratio(success_count as f64, total_requests as f64) * 100.0,
        wall_clock_seconds,
        avg_latency_millis: mean(&latencies),
        p50_latency_millis: percentile(&latencies, 0.50),
        p95_latency_millis: percentile(&latencies, 0.95),
        p99_latency_millis: percentile(&latencies, 0.99),
        throughput_per_second: ratio(success_count as f64, wall_clock_seconds),
    }
}

/// `num / den`, or 0 when the denominator is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn mean(data: &[f64]) -> f64 {
    ratio(data.iter().sum(), data.len() as f64)
}

/// Sort `data` ascending and return the element at index `floor(p * n)`.
/// Returns 0 for an empty slice.
pub fn percentile(data: &[f64], p: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
