use async_trait::async_trait;
use queuebench_common::{EndpointDescriptor, RequestOutcome, StageDescriptor};
use queuebench_harness::worker::{run_stage, Dispatch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sleeps for `delay` per request and reports a fixed latency.
struct FakeDispatcher {
    delay: Duration,
    latency_millis: f64,
    fail_every: Option<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDispatcher {
    fn new(delay: Duration, latency_millis: f64) -> Self {
        Self {
            delay,
            latency_millis,
            fail_every: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Dispatch for FakeDispatcher {
    async fn dispatch(&self, _endpoint: &EndpointDescriptor) -> RequestOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.fail_every {
            Some(k) if n % k == 0 => RequestOutcome::failure(self.latency_millis),
            _ => RequestOutcome::success(self.latency_millis),
        }
    }
}

/// Panics on its first call, succeeds afterwards.
struct PanickyDispatcher(AtomicUsize);

#[async_trait]
impl Dispatch for PanickyDispatcher {
    async fn dispatch(&self, _endpoint: &EndpointDescriptor) -> RequestOutcome {
        if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("worker blew up");
        }
        RequestOutcome::success(1.0)
    }
}

fn endpoint() -> EndpointDescriptor {
    EndpointDescriptor::new("sync", "http://127.0.0.1:1/orders/sync", &[200, 201])
}

#[tokio::test(start_paused = true)]
async fn test_run_stage_uniform_latency_end_to_end() {
    // 100 workers × 10 sequential requests × 500 ms each → the join takes 5 s.
    let dispatcher = Arc::new(FakeDispatcher::new(Duration::from_millis(500), 50.0));
    let stage = StageDescriptor::new(2, 50, 10).unwrap();

    let r = run_stage(Arc::clone(&dispatcher), &endpoint(), stage).await;

    assert_eq!(r.total_requests, 1000);
    assert_eq!(r.success_count, 1000);
    assert_eq!(r.avg_latency_millis, 50.0);
    assert!((r.wall_clock_seconds - 5.0).abs() < 0.01, "wall clock {}", r.wall_clock_seconds);
    assert!((r.throughput_per_second - 200.0).abs() < 0.5, "throughput {}", r.throughput_per_second);
}

#[tokio::test(start_paused = true)]
async fn test_run_stage_concurrency_equals_total_workers() {
    let dispatcher = Arc::new(FakeDispatcher::new(Duration::from_millis(10), 10.0));
    let stage = StageDescriptor::new(3, 4, 5).unwrap();

    let r = run_stage(Arc::clone(&dispatcher), &endpoint(), stage).await;

    // Requests within a worker are sequential, so in-flight never exceeds the worker count.
    assert_eq!(dispatcher.max_in_flight.load(Ordering::SeqCst), 12);
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 60);
    assert_eq!(r.total_requests, 60);
    assert!((r.wall_clock_seconds - 0.05).abs() < 0.005);
}

#[tokio::test(start_paused = true)]
async fn test_run_stage_counts_every_attempt() {
    let mut fake = FakeDispatcher::new(Duration::from_millis(1), 7.0);
    fake.fail_every = Some(4);
    let stage = StageDescriptor::new(1, 5, 8).unwrap();

    let r = run_stage(Arc::new(fake), &endpoint(), stage).await;

    assert_eq!(r.total_requests, stage.total_requests());
    assert_eq!(r.failure_count, 10);
    assert_eq!(r.success_count, 30);
    assert_eq!(r.success_count + r.failure_count, r.total_requests);
}

#[tokio::test]
async fn test_run_stage_lost_worker_still_accounted() {
    let dispatcher = Arc::new(PanickyDispatcher(AtomicUsize::new(0)));
    let stage = StageDescriptor::new(1, 3, 4).unwrap();

    let r = run_stage(dispatcher, &endpoint(), stage).await;

    assert_eq!(r.total_requests, 12);
    assert_eq!(r.failure_count, 4);
    assert_eq!(r.success_count, 8);
}
