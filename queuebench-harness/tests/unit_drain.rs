use queuebench_harness::drain::{hard_timeout, watch_for_drain, DrainOutcome, DrainState, Finalizer};
use queuebench_harness::sampler::Tick;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Feed a single-queue depth sequence through a fresh state; return the final state.
fn run_single(depths: &[Option<u64>], threshold: u32) -> DrainState {
    let mut state = DrainState::default();
    for d in depths {
        state.observe(&[*d], threshold);
    }
    state
}

// --- DrainState ---

#[test]
fn test_drain_requires_consecutive_zero_readings() {
    // Two zeros after the initial 5 are not enough.
    let state = run_single(&[Some(5), Some(0), Some(0)], 3);
    assert!(!state.done);
    assert_eq!(state.consecutive_zero_count, 2);

    // A trailing non-zero resets the count.
    let state = run_single(&[Some(5), Some(0), Some(0), Some(2)], 3);
    assert!(!state.done);
    assert_eq!(state.consecutive_zero_count, 0);

    let state = run_single(&[Some(5), Some(0), Some(0), Some(0)], 3);
    assert!(state.done);
}

#[test]
fn test_drain_reset_mid_sequence() {
    let state = run_single(&[Some(0), Some(0), Some(2), Some(0), Some(0)], 3);
    assert!(!state.done);
    assert_eq!(state.consecutive_zero_count, 2);
}

#[test]
fn test_unknown_counts_as_drained_reading() {
    let state = run_single(&[None, Some(0), None], 3);
    assert!(state.done);
}

#[test]
fn test_every_queue_must_be_empty() {
    let mut state = DrainState::default();
    assert!(!state.observe(&[Some(0), Some(3)], 1));
    assert_eq!(state.consecutive_zero_count, 0);
    assert!(state.observe(&[Some(0), None], 1));
}

#[test]
fn test_done_is_sticky() {
    let mut state = DrainState::default();
    assert!(state.observe(&[Some(0)], 1));
    assert!(state.observe(&[Some(100)], 1));
    assert!(state.done);
}

// --- Finalizer ---

#[tokio::test]
async fn test_finalizer_first_fire_wins() {
    let (finalizer, mut rx) = Finalizer::new();
    assert_eq!(finalizer.outcome(), None);

    assert!(finalizer.fire(DrainOutcome::Drained { after_seconds: 1.0 }));
    assert!(!finalizer.fire(DrainOutcome::TimedOut { after_seconds: 60.0 }));

    assert_eq!(finalizer.outcome(), Some(DrainOutcome::Drained { after_seconds: 1.0 }));
    assert_eq!(finalizer.wait().await, DrainOutcome::Drained { after_seconds: 1.0 });
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), Some(DrainOutcome::Drained { after_seconds: 1.0 }));
}

// --- drain path vs timeout path ---

fn tick(at: Instant, depth: u64) -> Tick {
    Tick { at, depths: vec![Some(depth)] }
}

#[tokio::test(start_paused = true)]
async fn test_drain_path_wins_when_queues_empty() {
    let (finalizer, _rx) = Finalizer::new();
    let (arm_tx, arm_rx) = watch::channel(None);
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();

    let detector = tokio::spawn(watch_for_drain(tick_rx, arm_rx.clone(), 3, finalizer.clone()));
    let ceiling = tokio::spawn(hard_timeout(arm_rx, Duration::from_secs(60), finalizer.clone()));

    // Ticks before arming never count, however many zeros they carry.
    for _ in 0..5 {
        tick_tx.send(tick(Instant::now(), 0)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    let armed_at = Instant::now();
    arm_tx.send_replace(Some(armed_at));

    for depth in [4, 0, 0, 0] {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tick_tx.send(tick(Instant::now(), depth)).unwrap();
    }

    detector.await.unwrap();
    let outcome = finalizer.wait().await;
    match outcome {
        DrainOutcome::Drained { after_seconds } => assert!((after_seconds - 4.0).abs() < 0.01),
        other => panic!("expected drain, got {other:?}"),
    }

    // The ceiling fires later but cannot change the outcome.
    ceiling.await.unwrap();
    assert_eq!(finalizer.outcome(), Some(outcome));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_path_fires_when_depth_never_drops() {
    let (finalizer, _rx) = Finalizer::new();
    let (arm_tx, arm_rx) = watch::channel(None);
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();

    let detector = tokio::spawn(watch_for_drain(tick_rx, arm_rx.clone(), 3, finalizer.clone()));
    let ceiling = tokio::spawn(hard_timeout(arm_rx, Duration::from_secs(10), finalizer.clone()));

    let start = Instant::now();
    arm_tx.send_replace(Some(start));
    let feeder = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if tick_tx.send(tick(Instant::now(), 5)).is_err() {
                break;
            }
        }
    });

    let outcome = finalizer.wait().await;
    assert_eq!(outcome, DrainOutcome::TimedOut { after_seconds: 10.0 });
    assert!((start.elapsed().as_secs_f64() - 10.0).abs() < 0.01);

    ceiling.await.unwrap();
    detector.abort();
    feeder.abort();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_waits_for_arming() {
    let (finalizer, _rx) = Finalizer::new();
    let (arm_tx, arm_rx) = watch::channel(None);
    let ceiling = tokio::spawn(hard_timeout(arm_rx, Duration::from_secs(2), finalizer.clone()));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(finalizer.outcome(), None);

    arm_tx.send_replace(Some(Instant::now()));
    ceiling.await.unwrap();
    assert_eq!(finalizer.outcome(), Some(DrainOutcome::TimedOut { after_seconds: 2.0 }));
}
