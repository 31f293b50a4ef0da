use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::sampler::Tick;

/// How the drain wait ended. `after_seconds` is measured from when the detector was armed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DrainOutcome {
    Drained { after_seconds: f64 },
    TimedOut { after_seconds: f64 },
}

/// Consecutive-confirmation counter for queue drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainState {
    pub consecutive_zero_count: u32,
    pub done: bool,
}

impl DrainState {
    /// Fold one tick's depths into the state and return whether drain is confirmed.
    ///
    /// A tick counts toward drain when every queue reads `0` or unknown; any other
    /// reading resets the count. Once done, the state stays done.
    pub fn observe(&mut self, depths: &[Option<u64>], threshold: u32) -> bool {
        if self.done {
            return true;
        }
        if depths.iter().all(|d| matches!(d, None | Some(0))) {
            self.consecutive_zero_count += 1;
        } else {
            self.consecutive_zero_count = 0;
        }
        self.done = self.consecutive_zero_count >= threshold;
        self.done
    }
}

/// One-shot latch in front of the finalize action. The first caller of [`fire`]
/// publishes its outcome and stops the sampler; later calls are no-ops.
///
/// [`fire`]: Finalizer::fire
pub struct Finalizer {
    fired: AtomicBool,
    outcome: watch::Sender<Option<DrainOutcome>>,
}

impl Finalizer {
    pub fn new() -> (Arc<Self>, watch::Receiver<Option<DrainOutcome>>) {
        let (tx, rx) = watch::channel(None);
        (Arc::new(Self { fired: AtomicBool::new(false), outcome: tx }), rx)
    }

    /// Returns `true` if this call won the latch.
    pub fn fire(&self, outcome: DrainOutcome) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(?outcome, "finalize already fired; ignoring");
            return false;
        }
        info!(?outcome, "finalizing run");
        self.outcome.send_replace(Some(outcome));
        true
    }

    pub fn outcome(&self) -> Option<DrainOutcome> {
        *self.outcome.borrow()
    }

    /// Wait until some path has fired.
    pub async fn wait(&self) -> DrainOutcome {
        let mut rx = self.outcome.subscribe();
        loop {
            if let Some(outcome) = *rx.borrow_and_update() {
                return outcome;
            }
            // The sender lives in `self`, so the channel cannot close while we wait.
            let _ = rx.changed().await;
        }
    }
}

/// Drain path: consume sampler ticks and fire once `threshold` consecutive ticks
/// taken after arming read all-zero/unknown.
pub async fn watch_for_drain(
    mut ticks: mpsc::UnboundedReceiver<Tick>,
    armed: watch::Receiver<Option<Instant>>,
    threshold: u32,
    finalizer: Arc<Finalizer>,
) {
    let mut state = DrainState::default();
    while let Some(tick) = ticks.recv().await {
        let Some(armed_at) = *armed.borrow() else {
            continue;
        };
        if tick.at < armed_at {
            continue;
        }
        let done = state.observe(&tick.depths, threshold);
        debug!(consecutive_zero_count = state.consecutive_zero_count, "drain check");
        if done {
            let after_seconds = tick.at.duration_since(armed_at).as_secs_f64();
            finalizer.fire(DrainOutcome::Drained { after_seconds });
            return;
        }
    }
}

/// Timeout path: once armed, wait `limit` and fire regardless of queue state.
pub async fn hard_timeout(
    mut armed: watch::Receiver<Option<Instant>>,
    limit: Duration,
    finalizer: Arc<Finalizer>,
) {
    let armed_at = match armed.wait_for(Option::is_some).await {
        Ok(at) => *at,
        Err(_) => return,
    };
    let Some(armed_at) = armed_at else {
        return;
    };
    tokio::time::sleep_until(armed_at + limit).await;
    finalizer.fire(DrainOutcome::TimedOut { after_seconds: limit.as_secs_f64() });
}
