use async_trait::async_trait;
use queuebench_client::Client;
use queuebench_common::{EndpointDescriptor, RequestOutcome, StageDescriptor, StageResult};
use std::iter;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::warn;

use crate::metrics;

/// Something that can issue one request against an endpoint and classify it.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    async fn dispatch(&self, endpoint: &EndpointDescriptor) -> RequestOutcome;
}

#[async_trait]
impl Dispatch for Client {
    async fn dispatch(&self, endpoint: &EndpointDescriptor) -> RequestOutcome {
        Client::dispatch(self, endpoint).await
    }
}

/// Run one stage against `endpoint`: spawn `stage.total_workers()` workers, each issuing
/// `stage.requests_per_worker` sequential requests, wait for all of them, then reduce.
///
/// Each worker owns its outcome buffer; buffers are only combined after the join.
pub async fn run_stage<D>(
    dispatcher: Arc<D>,
    endpoint: &EndpointDescriptor,
    stage: StageDescriptor,
) -> StageResult
where
    D: Dispatch + ?Sized,
{
    let per_worker = stage.requests_per_worker as usize;
    let target = Arc::new(endpoint.clone());
    let mut workers = JoinSet::new();

    let start = Instant::now();
    for _ in 0..stage.total_workers() {
        let dispatcher = Arc::clone(&dispatcher);
        let target = Arc::clone(&target);
        workers.spawn(async move {
            let mut outcomes = Vec::with_capacity(per_worker);
            for _ in 0..per_worker {
                outcomes.push(dispatcher.dispatch(&target).await);
            }
            outcomes
        });
    }

    let mut outcomes = Vec::with_capacity(stage.total_requests() as usize);
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(buffer) => outcomes.extend(buffer),
            Err(e) => {
                // A lost worker still accounts for every request it owed.
                warn!(endpoint = %endpoint.name, error = %e, "worker did not complete");
                outcomes.extend(iter::repeat(RequestOutcome::failure(0.0)).take(per_worker));
            }
        }
    }
    let wall_clock = start.elapsed();

    metrics::reduce(&endpoint.name, stage, &outcomes, wall_clock)
}
