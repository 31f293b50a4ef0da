use queuebench_common::{ConfigError, EndpointRegistry, QueueSeries, StageDescriptor, StageResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::{DrainConfig, SamplerConfig};
use crate::drain::{self, DrainOutcome, Finalizer};
use crate::sampler::{QueueDepthProvider, Sampler};
use crate::worker::{self, Dispatch};

/// Validated endpoint × stage matrix.
#[derive(Debug, Clone)]
pub struct RunPlan {
    registry: EndpointRegistry,
    stages: Vec<StageDescriptor>,
}

impl RunPlan {
    pub fn new(registry: EndpointRegistry, stages: Vec<StageDescriptor>) -> Result<Self, ConfigError> {
        if stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        for stage in &stages {
            stage.validate()?;
        }
        Ok(Self { registry, stages })
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// In invocation order: endpoint-major, then stage order.
    pub stages: Vec<StageResult>,
    pub queues: Vec<QueueSeries>,
    pub drain: DrainOutcome,
}

pub struct Orchestrator<D: ?Sized> {
    plan: RunPlan,
    dispatcher: Arc<D>,
    providers: Vec<Arc<dyn QueueDepthProvider>>,
    sampler: SamplerConfig,
    drain: DrainConfig,
}

impl<D> Orchestrator<D>
where
    D: Dispatch + ?Sized,
{
    pub fn new(
        plan: RunPlan,
        dispatcher: Arc<D>,
        providers: Vec<Arc<dyn QueueDepthProvider>>,
        sampler: SamplerConfig,
        drain: DrainConfig,
    ) -> Result<Self, ConfigError> {
        sampler.validate()?;
        drain.validate()?;
        Ok(Self { plan, dispatcher, providers, sampler, drain })
    }

    /// Run every stage of every endpoint back to back while the sampler and drain
    /// detector run alongside; return once the queues drain or the ceiling elapses.
    pub async fn run(self) -> RunReport {
        let start = Instant::now();
        let (finalizer, shutdown) = Finalizer::new();
        let (arm_tx, arm_rx) = watch::channel(None);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let sampler = tokio::spawn(Sampler::new(self.providers, self.sampler).run(start, tick_tx, shutdown));
        let detector = tokio::spawn(drain::watch_for_drain(
            tick_rx,
            arm_rx.clone(),
            self.drain.threshold,
            Arc::clone(&finalizer),
        ));
        let ceiling = tokio::spawn(drain::hard_timeout(arm_rx, self.drain.hard_timeout, Arc::clone(&finalizer)));

        let registry = self.plan.registry();
        let mut stages = Vec::with_capacity(registry.len() * self.plan.stages().len());
        for endpoint in registry.iter() {
            for stage in self.plan.stages() {
                info!(
                    endpoint = %endpoint.name,
                    groups = stage.group_count,
                    workers = stage.total_workers(),
                    requests = stage.total_requests(),
                    "starting stage"
                );
                let result = worker::run_stage(Arc::clone(&self.dispatcher), endpoint, *stage).await;
                info!(
                    endpoint = %endpoint.name,
                    groups = stage.group_count,
                    success = result.success_count,
                    failures = result.failure_count,
                    avg_latency_ms = result.avg_latency_millis,
                    throughput = result.throughput_per_second,
                    "stage complete"
                );
                stages.push(result);
            }
        }

        info!("load matrix complete; waiting for queues to drain");
        arm_tx.send_replace(Some(Instant::now()));

        let queues = match sampler.await {
            Ok(series) => series,
            Err(e) => {
                error!(error = %e, "queue sampler failed");
                Vec::new()
            }
        };
        let drain = finalizer.wait().await;
        detector.abort();
        ceiling.abort();

        RunReport { stages, queues, drain }
    }
}
