use queuebench_common::{EndpointDescriptor, RequestOutcome, DEFAULT_REQUEST_TIMEOUT_MS};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Request dispatcher configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on a single request, from send to response headers.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS) }
    }
}

/// Synthetic order submitted to every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub user_id: u32,
    pub product_id: u32,
    pub quantity: u32,
}

impl OrderPayload {
    /// Random buyer in `0..1000` ordering 1–5 units of product 1.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            user_id: rng.gen_range(0..1000),
            product_id: 1,
            quantity: rng.gen_range(1..=5),
        }
    }
}

/// Issues single timed order submissions and classifies them against the endpoint's
/// success predicate. Never retries.
#[derive(Clone)]
pub struct Client {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config, http_client: reqwest::Client::new() }
    }

    /// Submit one randomly generated order to `endpoint`.
    pub async fn dispatch(&self, endpoint: &EndpointDescriptor) -> RequestOutcome {
        let payload = OrderPayload::random(&mut rand::thread_rng());
        self.dispatch_payload(endpoint, &payload).await
    }

    /// Submit `payload` to `endpoint`, timing from just before send until the response
    /// headers arrive or the request fails.
    pub async fn dispatch_payload(
        &self,
        endpoint: &EndpointDescriptor,
        payload: &OrderPayload,
    ) -> RequestOutcome {
        let request = self
            .http_client
            .post(&endpoint.address)
            .timeout(self.config.timeout)
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .json(payload);

        let start = Instant::now();
        let result = request.send().await;
        let latency_millis = elapsed_millis(start);

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                if endpoint.is_success(status) {
                    RequestOutcome::success(latency_millis)
                } else {
                    debug!(endpoint = %endpoint.name, status, "unexpected status");
                    RequestOutcome::failure(latency_millis)
                }
            }
            Err(e) => {
                debug!(endpoint = %endpoint.name, error = %e, timeout = e.is_timeout(), "request failed");
                RequestOutcome::failure(latency_millis)
            }
        }
    }
}

fn elapsed_millis(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}
