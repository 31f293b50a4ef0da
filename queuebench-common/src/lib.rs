use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod endpoint;
pub mod queue;
pub mod stage;

pub use endpoint::{check_http_url, EndpointDescriptor, EndpointRegistry};
pub use queue::{derive_rate, QueueRateSample, QueueSample, QueueSeries};
pub use stage::{RequestOutcome, StageDescriptor, StageResult};

/// Default bound on a single dispatched request, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on the requests a single stage may issue.
pub const MAX_STAGE_REQUESTS: u64 = 10_000_000;

/// File holding the ordered stage results of the latest run.
pub const RESULTS_FILE: &str = "results.json";

/// File holding the depth/rate series of one monitored queue.
pub fn queue_file_name(queue: &str) -> String {
    format!("queues-{queue}.json")
}

/// Queue names double as file name fragments, so they are restricted to `[A-Za-z0-9_-]`.
pub fn is_valid_queue_name(queue: &str) -> bool {
    !queue.is_empty()
        && queue.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Configuration problems detected before any load is generated.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("Stage field {0} must be at least 1")]
    ZeroStageField(String),

    #[error("At least one stage is required")]
    NoStages,

    #[error("At least one endpoint is required")]
    NoEndpoints,

    #[error("Endpoint name must not be empty")]
    EmptyEndpointName,

    #[error("Duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    #[error("Endpoint {0} accepts no status codes")]
    NoExpectedStatus(String),

    #[error("Stage of {0} requests exceeds the limit of {MAX_STAGE_REQUESTS}")]
    StageTooLarge(String),

    #[error("Invalid address for {0}: {1}")]
    InvalidAddress(String, String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// JSON error envelope returned by the publisher for all error responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result type for configuration checks
pub type Result<T> = std::result::Result<T, ConfigError>;
