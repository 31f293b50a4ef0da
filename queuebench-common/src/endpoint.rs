use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::{ConfigError, Result};

/// A named target for load, plus the status codes that count as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub name: String,
    pub address: String,
    pub expected_statuses: Vec<u16>,
}

impl EndpointDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>, expected_statuses: &[u16]) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            expected_statuses: expected_statuses.to_vec(),
        }
    }

    /// Success predicate applied to the HTTP status of every response.
    pub fn is_success(&self, status: u16) -> bool {
        self.expected_statuses.contains(&status)
    }
}

/// Ordered, name-unique set of endpoints. Iteration order is registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointDescriptor>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        let mut seen = HashSet::new();
        for e in &endpoints {
            if e.name.is_empty() {
                return Err(ConfigError::EmptyEndpointName);
            }
            if e.expected_statuses.is_empty() {
                return Err(ConfigError::NoExpectedStatus(e.name.clone()));
            }
            if !seen.insert(e.name.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(e.name.clone()));
            }
            check_http_url(&e.name, &e.address)?;
        }
        Ok(Self { endpoints })
    }

    /// The three order-submission paths under comparison, rooted at `base_url`:
    /// the synchronous path and the two broker-backed asynchronous paths.
    pub fn order_paths(base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        Self::new(vec![
            EndpointDescriptor::new("sync", format!("{base}/orders/sync"), &[200, 201]),
            EndpointDescriptor::new("kafka", format!("{base}/orders/async/kafka"), &[202]),
            EndpointDescriptor::new("rabbitmq", format!("{base}/orders/async/rabbitmq"), &[202]),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Accept only absolute `http`/`https` URLs with a host. `field` names the setting in errors.
pub fn check_http_url(field: &str, raw: &str) -> Result<()> {
    let invalid = |reason: String| ConfigError::InvalidAddress(field.to_string(), reason);
    let url = Url::parse(raw).map_err(|e| invalid(format!("{raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("{raw:?}: scheme must be http or https")));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid(format!("{raw:?}: missing host")));
    }
    Ok(())
}
