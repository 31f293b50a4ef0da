use serde::{Deserialize, Serialize};

/// One sampler reading. `depth` is `None` when the provider could not answer;
/// an unknown depth is never the same thing as an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSample {
    pub offset_seconds: f64,
    pub depth: Option<u64>,
}

/// Enqueue/dequeue rate between two consecutive samples of the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRateSample {
    pub offset_seconds: f64,
    pub in_rate: u64,
    pub out_rate: u64,
}

/// Derive the rate sample for `current` from the immediately preceding sample.
///
/// Rates are deltas floored at zero; both are zero if either depth is unknown.
pub fn derive_rate(previous: &QueueSample, current: &QueueSample) -> QueueRateSample {
    let (in_rate, out_rate) = match (previous.depth, current.depth) {
        (Some(prev), Some(cur)) => (cur.saturating_sub(prev), prev.saturating_sub(cur)),
        _ => (0, 0),
    };
    QueueRateSample { offset_seconds: current.offset_seconds, in_rate, out_rate }
}

/// Depth and rate time series for one monitored queue over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSeries {
    pub queue: String,
    pub samples: Vec<QueueSample>,
    pub rates: Vec<QueueRateSample>,
}

impl QueueSeries {
    pub fn new(queue: impl Into<String>) -> Self {
        Self { queue: queue.into(), samples: Vec::new(), rates: Vec::new() }
    }

    /// Append a sample, deriving a rate sample from the previous one if there is one.
    pub fn record(&mut self, sample: QueueSample) {
        if let Some(previous) = self.samples.last() {
            self.rates.push(derive_rate(previous, &sample));
        }
        self.samples.push(sample);
    }
}
