pub mod config;
pub mod drain;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod sampler;
pub mod worker;
