//! Comparative load testing.
//!
//! This module provides the pieces of a benchmark suite run:
//! - Endpoint descriptors with path parameters, query, headers and payload
//! - A request executor classifying every request as a success or failure
//! - A load scheduler with a linear ramp-up and a fixed-rate steady state
//! - Exact-percentile result aggregation
//! - Side-by-side comparison reports
//! - A mock target server for local runs and tests

pub mod config;
pub mod endpoint;
pub mod executor;
pub mod metrics;
pub mod mock_server;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use config::{BenchmarkConfig, LivenessConfig, LoadProfile, MockServerConfig, Target};
pub use endpoint::{default_suite, validate_suite, EndpointDescriptor, Method};
pub use executor::{PreparedRequest, RequestExecutor};
pub use metrics::{BenchmarkResult, Failure, FailureSummary, RequestOutcome, ResultAggregator};
pub use mock_server::MockTargetServer;
pub use report::{ComparisonReport, ComparisonRow, Delta, DetailedResults, ResultPair, SuiteSummary};
pub use runner::BenchmarkRunner;
pub use scheduler::{LoadScheduler, ScheduledRun};
