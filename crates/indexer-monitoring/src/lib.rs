//! Monitoring and observability for the indexer.
//!
//! - `health`: health status types and the check registry backing the
//!   `/health` endpoint
//! - `metrics`: per-chain service counters shared between workers and
//!   the metrics surface
//! - `tracing`: subscriber initialization for the service binary

pub mod health;
pub mod metrics;
pub mod tracing;

pub use health::{HealthCheck, HealthChecker, HealthStatus};
pub use metrics::{MetricsSnapshot, ServiceMetrics};
