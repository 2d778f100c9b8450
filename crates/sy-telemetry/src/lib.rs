//! Telemetry and observability infrastructure for switchyard services.
//!
//! This crate provides the observability layer shared by the dispatcher and
//! the rebalancer daemon. It integrates with the `tracing` ecosystem for
//! structured logging and exposes a process-wide metrics collector with
//! Prometheus and JSON export.
//!
//! Key components:
//! - **Logging**: Human-readable and JSON-formatted output via `tracing-subscriber`
//! - **Metrics**: Thread-safe counters, gauges, and min/max/sum/count histograms

pub mod logging;
pub mod metrics;
