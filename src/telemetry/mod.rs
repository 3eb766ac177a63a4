//! Telemetry Module
//!
//! Logging setup, OpenTelemetry span export, and Prometheus metrics.

pub mod logging;
pub mod metrics;
pub mod trace_export;

pub use logging::{build_filter, init_logging, parse_level, LogFormat, LogHandle};
pub use metrics::DiscoveryMetrics;
pub use trace_export::{TraceExportSettings, DEFAULT_SERVICE_NAME};
