//! Discovery Metrics
//!
//! Prometheus instruments for discovery passes, held in a service-owned
//! registry and rendered in the text exposition format.

use crate::error::{Error, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Metrics recorded by every discovery pass
pub struct DiscoveryMetrics {
    registry: Registry,
    discoveries: IntCounter,
    failures: IntCounter,
    duration: Histogram,
    volumes: IntGauge,
}

impl DiscoveryMetrics {
    /// Create and register the discovery instruments
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new();

        let discoveries = IntCounter::new(
            "csi_topology_discoveries_total",
            "Total number of volume discovery passes",
        )?;
        let failures = IntCounter::new(
            "csi_topology_discovery_failures_total",
            "Number of discovery passes that failed to list volumes",
        )?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            "csi_topology_discovery_duration_seconds",
            "Duration of volume discovery passes",
        ))?;
        let volumes = IntGauge::new(
            "csi_topology_volumes",
            "Normalized volumes returned by the last successful discovery",
        )?;

        registry.register(Box::new(discoveries.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(volumes.clone()))?;

        Ok(Arc::new(Self {
            registry,
            discoveries,
            failures,
            duration,
            volumes,
        }))
    }

    /// Record a completed discovery
    pub fn record_success(&self, elapsed: Duration, volume_count: usize) {
        self.discoveries.inc();
        self.duration.observe(elapsed.as_secs_f64());
        self.volumes.set(volume_count as i64);
    }

    /// Record a discovery that failed to list volumes
    pub fn record_failure(&self, elapsed: Duration) {
        self.discoveries.inc();
        self.failures.inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn discoveries(&self) -> u64 {
        self.discoveries.get()
    }

    pub fn failures(&self) -> u64 {
        self.failures.get()
    }

    pub fn last_volume_count(&self) -> i64 {
        self.volumes.get()
    }

    /// Render all instruments in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics not UTF-8: {}", e)))
    }

    /// Content type of [`DiscoveryMetrics::encode`] output
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}
