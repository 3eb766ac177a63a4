//! Trace Export
//!
//! Ships `tracing` spans to an OpenTelemetry collector over OTLP/HTTP.
//! Export is off unless a collector URI is configured.

use crate::error::{Error, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

/// Service name reported when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "csi-topology";

/// Instrumentation scope of exported spans
const TRACER_NAME: &str = "csi-topology";

/// Collector and sampling settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceExportSettings {
    /// OTLP/HTTP traces endpoint, e.g. `http://collector:4318/v1/traces`
    pub uri: String,
    pub service_name: String,
    /// Fraction of traces sampled, clamped to `0.0..=1.0`
    pub probability: f64,
}

impl TraceExportSettings {
    pub fn is_enabled(&self) -> bool {
        !self.uri.trim().is_empty()
    }

    pub fn service_name(&self) -> &str {
        match self.service_name.trim() {
            "" => DEFAULT_SERVICE_NAME,
            name => name,
        }
    }

    /// Sampling ratio; out-of-range or non-finite values are clamped
    pub fn sampling_ratio(&self) -> f64 {
        if self.probability.is_finite() {
            self.probability.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::TraceIdRatioBased(self.sampling_ratio())
    }
}

/// Build a batching tracer provider exporting to `settings.uri`
pub fn build_provider(settings: &TraceExportSettings) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(settings.uri.trim())
        .build()
        .map_err(|e| {
            Error::Configuration(format!("failed to build span exporter for {}: {}", settings.uri, e))
        })?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(settings.sampler())
        .with_resource(
            Resource::builder()
                .with_service_name(settings.service_name().to_string())
                .build(),
        )
        .build())
}

/// Tracer used by the export layer
pub fn tracer(provider: &SdkTracerProvider) -> SdkTracer {
    provider.tracer(TRACER_NAME)
}
