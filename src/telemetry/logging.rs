//! Logging Setup
//!
//! Installs the global `tracing` subscriber. The level filter sits behind a
//! reload layer so a changed settings file can adjust verbosity at runtime.
//! Span export to an OpenTelemetry collector is a second reloadable layer.

use super::trace_export::{build_provider, tracer, TraceExportSettings};
use crate::error::{Error, Result};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type ExportLayer = Option<OpenTelemetryLayer<FilteredRegistry, SdkTracer>>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name; anything other than `json` is text
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Parse a level name, defaulting to INFO when unrecognized
pub fn parse_level(value: &str) -> Level {
    match value.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter for `level`, keeping noisy dependencies quiet
pub fn build_filter(level: Level) -> Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "rustls=warn"] {
        let directive = directive
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Handle for changing the active log level and trace export
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    export: Option<ExportHandle>,
}

#[derive(Clone)]
struct ExportHandle {
    layer: reload::Handle<ExportLayer, FilteredRegistry>,
    provider: Arc<Mutex<Option<SdkTracerProvider>>>,
}

impl LogHandle {
    /// Wrap a filter handle; trace export changes are ignored
    pub fn new(filter: reload::Handle<EnvFilter, Registry>) -> Self {
        Self {
            filter,
            export: None,
        }
    }

    /// Swap in a new level
    pub fn set_level(&self, level: Level) -> Result<()> {
        let filter = build_filter(level)?;
        self.filter
            .reload(filter)
            .map_err(|e| Error::Internal(format!("failed to reload log filter: {}", e)))
    }

    /// Rebuild span export; an empty URI turns export off
    pub fn set_trace_export(&self, settings: &TraceExportSettings) -> Result<()> {
        let Some(export) = &self.export else {
            return Ok(());
        };

        let provider = if settings.is_enabled() {
            Some(build_provider(settings)?)
        } else {
            None
        };
        let layer = provider
            .as_ref()
            .map(|provider| tracing_opentelemetry::layer().with_tracer(tracer(provider)));
        export
            .layer
            .reload(layer)
            .map_err(|e| Error::Internal(format!("failed to reload trace export: {}", e)))?;

        let previous = std::mem::replace(&mut *export.provider.lock(), provider);
        if let Some(previous) = previous {
            if let Err(e) = previous.shutdown() {
                warn!(error = %e, "Failed to flush previous trace exporter");
            }
        }

        if settings.is_enabled() {
            info!(
                uri = %settings.uri,
                service = settings.service_name(),
                probability = settings.sampling_ratio(),
                "Configured tracing"
            );
        }
        Ok(())
    }

    /// Flush and stop span export
    pub fn shutdown(&self) {
        let Some(export) = &self.export else {
            return;
        };
        if let Some(provider) = export.provider.lock().take() {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "Failed to flush trace exporter");
            }
        }
    }
}

/// Install the global subscriber
///
/// Trace export starts disabled; enable it with
/// [`LogHandle::set_trace_export`].
pub fn init_logging(level: Level, format: LogFormat) -> Result<LogHandle> {
    let (filter, filter_handle) = reload::Layer::new(build_filter(level)?);
    let (export, export_handle) = reload::Layer::<ExportLayer, FilteredRegistry>::new(None);

    let registry = tracing_subscriber::registry().with(filter).with(export);
    let installed = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    installed.map_err(|e| Error::Internal(format!("failed to install subscriber: {}", e)))?;

    Ok(LogHandle {
        filter: filter_handle,
        export: Some(ExportHandle {
            layer: export_handle,
            provider: Arc::new(Mutex::new(None)),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARN "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
    }

    #[test]
    fn test_build_filter() {
        assert!(build_filter(Level::DEBUG).is_ok());
    }

    #[test]
    fn test_set_level_reloads_filter() {
        let (layer, reload_handle) = reload::Layer::new(build_filter(Level::INFO).unwrap());
        let _subscriber = tracing_subscriber::registry().with(layer);
        let handle = LogHandle::new(reload_handle.clone());
        let before = reload_handle.with_current(|f| f.to_string()).unwrap();

        handle.set_level(Level::ERROR).unwrap();

        let after = reload_handle.with_current(|f| f.to_string()).unwrap();
        assert_ne!(before, after);
        assert!(after.contains("error"));
    }

    #[test]
    fn test_trace_export_without_export_layer_is_noop() {
        let (layer, reload_handle) = reload::Layer::new(build_filter(Level::INFO).unwrap());
        let _subscriber = tracing_subscriber::registry().with(layer);
        let handle = LogHandle::new(reload_handle);

        let settings = TraceExportSettings {
            uri: "http://127.0.0.1:4318/v1/traces".into(),
            ..TraceExportSettings::default()
        };
        assert!(handle.set_trace_export(&settings).is_ok());
        handle.shutdown();
    }
}
