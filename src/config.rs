//! Service Configuration
//!
//! Static settings come from the command line or environment. Discovery
//! settings, the log level and trace export may also be set in a YAML
//! settings file, which is polled and re-applied while the service runs.

use crate::api::{ApiServerConfig, TlsFiles};
use crate::discovery::{DiscoverySettings, DriverNameSet, SharedSettings};
use crate::error::{Error, Result};
use crate::telemetry::{parse_level, LogFormat, LogHandle, TraceExportSettings};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Level};

/// Settings file read when none is given
pub const DEFAULT_CONFIG_FILE: &str = "/etc/config/csi-topology.yaml";

/// Certificate served when none is given
pub const DEFAULT_TLS_CERT: &str = "/certs/localhost.crt";

/// Private key served when none is given
pub const DEFAULT_TLS_KEY: &str = "/certs/localhost.key";

/// Port used with TLS when none is given
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Port used without TLS when none is given
pub const DEFAULT_HTTP_PORT: u16 = 8080;

// =============================================================================
// CLI Arguments
// =============================================================================

/// CSI Topology - CSI volume topology datasource for dashboards
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServiceArgs {
    /// Address to bind the API server to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// API port (443 with TLS, 8080 with --insecure, when unset)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// PEM certificate for HTTPS
    #[arg(long, env = "TLS_CERT_PATH", default_value = DEFAULT_TLS_CERT)]
    pub tls_cert: PathBuf,

    /// PEM private key for HTTPS
    #[arg(long, env = "TLS_KEY_PATH", default_value = DEFAULT_TLS_KEY)]
    pub tls_key: PathBuf,

    /// Serve plain HTTP instead of HTTPS
    #[arg(long, env = "INSECURE")]
    pub insecure: bool,

    /// Expose debug endpoints
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Reloadable YAML settings file
    #[arg(long = "config", env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Settings file poll interval in seconds
    #[arg(long, env = "CONFIG_RELOAD_INTERVAL", default_value = "10")]
    pub reload_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Comma-separated CSI driver names to report
    #[arg(long, env = "PROVISIONER_NAMES", default_value = "")]
    pub provisioner_names: String,

    /// Comma-separated attribute keys tried for the storage-system identifier
    #[arg(long, env = "STORAGE_SYSTEM_KEYS", default_value = "StorageSystem,arrayID")]
    pub storage_system_keys: String,

    /// OTLP/HTTP traces endpoint; span export is off when empty
    #[arg(long, env = "TRACING_URI", default_value = "")]
    pub tracing_uri: String,

    /// Service name attached to exported spans
    #[arg(long, env = "TRACING_SERVICE_NAME", default_value = "")]
    pub tracing_service_name: String,

    /// Fraction of traces exported (0.0 to 1.0)
    #[arg(long, env = "TRACING_PROBABILITY", default_value = "0")]
    pub tracing_probability: f64,
}

impl ServiceArgs {
    /// Server bind address and TLS settings
    pub fn api_server_config(&self) -> Result<ApiServerConfig> {
        let tls = if self.insecure {
            None
        } else {
            if self.tls_cert.as_os_str().is_empty() || self.tls_key.as_os_str().is_empty() {
                return Err(Error::Configuration(format!(
                    "One or more TLS certificates not supplied: CertFile: {}, KeyFile: {}",
                    self.tls_cert.display(),
                    self.tls_key.display()
                )));
            }
            Some(TlsFiles {
                cert_path: self.tls_cert.clone(),
                key_path: self.tls_key.clone(),
            })
        };

        let default_port = if tls.is_some() {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_HTTP_PORT
        };
        let port = self.port.unwrap_or(default_port);

        Ok(ApiServerConfig {
            addr: SocketAddr::new(self.bind_address, port),
            tls,
        })
    }

    /// Settings file poll interval
    pub fn reload_interval(&self) -> Result<Duration> {
        if self.reload_interval_secs == 0 {
            return Err(Error::Configuration(
                "CONFIG_RELOAD_INTERVAL must be at least 1 second".into(),
            ));
        }
        Ok(Duration::from_secs(self.reload_interval_secs))
    }
}

// =============================================================================
// Settings File
// =============================================================================

/// Reloadable settings; every key is optional and overrides the CLI/env value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(rename = "PROVISIONER_NAMES", alias = "provisioner_names", default)]
    pub provisioner_names: Option<String>,

    #[serde(rename = "LOG_LEVEL", alias = "log_level", default)]
    pub log_level: Option<String>,

    #[serde(rename = "LOG_FORMAT", alias = "log_format", default)]
    pub log_format: Option<String>,

    #[serde(rename = "STORAGE_SYSTEM_KEYS", alias = "storage_system_keys", default)]
    pub storage_system_keys: Option<String>,

    #[serde(rename = "TRACING_URI", alias = "tracing_uri", default)]
    pub tracing_uri: Option<String>,

    #[serde(rename = "TRACING_SERVICE_NAME", alias = "tracing_service_name", default)]
    pub tracing_service_name: Option<String>,

    #[serde(rename = "TRACING_PROBABILITY", alias = "tracing_probability", default)]
    pub tracing_probability: Option<f64>,
}

impl SettingsFile {
    /// Read and parse `path`; `None` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&contents).map(Some)
    }

    /// Parse YAML settings; an empty document is valid
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

// =============================================================================
// Effective Settings
// =============================================================================

/// Settings after layering the settings file over CLI/env values
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub discovery: DiscoverySettings,
    pub log_level: Level,
    pub log_format: LogFormat,
    pub traces: TraceExportSettings,
}

impl EffectiveSettings {
    pub fn resolve(args: &ServiceArgs, file: Option<&SettingsFile>) -> Self {
        let pick = |from_file: Option<&String>, base: &str| -> String {
            from_file.cloned().unwrap_or_else(|| base.to_string())
        };

        let provisioner_names = pick(file.and_then(|f| f.provisioner_names.as_ref()), &args.provisioner_names);
        let log_level = pick(file.and_then(|f| f.log_level.as_ref()), &args.log_level);
        let log_format = pick(file.and_then(|f| f.log_format.as_ref()), &args.log_format);
        let storage_system_keys = pick(
            file.and_then(|f| f.storage_system_keys.as_ref()),
            &args.storage_system_keys,
        );

        let mut discovery = DiscoverySettings::with_drivers(DriverNameSet::parse(&provisioner_names));
        let keys: Vec<String> = storage_system_keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        if !keys.is_empty() {
            discovery.storage_system_keys = keys;
        }

        let traces = TraceExportSettings {
            uri: pick(file.and_then(|f| f.tracing_uri.as_ref()), &args.tracing_uri),
            service_name: pick(
                file.and_then(|f| f.tracing_service_name.as_ref()),
                &args.tracing_service_name,
            ),
            probability: file
                .and_then(|f| f.tracing_probability)
                .unwrap_or(args.tracing_probability),
        };

        Self {
            discovery,
            log_level: parse_level(&log_level),
            log_format: LogFormat::parse(&log_format),
            traces,
        }
    }
}

// =============================================================================
// Config Watcher
// =============================================================================

/// Polls the settings file and applies changes
pub struct ConfigWatcher {
    args: ServiceArgs,
    settings: Arc<SharedSettings>,
    log: Option<LogHandle>,
    last: Option<SettingsFile>,
    traces: TraceExportSettings,
}

impl ConfigWatcher {
    /// `current` is the file content already applied at startup
    pub fn new(
        args: ServiceArgs,
        settings: Arc<SharedSettings>,
        log: Option<LogHandle>,
        current: Option<SettingsFile>,
    ) -> Self {
        let traces = EffectiveSettings::resolve(&args, current.as_ref()).traces;
        Self {
            args,
            settings,
            log,
            last: current,
            traces,
        }
    }

    /// Re-read the settings file, applying it if it changed
    ///
    /// Returns whether new settings were applied. On error the previous
    /// settings stay in effect.
    pub fn check(&mut self) -> Result<bool> {
        let file = SettingsFile::load(&self.args.config_file)?;
        if file == self.last {
            return Ok(false);
        }

        info!(file = %self.args.config_file.display(), "Configuration updated");
        let effective = EffectiveSettings::resolve(&self.args, file.as_ref());
        self.settings.replace(effective.discovery);
        if let Some(log) = &self.log {
            log.set_level(effective.log_level)?;
            if effective.traces != self.traces {
                if let Err(e) = log.set_trace_export(&effective.traces) {
                    error!(error = %e, "Tracing initialization failed");
                }
            }
        }
        self.traces = effective.traces;
        self.last = file;
        Ok(true)
    }

    /// Poll until shutdown
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = match self.args.reload_interval() {
            Ok(interval) => interval,
            Err(e) => {
                warn!(error = %e, "Settings reload disabled");
                return;
            }
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check() {
                        Ok(true) => {}
                        Ok(false) => debug!("Settings unchanged"),
                        Err(e) => warn!(error = %e, "Failed to reload settings; keeping previous"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Config watcher stopping");
                    return;
                }
            }
        }
    }
}
