//! CSI Topology - Volume Topology Datasource
//!
//! Discovers CSI persistent volumes in a Kubernetes cluster, normalizes the
//! driver-specific attributes of tracked drivers, and serves the result as a
//! table datasource for dashboards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    REST API (axum, TLS)                       │
//! │     /query  /topology.json  /search  /metrics  /debug/vars    │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │        JSON Codec            │   Filter / Table Projection   │
//! ├──────────────────────────────┴───────────────────────────────┤
//! │                    Volume Finder                              │
//! │        (settings snapshot, normalizer, metrics)               │
//! ├──────────────────────────────────────────────────────────────┤
//! │              Cluster Volume Client (kube)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: HTTP routes, JSON codec, and server
//! - [`config`]: CLI/env settings and the reloadable settings file
//! - [`discovery`]: driver tracking and volume normalization
//! - [`domain`]: normalized volume record and ports
//! - [`error`]: Error types and handling
//! - [`k8s`]: Kubernetes client
//! - [`query`]: filtering and response projection
//! - [`telemetry`]: logging and Prometheus metrics

pub mod api;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod k8s;
pub mod query;
pub mod telemetry;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, JsonCodec, RestRouter, SerdeJsonCodec, TlsFiles};

pub use config::{ConfigWatcher, EffectiveSettings, ServiceArgs, SettingsFile};

pub use discovery::{
    normalize, DiscoverySettings, DriverFamily, DriverNameSet, SharedSettings, VolumeFinder,
};

pub use domain::ports::{
    VolumeInfo, VolumeInfoGetter, VolumeInfoGetterRef, VolumeLister, VolumeListerRef,
    NOT_AVAILABLE,
};

pub use error::{Error, ErrorKind, Result};

pub use k8s::{ClusterConnector, ClusterVolumeClient, KubeConnector};

pub use query::{filter_volumes, project_distinct, project_table, FilterField, TableResponse};

pub use telemetry::{init_logging, DiscoveryMetrics, LogFormat, LogHandle, TraceExportSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
