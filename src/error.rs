//! Error types for the CSI topology service
//!
//! Provides one structured error type for volume discovery, request
//! decoding, response encoding, and service configuration.

use thiserror::Error;

/// Unified error type for the service
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Cluster connection failed: {0}")]
    ClusterConnection(String),

    // =========================================================================
    // Request/Response Errors
    // =========================================================================
    #[error("Request body decode error: {0}")]
    RequestDecode(String),

    #[error("Query target decode error for {target:?}: {reason}")]
    TargetDecode { target: String, reason: String },

    #[error("Response encode error: {0}")]
    ResponseEncode(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure class of an error, used for diagnostics only
///
/// Every kind surfaces to dashboard clients as the same generic server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cluster connection or list call failed
    Transport,
    /// Inbound request body or target could not be decoded
    RequestDecoding,
    /// Computed response could not be encoded
    ResponseEncoding,
    /// Bad settings
    Configuration,
    /// Everything else
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::RequestDecoding => write!(f, "request_decoding"),
            ErrorKind::ResponseEncoding => write!(f, "response_encoding"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Kube(_) | Error::ClusterConnection(_) => ErrorKind::Transport,

            Error::RequestDecode(_) | Error::TargetDecode { .. } => ErrorKind::RequestDecoding,

            Error::ResponseEncode(_) => ErrorKind::ResponseEncoding,

            Error::Configuration(_) | Error::YamlParse(_) => ErrorKind::Configuration,

            Error::Internal(_) | Error::Metrics(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error came from talking to the cluster
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, Error>;
