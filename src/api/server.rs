//! API Server
//!
//! Serves the REST router over HTTP, or HTTPS when a certificate and key
//! are configured.

use crate::error::{Error, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Time allowed for in-flight requests after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// Server Configuration
// =============================================================================

/// TLS key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Serve HTTPS with these files; plain HTTP when `None`
    pub tls: Option<TlsFiles>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tls: None,
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// HTTP(S) server for the dashboard datasource API
pub struct ApiServer {
    config: ApiServerConfig,
    router: Router,
    shutdown_tx: broadcast::Sender<()>,
    bound_tx: watch::Sender<Option<SocketAddr>>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, router: Router) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (bound_tx, _) = watch::channel(None);

        Self {
            config,
            router,
            shutdown_tx,
            bound_tx,
        }
    }

    /// Address the listener is bound to, once it is listening
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut bound_rx = self.bound_tx.subscribe();
        let bound = bound_rx.wait_for(Option::is_some).await.ok()?;
        *bound
    }

    /// Run until the server fails or [`ApiServer::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        match &self.config.tls {
            Some(tls) => self.run_https(tls, shutdown_rx).await,
            None => {
                warn!("TLS disabled; serving plain HTTP");
                self.run_http(shutdown_rx).await
            }
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn run_http(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", self.config.addr, e)))?;
        let addr = listener.local_addr()?;
        self.bound_tx.send_replace(Some(addr));

        info!("HTTP API listening on {}", addr);

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))
    }

    async fn run_https(
        &self,
        tls: &TlsFiles,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        // Already installed on later calls.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                Error::Configuration(format!(
                    "Failed to load TLS certificate {} / key {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                ))
            })?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            info!("HTTPS server shutting down");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        let listening = handle.clone();
        let bound_tx = self.bound_tx.clone();
        let cert = tls.cert_path.display().to_string();
        tokio::spawn(async move {
            if let Some(addr) = listening.listening().await {
                info!(address = %addr, cert = %cert, "HTTPS API listening");
                bound_tx.send_replace(Some(addr));
            }
        });

        axum_server::bind_rustls(self.config.addr, rustls_config)
            .handle(handle)
            .serve(self.router.clone().into_make_service())
            .await
            .map_err(|e| Error::Internal(format!("HTTPS server error: {}", e)))
    }
}
