//! Cluster Volume Client
//!
//! Lists persistent volumes from the Kubernetes API. The connection is
//! established lazily on first use and reused by every later call.

use crate::domain::ports::VolumeLister;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use kube::api::{Api, ListParams};
use kube::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

// =============================================================================
// Cluster Connector
// =============================================================================

/// Establishes connections to the control plane and issues list calls on them
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    /// Reusable connection handle
    type Connection: Clone + Send + Sync;

    /// Open a new connection
    async fn connect(&self) -> Result<Self::Connection>;

    /// List every persistent volume over an established connection
    async fn list_persistent_volumes(
        &self,
        connection: &Self::Connection,
    ) -> Result<Vec<PersistentVolume>>;
}

/// Connector backed by `kube`, using in-cluster config with kubeconfig fallback
#[derive(Debug, Clone, Default)]
pub struct KubeConnector;

#[async_trait]
impl ClusterConnector for KubeConnector {
    type Connection = Client;

    async fn connect(&self) -> Result<Client> {
        Client::try_default()
            .await
            .map_err(|e| Error::ClusterConnection(e.to_string()))
    }

    async fn list_persistent_volumes(&self, client: &Client) -> Result<Vec<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }
}

// =============================================================================
// Cluster Volume Client
// =============================================================================

/// Lazily connected persistent volume client
///
/// The lock only spans connection setup. Once connected, list calls run on a
/// cloned handle so concurrent requests are not serialized behind each other.
pub struct ClusterVolumeClient<C: ClusterConnector = KubeConnector> {
    connector: C,
    connection: Mutex<Option<C::Connection>>,
}

impl ClusterVolumeClient<KubeConnector> {
    /// Create a client for the cluster this process runs in
    pub fn in_cluster() -> Self {
        Self::new(KubeConnector)
    }
}

impl<C: ClusterConnector> ClusterVolumeClient<C> {
    /// Create a client that connects through `connector` on first use
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connection: Mutex::new(None),
        }
    }

    /// Whether a connection has been established
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Return the shared connection, connecting if needed
    ///
    /// A failed connect leaves the slot empty so the next call tries again.
    async fn connection(&self) -> Result<C::Connection> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        debug!("Connecting to cluster control plane");
        let connection = self.connector.connect().await?;
        info!("Connected to cluster control plane");
        *slot = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl<C> VolumeLister for ClusterVolumeClient<C>
where
    C: ClusterConnector + 'static,
    C::Connection: 'static,
{
    async fn fetch_all(&self) -> Result<Vec<PersistentVolume>> {
        let connection = self.connection().await?;
        let volumes = self.connector.list_persistent_volumes(&connection).await?;
        debug!("Listed {} persistent volumes", volumes.len());
        Ok(volumes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Connector that counts connects and can be told to fail them
    #[derive(Default)]
    struct FakeConnector {
        connects: Arc<AtomicUsize>,
        lists: Arc<AtomicUsize>,
        fail_connect: Arc<AtomicBool>,
        connect_delay: Option<Duration>,
    }

    #[async_trait]
    impl ClusterConnector for FakeConnector {
        type Connection = usize;

        async fn connect(&self) -> Result<usize> {
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(Error::ClusterConnection("unable to load in-cluster config".into()));
            }
            Ok(self.connects.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn list_persistent_volumes(&self, _connection: &usize) -> Result<Vec<PersistentVolume>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(vec![PersistentVolume {
                metadata: ObjectMeta {
                    name: Some("pv-1".into()),
                    ..ObjectMeta::default()
                },
                ..PersistentVolume::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_connects_once_and_reuses_connection() {
        let connector = FakeConnector::default();
        let connects = connector.connects.clone();
        let lists = connector.lists.clone();
        let client = ClusterVolumeClient::new(connector);

        assert!(!client.is_connected().await);

        let first = client.fetch_all().await.unwrap();
        let second = client.fetch_all().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(lists.load(Ordering::SeqCst), 2);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_and_retries_next_call() {
        let connector = FakeConnector::default();
        let fail = connector.fail_connect.clone();
        let connects = connector.connects.clone();
        let lists = connector.lists.clone();
        fail.store(true, Ordering::SeqCst);
        let client = ClusterVolumeClient::new(connector);

        let result = client.fetch_all().await;
        assert_matches!(result, Err(Error::ClusterConnection(_)));
        assert!(!client.is_connected().await);
        assert_eq!(lists.load(Ordering::SeqCst), 0);

        fail.store(false, Ordering::SeqCst);
        tokio_test::assert_ok!(client.fetch_all().await);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_single_connect() {
        let connector = FakeConnector {
            connect_delay: Some(Duration::from_millis(20)),
            ..FakeConnector::default()
        };
        let connects = connector.connects.clone();
        let client = Arc::new(ClusterVolumeClient::new(connector));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.fetch_all().await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }
}
