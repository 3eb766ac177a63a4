//! Domain Ports - Core types and trait definitions for volume discovery
//!
//! These traits define the boundaries between the discovery logic, the
//! cluster control plane, and the HTTP layer. Adapters implement them to
//! provide concrete functionality; tests implement them with fakes.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Value used for any field the source data leaves unresolved
pub const NOT_AVAILABLE: &str = "N/A";

// =============================================================================
// Normalized Volume
// =============================================================================

/// Uniform view of a CSI persistent volume and the storage-system volume
/// backing it
///
/// Every field is populated once construction finishes; unresolved source
/// data is represented by [`NOT_AVAILABLE`] or a driver-specific fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Namespace of the bound claim
    pub namespace: String,
    /// UID of the bound claim
    pub persistent_volume_claim: String,
    /// Volume status phase (e.g. Bound, Released)
    pub volume_status: String,
    /// Name of the bound claim
    pub volume_claim_name: String,
    /// Persistent volume name
    pub persistent_volume: String,
    /// Storage class name
    pub storage_class: String,
    /// CSI driver identifier
    pub driver: String,
    /// Provisioned capacity as a Kubernetes quantity (e.g. "16Gi")
    pub provisioned_size: String,
    /// Name of the volume on the storage system
    pub storage_system_volume_name: String,
    /// Storage pool on the storage system
    pub storage_pool_name: String,
    /// Storage system identifier
    pub storage_system: String,
    /// Access protocol
    pub protocol: String,
    /// Volume creation timestamp
    pub created_time: String,
}

// =============================================================================
// Volume Lister Port
// =============================================================================

/// Port for listing raw persistent volumes from the cluster control plane
#[async_trait]
pub trait VolumeLister: Send + Sync {
    /// Return every persistent volume in the cluster, unfiltered
    async fn fetch_all(&self) -> Result<Vec<PersistentVolume>>;
}

// =============================================================================
// Volume Info Getter Port
// =============================================================================

/// Port used by the HTTP layer to run one discovery pass
#[async_trait]
pub trait VolumeInfoGetter: Send + Sync {
    /// Discover and normalize the volumes of all tracked drivers
    async fn get_persistent_volumes(&self) -> Result<Vec<VolumeInfo>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type VolumeListerRef = Arc<dyn VolumeLister>;
pub type VolumeInfoGetterRef = Arc<dyn VolumeInfoGetter>;
