//! Driver Families
//!
//! Each CSI driver family publishes its volume attributes under its own key
//! conventions. [`DriverFamily`] names the families we know about and owns
//! the per-family override rules applied on top of the common mapping.

use crate::domain::ports::{VolumeInfo, NOT_AVAILABLE};
use std::collections::BTreeMap;

// =============================================================================
// Attribute Keys
// =============================================================================

/// Storage-system volume name (PowerFlex, PowerScale)
pub const ATTR_NAME: &str = "Name";
/// Storage pool name (PowerFlex)
pub const ATTR_STORAGE_POOL_NAME: &str = "StoragePoolName";
/// Access protocol (PowerStore)
pub const ATTR_PROTOCOL: &str = "Protocol";
/// PowerScale cluster name
pub const ATTR_CLUSTER_NAME: &str = "ClusterName";
/// PowerScale access zone
pub const ATTR_ACCESS_ZONE: &str = "AccessZone";
/// PowerMax array serial number
pub const ATTR_POWERMAX_SYMID: &str = "powermax/SYMID";
/// PowerMax storage resource pool
pub const ATTR_SRP: &str = "SRP";

/// Protocol reported for every PowerScale volume
pub const PROTOCOL_NFS: &str = "nfs";

/// Number of hyphen-separated fields in a well-formed PowerMax volume handle
const POWERMAX_HANDLE_FIELDS: usize = 7;

// =============================================================================
// Driver Family
// =============================================================================

/// Storage backend family, identified by a substring of the CSI driver name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverFamily {
    /// PowerScale (Isilon): NFS exports addressed by cluster and access zone
    PowerScale,
    /// PowerMax: volume identity is encoded in the volume handle
    PowerMax,
    /// PowerFlex (VxFlex OS): publishes `StorageSystem` and `StoragePoolName`
    PowerFlex,
    /// PowerStore: publishes `arrayID` and `Protocol`, no storage pool
    PowerStore,
    /// Any other driver; only the common mapping applies
    Generic,
}

impl DriverFamily {
    /// Resolve the family of a CSI driver name
    ///
    /// Matching is by substring, checked in declaration order.
    pub fn from_driver(driver: &str) -> Self {
        if driver.contains("isilon") {
            DriverFamily::PowerScale
        } else if driver.contains("powermax") {
            DriverFamily::PowerMax
        } else if driver.contains("vxflexos") || driver.contains("powerflex") {
            DriverFamily::PowerFlex
        } else if driver.contains("powerstore") {
            DriverFamily::PowerStore
        } else {
            DriverFamily::Generic
        }
    }

    /// Apply this family's overrides to a volume already carrying the common
    /// mapping
    pub fn apply_overrides(
        &self,
        info: &mut VolumeInfo,
        attributes: &BTreeMap<String, String>,
        volume_handle: &str,
    ) {
        match self {
            DriverFamily::PowerScale => {
                info.storage_system = format!(
                    "{}:{}",
                    attribute(attributes, ATTR_CLUSTER_NAME),
                    attribute(attributes, ATTR_ACCESS_ZONE)
                );
                info.protocol = PROTOCOL_NFS.to_string();
            }
            DriverFamily::PowerMax => {
                info.storage_system_volume_name = parse_powermax_volume_name(volume_handle);
                info.storage_system = attribute(attributes, ATTR_POWERMAX_SYMID).to_string();
                info.storage_pool_name = attribute(attributes, ATTR_SRP).to_string();
                if info.protocol.is_empty() {
                    info.protocol = NOT_AVAILABLE.to_string();
                }
            }
            DriverFamily::PowerFlex | DriverFamily::PowerStore | DriverFamily::Generic => {}
        }
    }
}

impl std::fmt::Display for DriverFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverFamily::PowerScale => write!(f, "powerscale"),
            DriverFamily::PowerMax => write!(f, "powermax"),
            DriverFamily::PowerFlex => write!(f, "powerflex"),
            DriverFamily::PowerStore => write!(f, "powerstore"),
            DriverFamily::Generic => write!(f, "generic"),
        }
    }
}

/// Look up an attribute, treating a missing key as empty
pub(crate) fn attribute<'a>(attributes: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    attributes.get(key).map(String::as_str).unwrap_or_default()
}

/// Derive the storage-system volume name from a PowerMax volume handle
///
/// A handle of the form `csi-ZYA-pmax-4723028a00-powermax-000120000606-0012D`
/// becomes `0012D:csi-ZYA-pmax-4723028a00-powermax`. Handles with any other
/// number of fields are returned unchanged.
pub fn parse_powermax_volume_name(volume_handle: &str) -> String {
    let fields: Vec<&str> = volume_handle.split('-').collect();
    if fields.len() == POWERMAX_HANDLE_FIELDS {
        format!("{}:{}", fields[6], fields[0..5].join("-"))
    } else {
        volume_handle.to_string()
    }
}
