//! Tracked drivers and reloadable discovery settings
//!
//! Settings are swapped as a whole; a discovery pass takes one snapshot at
//! its start and never re-reads them mid-iteration.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Attribute keys tried, in order, for the storage-system identifier
pub const DEFAULT_STORAGE_SYSTEM_KEYS: &[&str] = &["StorageSystem", "arrayID"];

// =============================================================================
// Driver Name Set
// =============================================================================

/// Ordered list of CSI driver names to accept (exact match)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverNameSet {
    names: Vec<String>,
}

impl DriverNameSet {
    /// Build a set from driver names, dropping blanks
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .map(Into::into)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as
    /// `csi-vxflexos.dellemc.com,csi-isilon.dellemc.com`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Whether `driver` is tracked
    pub fn contains(&self, driver: &str) -> bool {
        self.names.iter().any(|name| name == driver)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

// =============================================================================
// Discovery Settings
// =============================================================================

/// Settings read by one discovery pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Drivers whose volumes are reported
    pub drivers: DriverNameSet,
    /// Attribute keys tried, in order, for the storage-system identifier
    pub storage_system_keys: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            drivers: DriverNameSet::default(),
            storage_system_keys: DEFAULT_STORAGE_SYSTEM_KEYS
                .iter()
                .map(|key| key.to_string())
                .collect(),
        }
    }
}

impl DiscoverySettings {
    /// Settings tracking `drivers` with the default storage-system keys
    pub fn with_drivers(drivers: DriverNameSet) -> Self {
        Self {
            drivers,
            ..Self::default()
        }
    }
}

// =============================================================================
// Shared Settings
// =============================================================================

/// Settings shared between the config watcher and discovery passes
#[derive(Debug, Default)]
pub struct SharedSettings {
    current: RwLock<Arc<DiscoverySettings>>,
}

impl SharedSettings {
    pub fn new(settings: DiscoverySettings) -> Arc<Self> {
        if settings.drivers.is_empty() {
            warn!("PROVISIONER_NAMES is empty; no provisioners will be used");
        }
        Arc::new(Self {
            current: RwLock::new(Arc::new(settings)),
        })
    }

    /// Current settings; later replacements do not affect the returned value
    pub fn snapshot(&self) -> Arc<DiscoverySettings> {
        self.current.read().clone()
    }

    /// Replace the settings, returning whether anything changed
    pub fn replace(&self, settings: DiscoverySettings) -> bool {
        let mut current = self.current.write();
        if **current == settings {
            return false;
        }
        if settings.drivers.is_empty() {
            warn!("PROVISIONER_NAMES is empty; no provisioners will be used");
        }
        info!(
            drivers = ?settings.drivers.names(),
            storage_system_keys = ?settings.storage_system_keys,
            "Discovery settings updated"
        );
        *current = Arc::new(settings);
        true
    }
}
