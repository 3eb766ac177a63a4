//! Record Filter
//!
//! Narrows normalized volumes by dashboard-supplied predicates. Each
//! predicate maps a display field name to a substring that field must
//! contain; all pairs across all predicates must hold.

use crate::domain::ports::VolumeInfo;
use std::collections::BTreeMap;

/// Display field name to required substring
pub type FilterPredicate = BTreeMap<String, String>;

// =============================================================================
// Filterable Fields
// =============================================================================

/// Fields dashboards may filter on or list distinct values for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Namespace,
    Protocol,
    Status,
    CsiDriver,
    StoragePool,
    StorageSystem,
    StorageClass,
}

impl FilterField {
    pub const ALL: [FilterField; 7] = [
        FilterField::Namespace,
        FilterField::Protocol,
        FilterField::Status,
        FilterField::CsiDriver,
        FilterField::StoragePool,
        FilterField::StorageSystem,
        FilterField::StorageClass,
    ];

    /// Resolve a display name; names are case-sensitive
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Display name used by dashboards
    pub fn name(&self) -> &'static str {
        match self {
            FilterField::Namespace => "Namespace",
            FilterField::Protocol => "Protocol",
            FilterField::Status => "Status",
            FilterField::CsiDriver => "CSI Driver",
            FilterField::StoragePool => "Storage Pool",
            FilterField::StorageSystem => "Storage System",
            FilterField::StorageClass => "Storage Class",
        }
    }

    /// Value of this field on `volume`
    pub fn value<'a>(&self, volume: &'a VolumeInfo) -> &'a str {
        match self {
            FilterField::Namespace => &volume.namespace,
            FilterField::Protocol => &volume.protocol,
            FilterField::Status => &volume.volume_status,
            FilterField::CsiDriver => &volume.driver,
            FilterField::StoragePool => &volume.storage_pool_name,
            FilterField::StorageSystem => &volume.storage_system,
            FilterField::StorageClass => &volume.storage_class,
        }
    }
}

impl std::fmt::Display for FilterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Matching
// =============================================================================

/// Whether `volume` satisfies every pair of every predicate
///
/// Unknown field names reject the record. An empty predicate list matches.
pub fn matches(volume: &VolumeInfo, predicates: &[FilterPredicate]) -> bool {
    predicates.iter().flatten().all(|(name, substring)| {
        FilterField::from_name(name)
            .map(|field| field.value(volume).contains(substring.as_str()))
            .unwrap_or(false)
    })
}

/// Keep the volumes matching `predicates`, preserving order
pub fn filter_volumes<'a>(
    volumes: &'a [VolumeInfo],
    predicates: &'a [FilterPredicate],
) -> impl Iterator<Item = &'a VolumeInfo> + 'a {
    volumes.iter().filter(move |volume| matches(volume, predicates))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn volume(namespace: &str, driver: &str, protocol: &str) -> VolumeInfo {
        VolumeInfo {
            namespace: namespace.into(),
            persistent_volume_claim: format!("uid-{}", namespace),
            volume_status: "Bound".into(),
            volume_claim_name: format!("pvc-{}", namespace),
            persistent_volume: format!("pv-{}", namespace),
            storage_class: "powerflex-sc".into(),
            driver: driver.into(),
            provisioned_size: "8Gi".into(),
            storage_system_volume_name: format!("vol-{}", namespace),
            storage_pool_name: "pool-a".into(),
            storage_system: "system-1".into(),
            protocol: protocol.into(),
            created_time: "2022-11-28 06:12:34 UTC".into(),
        }
    }

    fn predicate(pairs: &[(&str, &str)]) -> FilterPredicate {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in FilterField::ALL {
            assert_eq!(FilterField::from_name(field.name()), Some(field));
        }
        assert_eq!(FilterField::from_name("namespace"), None);
        assert_eq!(FilterField::from_name("Persistent Volume"), None);
    }

    #[test]
    fn test_empty_predicates_match_everything() {
        assert!(matches(&volume("ns-1", "csi-vxflexos.dellemc.com", "scsi"), &[]));
        assert!(matches(&volume("ns-1", "csi-vxflexos.dellemc.com", "scsi"), &[FilterPredicate::new()]));
    }

    #[test]
    fn test_namespace_filter() {
        let volumes = vec![
            volume("ns-1", "csi-vxflexos.dellemc.com", "scsi"),
            volume("ns-2", "csi-vxflexos.dellemc.com", "scsi"),
        ];
        let predicates = vec![predicate(&[("Namespace", "ns-1")])];

        let matched: Vec<_> = filter_volumes(&volumes, &predicates).collect();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].namespace, "ns-1");
    }

    #[test]
    fn test_substring_match_is_case_sensitive() {
        let record = volume("production-db", "csi-isilon.dellemc.com", "nfs");

        assert!(matches(&record, &[predicate(&[("Namespace", "prod")])]));
        assert!(matches(&record, &[predicate(&[("CSI Driver", "isilon")])]));
        assert!(!matches(&record, &[predicate(&[("Namespace", "PROD")])]));
    }

    #[test]
    fn test_unknown_field_fails_closed() {
        let record = volume("ns-1", "csi-vxflexos.dellemc.com", "scsi");
        assert!(!matches(&record, &[predicate(&[("Owner", "")])]));
        assert!(!matches(&record, &[predicate(&[("Namespace", "ns"), ("Owner", "x")])]));
    }

    #[test]
    fn test_predicates_are_anded_across_maps() {
        let volumes = vec![
            volume("ns-1", "csi-vxflexos.dellemc.com", "scsi"),
            volume("ns-2", "csi-isilon.dellemc.com", "nfs"),
        ];
        // Each map matches one record, but no record matches both.
        let predicates = vec![
            predicate(&[("Namespace", "ns-1")]),
            predicate(&[("Protocol", "nfs")]),
        ];

        assert_eq!(filter_volumes(&volumes, &predicates).count(), 0);

        let predicates = vec![
            predicate(&[("Namespace", "ns-2")]),
            predicate(&[("Protocol", "nfs"), ("Storage Pool", "pool")]),
        ];
        let matched: Vec<_> = filter_volumes(&volumes, &predicates).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].namespace, "ns-2");
    }

    #[test]
    fn test_all_fields_resolve() {
        let record = volume("ns-1", "csi-vxflexos.dellemc.com", "scsi");
        let predicates = vec![predicate(&[
            ("Namespace", "ns-1"),
            ("Protocol", "scsi"),
            ("Status", "Bound"),
            ("CSI Driver", "vxflexos"),
            ("Storage Pool", "pool-a"),
            ("Storage System", "system-1"),
            ("Storage Class", "powerflex"),
        ])];
        assert!(matches(&record, &predicates));
    }
}
