//! Driver Normalizer
//!
//! Maps raw persistent volumes onto [`VolumeInfo`]. Volumes without a CSI
//! source, or whose driver is not tracked, are skipped. Malformed or
//! missing source data never fails a record; it resolves to a fallback.

use super::driver::{attribute, DriverFamily, ATTR_NAME, ATTR_PROTOCOL, ATTR_STORAGE_POOL_NAME};
use super::drivers::DiscoverySettings;
use crate::domain::ports::{VolumeInfo, NOT_AVAILABLE};
use k8s_openapi::api::core::v1::PersistentVolume;
use std::collections::BTreeMap;
use tracing::debug;

/// Capacity key of the volume's resource list
const RESOURCE_STORAGE: &str = "storage";

/// Normalize every tracked CSI volume in `volumes`, preserving input order
pub fn normalize(volumes: &[PersistentVolume], settings: &DiscoverySettings) -> Vec<VolumeInfo> {
    volumes
        .iter()
        .filter_map(|volume| normalize_volume(volume, settings))
        .collect()
}

/// Normalize a single volume, or `None` if it is not reported
pub fn normalize_volume(volume: &PersistentVolume, settings: &DiscoverySettings) -> Option<VolumeInfo> {
    let spec = volume.spec.as_ref()?;
    let csi = spec.csi.as_ref()?;
    if !settings.drivers.contains(&csi.driver) {
        return None;
    }

    let empty = BTreeMap::new();
    let attributes = csi.volume_attributes.as_ref().unwrap_or(&empty);
    let family = DriverFamily::from_driver(&csi.driver);
    debug!(family = %family, volume_attributes = ?attributes, "volumefinder volumes attributes map");

    let claim = spec.claim_ref.as_ref();
    let volume_name = volume.metadata.name.clone().unwrap_or_default();

    let mut info = VolumeInfo {
        namespace: claim.and_then(|c| c.namespace.clone()).unwrap_or_default(),
        persistent_volume_claim: claim.and_then(|c| c.uid.clone()).unwrap_or_default(),
        volume_status: volume
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_default(),
        volume_claim_name: claim.and_then(|c| c.name.clone()).unwrap_or_default(),
        persistent_volume: volume_name.clone(),
        storage_class: spec.storage_class_name.clone().unwrap_or_default(),
        driver: csi.driver.clone(),
        provisioned_size: spec
            .capacity
            .as_ref()
            .and_then(|capacity| capacity.get(RESOURCE_STORAGE))
            .map(|quantity| quantity.0.clone())
            .unwrap_or_default(),
        storage_system_volume_name: first_non_empty(attributes, &[ATTR_NAME])
            .unwrap_or(volume_name.as_str())
            .to_string(),
        storage_pool_name: attribute(attributes, ATTR_STORAGE_POOL_NAME).to_string(),
        storage_system: first_non_empty(attributes, settings.storage_system_keys.as_slice())
            .unwrap_or_default()
            .to_string(),
        protocol: attribute(attributes, ATTR_PROTOCOL).to_string(),
        created_time: volume
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|time| time.0.to_string())
            .unwrap_or_default(),
    };

    family.apply_overrides(&mut info, attributes, &csi.volume_handle);

    fill_unresolved(&mut info);
    Some(info)
}

/// First non-empty attribute value among `keys`
fn first_non_empty<'a, K: AsRef<str>>(
    attributes: &'a BTreeMap<String, String>,
    keys: &[K],
) -> Option<&'a str> {
    keys.iter()
        .map(|key| attribute(attributes, key.as_ref()))
        .find(|value| !value.is_empty())
}

/// Replace every field still empty with [`NOT_AVAILABLE`]
fn fill_unresolved(info: &mut VolumeInfo) {
    for field in [
        &mut info.namespace,
        &mut info.persistent_volume_claim,
        &mut info.volume_status,
        &mut info.volume_claim_name,
        &mut info.persistent_volume,
        &mut info.storage_class,
        &mut info.driver,
        &mut info.provisioned_size,
        &mut info.storage_system_volume_name,
        &mut info.storage_pool_name,
        &mut info.storage_system,
        &mut info.protocol,
        &mut info.created_time,
    ] {
        if field.is_empty() {
            *field = NOT_AVAILABLE.to_string();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::discovery::drivers::DriverNameSet;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::api::core::v1::{
        CSIPersistentVolumeSource, NFSVolumeSource, ObjectReference, PersistentVolumeSpec,
        PersistentVolumeStatus,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    pub const POWERFLEX: &str = "csi-vxflexos.dellemc.com";
    pub const POWERSTORE: &str = "csi-powerstore.dellemc.com";
    pub const POWERSCALE: &str = "csi-isilon.dellemc.com";
    pub const POWERMAX: &str = "csi-powermax.dellemc.com";

    pub fn created() -> Time {
        Time(Utc.with_ymd_and_hms(2022, 11, 28, 6, 12, 34).unwrap())
    }

    /// Build a bound CSI volume for tests
    pub fn csi_volume(
        name: &str,
        namespace: &str,
        driver: &str,
        handle: &str,
        attributes: &[(&str, &str)],
    ) -> PersistentVolume {
        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(name.into()),
                creation_timestamp: Some(created()),
                ..ObjectMeta::default()
            },
            spec: Some(PersistentVolumeSpec {
                capacity: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity("16Gi".into()),
                )])),
                csi: Some(CSIPersistentVolumeSource {
                    driver: driver.into(),
                    volume_handle: handle.into(),
                    volume_attributes: Some(
                        attributes
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    ),
                    ..CSIPersistentVolumeSource::default()
                }),
                claim_ref: Some(ObjectReference {
                    name: Some(format!("pvc-{}", name)),
                    namespace: Some(namespace.into()),
                    uid: Some(format!("uid-{}", name)),
                    ..ObjectReference::default()
                }),
                storage_class_name: Some("storage-class".into()),
                ..PersistentVolumeSpec::default()
            }),
            status: Some(PersistentVolumeStatus {
                phase: Some("Bound".into()),
                ..PersistentVolumeStatus::default()
            }),
        }
    }

    fn settings(drivers: &[&str]) -> DiscoverySettings {
        DiscoverySettings::with_drivers(DriverNameSet::new(drivers.iter().copied()))
    }

    #[test]
    fn test_powerflex_common_mapping() {
        let volume = csi_volume(
            "pv-1",
            "namespace-1",
            POWERFLEX,
            "handle",
            &[
                ("Name", "storage-system-volume-name"),
                ("StoragePoolName", "storage-pool-name"),
                ("StorageSystem", "4d4a2e5a36080e0f"),
            ],
        );

        let info = normalize_volume(&volume, &settings(&[POWERFLEX])).unwrap();

        assert_eq!(
            info,
            VolumeInfo {
                namespace: "namespace-1".into(),
                persistent_volume_claim: "uid-pv-1".into(),
                volume_status: "Bound".into(),
                volume_claim_name: "pvc-pv-1".into(),
                persistent_volume: "pv-1".into(),
                storage_class: "storage-class".into(),
                driver: POWERFLEX.into(),
                provisioned_size: "16Gi".into(),
                storage_system_volume_name: "storage-system-volume-name".into(),
                storage_pool_name: "storage-pool-name".into(),
                storage_system: "4d4a2e5a36080e0f".into(),
                protocol: "N/A".into(),
                created_time: created().0.to_string(),
            }
        );
    }

    #[test]
    fn test_powerstore_falls_back_to_array_id_and_volume_name() {
        let volume = csi_volume(
            "pv-2",
            "namespace-2",
            POWERSTORE,
            "handle",
            &[("arrayID", "1.0.1.1"), ("Protocol", "scsi")],
        );

        let info = normalize_volume(&volume, &settings(&[POWERSTORE])).unwrap();

        assert_eq!(info.storage_system_volume_name, "pv-2");
        assert_eq!(info.storage_system, "1.0.1.1");
        assert_eq!(info.protocol, "scsi");
        assert_eq!(info.storage_pool_name, "N/A");
    }

    #[test]
    fn test_storage_system_prefers_first_key() {
        let volume = csi_volume(
            "pv-2",
            "ns",
            POWERSTORE,
            "handle",
            &[("StorageSystem", "primary"), ("arrayID", "secondary")],
        );
        let info = normalize_volume(&volume, &settings(&[POWERSTORE])).unwrap();
        assert_eq!(info.storage_system, "primary");

        let volume = csi_volume(
            "pv-2",
            "ns",
            POWERSTORE,
            "handle",
            &[("StorageSystem", ""), ("arrayID", "secondary")],
        );
        let info = normalize_volume(&volume, &settings(&[POWERSTORE])).unwrap();
        assert_eq!(info.storage_system, "secondary");
    }

    #[test]
    fn test_storage_system_keys_are_configurable() {
        let volume = csi_volume("pv-2", "ns", POWERSTORE, "handle", &[("arrayIP", "10.0.0.9")]);

        let default_info = normalize_volume(&volume, &settings(&[POWERSTORE])).unwrap();
        assert_eq!(default_info.storage_system, "N/A");

        let custom = DiscoverySettings {
            drivers: DriverNameSet::new([POWERSTORE]),
            storage_system_keys: vec!["StorageSystem".into(), "arrayID".into(), "arrayIP".into()],
        };
        let info = normalize_volume(&volume, &custom).unwrap();
        assert_eq!(info.storage_system, "10.0.0.9");
    }

    #[test]
    fn test_powerscale_record() {
        let volume = csi_volume(
            "pv-3",
            "namespace-3",
            POWERSCALE,
            "handle",
            &[
                ("Name", "pv-3"),
                ("AccessZone", "System"),
                ("ClusterName", "pieisi93x"),
                ("Protocol", "iscsi"),
                ("Path", "/ifs/data/csi/pv-3"),
            ],
        );

        let info = normalize_volume(&volume, &settings(&[POWERSCALE])).unwrap();

        assert_eq!(info.storage_system, "pieisi93x:System");
        assert_eq!(info.protocol, "nfs");
        assert_eq!(info.storage_pool_name, "N/A");
    }

    #[test]
    fn test_powermax_record() {
        let volume = csi_volume(
            "pv-4",
            "namespace-4",
            POWERMAX,
            "csi-ZYA-pmax-4723028a00-powermax-000120000606-0012D",
            &[
                ("SRP", "SRP_1"),
                ("powermax/SYMID", "000120000606"),
                ("CreationTime", "20221128061234"),
            ],
        );

        let info = normalize_volume(&volume, &settings(&[POWERMAX])).unwrap();

        assert_eq!(info.storage_system_volume_name, "0012D:csi-ZYA-pmax-4723028a00-powermax");
        assert_eq!(info.storage_system, "000120000606");
        assert_eq!(info.storage_pool_name, "SRP_1");
        assert_eq!(info.protocol, "N/A");
    }

    #[test]
    fn test_untracked_driver_excluded() {
        let volumes = vec![
            csi_volume("pv-1", "ns-1", POWERFLEX, "h", &[]),
            csi_volume("pv-2", "ns-2", "another-csi-driver.dellemc.com", "h", &[]),
        ];

        let infos = normalize(&volumes, &settings(&[POWERFLEX]));

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].persistent_volume, "pv-1");
    }

    #[test]
    fn test_non_csi_volume_excluded_for_any_driver_set() {
        let mut volume = csi_volume("pv-nfs", "ns", POWERFLEX, "h", &[]);
        if let Some(spec) = volume.spec.as_mut() {
            spec.csi = None;
            spec.nfs = Some(NFSVolumeSource {
                server: "nas-server".into(),
                path: "file-path".into(),
                ..NFSVolumeSource::default()
            });
        }

        assert!(normalize(&[volume.clone()], &settings(&[POWERFLEX])).is_empty());
        assert!(normalize(&[volume], &settings(&[])).is_empty());
    }

    #[test]
    fn test_missing_source_data_resolves_to_fallbacks() {
        let volume = PersistentVolume {
            metadata: ObjectMeta {
                name: Some("pv-bare".into()),
                ..ObjectMeta::default()
            },
            spec: Some(PersistentVolumeSpec {
                csi: Some(CSIPersistentVolumeSource {
                    driver: POWERFLEX.into(),
                    ..CSIPersistentVolumeSource::default()
                }),
                ..PersistentVolumeSpec::default()
            }),
            status: None,
        };

        let info = normalize_volume(&volume, &settings(&[POWERFLEX])).unwrap();

        assert_eq!(info.persistent_volume, "pv-bare");
        assert_eq!(info.storage_system_volume_name, "pv-bare");
        for value in [
            &info.namespace,
            &info.persistent_volume_claim,
            &info.volume_status,
            &info.volume_claim_name,
            &info.storage_class,
            &info.provisioned_size,
            &info.storage_pool_name,
            &info.storage_system,
            &info.protocol,
            &info.created_time,
        ] {
            assert_eq!(value, NOT_AVAILABLE);
        }
    }

    #[test]
    fn test_output_preserves_input_order() {
        let volumes = vec![
            csi_volume("pv-b", "ns", POWERFLEX, "h", &[]),
            csi_volume("pv-a", "ns", POWERSCALE, "h", &[]),
            csi_volume("pv-c", "ns", POWERMAX, "h", &[]),
        ];

        let names: Vec<_> = normalize(&volumes, &settings(&[POWERFLEX, POWERSCALE, POWERMAX]))
            .into_iter()
            .map(|info| info.persistent_volume)
            .collect();

        assert_eq!(names, vec!["pv-b", "pv-a", "pv-c"]);
    }
}
