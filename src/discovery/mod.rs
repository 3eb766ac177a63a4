//! Volume Discovery
//!
//! Finds CSI persistent volumes of tracked drivers and normalizes their
//! driver-specific attributes into [`VolumeInfo`](crate::domain::VolumeInfo).
//!
//! - [`driver`]: driver families and their override rules
//! - [`drivers`]: tracked driver names and reloadable settings
//! - [`normalizer`]: raw volume to normalized record mapping
//! - [`finder`]: one discovery pass over the cluster

pub mod driver;
pub mod drivers;
pub mod finder;
pub mod normalizer;

pub use driver::{parse_powermax_volume_name, DriverFamily};
pub use drivers::{DiscoverySettings, DriverNameSet, SharedSettings, DEFAULT_STORAGE_SYSTEM_KEYS};
pub use finder::VolumeFinder;
pub use normalizer::{normalize, normalize_volume};
