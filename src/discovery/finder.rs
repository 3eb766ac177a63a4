//! Volume Finder
//!
//! Runs one discovery pass: list raw volumes, then normalize the ones
//! provisioned by tracked drivers.

use super::drivers::SharedSettings;
use super::normalizer::normalize;
use crate::domain::ports::{VolumeInfo, VolumeInfoGetter, VolumeListerRef};
use crate::error::Result;
use crate::telemetry::DiscoveryMetrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument};

/// Finds persistent volumes created by the configured CSI drivers
pub struct VolumeFinder {
    lister: VolumeListerRef,
    settings: Arc<SharedSettings>,
    metrics: Arc<DiscoveryMetrics>,
}

impl VolumeFinder {
    pub fn new(
        lister: VolumeListerRef,
        settings: Arc<SharedSettings>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        Self {
            lister,
            settings,
            metrics,
        }
    }
}

#[async_trait]
impl VolumeInfoGetter for VolumeFinder {
    #[instrument(name = "get_persistent_volumes", skip(self))]
    async fn get_persistent_volumes(&self) -> Result<Vec<VolumeInfo>> {
        let start = Instant::now();
        // Taken before listing so a concurrent reload cannot split this pass.
        let settings = self.settings.snapshot();

        let volumes = match self.lister.fetch_all().await {
            Ok(volumes) => volumes,
            Err(e) => {
                self.metrics.record_failure(start.elapsed());
                error!(error = %e, kind = %e.kind(), "Listing persistent volumes failed");
                return Err(e);
            }
        };

        let infos = normalize(&volumes, &settings);

        let elapsed = start.elapsed();
        self.metrics.record_success(elapsed, infos.len());
        debug!(
            duration = ?elapsed,
            function = "GetPersistentVolumes",
            listed = volumes.len(),
            matched = infos.len(),
            "function duration"
        );

        Ok(infos)
    }
}
