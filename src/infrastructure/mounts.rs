use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{DriverConfig, MountConfig, ServerConfig};
use crate::services::drivers::StorageBackend;
use crate::services::drivers::google_drive::GoogleDriveBackend;
use crate::services::drivers::local::LocalBackend;
use crate::services::drivers::onedrive::OneDriveBackend;
use crate::services::drivers::s3::S3Backend;
use crate::services::mount_table::MountTable;

/// Builds one backend per mount definition and mounts it.
pub async fn setup_mounts(
    mounts: Vec<MountConfig>,
    config: &ServerConfig,
) -> anyhow::Result<Arc<MountTable>> {
    // Bounds each upstream call of every driver
    let timeout = Duration::from_secs(config.upstream_timeout_secs);
    let http = reqwest::Client::builder().timeout(timeout).build()?;

    let table = Arc::new(MountTable::new());
    for mount in mounts {
        let kind = mount.driver.kind();
        let backend: Arc<dyn StorageBackend> = match mount.driver {
            DriverConfig::Local(c) => Arc::new(LocalBackend::new(c)),
            DriverConfig::OneDrive(c) => Arc::new(OneDriveBackend::new(http.clone(), c)),
            DriverConfig::GoogleDrive(c) => Arc::new(GoogleDriveBackend::new(http.clone(), c)),
            DriverConfig::S3(c) => Arc::new(S3Backend::connect(c, timeout).await),
        };

        info!(
            "🗂️  Mounted {} at {} (capabilities: {:?})",
            kind,
            mount.mount_path,
            backend.capabilities().iter().collect::<Vec<_>>()
        );
        if table.mount(&mount.mount_path, backend).is_some() {
            tracing::warn!("Mount path {} defined twice, last one wins", mount.mount_path);
        }
    }

    Ok(table)
}
