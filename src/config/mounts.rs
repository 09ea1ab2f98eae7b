use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::services::drivers::google_drive::GoogleDriveConfig;
use crate::services::drivers::local::LocalConfig;
use crate::services::drivers::onedrive::OneDriveConfig;
use crate::services::drivers::s3::S3Config;

/// Driver kind plus its settings, tagged by the `driver` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DriverConfig {
    Local(LocalConfig),
    #[serde(rename = "onedrive")]
    OneDrive(OneDriveConfig),
    GoogleDrive(GoogleDriveConfig),
    S3(S3Config),
}

impl DriverConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            DriverConfig::Local(_) => "local",
            DriverConfig::OneDrive(_) => "onedrive",
            DriverConfig::GoogleDrive(_) => "google_drive",
            DriverConfig::S3(_) => "s3",
        }
    }
}

/// One entry of the mounts file.
#[derive(Debug, Clone, Deserialize)]
pub struct MountConfig {
    pub mount_path: String,
    #[serde(flatten)]
    pub driver: DriverConfig,
}

pub fn parse_mounts(json: &str) -> anyhow::Result<Vec<MountConfig>> {
    serde_json::from_str(json).context("Invalid mounts definition")
}

pub fn load_mounts(path: impl AsRef<Path>) -> anyhow::Result<Vec<MountConfig>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mounts file {}", path.display()))?;
    parse_mounts(&raw)
}
