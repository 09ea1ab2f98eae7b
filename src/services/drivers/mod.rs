use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::DirectUploadInfo;

pub mod capability;
pub mod chunking;
pub mod conflict;
pub mod google_drive;
pub mod local;
pub mod oauth;
pub mod onedrive;
pub mod s3;

pub use capability::{Capability, CapabilitySet, probe_direct_upload};
pub use chunking::ChunkPolicy;
pub use conflict::ConflictPolicy;

/// Metadata of a single object as seen by a backend.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Provider object id, for providers that address objects by id
    pub id: Option<String>,
    /// Backend-relative path
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub size: Option<i64>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn root(id: Option<String>) -> Self {
        Self {
            id,
            path: "/".to_string(),
            name: String::new(),
            is_dir: true,
            size: None,
            modified_at: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        // Session URLs carry credentials, never format them
        BackendError::UpstreamUnavailable(e.without_url().to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Result of asking a backend for a direct upload descriptor.
#[derive(Debug)]
pub enum DirectUpload {
    Ready(DirectUploadInfo),
    /// The backend has the capability but declines this particular call,
    /// e.g. the feature is switched off in its configuration.
    NotSupported,
}

#[async_trait]
pub trait DirectUploader: Send + Sync {
    /// Opens a provider upload session for a new file `file_name` inside
    /// `dir`, which lives at `actual_path` on the backend.
    async fn direct_upload_info(
        &self,
        dir: &Entry,
        actual_path: &str,
        file_name: &str,
        file_size: i64,
    ) -> BackendResult<DirectUpload>;
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Driver identifier (e.g., "onedrive", "s3")
    fn driver_id(&self) -> &'static str;

    /// Looks up a single object by backend-relative path.
    async fn get(&self, actual_path: &str) -> BackendResult<Entry>;

    /// Direct upload support, `None` for backends without it.
    fn direct_uploader(&self) -> Option<&dyn DirectUploader> {
        None
    }

    fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::empty();
        if self.direct_uploader().is_some() {
            caps.insert(Capability::DirectUpload);
        }
        caps
    }
}
