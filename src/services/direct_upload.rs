use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{DirectUploadInfo, DirectUploadRequest};
use crate::services::drivers::{
    BackendError, DirectUpload, Entry, StorageBackend, probe_direct_upload,
};
use crate::services::mount_table::MountTable;
use crate::utils::path::{PathError, decode_path, join_base_path};

/// Outcome of a negotiation that did not fail. `Unsupported` tells the
/// client to fall back to uploading through the server.
#[derive(Debug)]
pub enum Negotiation {
    Unsupported,
    Ready(DirectUploadInfo),
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidTarget(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<BackendError> for NegotiationError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(msg) => NegotiationError::InvalidTarget(msg),
            BackendError::InvalidArgument(msg) => NegotiationError::InvalidArgument(msg),
            BackendError::Conflict(msg) => NegotiationError::Conflict(msg),
            BackendError::UpstreamUnavailable(msg) => NegotiationError::UpstreamUnavailable(msg),
            BackendError::Internal(msg) => NegotiationError::Internal(msg),
        }
    }
}

impl From<PathError> for NegotiationError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::Malformed(_) => NegotiationError::InvalidArgument(e.to_string()),
            PathError::Escapes => NegotiationError::Forbidden(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    ReceivedRequest,
    PathResolved,
    CapabilityChecked,
    TargetValidated,
    DescriptorReady,
    Unsupported,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReceivedRequest => "received_request",
            Stage::PathResolved => "path_resolved",
            Stage::CapabilityChecked => "capability_checked",
            Stage::TargetValidated => "target_validated",
            Stage::DescriptorReady => "descriptor_ready",
            Stage::Unsupported => "unsupported",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Confirms `actual_path` is an existing directory on `backend`.
pub async fn validate_directory(
    backend: &dyn StorageBackend,
    actual_path: &str,
) -> Result<Entry, NegotiationError> {
    match backend.get(actual_path).await {
        Ok(entry) if entry.is_dir => Ok(entry),
        Ok(_) => Err(NegotiationError::InvalidTarget(
            "Path is not a directory".to_string(),
        )),
        Err(BackendError::NotFound(_)) => Err(NegotiationError::InvalidTarget(
            "Directory not found".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Decides per request whether a client may upload straight to the provider
/// behind a virtual path. Holds no per-request state.
pub struct DirectUploadService {
    mounts: Arc<MountTable>,
}

impl DirectUploadService {
    pub fn new(mounts: Arc<MountTable>) -> Self {
        Self { mounts }
    }

    /// Runs one negotiation for a caller whose view of the tree starts at
    /// `base_path`.
    pub async fn negotiate(
        &self,
        base_path: &str,
        req: &DirectUploadRequest,
    ) -> Result<Negotiation, NegotiationError> {
        debug!(stage = %Stage::ReceivedRequest, path = %req.path, file_name = %req.file_name);

        let path = decode_path(&req.path)?;
        let virtual_path = join_base_path(base_path, &path)?;

        let Some(resolved) = self.mounts.resolve(&virtual_path) else {
            info!(stage = %Stage::Unsupported, path = %virtual_path, "No storage mounted");
            return Ok(Negotiation::Unsupported);
        };
        let backend = resolved.backend.as_ref();
        debug!(
            stage = %Stage::PathResolved,
            driver = backend.driver_id(),
            mount = %resolved.mount_path,
            actual_path = %resolved.actual_path
        );

        let Some(uploader) = probe_direct_upload(backend) else {
            info!(
                stage = %Stage::Unsupported,
                driver = backend.driver_id(),
                "Driver has no direct upload support"
            );
            return Ok(Negotiation::Unsupported);
        };
        debug!(stage = %Stage::CapabilityChecked, driver = backend.driver_id());

        let dir = match validate_directory(backend, &resolved.actual_path).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(stage = %Stage::Failed, path = %virtual_path, error = %e);
                return Err(e);
            }
        };
        debug!(stage = %Stage::TargetValidated, actual_path = %dir.path);

        match uploader
            .direct_upload_info(&dir, &resolved.actual_path, &req.file_name, req.file_size)
            .await
        {
            Ok(DirectUpload::Ready(info)) => {
                info!(
                    stage = %Stage::DescriptorReady,
                    driver = backend.driver_id(),
                    chunk_size = info.chunk_size,
                    "Direct upload negotiated for {}",
                    req.file_name
                );
                Ok(Negotiation::Ready(info))
            }
            Ok(DirectUpload::NotSupported) => {
                info!(
                    stage = %Stage::Unsupported,
                    driver = backend.driver_id(),
                    "Driver declined direct upload"
                );
                Ok(Negotiation::Unsupported)
            }
            Err(e) => {
                warn!(stage = %Stage::Failed, driver = backend.driver_id(), error = %e);
                Err(e.into())
            }
        }
    }
}
