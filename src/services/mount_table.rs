use dashmap::DashMap;
use std::sync::Arc;

use crate::services::drivers::StorageBackend;
use crate::utils::path::clean_path;

/// A virtual path resolved onto the backend mounted above it.
pub struct ResolvedPath {
    pub mount_path: String,
    pub backend: Arc<dyn StorageBackend>,
    /// Path relative to the mount root, always absolute
    pub actual_path: String,
}

/// Virtual tree of mounted backends, keyed by clean mount path.
///
/// Resolution hands out a clone of the backend `Arc`, so a request that
/// resolved before an `unmount` keeps a working backend until it finishes.
#[derive(Default)]
pub struct MountTable {
    mounts: DashMap<String, Arc<dyn StorageBackend>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `backend` at `mount_path`, returning whatever was mounted there.
    pub fn mount(
        &self,
        mount_path: &str,
        backend: Arc<dyn StorageBackend>,
    ) -> Option<Arc<dyn StorageBackend>> {
        self.mounts.insert(clean_path(mount_path), backend)
    }

    pub fn unmount(&self, mount_path: &str) -> Option<Arc<dyn StorageBackend>> {
        self.mounts
            .remove(&clean_path(mount_path))
            .map(|(_, backend)| backend)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn mount_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.mounts.iter().map(|m| m.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Finds the deepest mount containing `virtual_path`.
    pub fn resolve(&self, virtual_path: &str) -> Option<ResolvedPath> {
        let path = clean_path(virtual_path);
        let mut candidate = path.as_str();

        loop {
            if let Some(backend) = self.mounts.get(candidate) {
                let rest = if candidate == "/" {
                    path.as_str()
                } else {
                    &path[candidate.len()..]
                };
                let actual_path = if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                };
                return Some(ResolvedPath {
                    mount_path: candidate.to_string(),
                    backend: backend.value().clone(),
                    actual_path,
                });
            }

            if candidate == "/" {
                return None;
            }
            candidate = match candidate.rfind('/') {
                Some(0) | None => "/",
                Some(idx) => &candidate[..idx],
            };
        }
    }
}
