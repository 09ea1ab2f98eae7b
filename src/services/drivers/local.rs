use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{BackendError, BackendResult, Entry, StorageBackend};
use crate::utils::path::{clean_path, segments};

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    pub root: PathBuf,
}

/// Directory on the server's own disk. Uploads to it always go through the
/// server, so it has no direct upload support.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Self {
        Self { root: config.root }
    }

    fn full_path(&self, actual_path: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments(actual_path) {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn driver_id(&self) -> &'static str {
        "local"
    }

    async fn get(&self, actual_path: &str) -> BackendResult<Entry> {
        let actual_path = clean_path(actual_path);
        let metadata = match tokio::fs::metadata(self.full_path(&actual_path)).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(actual_path));
            }
            Err(e) => return Err(BackendError::Internal(e.to_string())),
        };

        let name = segments(&actual_path).last().unwrap_or_default().to_string();
        Ok(Entry {
            id: None,
            name,
            is_dir: metadata.is_dir(),
            size: (!metadata.is_dir()).then_some(metadata.len() as i64),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            path: actual_path,
        })
    }
}
