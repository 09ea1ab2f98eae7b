use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::conflict::first_free_name;
use super::oauth::{OAuthCredentials, TokenSource};
use super::{
    BackendError, BackendResult, ChunkPolicy, ConflictPolicy, DirectUpload, DirectUploader, Entry,
    StorageBackend,
};
use crate::models::DirectUploadInfo;
use crate::utils::path::{clean_path, segments};
use crate::utils::validation::validate_upload_target;

/// Resumable upload chunks must be multiples of 256 KiB.
pub const DRIVE_CHUNK_ALIGNMENT: i64 = 256 * 1024;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

fn default_root_folder_id() -> String {
    "root".to_string()
}

fn default_chunk_size() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleDriveConfig {
    #[serde(default = "default_root_folder_id")]
    pub root_folder_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Upload chunk size in MiB
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_true")]
    pub enable_direct_upload: bool,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    /// Drive reports sizes as decimal strings
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Escapes a literal for use inside a single quoted Drive query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct GoogleDriveBackend {
    http: reqwest::Client,
    tokens: TokenSource,
    api_base: String,
    root_folder_id: String,
    chunks: ChunkPolicy,
    conflict_policy: ConflictPolicy,
    enable_direct_upload: bool,
}

impl GoogleDriveBackend {
    pub fn new(http: reqwest::Client, config: GoogleDriveConfig) -> Self {
        let tokens = TokenSource::new(
            http.clone(),
            OAuthCredentials {
                token_url: config
                    .token_url
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                client_id: config.client_id,
                client_secret: config.client_secret,
                refresh_token: config.refresh_token,
                access_token: config.access_token,
            },
        );

        Self {
            http,
            tokens,
            api_base: config
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            root_folder_id: config.root_folder_id,
            chunks: ChunkPolicy::from_mib(config.chunk_size, DRIVE_CHUNK_ALIGNMENT),
            conflict_policy: config.conflict_policy,
            enable_direct_upload: config.enable_direct_upload,
        }
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        self.chunks
    }

    async fn find_child(&self, parent_id: &str, name: &str) -> BackendResult<Option<DriveFile>> {
        let query = format!(
            "'{}' in parents and name = '{}' and trashed = false",
            escape_query(parent_id),
            escape_query(name)
        );
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(format!("{}/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name,mimeType,size,modifiedTime)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::UpstreamUnavailable(format!(
                "File lookup failed with status {}",
                response.status()
            )));
        }

        let list: FileList = response.json().await?;
        Ok(list.files.into_iter().next())
    }

    /// Starts a resumable session creating a new file.
    async fn create_session(
        &self,
        parent_id: &str,
        name: &str,
        file_size: i64,
    ) -> BackendResult<String> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .bearer_auth(token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&json!({ "name": name, "parents": [parent_id] }))
            .send()
            .await?;
        Self::session_url(response).await
    }

    /// Starts a resumable session overwriting the content of `file_id`.
    async fn update_session(&self, file_id: &str, file_size: i64) -> BackendResult<String> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .patch(format!("{}/upload/drive/v3/files/{}", self.api_base, file_id))
            .bearer_auth(token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&json!({}))
            .send()
            .await?;
        Self::session_url(response).await
    }

    async fn session_url(response: reqwest::Response) -> BackendResult<String> {
        if !response.status().is_success() {
            return Err(BackendError::UpstreamUnavailable(format!(
                "Upload session creation failed with status {}",
                response.status()
            )));
        }
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| url::Url::parse(v).ok())
            .map(String::from)
            .ok_or_else(|| {
                BackendError::UpstreamUnavailable("Upload session URL missing".to_string())
            })
    }
}

#[async_trait]
impl StorageBackend for GoogleDriveBackend {
    fn driver_id(&self) -> &'static str {
        "google_drive"
    }

    async fn get(&self, actual_path: &str) -> BackendResult<Entry> {
        let actual_path = clean_path(actual_path);
        let mut current = Entry::root(Some(self.root_folder_id.clone()));

        // Drive has no paths, walk the folder chain by name
        for segment in segments(&actual_path) {
            if !current.is_dir {
                return Err(BackendError::NotFound(actual_path.clone()));
            }
            let parent_id = current.id.clone().unwrap_or_default();
            let file = self
                .find_child(&parent_id, segment)
                .await?
                .ok_or_else(|| BackendError::NotFound(actual_path.clone()))?;

            current = Entry {
                is_dir: file.mime_type == FOLDER_MIME_TYPE,
                size: file.size.as_deref().and_then(|s| s.parse().ok()),
                modified_at: file.modified_time,
                path: String::new(),
                name: file.name,
                id: Some(file.id),
            };
        }

        current.path = actual_path;
        Ok(current)
    }

    fn direct_uploader(&self) -> Option<&dyn DirectUploader> {
        Some(self)
    }
}

#[async_trait]
impl DirectUploader for GoogleDriveBackend {
    async fn direct_upload_info(
        &self,
        dir: &Entry,
        actual_path: &str,
        file_name: &str,
        file_size: i64,
    ) -> BackendResult<DirectUpload> {
        if !self.enable_direct_upload {
            return Ok(DirectUpload::NotSupported);
        }
        validate_upload_target(file_name, file_size)?;

        let parent_id = match &dir.id {
            Some(id) => id.clone(),
            None => self.get(actual_path).await?.id.ok_or_else(|| {
                BackendError::Internal(format!("No folder id for {}", actual_path))
            })?,
        };

        let existing = self.find_child(&parent_id, file_name).await?;
        let session_url = match (existing, self.conflict_policy) {
            (None, _) => self.create_session(&parent_id, file_name, file_size).await?,
            (Some(_), ConflictPolicy::Fail) => {
                return Err(BackendError::Conflict(format!(
                    "{} already exists",
                    file_name
                )));
            }
            // Only file content can be overwritten
            (Some(file), ConflictPolicy::Replace) if file.mime_type == FOLDER_MIME_TYPE => {
                return Err(BackendError::Conflict(format!(
                    "{} already exists as a folder",
                    file_name
                )));
            }
            (Some(file), ConflictPolicy::Replace) => {
                self.update_session(&file.id, file_size).await?
            }
            (Some(_), ConflictPolicy::Rename) => {
                let this = self;
                let parent = parent_id.as_str();
                let name = first_free_name(file_name, move |candidate| async move {
                    this.find_child(parent, &candidate)
                        .await
                        .map(|f| f.is_some())
                })
                .await?;
                self.create_session(&parent_id, &name, file_size).await?
            }
        };

        Ok(DirectUpload::Ready(DirectUploadInfo::put(
            session_url,
            self.chunks.chunk_size_for(file_size),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("report.pdf"), "report.pdf");
        assert_eq!(escape_query("Bob's file"), "Bob\\'s file");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_four_mib_chunk_is_exact() {
        let config: GoogleDriveConfig =
            serde_json::from_value(json!({ "access_token": "t", "chunk_size": 4 })).unwrap();
        let backend = GoogleDriveBackend::new(reqwest::Client::new(), config);
        assert_eq!(backend.chunk_policy().chunk_size(), 4_194_304);
        assert_eq!(backend.chunk_policy().chunk_size_for(10_000_000), 4_194_304);
        assert_eq!(backend.chunk_policy().chunk_size_for(DRIVE_CHUNK_ALIGNMENT - 1), 0);
    }

    #[tokio::test]
    async fn test_root_needs_no_request() {
        let config: GoogleDriveConfig =
            serde_json::from_value(json!({ "access_token": "t", "root_folder_id": "abc" })).unwrap();
        let backend = GoogleDriveBackend::new(reqwest::Client::new(), config);
        let root = backend.get("/").await.unwrap();
        assert!(root.is_dir);
        assert_eq!(root.id.as_deref(), Some("abc"));
    }
}
