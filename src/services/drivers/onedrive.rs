use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::oauth::{OAuthCredentials, TokenSource};
use super::{
    BackendError, BackendResult, ChunkPolicy, ConflictPolicy, DirectUpload, DirectUploader, Entry,
    StorageBackend,
};
use crate::models::DirectUploadInfo;
use crate::utils::path::{clean_path, encode_path, join_name};
use crate::utils::validation::validate_upload_target;

/// Graph requires upload fragments in multiples of 320 KiB.
pub const ONEDRIVE_CHUNK_ALIGNMENT: i64 = 320 * 1024;

fn default_root_folder_path() -> String {
    "/".to_string()
}

fn default_chunk_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// National cloud the drive lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OneDriveRegion {
    #[default]
    Global,
    Cn,
    Us,
    De,
}

impl OneDriveRegion {
    pub fn oauth_host(&self) -> &'static str {
        match self {
            OneDriveRegion::Global => "https://login.microsoftonline.com",
            OneDriveRegion::Cn => "https://login.chinacloudapi.cn",
            OneDriveRegion::Us => "https://login.microsoftonline.us",
            OneDriveRegion::De => "https://login.microsoftonline.de",
        }
    }

    pub fn api_host(&self) -> &'static str {
        match self {
            OneDriveRegion::Global => "https://graph.microsoft.com",
            OneDriveRegion::Cn => "https://microsoftgraph.chinacloudapi.cn",
            OneDriveRegion::Us => "https://graph.microsoft.us",
            OneDriveRegion::De => "https://graph.microsoft.de",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneDriveConfig {
    #[serde(default)]
    pub region: OneDriveRegion,
    /// Folder on the drive that appears as the mount root
    #[serde(default = "default_root_folder_path")]
    pub root_folder_path: String,
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
    /// Overrides the regional Graph host
    #[serde(default)]
    pub api_base: Option<String>,
    /// Overrides the regional token endpoint
    #[serde(default)]
    pub token_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    id: String,
    name: String,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    folder: Option<serde_json::Value>,
    #[serde(default)]
    last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSession {
    upload_url: String,
    #[serde(default)]
    expiration_date_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Deserialize)]
struct GraphError {
    code: String,
    message: String,
}

pub struct OneDriveBackend {
    http: reqwest::Client,
    tokens: TokenSource,
    api_base: String,
    root_folder_path: String,
    chunks: ChunkPolicy,
    conflict_policy: ConflictPolicy,
    enable_direct_upload: bool,
}

impl OneDriveBackend {
    pub fn new(http: reqwest::Client, config: OneDriveConfig) -> Self {
        let token_url = config.token_url.clone().unwrap_or_else(|| {
            format!("{}/common/oauth2/v2.0/token", config.region.oauth_host())
        });
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| config.region.api_host().to_string());

        let tokens = TokenSource::new(
            http.clone(),
            OAuthCredentials {
                token_url,
                client_id: config.client_id,
                client_secret: config.client_secret,
                refresh_token: config.refresh_token,
                access_token: config.access_token,
            },
        );

        Self {
            http,
            tokens,
            api_base: api_base.trim_end_matches('/').to_string(),
            root_folder_path: clean_path(&config.root_folder_path),
            chunks: ChunkPolicy::from_mib(config.chunk_size, ONEDRIVE_CHUNK_ALIGNMENT),
            conflict_policy: config.conflict_policy,
            enable_direct_upload: config.enable_direct_upload,
        }
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        self.chunks
    }

    /// Item address for a backend-relative path, e.g.
    /// `/v1.0/me/drive/root:/Documents/report.pdf:`
    fn meta_url(&self, actual_path: &str) -> String {
        let full = join_name(&self.root_folder_path, actual_path);
        if full == "/" {
            format!("{}/v1.0/me/drive/root", self.api_base)
        } else {
            format!("{}/v1.0/me/drive/root:{}:", self.api_base, encode_path(&full))
        }
    }

    async fn upstream_error(response: reqwest::Response, what: &str) -> BackendError {
        let status = response.status();
        let detail = match response.json::<GraphErrorBody>().await {
            Ok(body) => format!("{} ({})", body.error.message, body.error.code),
            Err(_) => "no error details".to_string(),
        };
        BackendError::UpstreamUnavailable(format!("{} failed with status {}: {}", what, status, detail))
    }
}

#[async_trait]
impl StorageBackend for OneDriveBackend {
    fn driver_id(&self) -> &'static str {
        "onedrive"
    }

    async fn get(&self, actual_path: &str) -> BackendResult<Entry> {
        let actual_path = clean_path(actual_path);
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.meta_url(&actual_path))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(actual_path));
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response, "Item lookup").await);
        }

        let item: DriveItem = response.json().await?;
        Ok(Entry {
            id: Some(item.id),
            name: item.name,
            is_dir: item.folder.is_some(),
            size: item.size,
            modified_at: item.last_modified_date_time,
            path: actual_path,
        })
    }

    fn direct_uploader(&self) -> Option<&dyn DirectUploader> {
        Some(self)
    }
}

#[async_trait]
impl DirectUploader for OneDriveBackend {
    async fn direct_upload_info(
        &self,
        _dir: &Entry,
        actual_path: &str,
        file_name: &str,
        file_size: i64,
    ) -> BackendResult<DirectUpload> {
        if !self.enable_direct_upload {
            return Ok(DirectUpload::NotSupported);
        }
        validate_upload_target(file_name, file_size)?;

        let file_path = join_name(actual_path, file_name);
        let url = format!("{}/createUploadSession", self.meta_url(&file_path));
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "item": {
                    "@microsoft.graph.conflictBehavior": self.conflict_policy.as_str()
                }
            }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(BackendError::Conflict(format!("{} already exists", file_path)));
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response, "Upload session creation").await);
        }

        let session: UploadSession = response.json().await?;
        debug!(
            "OneDrive upload session for {} expires at {:?}",
            file_path, session.expiration_date_time
        );

        Ok(DirectUpload::Ready(DirectUploadInfo::put(
            session.upload_url,
            self.chunks.chunk_size_for(file_size),
        )))
    }
}
