use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::presigning::PresigningConfig;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::conflict::first_free_name;
use super::{
    BackendError, BackendResult, ConflictPolicy, DirectUpload, DirectUploader, Entry,
    StorageBackend,
};
use crate::models::DirectUploadInfo;
use crate::utils::path::{clean_path, join_name, segments};
use crate::utils::validation::validate_upload_target;

/// Largest object a single `PutObject` accepts (5 GiB).
pub const MAX_SINGLE_PUT_SIZE: i64 = 5 * 1024 * 1024 * 1024;

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_expiry_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Falls back to the default AWS credential chain when absent
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Key prefix that appears as the mount root
    #[serde(default)]
    pub root_prefix: String,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
    #[serde(default = "default_true")]
    pub enable_direct_upload: bool,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn upstream<E: std::error::Error>(e: E) -> BackendError {
    BackendError::UpstreamUnavailable(DisplayErrorContext(&e).to_string())
}

/// Bucket (or prefix of one) on S3 or an S3 compatible store. Directories are
/// key prefixes; uploads are presigned single `PUT` requests.
pub struct S3Backend {
    client: Client,
    config: S3Config,
}

impl S3Backend {
    pub fn with_client(client: Client, config: S3Config) -> Self {
        Self { client, config }
    }

    /// Builds the SDK client. Each operation makes a single attempt bounded
    /// by `timeout`; failures surface to the caller as they happen.
    pub async fn connect(config: S3Config, timeout: Duration) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self::with_client(Client::from_conf(s3_config), config)
    }

    fn object_key(&self, actual_path: &str) -> String {
        let prefix = self.config.root_prefix.trim_matches('/');
        let path = clean_path(actual_path);
        let relative = path.trim_start_matches('/');
        match (prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => prefix.to_string(),
            (false, false) => format!("{}/{}", prefix, relative),
        }
    }

    async fn head(&self, key: &str) -> BackendResult<Option<HeadObjectOutput>> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(Some(output)),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false) =>
            {
                Ok(None)
            }
            Err(e) => Err(upstream(e)),
        }
    }

    async fn object_exists(&self, dir_path: &str, name: &str) -> BackendResult<bool> {
        let key = self.object_key(&join_name(dir_path, name));
        Ok(self.head(&key).await?.is_some())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn driver_id(&self) -> &'static str {
        "s3"
    }

    async fn get(&self, actual_path: &str) -> BackendResult<Entry> {
        let actual_path = clean_path(actual_path);
        if actual_path == "/" {
            return Ok(Entry::root(None));
        }

        let key = self.object_key(&actual_path);
        let name = segments(&actual_path).last().unwrap_or_default().to_string();

        let listing = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(format!("{}/", key))
            .max_keys(1)
            .send()
            .await
            .map_err(upstream)?;

        if !listing.contents().is_empty() || !listing.common_prefixes().is_empty() {
            return Ok(Entry {
                id: None,
                name,
                is_dir: true,
                size: None,
                modified_at: None,
                path: actual_path,
            });
        }

        match self.head(&key).await? {
            Some(object) => Ok(Entry {
                id: None,
                name,
                is_dir: false,
                size: object.content_length(),
                modified_at: object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                path: actual_path,
            }),
            None => Err(BackendError::NotFound(actual_path)),
        }
    }

    fn direct_uploader(&self) -> Option<&dyn DirectUploader> {
        Some(self)
    }
}

#[async_trait]
impl DirectUploader for S3Backend {
    async fn direct_upload_info(
        &self,
        _dir: &Entry,
        actual_path: &str,
        file_name: &str,
        file_size: i64,
    ) -> BackendResult<DirectUpload> {
        if !self.config.enable_direct_upload {
            return Ok(DirectUpload::NotSupported);
        }
        validate_upload_target(file_name, file_size)?;

        if file_size > MAX_SINGLE_PUT_SIZE {
            debug!(
                "{} bytes exceeds the single PUT limit, declining direct upload",
                file_size
            );
            return Ok(DirectUpload::NotSupported);
        }

        let name = match self.config.conflict_policy {
            ConflictPolicy::Replace => file_name.to_string(),
            ConflictPolicy::Fail => {
                if self.object_exists(actual_path, file_name).await? {
                    return Err(BackendError::Conflict(format!(
                        "{} already exists",
                        file_name
                    )));
                }
                file_name.to_string()
            }
            ConflictPolicy::Rename => {
                let this = self;
                first_free_name(file_name, move |candidate| async move {
                    this.object_exists(actual_path, &candidate).await
                })
                .await?
            }
        };

        let key = self.object_key(&join_name(actual_path, &name));
        let presigning = PresigningConfig::expires_in(Duration::from_secs(
            self.config.presign_expiry_secs,
        ))
        .map_err(|e| BackendError::Internal(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| BackendError::Internal(DisplayErrorContext(&e).to_string()))?;

        Ok(DirectUpload::Ready(DirectUploadInfo {
            upload_url: presigned.uri().to_string(),
            chunk_size: 0,
            headers: presigned
                .headers()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            method: presigned.method().to_string(),
        }))
    }
}
