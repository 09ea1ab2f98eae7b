use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

fn default_method() -> String {
    "PUT".to_string()
}

/// Everything a client needs to send a file straight to the storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DirectUploadInfo {
    /// Provider URL the bytes are sent to
    pub upload_url: String,
    /// Bytes per request, 0 means the whole file in one request
    pub chunk_size: i64,
    /// Headers to attach verbatim to every upload request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_method")]
    pub method: String,
}

impl DirectUploadInfo {
    pub fn put(upload_url: impl Into<String>, chunk_size: i64) -> Self {
        Self {
            upload_url: upload_url.into(),
            chunk_size,
            headers: HashMap::new(),
            method: default_method(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct DirectUploadRequest {
    /// Virtual directory the file will be created in, may be percent-encoded
    pub path: String,
    pub file_name: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectUploadResponse {
    /// `null` when the client has to fall back to uploading through the server
    pub upload_info: Option<DirectUploadInfo>,
}
