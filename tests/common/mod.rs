#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use direct_upload_gateway::config::ServerConfig;
use direct_upload_gateway::models::DirectUploadInfo;
use direct_upload_gateway::services::drivers::{
    BackendError, BackendResult, DirectUpload, DirectUploader, Entry, StorageBackend,
};
use direct_upload_gateway::services::mount_table::MountTable;
use direct_upload_gateway::utils::auth::create_jwt;
use direct_upload_gateway::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

pub fn app(mounts: Arc<MountTable>) -> Router {
    setup_tracing();
    create_app(AppState::new(mounts, ServerConfig::development()))
}

pub fn token(base_path: &str) -> String {
    create_jwt("user_1", base_path, &ServerConfig::development().jwt_secret).unwrap()
}

/// Posts a negotiation request and returns status plus decoded JSON body.
pub async fn negotiate(app: &Router, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/fs/get_direct_upload_info")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// What a [`FakeBackend`] answers once asked for a descriptor.
#[derive(Clone, Copy)]
pub enum Outcome {
    Ready { alignment: i64, chunk_size: i64 },
    NotSupported,
    Upstream,
    Conflict,
}

/// In-memory backend with a fixed tree: `/docs` and `/media` are
/// directories, `/docs/readme.txt` is a file.
pub struct FakeBackend {
    capable: bool,
    outcome: Outcome,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub fn capable(outcome: Outcome) -> Self {
        Self {
            capable: true,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn plain() -> Self {
        Self {
            capable: false,
            outcome: Outcome::NotSupported,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FakeBackend {
    fn driver_id(&self) -> &'static str {
        "fake"
    }

    async fn get(&self, actual_path: &str) -> BackendResult<Entry> {
        let is_dir = match actual_path {
            "/" | "/docs" | "/media" => true,
            "/docs/readme.txt" => false,
            _ => return Err(BackendError::NotFound(actual_path.to_string())),
        };
        Ok(Entry {
            id: None,
            path: actual_path.to_string(),
            name: actual_path.rsplit('/').next().unwrap_or_default().to_string(),
            is_dir,
            size: None,
            modified_at: None,
        })
    }

    fn direct_uploader(&self) -> Option<&dyn DirectUploader> {
        if self.capable { Some(self) } else { None }
    }
}

#[async_trait]
impl DirectUploader for FakeBackend {
    async fn direct_upload_info(
        &self,
        _dir: &Entry,
        actual_path: &str,
        file_name: &str,
        file_size: i64,
    ) -> BackendResult<DirectUpload> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Ready {
                alignment,
                chunk_size,
            } => {
                let chunk = if file_size < alignment { 0 } else { chunk_size };
                Ok(DirectUpload::Ready(DirectUploadInfo::put(
                    format!(
                        "https://upload.fake/session/{}?path={}/{}",
                        n,
                        actual_path.trim_end_matches('/'),
                        file_name
                    ),
                    chunk,
                )))
            }
            Outcome::NotSupported => Ok(DirectUpload::NotSupported),
            Outcome::Upstream => Err(BackendError::UpstreamUnavailable(
                "provider returned 503".to_string(),
            )),
            Outcome::Conflict => Err(BackendError::Conflict(format!(
                "{} already exists",
                file_name
            ))),
        }
    }
}
