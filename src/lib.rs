pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::ServerConfig;
use crate::services::direct_upload::DirectUploadService;
use crate::services::mount_table::MountTable;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::fs::get_direct_upload_info,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::DirectUploadRequest,
            models::DirectUploadResponse,
            models::DirectUploadInfo,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "fs", description = "Virtual file system endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub mounts: Arc<MountTable>,
    pub direct_upload: Arc<DirectUploadService>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(mounts: Arc<MountTable>, config: ServerConfig) -> Self {
        Self {
            direct_upload: Arc::new(DirectUploadService::new(mounts.clone())),
            mounts,
            config,
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/fs/get_direct_upload_info",
            post(api::handlers::fs::get_direct_upload_info).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
