use crate::AppState;
use crate::api::error::AppError;
use crate::models::{DirectUploadRequest, DirectUploadResponse};
use crate::services::direct_upload::Negotiation;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};

#[utoipa::path(
    post,
    path = "/api/fs/get_direct_upload_info",
    request_body = DirectUploadRequest,
    responses(
        (status = 200, description = "Upload descriptor, or null when the client must upload through the server", body = DirectUploadResponse),
        (status = 400, description = "Invalid target directory or arguments"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Path outside the caller's base path"),
        (status = 409, description = "Target file already exists"),
        (status = 502, description = "Storage provider failed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "fs"
)]
pub async fn get_direct_upload_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<DirectUploadRequest>, JsonRejection>,
) -> Result<Json<DirectUploadResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let upload_info = match state
        .direct_upload
        .negotiate(&claims.base_path, &req)
        .await?
    {
        Negotiation::Ready(info) => Some(info),
        Negotiation::Unsupported => None,
    };

    Ok(Json(DirectUploadResponse { upload_info }))
}
