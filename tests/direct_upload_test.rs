mod common;

use axum::http::StatusCode;
use common::{FakeBackend, Outcome, app, negotiate, token};
use direct_upload_gateway::services::mount_table::MountTable;
use serde_json::json;
use std::sync::Arc;

const ONEDRIVE_ALIGNMENT: i64 = 327_680;

fn ready() -> Outcome {
    Outcome::Ready {
        alignment: ONEDRIVE_ALIGNMENT,
        chunk_size: 12 * ONEDRIVE_ALIGNMENT,
    }
}

fn scenario() -> serde_json::Value {
    json!({ "path": "/shared/docs", "file_name": "report.pdf", "file_size": 10_000_000 })
}

fn mounted(backend: FakeBackend) -> (Arc<MountTable>, Arc<FakeBackend>) {
    let table = Arc::new(MountTable::new());
    let backend = Arc::new(backend);
    table.mount("/shared", backend.clone());
    (table, backend)
}

#[tokio::test]
async fn test_scenario_a_capable_backend() {
    let (table, backend) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    let (status, body) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::OK);

    let info = &body["upload_info"];
    let url = info["upload_url"].as_str().unwrap();
    assert!(!url.is_empty());
    assert!(url.ends_with("/docs/report.pdf"));
    let chunk = info["chunk_size"].as_i64().unwrap();
    assert!(chunk > 0);
    assert_eq!(chunk % ONEDRIVE_ALIGNMENT, 0);
    assert_eq!(info["method"], "PUT");
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_scenario_b_plain_backend() {
    let (table, _) = mounted(FakeBackend::plain());
    let app = app(table);

    let (status, body) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "upload_info": null }));

    // Any name or size, even ones a capable backend would reject
    let (status, body) = negotiate(
        &app,
        Some(&token("/")),
        json!({ "path": "/shared/nowhere", "file_name": "", "file_size": -1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["upload_info"].is_null());
}

#[tokio::test]
async fn test_unmounted_path_is_unsupported() {
    let (table, backend) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    for path in ["/elsewhere/docs", "/sharedfolder", "/"] {
        let (status, body) = negotiate(
            &app,
            Some(&token("/")),
            json!({ "path": path, "file_name": "report.pdf", "file_size": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "path {}", path);
        assert!(body["upload_info"].is_null(), "path {}", path);
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_small_file_is_not_chunked() {
    let (table, _) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    let (status, body) = negotiate(
        &app,
        Some(&token("/")),
        json!({ "path": "/shared/docs", "file_name": "note.txt", "file_size": ONEDRIVE_ALIGNMENT - 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upload_info"]["chunk_size"], 0);
}

#[tokio::test]
async fn test_non_directory_targets_are_client_errors() {
    let (table, backend) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    for path in ["/shared/docs/readme.txt", "/shared/missing"] {
        let (status, body) = negotiate(
            &app,
            Some(&token("/")),
            json!({ "path": path, "file_name": "report.pdf", "file_size": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "path {}", path);
        assert!(body["error"].is_string());
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_declined_at_runtime_is_unsupported() {
    let (table, backend) = mounted(FakeBackend::capable(Outcome::NotSupported));
    let app = app(table);

    let (status, body) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["upload_info"].is_null());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_upstream_failure_and_conflict() {
    let (table, _) = mounted(FakeBackend::capable(Outcome::Upstream));
    let (status, body) = negotiate(&app(table), Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("503"));

    let (table, _) = mounted(FakeBackend::capable(Outcome::Conflict));
    let (status, body) = negotiate(&app(table), Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("report.pdf"));
}

#[tokio::test]
async fn test_idempotent_requests_mint_fresh_sessions() {
    let (table, backend) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    let (_, first) = negotiate(&app, Some(&token("/")), scenario()).await;
    let (_, second) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert!(first["upload_info"]["upload_url"].is_string());
    assert!(second["upload_info"]["upload_url"].is_string());
    assert_eq!(
        first["upload_info"]["chunk_size"],
        second["upload_info"]["chunk_size"]
    );
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_base_path_scopes_requests() {
    let (table, _) = mounted(FakeBackend::capable(ready()));
    let app = app(table);
    let scoped = token("/shared");

    // Relative to the base path, and percent-encoded
    let (status, body) = negotiate(
        &app,
        Some(&scoped),
        json!({ "path": "%2Fdocs", "file_name": "report.pdf", "file_size": 10_000_000 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["upload_info"]["upload_url"].as_str().unwrap().ends_with("/docs/report.pdf"));

    let (status, _) = negotiate(
        &app,
        Some(&scoped),
        json!({ "path": "/../secret", "file_name": "report.pdf", "file_size": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_authentication_required() {
    let (table, backend) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    let (status, body) = negotiate(&app, None, scenario()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = negotiate(&app, Some("not-a-jwt"), scenario()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (table, _) = mounted(FakeBackend::capable(ready()));
    let app = app(table);

    let (status, body) = negotiate(
        &app,
        Some(&token("/")),
        json!({ "path": "/shared/docs", "file_name": "report.pdf" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unmount_switches_to_unsupported() {
    let (table, _) = mounted(FakeBackend::capable(ready()));
    let app = app(table.clone());

    let (_, body) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert!(body["upload_info"].is_object());

    table.unmount("/shared");
    let (status, body) = negotiate(&app, Some(&token("/")), scenario()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["upload_info"].is_null());
}

#[tokio::test]
async fn test_health_lists_mounts_and_request_id() {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let (table, _) = mounted(FakeBackend::plain());
    let app = app(table);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mounts"], json!(["/shared"]));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(!response.headers()["x-request-id"].is_empty());
}
