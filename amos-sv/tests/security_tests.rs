//! Security tests for amos-sv
//!
//! Tests security-critical features:
//! - Request body size limit on JSON endpoints
//! - Audio serving confined to the audio root

use std::sync::Arc;

use amos_common::catalog::{TrialCatalog, TrialDefinition};
use amos_common::store::LocalFileStore;
use amos_common::SessionController;
use amos_sv::{build_router, AppState, MAX_BODY_BYTES};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::util::ServiceExt;

/// Test helper: Create app with an audio root holding one file
async fn setup_app(dir: &TempDir) -> Router {
    let audio_root = dir.path().join("audio");
    std::fs::create_dir_all(audio_root.join("native")).unwrap();
    std::fs::write(audio_root.join("native/01.wav"), b"RIFF").unwrap();
    std::fs::write(dir.path().join("secret.txt"), b"do not serve").unwrap();

    let catalog = TrialCatalog::new(vec![TrialDefinition {
        trial_id: "t01".to_string(),
        transcript: "Hello".to_string(),
        native_path: "native/01.wav".to_string(),
        indian_path: "indian/01.wav".to_string(),
        a_path: "a/01.wav".to_string(),
        b_path: "b/01.wav".to_string(),
    }])
    .unwrap();
    let store = LocalFileStore::open(&dir.path().join("results")).await.unwrap();
    let controller = Arc::new(SessionController::new(Arc::new(catalog), Arc::new(store), 1));

    build_router(AppState::new(controller, "Test".to_string(), audio_root))
}

fn json_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Body Size Limit Tests
// =============================================================================

#[tokio::test]
async fn test_oversized_body_rejected() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let body = format!(
        r#"{{"name": "Jane Doe", "padding": "{}"}}"#,
        "x".repeat(MAX_BODY_BYTES + 1024)
    );
    let response = app.oneshot(json_request("/api/sessions", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_body_under_limit_accepted() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let body = format!(
        r#"{{"name": "Jane Doe", "padding": "{}"}}"#,
        "x".repeat(MAX_BODY_BYTES / 2)
    );
    let response = app.oneshot(json_request("/api/sessions", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Audio Serving Tests
// =============================================================================

#[tokio::test]
async fn test_audio_file_served() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app.oneshot(get("/audio/native/01.wav")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_audio_not_found() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app.oneshot(get("/audio/indian/01.wav")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_audio_path_traversal_blocked() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app.oneshot(get("/audio/../secret.txt")).await.unwrap();
    assert_ne!(response.status(), StatusCode::OK);

    let response = setup_app(&dir)
        .await
        .oneshot(get("/audio/%2e%2e/secret.txt"))
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}
