//! Upload staging integration tests.
//!
//! Tests verify:
//! - Success envelopes carry the staged URL and probed dimensions
//! - Validation failures answer 200 with an error envelope and touch nothing
//! - Restaging keeps a single temp file per session
//! - Access denial answers a bare 403

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;

use cropstage::hooks::{AccessChecker, FnAccessChecker, Operation};
use cropstage::session::SlotStore;

use super::test_utils::{
    build_app, build_app_with, jpeg_bytes, json_body, png_bytes, upload_request,
    upload_request_with_part, AppOptions,
};

// =============================================================================
// Success Path
// =============================================================================

#[tokio::test]
async fn test_upload_success_envelope() {
    let app = build_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "img.jpeg", &jpeg_bytes(100, 100)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["url"], "/img/temp/img.jpeg");
    assert_eq!(body["width"], 100);
    assert_eq!(body["height"], 100);

    // The staged file is on disk and bound to the session
    assert_eq!(app.temp_files(), vec!["img.jpeg"]);
    assert_eq!(app.slots.get("s1").await, Some("img.jpeg".to_string()));
}

#[tokio::test]
async fn test_upload_unique_names() {
    let app = build_app_with(AppOptions {
        unique_names: true,
        ..AppOptions::default()
    });

    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "photo.png", &png_bytes(10, 10)))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");

    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/img/temp/i-"));
    assert!(url.ends_with(".png"));
    assert!(!url.contains("photo"));
}

#[tokio::test]
async fn test_restage_keeps_single_temp_file() {
    let app = build_app_with(AppOptions {
        unique_names: true,
        ..AppOptions::default()
    });

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(upload_request("s1", "a.jpeg", &jpeg_bytes(8, 8)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Only the latest staged file survives
    assert_eq!(app.temp_files().len(), 1);
    assert_eq!(
        app.slots.get("s1").await,
        Some(app.temp_files()[0].clone())
    );
}

// =============================================================================
// Validation Failures
// =============================================================================

#[tokio::test]
async fn test_upload_rejected_extension() {
    let app = build_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "image.bmp", &jpeg_bytes(8, 8)))
        .await
        .unwrap();

    // Ordinary failure: HTTP 200 with an error envelope
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Only files with these extensions are allowed"));

    // Nothing was written, nothing was bound
    assert!(app.temp_files().is_empty());
    assert_eq!(app.slots.get("s1").await, None);
}

#[tokio::test]
async fn test_upload_content_mismatch() {
    let app = build_app();

    // PNG bytes under a jpeg name fail the magic-byte check
    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "fake.jpeg", &png_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_upload_without_image_part() {
    let app = build_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request_with_part(
            "s1",
            "attachment",
            "img.jpeg",
            &jpeg_bytes(8, 8),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "No image was uploaded.");
}

#[tokio::test]
async fn test_upload_not_an_image() {
    let app = build_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "img.jpeg", b"not image data at all"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(app.temp_files().is_empty());
}

#[tokio::test]
async fn test_failed_upload_preserves_previous_stage() {
    let app = build_app();

    app.router
        .clone()
        .oneshot(upload_request("s1", "good.jpeg", &jpeg_bytes(8, 8)))
        .await
        .unwrap();

    // A rejected upload must not disturb the existing staged file
    app.router
        .clone()
        .oneshot(upload_request("s1", "bad.bmp", &jpeg_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(app.temp_files(), vec!["good.jpeg"]);
    assert_eq!(app.slots.get("s1").await, Some("good.jpeg".to_string()));
}

// =============================================================================
// Access Control
// =============================================================================

#[tokio::test]
async fn test_upload_denied_is_bare_403() {
    let checker: Arc<dyn AccessChecker> =
        Arc::new(FnAccessChecker(|op, _session: &str| op != Operation::Upload));
    let app = build_app_with(AppOptions {
        access: Some(checker),
        ..AppOptions::default()
    });

    let response = app
        .router
        .clone()
        .oneshot(upload_request("s1", "img.jpeg", &jpeg_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.temp_files().is_empty());
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app();

    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
