//! Crop commit integration tests.
//!
//! Tests verify:
//! - Validation failures answer 200 with an error envelope and leave the
//!   staged file in place
//! - Corrupt session state (no slot, missing source) answers 500
//! - The persistence sink receives the committed value, and a previous
//!   committed file is retired under the overwrite policy
//! - Access denial answers a bare 403

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;

use cropstage::hooks::{AccessChecker, FnAccessChecker, Operation, PersistenceSink};
use cropstage::session::SlotStore;
use cropstage::InMemorySink;

use super::test_utils::{
    build_app, build_app_with, crop_request, full_crop_fields, jpeg_bytes, json_body,
    upload_request, AppOptions, TestApp,
};

/// Upload a square JPEG for the session and return the staged URL.
async fn stage_image(app: &TestApp, session: &str, size: u32) -> String {
    let response = app
        .router
        .clone()
        .oneshot(upload_request(session, "img.jpeg", &jpeg_bytes(size, size)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    body["url"].as_str().unwrap().to_string()
}

// =============================================================================
// Validation Failures
// =============================================================================

#[tokio::test]
async fn test_missing_field_is_error_envelope() {
    let app = build_app();
    let url = stage_image(&app, "s1", 100).await;

    let mut fields = full_crop_fields(&url, "100");
    fields.retain(|(name, _)| *name != "cropW");

    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &fields))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Could not process the image.");

    // The staged file survives for retry
    assert_eq!(app.temp_files(), vec!["img.jpeg"]);
    assert_eq!(app.slots.get("s1").await, Some("img.jpeg".to_string()));
}

#[tokio::test]
async fn test_non_numeric_field_is_error_envelope() {
    let app = build_app();
    let url = stage_image(&app, "s1", 100).await;

    let mut fields = full_crop_fields(&url, "100");
    for (name, value) in &mut fields {
        if *name == "imgW" {
            *value = "wide".to_string();
        }
    }

    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &fields))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(app.dest_files().is_empty());
}

#[tokio::test]
async fn test_out_of_bounds_crop_is_error_envelope() {
    let app = build_app();
    let url = stage_image(&app, "s1", 100).await;

    // Crop rectangle extends past the resized bounds
    let mut fields = full_crop_fields(&url, "100");
    for (name, value) in &mut fields {
        if *name == "imgX1" {
            *value = "80".to_string();
        }
        if *name == "cropW" {
            *value = "50".to_string();
        }
    }

    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &fields))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");

    // Staged state untouched
    assert_eq!(app.temp_files(), vec!["img.jpeg"]);
    assert!(app.dest_files().is_empty());
}

// =============================================================================
// Integrity Failures
// =============================================================================

#[tokio::test]
async fn test_crop_without_staged_image_is_500() {
    let app = build_app();

    let fields = full_crop_fields("/img/temp/img.jpeg", "100");
    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &fields))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_crop_with_missing_source_is_500() {
    let app = build_app();
    let url = stage_image(&app, "s1", 100).await;

    // The slot is bound but the file is gone
    std::fs::remove_file(app.temp_dir.join("img.jpeg")).unwrap();

    let fields = full_crop_fields(&url, "100");
    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &fields))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(app.dest_files().is_empty());
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_sink_receives_committed_url() {
    let sink = Arc::new(InMemorySink::new());
    let app = build_app_with(AppOptions {
        sink: Some(sink.clone()),
        ..AppOptions::default()
    });
    let url = stage_image(&app, "s1", 100).await;

    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &full_crop_fields(&url, "100")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(
        sink.current_value(),
        Some("/img/cropped/img.jpeg".to_string())
    );
}

#[tokio::test]
async fn test_overwrite_previous_retires_old_file() {
    let sink = Arc::new(InMemorySink::with_value("/img/cropped/old.jpeg"));
    let app = build_app_with(AppOptions {
        sink: Some(sink.clone()),
        overwrite_previous: true,
        ..AppOptions::default()
    });

    // Seed the previously committed file
    std::fs::write(app.dest_dir.join("old.jpeg"), jpeg_bytes(10, 10)).unwrap();

    let url = stage_image(&app, "s1", 100).await;
    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &full_crop_fields(&url, "100")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.dest_files(), vec!["img.jpeg"]);
    assert_eq!(
        sink.current_value(),
        Some("/img/cropped/img.jpeg".to_string())
    );
}

#[tokio::test]
async fn test_persist_bare_name() {
    let sink = Arc::new(InMemorySink::new());
    let app = build_app_with(AppOptions {
        sink: Some(sink.clone()),
        persist_full_path: false,
        ..AppOptions::default()
    });
    let url = stage_image(&app, "s1", 100).await;

    app.router
        .clone()
        .oneshot(crop_request("s1", &full_crop_fields(&url, "100")))
        .await
        .unwrap();

    assert_eq!(sink.current_value(), Some("img.jpeg".to_string()));
}

// =============================================================================
// Access Control
// =============================================================================

#[tokio::test]
async fn test_crop_denied_is_bare_403() {
    let checker: Arc<dyn AccessChecker> =
        Arc::new(FnAccessChecker(|op, _session: &str| op != Operation::Crop));
    let app = build_app_with(AppOptions {
        access: Some(checker),
        ..AppOptions::default()
    });
    let url = stage_image(&app, "s1", 100).await;

    let response = app
        .router
        .clone()
        .oneshot(crop_request("s1", &full_crop_fields(&url, "100")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nothing committed, staged file untouched
    assert!(app.dest_files().is_empty());
    assert_eq!(app.temp_files(), vec!["img.jpeg"]);
}
