//! Test utilities for integration tests.
//!
//! This module provides helpers for building a service instance against a
//! throwaway web root and for constructing multipart and form requests the
//! way a browser cropper sends them.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tempfile::TempDir;

use cropstage::hooks::AccessChecker;
use cropstage::server::{create_router, AppState, RouterConfig, SESSION_HEADER};
use cropstage::session::{InMemorySlotStore, SlotStore};
use cropstage::stage::ValidationRules;
use cropstage::{CropCommitter, InMemorySink, UploadStager};

/// Multipart boundary used by all test upload bodies.
const BOUNDARY: &str = "----cropstage-test-boundary";

// =============================================================================
// Test Application
// =============================================================================

/// A service instance wired against a throwaway directory tree:
///
/// ```text
/// <root>/img/temp     - staged uploads
/// <root>/img/cropped  - committed images
/// ```
pub struct TestApp {
    pub router: Router,
    pub web_root: PathBuf,
    pub temp_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub slots: Arc<InMemorySlotStore>,
    _root: TempDir,
}

/// Options for building a test application.
pub struct AppOptions {
    pub unique_names: bool,
    pub sink: Option<Arc<InMemorySink>>,
    pub overwrite_previous: bool,
    pub persist_full_path: bool,
    pub access: Option<Arc<dyn AccessChecker>>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            unique_names: false,
            sink: None,
            overwrite_previous: false,
            persist_full_path: true,
            access: None,
        }
    }
}

/// Build a test application with default options (verbatim file names, no
/// sink, no access checker).
pub fn build_app() -> TestApp {
    build_app_with(AppOptions::default())
}

/// Build a test application with the given options.
pub fn build_app_with(options: AppOptions) -> TestApp {
    let root = TempDir::new().unwrap();
    let web_root = root.path().to_path_buf();
    let temp_dir = web_root.join("img/temp");
    let dest_dir = web_root.join("img/cropped");

    let slots = Arc::new(InMemorySlotStore::new());

    let rules = ValidationRules::new(
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        3_000_000,
        true,
    );

    let stager = UploadStager::new(
        &temp_dir,
        "/img/temp/",
        options.unique_names,
        rules,
        slots.clone() as Arc<dyn SlotStore>,
    )
    .unwrap();

    let mut committer = CropCommitter::new(
        &web_root,
        &dest_dir,
        "/img/cropped/",
        slots.clone() as Arc<dyn SlotStore>,
    )
    .unwrap()
    .with_overwrite_previous(options.overwrite_previous)
    .with_persist_full_path(options.persist_full_path);

    if let Some(sink) = options.sink {
        committer = committer.with_sink(sink);
    }

    let mut state = AppState::new(stager, committer);
    if let Some(access) = options.access {
        state = state.with_access_checker(access);
    }

    let router = create_router(state, RouterConfig::new().with_tracing(false));

    TestApp {
        router,
        web_root,
        temp_dir,
        dest_dir,
        slots,
        _root: root,
    }
}

impl TestApp {
    /// File names currently in the temp directory, sorted.
    pub fn temp_files(&self) -> Vec<String> {
        list_files(&self.temp_dir)
    }

    /// File names currently in the destination directory, sorted.
    pub fn dest_files(&self) -> Vec<String> {
        list_files(&self.dest_dir)
    }
}

fn list_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// Encode a solid-color JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([180, 90, 45]));
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Encode a solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =============================================================================
// Request Builders
// =============================================================================

/// Build a multipart upload request carrying the image in a part named `img`.
pub fn upload_request(session: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    upload_request_with_part(session, "img", file_name, bytes)
}

/// Build a multipart upload request with an arbitrary part name.
pub fn upload_request_with_part(
    session: &str,
    part_name: &str,
    file_name: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{part_name}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(SESSION_HEADER, session)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Build an urlencoded crop request from field name/value pairs.
pub fn crop_request(session: &str, fields: &[(&str, String)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    Request::builder()
        .method("POST")
        .uri("/crop")
        .header(SESSION_HEADER, session)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// The full set of crop fields for an identity transform of a square image,
/// minus whichever a test removes.
pub fn full_crop_fields(img_url: &str, size: &str) -> Vec<(&'static str, String)> {
    vec![
        ("imgUrl", img_url.to_string()),
        ("imgW", size.to_string()),
        ("imgH", size.to_string()),
        ("imgX1", "0".to_string()),
        ("imgY1", "0".to_string()),
        ("cropW", size.to_string()),
        ("cropH", size.to_string()),
        ("rotation", "0".to_string()),
    ]
}

/// Collect a response body and parse it as JSON.
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
