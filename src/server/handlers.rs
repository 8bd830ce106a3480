//! HTTP request handlers for the crop staging API.
//!
//! This module contains the Axum handlers for uploading, cropping and health
//! checks.
//!
//! # Endpoints
//!
//! - `POST /upload` - Stage an uploaded image (multipart, part name "img")
//! - `POST /crop` - Commit a crop of the staged image (urlencoded form)
//! - `GET /health` - Health check endpoint
//!
//! # Response convention
//!
//! The upload and crop endpoints answer HTTP 200 for both success and
//! ordinary failure, carrying the outcome in a JSON envelope with a `status`
//! discriminator. Browser-side croppers read that envelope; a non-200 status
//! is reserved for conditions the widget cannot handle: 403 when the access
//! checker denies the operation, 500 when session state is corrupt.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Multipart, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::crop::{CropCommitter, CropForm};
use crate::error::{CropError, UploadError};
use crate::hooks::{AccessChecker, Operation};
use crate::session::SessionLocks;
use crate::stage::{UploadStager, UploadedImage};

/// Header carrying the client's session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

/// Cookie consulted when the session header is absent.
pub const SESSION_COOKIE: &str = "sid";

/// Session used when the client identifies itself in no way at all.
const DEFAULT_SESSION: &str = "anonymous";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Stages uploads into session temp storage
    pub stager: Arc<UploadStager>,

    /// Commits crops of the staged image
    pub committer: Arc<CropCommitter>,

    /// Per-session locks serializing stage/commit for the same session
    pub locks: Arc<SessionLocks>,

    /// Optional access checker consulted before either operation
    pub access: Option<Arc<dyn AccessChecker>>,
}

impl AppState {
    /// Create a new application state with the given services.
    pub fn new(stager: UploadStager, committer: CropCommitter) -> Self {
        Self {
            stager: Arc::new(stager),
            committer: Arc::new(committer),
            locks: Arc::new(SessionLocks::new()),
            access: None,
        }
    }

    /// Gate upload and crop behind an access checker.
    pub fn with_access_checker(mut self, checker: Arc<dyn AccessChecker>) -> Self {
        self.access = Some(checker);
        self
    }

    fn allowed(&self, operation: Operation, session_id: &str) -> bool {
        match &self.access {
            Some(checker) => checker.can_access(operation, session_id),
            None => true,
        }
    }
}

// =============================================================================
// Session Identity
// =============================================================================

/// The caller's session identifier.
///
/// Read from the `X-Session-Id` header, then the `sid` cookie; a client that
/// sends neither shares the fallback session. Extraction never fails, so a
/// missing identity is an envelope-level concern, not a 4xx.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionId(extract_session_id(&parts.headers)))
    }
}

/// Resolve the session identifier from request headers.
pub fn extract_session_id(headers: &HeaderMap) -> String {
    if let Some(id) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return id.to_string();
    }

    if let Some(id) = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_from_cookie)
    {
        return id;
    }

    DEFAULT_SESSION.to_string()
}

fn session_from_cookie(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

// =============================================================================
// Response Types
// =============================================================================

/// The JSON envelope returned by the upload and crop endpoints.
///
/// The `status` field discriminates success from failure. Upload success
/// carries the staged image's true pixel dimensions; crop success carries the
/// committed URL only.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Success {
        /// Public URL of the staged or committed image
        url: String,

        /// Probed pixel width (upload responses only)
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u32>,

        /// Probed pixel height (upload responses only)
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    Error {
        /// Human-readable error message, safe to show to the end user
        message: String,
    },
}

impl Envelope {
    /// Success envelope for a staged upload.
    pub fn staged(url: impl Into<String>, width: u32, height: u32) -> Self {
        Envelope::Success {
            url: url.into(),
            width: Some(width),
            height: Some(height),
        }
    }

    /// Success envelope for a committed crop.
    pub fn committed(url: impl Into<String>) -> Self {
        Envelope::Success {
            url: url.into(),
            width: None,
            height: None,
        }
    }

    /// Error envelope with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle upload requests.
///
/// # Endpoint
///
/// `POST /upload` with a multipart body carrying the image in a part named
/// `img`.
///
/// # Response
///
/// - `200 OK`, success envelope: `{"status":"success","url":...,"width":...,"height":...}`
/// - `200 OK`, error envelope: validation or storage failure
/// - `403 Forbidden`: the access checker denied the upload
pub async fn upload_handler(
    State(state): State<AppState>,
    session: SessionId,
    mut multipart: Multipart,
) -> Response {
    if !state.allowed(Operation::Upload, &session.0) {
        warn!(session_id = %session.0, "upload denied by access checker");
        return StatusCode::FORBIDDEN.into_response();
    }

    let upload = match read_image_part(&mut multipart).await {
        Ok(upload) => upload,
        Err(err) => {
            warn!(session_id = %session.0, "upload rejected: {err}");
            return Json(Envelope::error(err.to_string())).into_response();
        }
    };

    // The lock covers the whole stage: delete of the previous temp file,
    // write, slot rebind.
    let _guard = state.locks.acquire(&session.0).await;

    match state.stager.stage(&session.0, upload).await {
        Ok(staged) => {
            info!(
                session_id = %session.0,
                file = %staged.file_name,
                width = staged.width,
                height = staged.height,
                "upload staged"
            );
            Json(Envelope::staged(staged.public_url, staged.width, staged.height)).into_response()
        }
        Err(err) => {
            warn!(session_id = %session.0, "upload rejected: {err}");
            Json(Envelope::error(err.to_string())).into_response()
        }
    }
}

/// Read the `img` part out of the multipart body.
async fn read_image_part(multipart: &mut Multipart) -> Result<UploadedImage, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::SaveFailed {
            message: e.to_string(),
        })?
    {
        if field.name() != Some("img") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(UploadError::MissingFile);
        }

        let bytes = field.bytes().await.map_err(|e| UploadError::SaveFailed {
            message: e.to_string(),
        })?;

        return Ok(UploadedImage { file_name, bytes });
    }

    Err(UploadError::MissingFile)
}

/// Handle crop commit requests.
///
/// # Endpoint
///
/// `POST /crop` with an urlencoded form: `imgUrl`, `imgW`, `imgH`, `imgX1`,
/// `imgY1`, `cropW`, `cropH`, `rotation`. All fields are required; the
/// numeric ones accept fractional values.
///
/// # Response
///
/// - `200 OK`, success envelope: `{"status":"success","url":...}`
/// - `200 OK`, error envelope: validation or processing failure; the staged
///   file survives for retry
/// - `403 Forbidden`: the access checker denied the crop
/// - `500 Internal Server Error`, error envelope: the session slot points at
///   a file that is gone
pub async fn crop_handler(
    State(state): State<AppState>,
    session: SessionId,
    Form(form): Form<CropForm>,
) -> Response {
    if !state.allowed(Operation::Crop, &session.0) {
        warn!(session_id = %session.0, "crop denied by access checker");
        return StatusCode::FORBIDDEN.into_response();
    }

    let _guard = state.locks.acquire(&session.0).await;

    let result = match form.into_request() {
        Ok(request) => state.committer.commit(&session.0, &request).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(committed) => {
            Json(Envelope::committed(committed.public_url)).into_response()
        }
        Err(err) if err.is_integrity_error() => {
            error!(session_id = %session.0, "session state is corrupt: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::error(err.to_string())),
            )
                .into_response()
        }
        Err(err) => {
            // The wire message is generic; the field or pipeline detail only
            // goes to the log.
            let detail = match &err {
                CropError::Validation { field } => format!("invalid field: {field}"),
                CropError::Processing { message } => message.clone(),
                _ => String::new(),
            };
            warn!(session_id = %session.0, %detail, "crop rejected: {err}");
            Json(Envelope::error(err.to_string())).into_response()
        }
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
