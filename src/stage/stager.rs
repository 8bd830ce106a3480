//! The upload stager: validates an upload and stores it as the session's
//! staged image.
//!
//! # Lifecycle
//!
//! ```text
//! upload ──▶ validate ──▶ retire previous staged file ──▶ write ──▶ bind slot
//! ```
//!
//! Restaging deletes the prior temp file before the new bytes land, so a
//! session owns at most one live temp file at any time. The slot is rebound
//! only after a successful write; a failed write leaves the slot unbound
//! rather than pointing at a file that does not exist.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ensure_directory, normalize_url_prefix};
use crate::error::{ConfigError, UploadError};
use crate::session::SlotStore;

use super::validator::{extension_of, ImageValidator, ValidationRules};

// =============================================================================
// Upload Types
// =============================================================================

/// An uploaded file, read fully into memory from the request body.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied file name (used for the extension and, when unique
    /// naming is off, for the stored name).
    pub file_name: String,

    /// The raw upload bytes.
    pub bytes: Bytes,
}

/// A staged image: uploaded, validated and written to temp storage, awaiting
/// a crop commit.
#[derive(Debug, Clone)]
pub struct StagedImage {
    /// Stored file name (unique-generated or client-supplied).
    pub file_name: String,

    /// Absolute path of the staged file.
    pub storage_path: PathBuf,

    /// Public URL of the staged file.
    pub public_url: String,

    /// True pixel width, probed from the stored bytes.
    pub width: u32,

    /// True pixel height, probed from the stored bytes.
    pub height: u32,
}

// =============================================================================
// Upload Stager
// =============================================================================

/// Stages uploads into session-scoped temp storage.
pub struct UploadStager {
    temp_dir: PathBuf,
    temp_url: String,
    unique_names: bool,
    validator: ImageValidator,
    slots: Arc<dyn SlotStore>,
}

impl UploadStager {
    /// Create a stager.
    ///
    /// Fails fast on configuration errors: an empty temp directory or URL
    /// prefix, or a directory that cannot be created, is fatal here rather
    /// than a per-request error.
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        temp_url: &str,
        unique_names: bool,
        rules: ValidationRules,
        slots: Arc<dyn SlotStore>,
    ) -> Result<Self, ConfigError> {
        let temp_dir = temp_dir.into();
        if temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "temp_dir" });
        }
        if temp_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrlPrefix { option: "temp_url" });
        }
        ensure_directory(&temp_dir)?;

        Ok(Self {
            temp_dir,
            temp_url: normalize_url_prefix(temp_url),
            unique_names,
            validator: ImageValidator::new(rules),
            slots,
        })
    }

    /// Directory holding staged files.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Validate and stage an upload for the given session.
    ///
    /// On success exactly one file was written, at most one (the previously
    /// staged file) was deleted, and the slot is bound to the new name. On
    /// validation failure nothing was touched.
    pub async fn stage(
        &self,
        session_id: &str,
        upload: UploadedImage,
    ) -> Result<StagedImage, UploadError> {
        self.validator.validate(&upload)?;

        let file_name = self.stored_name(&upload)?;

        // Retire the previous staged file before the new one lands. The slot
        // is cleared here and rebound only after the write succeeds.
        if let Some(previous) = self.slots.get(session_id).await {
            let previous_path = self.temp_dir.join(&previous);
            match tokio::fs::remove_file(&previous_path).await {
                Ok(()) => debug!(session_id, file = %previous, "retired staged file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    session_id,
                    file = %previous,
                    "failed to delete staged file: {e}"
                ),
            }
            self.slots.clear(session_id).await;
        }

        let storage_path = self.temp_dir.join(&file_name);
        tokio::fs::write(&storage_path, &upload.bytes)
            .await
            .map_err(|e| UploadError::SaveFailed {
                message: e.to_string(),
            })?;

        self.slots.set(session_id, &file_name).await;

        // Dimensions come from the stored bytes, never from anything the
        // client declared.
        let (width, height) = probe_dimensions(&upload.bytes)?;

        debug!(session_id, file = %file_name, width, height, "staged upload");

        Ok(StagedImage {
            public_url: format!("{}{}", self.temp_url, file_name),
            file_name,
            storage_path,
            width,
            height,
        })
    }

    /// Compute the stored file name.
    ///
    /// Unique mode synthesizes a collision-free name from a random token and
    /// the original extension. Verbatim mode keeps the client name but strips
    /// any path components, so an upload can never escape the temp directory.
    fn stored_name(&self, upload: &UploadedImage) -> Result<String, UploadError> {
        if self.unique_names {
            // The validator has already required a known extension.
            let extension = extension_of(&upload.file_name).ok_or(UploadError::MissingFile)?;
            Ok(format!("i-{}.{}", Uuid::new_v4().simple(), extension))
        } else {
            let name = Path::new(&upload.file_name)
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or(UploadError::MissingFile)?;
            Ok(name.to_string())
        }
    }
}

/// Read pixel dimensions from encoded image bytes.
fn probe_dimensions(bytes: &[u8]) -> Result<(u32, u32), UploadError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| UploadError::ProbeFailed {
            message: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| UploadError::ProbeFailed {
            message: e.to_string(),
        })
}

// =============================================================================
// Tests
// =============================================================================
