//! The crop committer: consumes the session's staged image and produces the
//! committed artifact.
//!
//! # Lifecycle
//!
//! ```text
//! request ──▶ validate geometry ──▶ read staged source ──▶
//!   resize ▶ rotate ▶ crop ▶ encode ──▶ write committed file ──▶
//!   persist (optional) ──▶ delete temp file ──▶ clear slot
//! ```
//!
//! The committed file keeps the staged file's name at the destination
//! directory; there is no rename. Any pipeline failure leaves the staged
//! file and the slot untouched so the client can retry; only a fully
//! successful commit consumes the slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use tracing::{debug, error, info, warn};

use crate::config::{ensure_directory, normalize_url_prefix};
use crate::error::{ConfigError, CropError};
use crate::hooks::PersistenceSink;
use crate::session::SlotStore;

use super::pipeline::{encode, transform, TransformSpec};
use super::request::CropRequest;

// =============================================================================
// Committed Image
// =============================================================================

/// The final artifact of a successful commit.
#[derive(Debug, Clone)]
pub struct CommittedImage {
    /// File name at the destination (same as the staged name).
    pub file_name: String,

    /// Absolute path of the committed file.
    pub storage_path: PathBuf,

    /// Public URL of the committed file.
    pub public_url: String,
}

// =============================================================================
// Crop Committer
// =============================================================================

/// Applies the client-described transform to the staged image and moves it to
/// permanent storage.
pub struct CropCommitter {
    web_root: PathBuf,
    dest_dir: PathBuf,
    dest_url: String,
    overwrite_previous: bool,
    persist_full_path: bool,
    slots: Arc<dyn SlotStore>,
    sink: Option<Arc<dyn PersistenceSink>>,
}

impl CropCommitter {
    /// Create a committer.
    ///
    /// Configuration problems (empty paths/prefixes, uncreatable destination
    /// directory) are fatal here, before any request is served.
    pub fn new(
        web_root: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        dest_url: &str,
        slots: Arc<dyn SlotStore>,
    ) -> Result<Self, ConfigError> {
        let web_root = web_root.into();
        let dest_dir = dest_dir.into();
        if web_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "web_root" });
        }
        if dest_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "dest_dir" });
        }
        if dest_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrlPrefix { option: "dest_url" });
        }
        ensure_directory(&dest_dir)?;

        Ok(Self {
            web_root,
            dest_dir,
            dest_url: normalize_url_prefix(dest_url),
            overwrite_previous: false,
            persist_full_path: true,
            slots,
            sink: None,
        })
    }

    /// Attach a persistence sink for the committed value.
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Delete the previously committed file (read from the sink) before
    /// writing a replacement.
    pub fn with_overwrite_previous(mut self, enabled: bool) -> Self {
        self.overwrite_previous = enabled;
        self
    }

    /// Persist the full public URL instead of the bare file name.
    pub fn with_persist_full_path(mut self, enabled: bool) -> Self {
        self.persist_full_path = enabled;
        self
    }

    /// Directory holding committed files.
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Commit the staged image for this session using the given transform.
    pub async fn commit(
        &self,
        session_id: &str,
        request: &CropRequest,
    ) -> Result<CommittedImage, CropError> {
        // Geometry validation happens before any storage access.
        let spec = TransformSpec::from_request(request)?;

        // The slot must name a staged file; its absence means the session
        // state is corrupt, not that the client sent a bad request.
        let staged_name = self
            .slots
            .get(session_id)
            .await
            .ok_or(CropError::NoStagedImage)?;

        let source_path = self.resolve_url(&request.img_url);
        let source_bytes = tokio::fs::read(&source_path).await.map_err(|e| {
            error!(
                session_id,
                path = %source_path.display(),
                "staged source is missing or unreadable: {e}"
            );
            CropError::MissingSource {
                path: source_path.display().to_string(),
            }
        })?;

        let source = image::load_from_memory(&source_bytes).map_err(|e| CropError::Processing {
            message: format!("decode failed: {e}"),
        })?;

        let output = transform(source, &spec)?;

        let dest_path = self.dest_dir.join(&staged_name);
        let format = format_for(&dest_path)?;
        let encoded = encode(&output, format)?;

        // Replace-an-avatar policy: the previous committed file is retired
        // just before the new one lands.
        if self.overwrite_previous {
            self.remove_previous(&dest_path).await;
        }

        tokio::fs::write(&dest_path, encoded)
            .await
            .map_err(|e| CropError::Processing {
                message: format!("write failed: {e}"),
            })?;

        let public_url = format!("{}{}", self.dest_url, staged_name);

        // Sink failures are warnings: the crop itself already succeeded.
        if let Some(sink) = &self.sink {
            let value = if self.persist_full_path {
                public_url.as_str()
            } else {
                staged_name.as_str()
            };
            if let Err(e) = sink.save(value) {
                warn!(session_id, value, "persistence sink failed: {e}");
            }
        }

        // The commit consumes the slot: retire the temp file and clear the
        // binding. A missing temp file at this point is tolerable.
        match tokio::fs::remove_file(&source_path).await {
            Ok(()) => debug!(session_id, path = %source_path.display(), "retired temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                session_id,
                path = %source_path.display(),
                "failed to delete temp file: {e}"
            ),
        }
        self.slots.clear(session_id).await;

        info!(session_id, file = %staged_name, "committed cropped image");

        Ok(CommittedImage {
            file_name: staged_name,
            storage_path: dest_path,
            public_url,
        })
    }

    /// Resolve a public URL against the web root.
    fn resolve_url(&self, url: &str) -> PathBuf {
        self.web_root.join(url.trim_start_matches('/'))
    }

    /// Delete the file referenced by the sink's current value, unless it is
    /// the path about to be written (same-name overwrites need no delete).
    async fn remove_previous(&self, dest_path: &Path) {
        let Some(sink) = &self.sink else { return };
        let Some(previous) = sink.current_value() else {
            return;
        };

        let previous_path = if self.persist_full_path {
            self.resolve_url(&previous)
        } else {
            self.dest_dir.join(&previous)
        };

        if previous_path == dest_path {
            return;
        }

        match tokio::fs::remove_file(&previous_path).await {
            Ok(()) => debug!(path = %previous_path.display(), "deleted previous committed image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %previous_path.display(),
                "failed to delete previous committed image: {e}"
            ),
        }
    }
}

/// Output format derived from the destination file extension.
fn format_for(path: &Path) -> Result<ImageFormat, CropError> {
    ImageFormat::from_path(path).map_err(|_| CropError::Processing {
        message: format!("unsupported output format: {}", path.display()),
    })
}

// =============================================================================
// Tests
// =============================================================================
