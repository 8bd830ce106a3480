//! Configuration management for cropstage.
//!
//! Options can be supplied as command-line arguments or environment variables
//! with the `CROP_` prefix:
//!
//! - `CROP_HOST` - Server bind address (default: 0.0.0.0)
//! - `CROP_PORT` - Server port (default: 3000)
//! - `CROP_WEB_ROOT` - Directory public URLs resolve against (required)
//! - `CROP_TEMP_DIR` - Temp storage for staged uploads (required)
//! - `CROP_TEMP_URL` - Public URL prefix for staged uploads (required)
//! - `CROP_DEST_DIR` - Permanent storage for committed images (required)
//! - `CROP_DEST_URL` - Public URL prefix for committed images (required)
//! - `CROP_EXTENSIONS` - Allowed upload extensions (default: jpg,jpeg,png,gif)
//! - `CROP_MAX_UPLOAD_BYTES` - Upload size cap (default: 3000000)

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::error::ConfigError;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default upload size cap in bytes (3 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 3_000_000;

/// Default extension allow-list.
pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,gif";

// =============================================================================
// CLI Arguments
// =============================================================================

/// cropstage - an upload/stage/crop backend for browser image croppers.
///
/// Accepts an image upload into session-scoped temp storage, then commits a
/// client-described resize/rotate/crop transform to permanent storage.
#[derive(Parser, Debug, Clone)]
#[command(name = "cropstage")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CROP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CROP_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory that public image URLs resolve against.
    ///
    /// The crop request's `imgUrl` field is joined to this directory when
    /// locating the staged source file.
    #[arg(long, env = "CROP_WEB_ROOT")]
    pub web_root: PathBuf,

    /// Directory for staged (uploaded but not yet committed) images.
    #[arg(long, env = "CROP_TEMP_DIR")]
    pub temp_dir: PathBuf,

    /// Public URL prefix for staged images (e.g. "/img/temp/").
    #[arg(long, env = "CROP_TEMP_URL")]
    pub temp_url: String,

    /// Directory for committed (cropped) images.
    #[arg(long, env = "CROP_DEST_DIR")]
    pub dest_dir: PathBuf,

    /// Public URL prefix for committed images (e.g. "/img/cropped/").
    #[arg(long, env = "CROP_DEST_URL")]
    pub dest_url: String,

    // =========================================================================
    // Upload Validation
    // =========================================================================
    /// Allowed upload extensions (comma-separated).
    #[arg(long, default_value = DEFAULT_EXTENSIONS, env = "CROP_EXTENSIONS", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Maximum upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "CROP_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: u64,

    /// Verify the file content matches the claimed extension (magic-byte sniff).
    #[arg(long, default_value_t = true, env = "CROP_CHECK_CONTENT_TYPE")]
    pub check_content_type: bool,

    /// Generate collision-free names for staged files instead of using the
    /// client file name verbatim.
    #[arg(long, default_value_t = true, env = "CROP_UNIQUE_NAMES")]
    pub unique_names: bool,

    // =========================================================================
    // Commit Policy
    // =========================================================================
    /// Delete the previously committed image (read from the persistence sink)
    /// before writing a replacement.
    #[arg(long, default_value_t = false, env = "CROP_OVERWRITE_PREVIOUS")]
    pub overwrite_previous: bool,

    /// Persist the full public URL into the sink instead of the bare file name.
    #[arg(long, default_value_t = true, env = "CROP_PERSIST_FULL_PATH")]
    pub persist_full_path: bool,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CROP_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Fails fast before any request is served: empty paths, empty URL
    /// prefixes, an empty extension list, or a zero size cap are all fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "web_root" });
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "temp_dir" });
        }
        if self.dest_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStoragePath { option: "dest_dir" });
        }

        if self.temp_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrlPrefix { option: "temp_url" });
        }
        if self.dest_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrlPrefix { option: "dest_url" });
        }

        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::EmptyExtensionList);
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroSizeCap);
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Ensure a storage directory exists, creating it if necessary.
///
/// Mirrors the fail-fast contract of [`Config::validate`]: a directory that
/// cannot be created is a fatal configuration error, not a per-request error.
pub fn ensure_directory(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyStoragePath { option: "path" });
    }
    std::fs::create_dir_all(path).map_err(|e| ConfigError::DirectoryNotCreatable {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Normalize a public URL prefix so joining a file name yields exactly one
/// separator: "img/temp" and "img/temp/" both become "img/temp/".
pub fn normalize_url_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    format!("{}/", trimmed)
}

// =============================================================================
// Tests
// =============================================================================
