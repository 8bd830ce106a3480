//! Upload validation: extension allow-list, size cap, content sniffing.
//!
//! All checks run against the in-memory upload before any file is written, so
//! a rejected upload has no side effects.

use crate::error::UploadError;

use super::stager::UploadedImage;

// =============================================================================
// Validation Rules
// =============================================================================

/// Pluggable rules for the image validator, supplied by configuration.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Allowed file extensions, matched case-insensitively.
    pub extensions: Vec<String>,

    /// Maximum upload size in bytes.
    pub max_size_bytes: u64,

    /// Verify magic bytes match the claimed extension.
    pub check_content_type: bool,
}

impl ValidationRules {
    pub fn new(extensions: Vec<String>, max_size_bytes: u64, check_content_type: bool) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            max_size_bytes,
            check_content_type,
        }
    }

    /// The allow-list as a display string, e.g. "jpg, png".
    pub fn allowed_list(&self) -> String {
        self.extensions.join(", ")
    }
}

// =============================================================================
// Image Validator
// =============================================================================

/// Validates an uploaded image against a set of [`ValidationRules`].
#[derive(Debug, Clone)]
pub struct ImageValidator {
    rules: ValidationRules,
}

impl ImageValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Run all checks. Returns the first failure, mirroring a validator that
    /// reports its first error message.
    pub fn validate(&self, upload: &UploadedImage) -> Result<(), UploadError> {
        if upload.bytes.is_empty() {
            return Err(UploadError::MissingFile);
        }

        let extension = match extension_of(&upload.file_name) {
            Some(ext) => ext,
            None => {
                return Err(UploadError::ExtensionNotAllowed {
                    extension: String::new(),
                    allowed: self.rules.allowed_list(),
                })
            }
        };

        if !self.rules.extensions.contains(&extension) {
            return Err(UploadError::ExtensionNotAllowed {
                extension,
                allowed: self.rules.allowed_list(),
            });
        }

        let size = upload.bytes.len() as u64;
        if size > self.rules.max_size_bytes {
            return Err(UploadError::TooLarge {
                size,
                max_size: self.rules.max_size_bytes,
            });
        }

        if self.rules.check_content_type {
            self.check_content(&extension, &upload.bytes)?;
        }

        Ok(())
    }

    /// Sniff the magic bytes and require them to agree with the claimed
    /// extension. Client-declared content types are never trusted.
    fn check_content(&self, extension: &str, bytes: &[u8]) -> Result<(), UploadError> {
        let format = image::guess_format(bytes).map_err(|_| UploadError::NotAnImage)?;

        // "jpg" and "jpeg" both belong to ImageFormat::Jpeg, etc.
        if format.extensions_str().contains(&extension) {
            Ok(())
        } else {
            Err(UploadError::ContentMismatch {
                extension: extension.to_string(),
            })
        }
    }
}

/// Lowercased extension of a file name, if it has one.
pub fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

// =============================================================================
// Tests
// =============================================================================
