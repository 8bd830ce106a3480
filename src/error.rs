use thiserror::Error;

/// Fatal configuration errors, surfaced at startup or component construction.
///
/// These are never recoverable per-request: a component that fails to
/// construct must not serve traffic.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required storage path option is empty
    #[error("The \"{option}\" option is empty; a storage directory is required")]
    EmptyStoragePath { option: &'static str },

    /// A required public URL prefix option is empty
    #[error("The \"{option}\" option is empty; a public URL prefix is required")]
    EmptyUrlPrefix { option: &'static str },

    /// The configured directory does not exist and could not be created
    #[error("The directory \"{path}\" does not exist and could not be created: {message}")]
    DirectoryNotCreatable { path: String, message: String },

    /// The extension allow-list is empty
    #[error("The extension allow-list is empty; at least one extension is required")]
    EmptyExtensionList,

    /// The upload size cap is zero
    #[error("max_upload_bytes must be greater than 0")]
    ZeroSizeCap,
}

/// Per-request upload failures. All variants are recoverable: the request is
/// rejected with an error envelope. Validation variants occur before any file
/// is touched; `SaveFailed` occurs after the previous staged file was retired
/// but leaves the slot unbound rather than pointing at a missing file.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// No file part named "img" was present in the request
    #[error("No image was uploaded.")]
    MissingFile,

    /// The uploaded file has no extension or one outside the allow-list
    #[error("Only files with these extensions are allowed: {allowed}.")]
    ExtensionNotAllowed { extension: String, allowed: String },

    /// The file content does not match the claimed extension
    #[error("The file content does not match the \"{extension}\" extension.")]
    ContentMismatch { extension: String },

    /// The uploaded bytes are not a recognizable image
    #[error("The uploaded file is not a valid image.")]
    NotAnImage,

    /// The upload exceeds the configured size cap
    #[error("The uploaded image is too big ({size} bytes, max {max_size}).")]
    TooLarge { size: u64, max_size: u64 },

    /// Writing the staged file failed
    #[error("Could not upload the image.")]
    SaveFailed { message: String },

    /// The saved file's dimensions could not be read back
    #[error("Could not read the uploaded image.")]
    ProbeFailed { message: String },
}

/// Per-request crop/commit failures.
///
/// `Validation` and `Processing` are ordinary, recoverable failures: the
/// staged file and session slot are left untouched so the client can retry.
/// `NoStagedImage` and `MissingSource` indicate corrupted session state (the
/// slot points at an artifact that is gone) and are surfaced distinctly.
#[derive(Debug, Clone, Error)]
pub enum CropError {
    /// A required field is missing or malformed; reported generically on the
    /// wire, the specific field is carried for logging
    #[error("Could not process the image.")]
    Validation { field: &'static str },

    /// No staged file is bound to this session
    #[error("No staged image exists for this session.")]
    NoStagedImage,

    /// The staged source file is missing or unreadable
    #[error("The staged image does not exist or cannot be read: {path}")]
    MissingSource { path: String },

    /// The resize/rotate/crop/encode pipeline failed
    #[error("Could not process the image.")]
    Processing { message: String },
}

impl CropError {
    /// Whether this error indicates corrupted session/slot state rather than
    /// a bad request.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, CropError::NoStagedImage | CropError::MissingSource { .. })
    }
}

/// Failure to write the committed value into the optional persistence sink.
///
/// Never flips a computed success response; logged as a warning instead.
#[derive(Debug, Clone, Error)]
#[error("Persistence sink rejected the value: {message}")]
pub struct PersistError {
    pub message: String,
}

impl PersistError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
