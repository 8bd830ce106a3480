//! # cropstage
//!
//! An upload/stage/crop backend for browser image croppers.
//!
//! The service implements a two-step lifecycle: a client uploads an image,
//! which is validated and staged into session-scoped temp storage, then
//! submits the crop geometry its widget collected, and the service applies
//! the resize/rotate/crop transform and moves the result to permanent
//! storage. Each session owns at most one staged file at a time; a commit
//! consumes it.
//!
//! ## Features
//!
//! - **Upload staging**: Extension allow-list, size cap and magic-byte
//!   content checks before any file is written
//! - **Session slots**: At most one staged temp file per session, with
//!   per-session locking around stage and commit
//! - **Transform pipeline**: Exact resize, arbitrary-angle rotation with
//!   canvas expansion, crop and re-encode, all in pure Rust
//! - **Pluggable seams**: Optional access checking and persistence of the
//!   committed URL behind injected traits
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`stage`] - Upload validation and staging
//! - [`crop`] - Crop request parsing, the transform pipeline and the committer
//! - [`session`] - Session slot store and per-session locks
//! - [`hooks`] - Access-checker and persistence-sink traits
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cropstage::{
//!     create_router, AppState, CropCommitter, InMemorySlotStore, RouterConfig, SlotStore,
//!     UploadStager, ValidationRules,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let slots: Arc<dyn SlotStore> = Arc::new(InMemorySlotStore::new());
//!     let rules = ValidationRules::new(
//!         vec!["jpg".into(), "jpeg".into(), "png".into()],
//!         3_000_000,
//!         true,
//!     );
//!
//!     let stager = UploadStager::new(
//!         "/srv/web/img/temp",
//!         "/img/temp/",
//!         true,
//!         rules,
//!         slots.clone(),
//!     )?;
//!     let committer =
//!         CropCommitter::new("/srv/web", "/srv/web/img/cropped", "/img/cropped/", slots)?;
//!
//!     let state = AppState::new(stager, committer);
//!     let router = create_router(state, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crop;
pub mod error;
pub mod hooks;
pub mod server;
pub mod session;
pub mod stage;

// Re-export commonly used types
pub use config::{
    ensure_directory, normalize_url_prefix, Config, DEFAULT_EXTENSIONS, DEFAULT_HOST,
    DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT,
};
pub use crop::{
    rotate_image, strip_tags, transform, CommittedImage, CropCommitter, CropForm, CropRequest,
    TransformSpec,
};
pub use error::{ConfigError, CropError, PersistError, UploadError};
pub use hooks::{AccessChecker, FnAccessChecker, InMemorySink, Operation, PersistenceSink};
pub use server::{
    create_router, extract_session_id, AppState, Envelope, HealthResponse, RouterConfig, SessionId,
    SESSION_COOKIE, SESSION_HEADER,
};
pub use session::{InMemorySlotStore, SessionLocks, SlotStore};
pub use stage::{
    extension_of, ImageValidator, StagedImage, UploadStager, UploadedImage, ValidationRules,
};
