//! Crop commit: request validation, the transform pipeline, and the
//! committer service.

mod committer;
mod pipeline;
mod request;

pub use committer::{CommittedImage, CropCommitter};
pub use pipeline::{rotate_image, transform, TransformSpec};
pub use request::{strip_tags, CropForm, CropRequest};
