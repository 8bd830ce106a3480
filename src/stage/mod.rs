//! Upload staging: validation rules and the stager service.

mod stager;
mod validator;

pub use stager::{StagedImage, UploadStager, UploadedImage};
pub use validator::{extension_of, ImageValidator, ValidationRules};
