//! Crop request parsing and validation.
//!
//! The raw POST form is deserialized into [`CropForm`] (all fields optional
//! strings) and then validated into a typed [`CropRequest`]. Every field is
//! required and must be numeric (except `imgUrl`, which is a string and gets
//! HTML-stripped). Validation runs before any file is touched; a failing
//! request has no side effects.

use serde::Deserialize;

use crate::error::CropError;

// =============================================================================
// Raw Form
// =============================================================================

/// The eight client-supplied crop fields, as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CropForm {
    #[serde(default, rename = "imgUrl")]
    pub img_url: Option<String>,

    #[serde(default, rename = "imgW")]
    pub img_w: Option<String>,

    #[serde(default, rename = "imgH")]
    pub img_h: Option<String>,

    #[serde(default, rename = "imgX1")]
    pub img_x1: Option<String>,

    #[serde(default, rename = "imgY1")]
    pub img_y1: Option<String>,

    #[serde(default, rename = "cropW")]
    pub crop_w: Option<String>,

    #[serde(default, rename = "cropH")]
    pub crop_h: Option<String>,

    #[serde(default)]
    pub rotation: Option<String>,
}

impl CropForm {
    /// Validate all fields into a typed request.
    ///
    /// The returned error is generic on the wire ("Could not process the
    /// image.") but carries the first failing field name for logging.
    pub fn into_request(self) -> Result<CropRequest, CropError> {
        let img_url = required_string(self.img_url, "imgUrl")?;

        Ok(CropRequest {
            img_url: strip_tags(&img_url),
            img_w: required_number(self.img_w, "imgW")?,
            img_h: required_number(self.img_h, "imgH")?,
            img_x1: required_number(self.img_x1, "imgX1")?,
            img_y1: required_number(self.img_y1, "imgY1")?,
            crop_w: required_number(self.crop_w, "cropW")?,
            crop_h: required_number(self.crop_h, "cropH")?,
            rotation: required_number(self.rotation, "rotation")?,
        })
    }
}

fn required_string(value: Option<String>, field: &'static str) -> Result<String, CropError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(CropError::Validation { field }),
    }
}

fn required_number(value: Option<String>, field: &'static str) -> Result<f64, CropError> {
    let raw = value.ok_or(CropError::Validation { field })?;
    let parsed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CropError::Validation { field })?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(CropError::Validation { field })
    }
}

// =============================================================================
// Validated Request
// =============================================================================

/// A validated crop request.
///
/// Geometry fields are doubles because the browser cropper reports fractional
/// pixel positions; the pipeline rounds them when building its integer spec.
#[derive(Debug, Clone, PartialEq)]
pub struct CropRequest {
    /// Public URL of the staged source image, HTML-stripped.
    pub img_url: String,

    /// Target resize box width, in pixels.
    pub img_w: f64,

    /// Target resize box height, in pixels.
    pub img_h: f64,

    /// Crop rectangle left offset, against the resized image.
    pub img_x1: f64,

    /// Crop rectangle top offset, against the resized image.
    pub img_y1: f64,

    /// Crop rectangle width.
    pub crop_w: f64,

    /// Crop rectangle height.
    pub crop_h: f64,

    /// Rotation in degrees, applied after the resize.
    pub rotation: f64,
}

/// Remove HTML tags from a string: everything between `<` and the next `>`
/// is dropped, along with an unterminated trailing `<...`.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
