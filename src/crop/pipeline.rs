//! The image transform pipeline: resize, rotate, crop, encode.
//!
//! The order is fixed and matters: the source is resized first, so the crop
//! rectangle is interpreted against the *resized* image, not the original.
//! Rotation happens between the two.
//!
//! Quarter turns map to the `image` crate's lossless rotations. Arbitrary
//! angles use a small pure-Rust inverse-mapped bilinear rotation with an
//! expanded canvas, so no extra imaging dependency is needed.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::CropError;

use super::request::CropRequest;

// =============================================================================
// Transform Spec
// =============================================================================

/// Integer transform parameters derived from a validated [`CropRequest`].
///
/// Building the spec is where geometry is checked: non-positive boxes and
/// negative offsets are processing errors, reported before any pixel work.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub resize_w: u32,
    pub resize_h: u32,
    pub rotation: f64,
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_w: u32,
    pub crop_h: u32,
}

impl TransformSpec {
    pub fn from_request(request: &CropRequest) -> Result<Self, CropError> {
        Ok(Self {
            resize_w: positive_dimension(request.img_w, "imgW")?,
            resize_h: positive_dimension(request.img_h, "imgH")?,
            rotation: request.rotation,
            crop_x: non_negative_offset(request.img_x1, "imgX1")?,
            crop_y: non_negative_offset(request.img_y1, "imgY1")?,
            crop_w: positive_dimension(request.crop_w, "cropW")?,
            crop_h: positive_dimension(request.crop_h, "cropH")?,
        })
    }
}

fn positive_dimension(value: f64, name: &str) -> Result<u32, CropError> {
    let rounded = value.round();
    if rounded < 1.0 || rounded > u32::MAX as f64 {
        return Err(CropError::Processing {
            message: format!("{name} must be a positive dimension, got {value}"),
        });
    }
    Ok(rounded as u32)
}

fn non_negative_offset(value: f64, name: &str) -> Result<u32, CropError> {
    let rounded = value.round();
    if rounded < 0.0 || rounded > u32::MAX as f64 {
        return Err(CropError::Processing {
            message: format!("{name} must be a non-negative offset, got {value}"),
        });
    }
    Ok(rounded as u32)
}

// =============================================================================
// Pipeline
// =============================================================================

/// Apply resize -> rotate -> crop to a decoded image.
pub fn transform(img: DynamicImage, spec: &TransformSpec) -> Result<DynamicImage, CropError> {
    let resized = img.resize_exact(spec.resize_w, spec.resize_h, FilterType::CatmullRom);
    let rotated = rotate_image(&resized, spec.rotation);

    let (width, height) = (rotated.width(), rotated.height());
    let right = spec.crop_x.checked_add(spec.crop_w);
    let bottom = spec.crop_y.checked_add(spec.crop_h);
    match (right, bottom) {
        (Some(r), Some(b)) if r <= width && b <= height => {}
        _ => {
            return Err(CropError::Processing {
                message: format!(
                    "crop rectangle {}x{} at ({}, {}) is out of bounds for a {}x{} image",
                    spec.crop_w, spec.crop_h, spec.crop_x, spec.crop_y, width, height
                ),
            })
        }
    }

    Ok(rotated.crop_imm(spec.crop_x, spec.crop_y, spec.crop_w, spec.crop_h))
}

/// Encode an image for the given output format.
///
/// JPEG has no alpha channel, so RGBA output is flattened to RGB first.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CropError> {
    let mut out = std::io::Cursor::new(Vec::new());
    let result = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, format)
    } else {
        img.write_to(&mut out, format)
    };
    result.map_err(|e| CropError::Processing {
        message: format!("encode failed: {e}"),
    })?;
    Ok(out.into_inner())
}

// =============================================================================
// Rotation
// =============================================================================

/// Rotate an image clockwise by an arbitrary number of degrees.
///
/// The canvas expands to hold the rotated bounds; uncovered corners are
/// transparent black. Multiples of 90 use the exact quarter-turn rotations.
pub fn rotate_image(img: &DynamicImage, degrees: f64) -> DynamicImage {
    let normalized = degrees.rem_euclid(360.0);

    if (normalized % 90.0).abs() < 1e-9 || (90.0 - normalized % 90.0).abs() < 1e-9 {
        return match (normalized / 90.0).round() as u32 % 4 {
            0 => img.clone(),
            1 => img.rotate90(),
            2 => img.rotate180(),
            _ => img.rotate270(),
        };
    }

    let src = img.to_rgba8();
    let (src_w, src_h) = (src.width() as f64, src.height() as f64);

    let theta = normalized.to_radians();
    let (sin, cos) = theta.sin_cos();

    let dst_w = (src_w * cos.abs() + src_h * sin.abs()).ceil() as u32;
    let dst_h = (src_w * sin.abs() + src_h * cos.abs()).ceil() as u32;

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let mut dst = RgbaImage::new(dst_w, dst_h);
    for y in 0..dst_h {
        for x in 0..dst_w {
            // Inverse-map the destination pixel center into source space
            let dx = x as f64 + 0.5 - dst_cx;
            let dy = y as f64 + 0.5 - dst_cy;
            let sx = cos * dx + sin * dy + src_cx - 0.5;
            let sy = -sin * dx + cos * dy + src_cy - 0.5;
            if let Some(pixel) = bilinear_sample(&src, sx, sy) {
                dst.put_pixel(x, y, pixel);
            }
        }
    }

    DynamicImage::ImageRgba8(dst)
}

/// Bilinear sample at fractional coordinates; `None` outside the image.
fn bilinear_sample(src: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = (src.width() as i64, src.height() as i64);

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return None;
    }

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let clamp = |v: i64, max: i64| v.clamp(0, max - 1) as u32;
    let p00 = src.get_pixel(clamp(x0, w), clamp(y0, h));
    let p10 = src.get_pixel(clamp(x0 + 1, w), clamp(y0, h));
    let p01 = src.get_pixel(clamp(x0, w), clamp(y0 + 1, h));
    let p11 = src.get_pixel(clamp(x0 + 1, w), clamp(y0 + 1, h));

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00.0[c] as f64 * (1.0 - fx) + p10.0[c] as f64 * fx;
        let bottom = p01.0[c] as f64 * (1.0 - fx) + p11.0[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    Some(Rgba(out))
}

// =============================================================================
// Tests
// =============================================================================
