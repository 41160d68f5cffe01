//! Image preprocessing matching the transforms the classifier was trained
//! with: RGB conversion, non-aspect-preserving bilinear resize to S x S,
//! scale to [0, 1], per-channel ImageNet normalization, batch dimension.
//!
//! The normalization constants are baked into the trained weights; any
//! deviation here degrades confidence silently instead of failing, so the
//! step order below must not change.

use crate::error::PhError;
use image::imageops::{self, FilterType};
use tch::Tensor;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes `bytes` and produces a `(1, 3, img_size, img_size)` float tensor
/// ready for the classifier. Fails with `PhError::Decode` on malformed or
/// unsupported image data.
pub fn preprocess(bytes: &[u8], img_size: u32) -> Result<Tensor, PhError> {
    let pixels = normalized_chw(bytes, img_size)?;
    let side = i64::from(img_size);
    Ok(Tensor::from_slice(&pixels).view([1, 3, side, side]))
}

/// Decode, resize and normalize into a CHW-ordered float buffer.
pub(crate) fn normalized_chw(bytes: &[u8], img_size: u32) -> Result<Vec<f32>, PhError> {
    let rgb = image::load_from_memory(bytes)?.into_rgb8();
    let resized = imageops::resize(&rgb, img_size, img_size, FilterType::Triangle);

    let plane = (img_size * img_size) as usize;
    let mut chw = vec![0.0f32; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * img_size + x) as usize;
        for c in 0..3 {
            chw[c * plane + offset] =
                (f32::from(pixel[c]) / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    Ok(chw)
}
