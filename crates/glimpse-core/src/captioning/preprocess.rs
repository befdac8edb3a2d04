//! Image preprocessing for the BLIP vision encoder.
//!
//! BLIP expects:
//! - Input size: 384×384 pixels (bicubic resize)
//! - Normalization: CLIP mean/std applied to pixel/255
//! - Channel order: RGB
//! - Tensor layout: NCHW [batch, channels, height, width]

use image::DynamicImage;
use ndarray::Array4;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// CLIP normalization mean (per-channel).
const NORM_MEAN: [f32; CHANNELS] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std (per-channel).
const NORM_STD: [f32; CHANNELS] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Preprocess an image for BLIP inference.
///
/// Resizes to `image_size × image_size`, converts to RGB, normalizes per
/// channel, and returns an NCHW tensor suitable for ONNX Runtime.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Array4<f32> {
    let resized = image.resize_exact(
        image_size,
        image_size,
        image::imageops::FilterType::CatmullRom,
    );
    let rgb = resized.to_rgb8();

    let size = image_size as usize;
    let plane = size * size;
    let mut data = vec![0f32; CHANNELS * plane];

    for (i, pixel) in rgb.as_raw().chunks_exact(CHANNELS).enumerate() {
        for (c, &val) in pixel.iter().enumerate() {
            // NCHW layout: offset = c * size * size + pixel index
            data[c * plane + i] = (val as f32 / 255.0 - NORM_MEAN[c]) / NORM_STD[c];
        }
    }

    // Length always matches the shape, so this cannot fail.
    Array4::from_shape_vec((1, CHANNELS, size, size), data)
        .unwrap_or_else(|_| Array4::zeros((1, CHANNELS, size, size)))
}
