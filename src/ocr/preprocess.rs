use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

use crate::config::PreprocessConfig;

/// Mean luminance, rounded to the nearest integer.
fn mean_luminance(img: &GrayImage) -> f32 {
    let pixels = img.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    (sum as f64 / pixels.len() as f64).round() as f32
}

/// Stretches contrast around the mean luminance.
///
/// Each pixel becomes `mean + factor * (pixel - mean)`, clamped to 0..=255.
/// A factor of 1.0 leaves the image unchanged.
pub fn enhance_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    let mean = mean_luminance(img);
    let mut output = img.clone();

    for pixel in output.pixels_mut() {
        let value = mean + factor * (pixel[0] as f32 - mean);
        *pixel = Luma([value.round().clamp(0.0, 255.0) as u8]);
    }

    output
}

/// Scales both axes by `factor` with a Lanczos filter.
pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    if factor == 1 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    imageops::resize(img, w * factor, h * factor, FilterType::Lanczos3)
}

/// Grayscale, then contrast boost, then upscaling.
pub fn preprocess_image(img: &DynamicImage, config: &PreprocessConfig) -> GrayImage {
    let gray = img.to_luma8();
    let enhanced = enhance_contrast(&gray, config.contrast);
    upscale(&enhanced, config.upscale)
}
