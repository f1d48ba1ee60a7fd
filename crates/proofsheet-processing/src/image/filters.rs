//! Cosmetic filters. Not part of the default rendition chains.

use image::DynamicImage;

use super::transform::TransformError;

pub fn grayscale(img: DynamicImage) -> DynamicImage {
    img.grayscale()
}

pub fn blur(img: DynamicImage, sigma: f32) -> Result<DynamicImage, TransformError> {
    check_sigma(sigma)?;
    Ok(img.blur(sigma))
}

/// Unsharp mask.
pub fn sharpen(img: DynamicImage, sigma: f32, threshold: i32) -> Result<DynamicImage, TransformError> {
    check_sigma(sigma)?;
    if threshold < 0 {
        return Err(TransformError::InvalidParameter(format!(
            "sharpen threshold must not be negative, got {}",
            threshold
        )));
    }
    Ok(img.unsharpen(sigma, threshold))
}

fn check_sigma(sigma: f32) -> Result<(), TransformError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(TransformError::InvalidParameter(format!(
            "sigma must be positive, got {}",
            sigma
        )));
    }
    Ok(())
}
