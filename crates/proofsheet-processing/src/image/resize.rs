//! Bounded resize and fixed-size fill

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use super::transform::TransformError;

/// Largest dimensions within `max_width` x `max_height` preserving the aspect
/// ratio of `width` x `height`. Never larger than the input.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (w, h)
}

pub fn resize_to_fit(
    img: DynamicImage,
    max_width: u32,
    max_height: u32,
) -> Result<DynamicImage, TransformError> {
    if max_width == 0 || max_height == 0 {
        return Err(TransformError::InvalidDimensions {
            width: max_width,
            height: max_height,
        });
    }

    let (width, height) = img.dimensions();
    let (target_width, target_height) = fit_dimensions(width, height, max_width, max_height);
    if (target_width, target_height) == (width, height) {
        return Ok(img);
    }

    Ok(img.resize_exact(target_width, target_height, FilterType::Lanczos3))
}

pub fn fill(img: DynamicImage, width: u32, height: u32) -> Result<DynamicImage, TransformError> {
    if width == 0 || height == 0 {
        return Err(TransformError::InvalidDimensions { width, height });
    }
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(TransformError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    Ok(img.resize_to_fill(width, height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 200, 30])))
    }

    #[test]
    fn in_bounds_images_are_unchanged() {
        for (w, h) in [(1920, 1080), (800, 600), (1, 1), (1080, 1080)] {
            let out = resize_to_fit(image(w, h), 1920, 1080).unwrap();
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn oversized_images_fit_and_keep_aspect() {
        for (w, h) in [(4000, 3000), (6000, 4000), (3840, 2160), (1000, 5000), (2000, 1000)] {
            let (tw, th) = fit_dimensions(w, h, 1920, 1080);
            assert!(tw <= 1920 && th <= 1080, "{}x{} -> {}x{}", w, h, tw, th);
            assert!(tw == 1920 || th == 1080, "{}x{} -> {}x{}", w, h, tw, th);

            let original = w as f64 / h as f64;
            let resized = tw as f64 / th as f64;
            let tolerance = 1.0 / th.min(tw) as f64 + 1e-9;
            assert!((original - resized).abs() / original <= tolerance);
        }
        assert_eq!(fit_dimensions(4000, 3000, 1920, 1080), (1440, 1080));
    }

    #[test]
    fn resize_never_upscales() {
        let out = resize_to_fit(image(100, 50), 1920, 1080).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
        let out = resize_to_fit(image(3840, 2160), 1920, 1080).unwrap();
        assert_eq!(out.dimensions(), (1920, 1080));
    }

    #[test]
    fn fill_is_always_exact() {
        for (w, h) in [(4000, 3000), (100, 100), (50, 400), (1, 1), (199, 201)] {
            let out = fill(image(w, h), 200, 200).unwrap();
            assert_eq!(out.dimensions(), (200, 200));
        }
    }

    #[test]
    fn zero_targets_are_rejected() {
        assert!(resize_to_fit(image(10, 10), 0, 10).is_err());
        assert!(fill(image(10, 10), 10, 0).is_err());
    }
}
