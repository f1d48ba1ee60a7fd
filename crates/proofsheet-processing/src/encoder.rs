//! Rendition encoding
//!
//! Encoding failures are hard errors: there is no fallback format.

use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Cannot encode an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("JPEG encoding failed: {0}")]
    Jpeg(String),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),

    #[error("WebP encoding failed: {0}")]
    WebP(String),
}

/// Output format for renditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenditionFormat {
    #[default]
    Jpeg,
    Png,
    WebP,
}

impl RenditionFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(RenditionFormat::Jpeg),
            "png" => Some(RenditionFormat::Png),
            "webp" => Some(RenditionFormat::WebP),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            RenditionFormat::Jpeg => "image/jpeg",
            RenditionFormat::Png => "image/png",
            RenditionFormat::WebP => "image/webp",
        }
    }

    /// File extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            RenditionFormat::Jpeg => ".jpg",
            RenditionFormat::Png => ".png",
            RenditionFormat::WebP => ".webp",
        }
    }
}

pub struct RenditionEncoder;

impl RenditionEncoder {
    /// Encode `img` at `quality` (1..=100; ignored for PNG). CPU-bound.
    pub fn encode(
        img: &DynamicImage,
        format: RenditionFormat,
        quality: u8,
    ) -> Result<Bytes, EncodeError> {
        if !(1..=100).contains(&quality) {
            return Err(EncodeError::InvalidQuality(quality));
        }
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyImage { width, height });
        }

        match format {
            RenditionFormat::Jpeg => Self::encode_jpeg(img, quality),
            RenditionFormat::Png => Self::encode_png(img),
            RenditionFormat::WebP => Self::encode_webp(img, quality),
        }
    }

    /// mozjpeg reports libjpeg errors by unwinding, so the whole run is
    /// wrapped in `catch_unwind`. Alpha is discarded.
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, EncodeError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let result = catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
            let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            comp.set_size(width as usize, height as usize);
            comp.set_quality(quality as f32);
            comp.set_progressive_mode();
            comp.set_optimize_coding(true);

            let mut comp = comp.start_compress(Vec::new())?;
            comp.write_scanlines(&rgb_img)?;
            comp.finish()
        }));

        match result {
            Ok(Ok(data)) => Ok(Bytes::from(data)),
            Ok(Err(e)) => Err(EncodeError::Jpeg(e.to_string())),
            Err(_) => Err(EncodeError::Jpeg("encoder aborted".to_string())),
        }
    }

    fn encode_png(img: &DynamicImage) -> Result<Bytes, EncodeError> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(Bytes::from(buffer.into_inner()))
    }

    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, EncodeError> {
        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let encoded = encoder
            .encode_simple(false, quality as f32)
            .map_err(|e| EncodeError::WebP(format!("{:?}", e)))?;

        Ok(Bytes::copy_from_slice(&encoded))
    }
}
