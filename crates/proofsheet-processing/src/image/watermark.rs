//! Text watermark overlay
//!
//! Text is rasterized from the 8x8 bitmap font in `font8x8` (ASCII plus
//! Latin-1, so `©` renders) scaled to about 3% of the image's shorter side,
//! drawn in translucent white over a translucent dark backdrop.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{DynamicImage, GenericImageView, Rgba};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect;
use proofsheet_core::WatermarkSettings;

use super::transform::TransformError;

const GLYPH_SIZE: u32 = 8;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 200]);
const BACKDROP_COLOR: Rgba<u8> = Rgba([0, 0, 0, 110]);

/// Watermark position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    #[default]
    BottomRight,
    BottomLeft,
    Center,
}

impl WatermarkPosition {
    /// Lenient parse: empty or unrecognized input is bottom-right.
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "bottomleft" => WatermarkPosition::BottomLeft,
            "center" | "centre" | "middle" => WatermarkPosition::Center,
            _ => WatermarkPosition::BottomRight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    pub text: String,
    pub position: WatermarkPosition,
}

impl From<&WatermarkSettings> for WatermarkSpec {
    fn from(settings: &WatermarkSettings) -> Self {
        WatermarkSpec {
            text: settings.text.clone(),
            position: WatermarkPosition::parse(&settings.position),
        }
    }
}

/// Geometry of the rendered watermark box, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    scale: u32,
    padding: u32,
}

fn layout(img_width: u32, img_height: u32, chars: u32, position: WatermarkPosition) -> Layout {
    let shorter = img_width.min(img_height) as f64;
    let mut scale = ((shorter * 0.03) / GLYPH_SIZE as f64).round().max(1.0) as u32;
    let margin = (shorter * 0.02).round().max(1.0) as u32;

    // Shrink until the text fits inside the margins, down to one pixel per bit.
    let box_size = |scale: u32| {
        let padding = scale * 2;
        (
            chars * GLYPH_SIZE * scale + 2 * padding,
            GLYPH_SIZE * scale + 2 * padding,
        )
    };
    while scale > 1 && box_size(scale).0 + 2 * margin > img_width {
        scale -= 1;
    }
    let (width, height) = box_size(scale);

    let (w, h, bw, bh, m) = (
        img_width as i64,
        img_height as i64,
        width as i64,
        height as i64,
        margin as i64,
    );
    let (x, y) = match position {
        WatermarkPosition::BottomRight => ((w - bw - m).max(0), (h - bh - m).max(0)),
        WatermarkPosition::BottomLeft => (m.min(w), (h - bh - m).max(0)),
        WatermarkPosition::Center => (((w - bw) / 2).max(0), ((h - bh) / 2).max(0)),
    };

    Layout {
        x: x as i32,
        y: y as i32,
        width,
        height,
        scale,
        padding: scale * 2,
    }
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Overlay `spec.text`. Empty text returns the image untouched.
pub fn apply_watermark(
    img: DynamicImage,
    spec: &WatermarkSpec,
) -> Result<DynamicImage, TransformError> {
    let text = spec.text.trim();
    if text.is_empty() {
        return Ok(img);
    }

    let (img_width, img_height) = img.dimensions();
    if img_width == 0 || img_height == 0 {
        return Err(TransformError::InvalidDimensions {
            width: img_width,
            height: img_height,
        });
    }

    let chars = text.chars().count() as u32;
    let l = layout(img_width, img_height, chars, spec.position);

    let mut canvas = Blend(img.to_rgba8());
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(l.x, l.y).of_size(l.width, l.height),
        BACKDROP_COLOR,
    );

    let origin_x = l.x + l.padding as i32;
    let origin_y = l.y + l.padding as i32;
    let cell = (GLYPH_SIZE * l.scale) as i32;

    for (index, c) in text.chars().enumerate() {
        let glyph_x = origin_x + index as i32 * cell;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                // Bit 0 is the leftmost pixel.
                if bits & (1 << col) == 0 {
                    continue;
                }
                let x = glyph_x + (col * l.scale) as i32;
                let y = origin_y + row as i32 * l.scale as i32;
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x, y).of_size(l.scale, l.scale),
                    TEXT_COLOR,
                );
            }
        }
    }

    Ok(DynamicImage::ImageRgba8(canvas.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    fn spec(text: &str, position: &str) -> WatermarkSpec {
        WatermarkSpec {
            text: text.to_string(),
            position: WatermarkPosition::parse(position),
        }
    }

    fn is_untouched(img: &DynamicImage, x: u32, y: u32) -> bool {
        let px = img.get_pixel(x, y);
        px[0] == 128 && px[1] == 128 && px[2] == 128
    }

    #[test]
    fn position_parsing_defaults_to_bottom_right() {
        assert_eq!(WatermarkPosition::parse(""), WatermarkPosition::BottomRight);
        assert_eq!(WatermarkPosition::parse("top-left"), WatermarkPosition::BottomRight);
        assert_eq!(WatermarkPosition::parse("bottom-right"), WatermarkPosition::BottomRight);
        assert_eq!(WatermarkPosition::parse("Bottom Left"), WatermarkPosition::BottomLeft);
        assert_eq!(WatermarkPosition::parse("bottom_left"), WatermarkPosition::BottomLeft);
        assert_eq!(WatermarkPosition::parse("CENTER"), WatermarkPosition::Center);
    }

    #[test]
    fn empty_text_is_a_no_op() {
        let out = apply_watermark(gray(100, 100), &spec("   ", "center")).unwrap();
        assert!(is_untouched(&out, 50, 50));
        assert!(is_untouched(&out, 95, 95));
    }

    #[test]
    fn copyright_sign_has_a_glyph() {
        assert_ne!(glyph('©'), [0; 8]);
        assert_ne!(glyph('S'), [0; 8]);
    }

    #[test]
    fn blank_position_draws_bottom_right() {
        let img = gray(1920, 1080);
        let out = apply_watermark(img, &spec("© Studio", "")).unwrap();
        assert_eq!(out.dimensions(), (1920, 1080));

        // margin = 2% of 1080
        let margin = 22;
        assert!(!is_untouched(&out, 1920 - margin - 2, 1080 - margin - 2));
        assert!(is_untouched(&out, margin + 2, 1080 - margin - 2));
        assert!(is_untouched(&out, 960, 540));
        assert!(is_untouched(&out, 5, 5));
    }

    #[test]
    fn bottom_left_and_center() {
        let out = apply_watermark(gray(800, 600), &spec("Studio", "bottom-left")).unwrap();
        assert!(!is_untouched(&out, 14, 600 - 14));
        assert!(is_untouched(&out, 800 - 14, 600 - 14));

        let out = apply_watermark(gray(800, 600), &spec("Studio", "center")).unwrap();
        assert!(!is_untouched(&out, 400, 300));
        assert!(is_untouched(&out, 800 - 14, 600 - 14));
    }

    #[test]
    fn long_text_on_small_images_does_not_fail() {
        let out = apply_watermark(gray(40, 30), &spec("© A Very Long Studio Name", "")).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
    }

    #[test]
    fn layout_scales_with_image() {
        let l = layout(1920, 1080, 8, WatermarkPosition::BottomRight);
        assert_eq!(l.scale, 4);
        assert_eq!(l.height, 8 * 4 + 16);
        assert_eq!(l.x as u32 + l.width, 1920 - 22);
        assert_eq!(l.y as u32 + l.height, 1080 - 22);
    }
}
