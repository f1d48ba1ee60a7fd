//! Dimension and capture-metadata extraction
//!
//! Decoding for width/height is strict: an undecodable buffer is an error.
//! EXIF extraction is best-effort and never fails; it reports whether EXIF
//! was absent (no warning) or present but unreadable (warning).

use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, In, Reader, Tag, Value as ExifValue};
use image::{DynamicImage, GenericImageView, ImageReader};
use img_parts::{DynImage, ImageEXIF};
use proofsheet_core::{GpsCoordinates, ImageMetadata};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// EXIF data was present but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataWarning {
    pub message: String,
}

impl std::fmt::Display for MetadataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Everything the extractor learns from one buffer.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Decode-derived dimensions.
    pub width: u32,
    pub height: u32,
    /// Capture metadata with width/height resolved (EXIF first, decoded
    /// values filling gaps).
    pub metadata: ImageMetadata,
    pub warning: Option<MetadataWarning>,
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Decode dimensions and read capture metadata in one call.
    pub fn extract(data: &[u8]) -> Result<Extraction, DecodeError> {
        let image = Self::decode(data)?;
        let (width, height) = image.dimensions();

        let (mut metadata, warning) = Self::read_capture_metadata(data);
        metadata.fill_dimensions(width, height);

        Ok(Extraction {
            width,
            height,
            metadata,
            warning,
        })
    }

    /// Fully decode the buffer. CPU-bound: call from a blocking thread.
    pub fn decode(data: &[u8]) -> Result<DynamicImage, DecodeError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(DecodeError::UnknownFormat);
        }
        Ok(reader.decode()?)
    }

    /// Best-effort EXIF extraction. Width/height are only set when EXIF
    /// carries them.
    pub fn read_capture_metadata(data: &[u8]) -> (ImageMetadata, Option<MetadataWarning>) {
        match read_exif(data) {
            Ok(Some(exif)) => (metadata_from_exif(&exif), None),
            Ok(None) => (ImageMetadata::default(), None),
            Err(warning) => (ImageMetadata::default(), Some(warning)),
        }
    }
}

fn read_exif(data: &[u8]) -> Result<Option<Exif>, MetadataWarning> {
    let reader = Reader::new();

    // JPEG, PNG and WebP: pull the raw TIFF block out of the container first.
    if let Ok(Some(container)) = DynImage::from_bytes(Bytes::copy_from_slice(data)) {
        return match container.exif() {
            Some(raw) => reader
                .read_raw(raw.to_vec())
                .map(Some)
                .map_err(|e| warning(&e)),
            None => Ok(None),
        };
    }

    // TIFF and HEIF are read directly; anything else has no EXIF.
    match reader.read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) | Err(exif::Error::NotSupported(_)) => Ok(None),
        Err(exif::Error::InvalidFormat(_)) => Ok(None),
        Err(e) => Err(warning(&e)),
    }
}

fn warning(error: &exif::Error) -> MetadataWarning {
    MetadataWarning {
        message: format!("unreadable EXIF: {}", error),
    }
}

fn metadata_from_exif(exif: &Exif) -> ImageMetadata {
    let field = |tag: Tag| exif.get_field(tag, In::PRIMARY).map(|f| &f.value);

    let make = field(Tag::Make).and_then(exif_string);
    let model = field(Tag::Model).and_then(exif_string);

    let date_taken = field(Tag::DateTimeOriginal)
        .and_then(parse_exif_datetime)
        .or_else(|| field(Tag::DateTime).and_then(parse_exif_datetime));

    let gps = gps_coordinate(
        field(Tag::GPSLatitude).and_then(dms_values),
        field(Tag::GPSLatitudeRef).and_then(exif_string).as_deref(),
    )
    .zip(gps_coordinate(
        field(Tag::GPSLongitude).and_then(dms_values),
        field(Tag::GPSLongitudeRef).and_then(exif_string).as_deref(),
    ))
    .map(|(latitude, longitude)| GpsCoordinates {
        latitude,
        longitude,
    });

    ImageMetadata {
        camera_model: camera_model(make, model),
        date_taken,
        iso: field(Tag::PhotographicSensitivity)
            .and_then(int_value)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0),
        aperture: field(Tag::FNumber)
            .and_then(rational_value)
            .filter(|v| *v > 0.0),
        shutter_speed: field(Tag::ExposureTime)
            .and_then(rational_value)
            .and_then(format_exposure),
        focal_length: field(Tag::FocalLength)
            .and_then(rational_value)
            .filter(|v| *v > 0.0),
        gps,
        width: field(Tag::PixelXDimension)
            .and_then(int_value)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0),
        height: field(Tag::PixelYDimension)
            .and_then(int_value)
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0),
    }
}

/// `Canon` + `Canon EOS R5` is `Canon EOS R5`, not `Canon Canon EOS R5`.
fn camera_model(make: Option<String>, model: Option<String>) -> Option<String> {
    match (make, model) {
        (Some(make), Some(model)) => {
            if model.to_lowercase().starts_with(&make.to_lowercase()) {
                Some(model)
            } else {
                Some(format!("{} {}", make, model))
            }
        }
        (None, Some(model)) => Some(model),
        (Some(make), None) => Some(make),
        (None, None) => None,
    }
}

/// `1/250` below one second, plain seconds (`2`, `2.5`) above.
fn format_exposure(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    if seconds < 1.0 {
        return Some(format!("1/{}", (1.0 / seconds).round() as u64));
    }
    let text = format!("{:.1}", seconds);
    Some(text.trim_end_matches('0').trim_end_matches('.').to_string())
}

fn exif_string(value: &ExifValue) -> Option<String> {
    match value {
        ExifValue::Ascii(values) => values
            .first()
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .map(|s| s.trim_matches('\u{0}').trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn parse_exif_datetime(value: &ExifValue) -> Option<DateTime<Utc>> {
    let raw = exif_string(value)?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn rational_value(value: &ExifValue) -> Option<f64> {
    let v = match value {
        ExifValue::Rational(values) => values.first()?.to_f64(),
        ExifValue::SRational(values) => values.first()?.to_f64(),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn int_value(value: &ExifValue) -> Option<i64> {
    match value {
        ExifValue::Byte(values) => values.first().map(|v| *v as i64),
        ExifValue::Short(values) => values.first().map(|v| *v as i64),
        ExifValue::Long(values) => values.first().map(|v| *v as i64),
        ExifValue::SByte(values) => values.first().map(|v| *v as i64),
        ExifValue::SShort(values) => values.first().map(|v| *v as i64),
        ExifValue::SLong(values) => values.first().map(|v| *v as i64),
        _ => None,
    }
}

fn dms_values(value: &ExifValue) -> Option<[f64; 3]> {
    match value {
        ExifValue::Rational(values) if values.len() >= 3 => {
            Some([values[0].to_f64(), values[1].to_f64(), values[2].to_f64()])
        }
        _ => None,
    }
}

fn gps_coordinate(values: Option<[f64; 3]>, reference: Option<&str>) -> Option<f64> {
    let [degrees, minutes, seconds] = values?;
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if !decimal.is_finite() {
        return None;
    }
    let negative = matches!(
        reference.map(|r| r.trim().to_ascii_uppercase()).as_deref(),
        Some("S") | Some("W")
    );
    Some(if negative { -decimal } else { decimal })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 40]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn jpeg_without_exif_has_dimensions_and_no_warning() {
        let data = encode(64, 48, ImageFormat::Jpeg);
        let extraction = MetadataExtractor::extract(&data).unwrap();

        assert_eq!((extraction.width, extraction.height), (64, 48));
        assert_eq!(extraction.metadata.width, Some(64));
        assert_eq!(extraction.metadata.height, Some(48));
        assert!(extraction.metadata.is_empty());
        assert!(extraction.warning.is_none());
    }

    #[test]
    fn png_and_gif_decode() {
        for format in [ImageFormat::Png, ImageFormat::Gif] {
            let data = encode(10, 20, format);
            let extraction = MetadataExtractor::extract(&data).unwrap();
            assert_eq!((extraction.width, extraction.height), (10, 20));
            assert!(extraction.warning.is_none());
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(MetadataExtractor::extract(b"definitely not an image").is_err());
        assert!(MetadataExtractor::decode(&[]).is_err());
    }

    #[test]
    fn corrupt_exif_block_yields_warning() {
        let data = encode(16, 16, ImageFormat::Jpeg);
        let mut jpeg = img_parts::jpeg::Jpeg::from_bytes(Bytes::from(data)).unwrap();
        jpeg.set_exif(Some(Bytes::from_static(b"MM\x00\x2a\xff\xff\xff\xff")));
        let data = jpeg.encoder().bytes();

        let (metadata, warning) = MetadataExtractor::read_capture_metadata(&data);
        assert!(metadata.is_empty());
        assert!(warning.is_some());

        // Dimensions are still available.
        let extraction = MetadataExtractor::extract(&data).unwrap();
        assert_eq!(extraction.width, 16);
    }

    #[test]
    fn camera_model_does_not_repeat_make() {
        assert_eq!(
            camera_model(Some("Canon".into()), Some("Canon EOS R5".into())).as_deref(),
            Some("Canon EOS R5")
        );
        assert_eq!(
            camera_model(Some("FUJIFILM".into()), Some("X-T5".into())).as_deref(),
            Some("FUJIFILM X-T5")
        );
        assert_eq!(camera_model(None, None), None);
    }

    #[test]
    fn exposure_formatting() {
        assert_eq!(format_exposure(0.004).as_deref(), Some("1/250"));
        assert_eq!(format_exposure(2.0).as_deref(), Some("2"));
        assert_eq!(format_exposure(2.5).as_deref(), Some("2.5"));
        assert_eq!(format_exposure(0.0), None);
    }

    #[test]
    fn gps_hemispheres() {
        let lat = gps_coordinate(Some([48.0, 51.0, 30.24]), Some("N")).unwrap();
        assert!((lat - 48.8584).abs() < 1e-4);
        let lon = gps_coordinate(Some([73.0, 59.0, 0.0]), Some("W")).unwrap();
        assert!(lon < 0.0);
        assert_eq!(gps_coordinate(None, Some("N")), None);
    }
}
