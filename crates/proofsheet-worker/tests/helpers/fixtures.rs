use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use proofsheet_core::{Gallery, Photo};
use proofsheet_worker::{s3_event_body, ObjectRef};

use super::UPLOADS;

/// A flat mid-gray JPEG with no EXIF segment.
pub fn gray_jpeg(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
    Bytes::from(buffer.into_inner())
}

pub fn upload_event(key: &str) -> String {
    s3_event_body(&[ObjectRef {
        bucket: UPLOADS.to_string(),
        key: key.to_string(),
    }])
}

pub fn pending_photo(gallery_id: &str, photo_id: &str, file_name: &str) -> Photo {
    Photo::pending(
        photo_id,
        gallery_id,
        file_name,
        format!("{}/{}/{}", gallery_id, photo_id, file_name),
        start(),
    )
}

pub fn watermarked_gallery(id: &str, text: &str, position: &str) -> Gallery {
    let mut gallery = Gallery::new(id, "Client proofs");
    gallery.enable_watermark = true;
    gallery.watermark_text = text.to_string();
    gallery.watermark_position = position.to_string();
    gallery
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}
