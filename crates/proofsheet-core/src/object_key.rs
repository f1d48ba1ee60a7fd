//! Object-key parsing and rendition key derivation.
//!
//! Originals are stored under `{galleryID}/{photoID}/{fileName}` where the
//! gallery identifier starts with `gal_` and the photo identifier with
//! `photo_`. Renditions live in their own buckets under the same key with the
//! extension replaced by `.jpg`.

use std::fmt;

use crate::constants::{GALLERY_ID_PREFIX, PHOTO_ID_PREFIX, RENDITION_EXTENSION};
use crate::error::CoreError;

/// Parsed identity of a stored original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub gallery_id: String,
    pub photo_id: String,
    pub file_name: String,
    /// Lowercased extension without the dot; empty when the file name has none.
    pub extension: String,
}

impl ObjectKey {
    pub fn parse(key: &str) -> Result<Self, CoreError> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != 3 {
            return Err(CoreError::invalid_key(
                key,
                "expected {galleryID}/{photoID}/{fileName}",
            ));
        }

        let (gallery_id, photo_id, file_name) = (segments[0], segments[1], segments[2]);

        if !has_id_prefix(gallery_id, GALLERY_ID_PREFIX) {
            return Err(CoreError::invalid_key(key, "gallery segment must start with gal_"));
        }
        if !has_id_prefix(photo_id, PHOTO_ID_PREFIX) {
            return Err(CoreError::invalid_key(key, "photo segment must start with photo_"));
        }
        if file_name.is_empty() {
            return Err(CoreError::invalid_key(key, "file name is empty"));
        }

        Ok(ObjectKey {
            gallery_id: gallery_id.to_string(),
            photo_id: photo_id.to_string(),
            file_name: file_name.to_string(),
            extension: extension_of(file_name).to_lowercase(),
        })
    }

    /// Key under which both renditions of this original are stored.
    pub fn rendition_key(&self) -> String {
        rendition_key(&self.to_string())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.gallery_id, self.photo_id, self.file_name)
    }
}

fn has_id_prefix(segment: &str, prefix: &str) -> bool {
    segment.len() > prefix.len() && segment.starts_with(prefix)
}

/// Extension of the final path segment, without the dot.
fn extension_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx + 1..],
        None => "",
    }
}

/// Replace the extension of the final path segment of `key` with `new_ext`.
///
/// `new_ext` includes its leading dot. A key without an extension gets
/// `new_ext` appended. Applying the same `new_ext` twice is a no-op.
pub fn change_extension(key: &str, new_ext: &str) -> String {
    let segment_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem_end = key[segment_start..]
        .rfind('.')
        .map(|i| segment_start + i)
        .unwrap_or(key.len());
    format!("{}{}", &key[..stem_end], new_ext)
}

/// Rendition key for an original key.
pub fn rendition_key(key: &str) -> String {
    change_extension(key, RENDITION_EXTENSION)
}
