use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::metadata_keys;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Capture metadata extracted from an original.
///
/// Every field is optional: an image without EXIF yields the default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub camera_model: Option<String>,
    pub date_taken: Option<DateTime<Utc>>,
    pub iso: Option<u32>,
    /// f-number, e.g. `2.8`.
    pub aperture: Option<f64>,
    /// Exposure time as displayed, e.g. `1/250` or `2`.
    pub shutter_speed: Option<String>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    pub gps: Option<GpsCoordinates>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageMetadata {
    /// Fill missing or zero dimensions from decoded pixel dimensions.
    /// Values already present win.
    pub fn fill_dimensions(&mut self, width: u32, height: u32) {
        if self.width.unwrap_or(0) == 0 {
            self.width = Some(width);
        }
        if self.height.unwrap_or(0) == 0 {
            self.height = Some(height);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.camera_model.is_none()
            && self.date_taken.is_none()
            && self.iso.is_none()
            && self.aperture.is_none()
            && self.shutter_speed.is_none()
            && self.focal_length.is_none()
            && self.gps.is_none()
    }

    /// Entries for the photo record's string-to-string metadata map.
    /// Dimensions are persisted as columns and are not included.
    pub fn to_metadata_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(model) = &self.camera_model {
            map.insert(metadata_keys::CAMERA_MODEL.to_string(), model.clone());
        }
        if let Some(taken) = self.date_taken {
            map.insert(
                metadata_keys::DATE_TAKEN.to_string(),
                taken.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        if let Some(iso) = self.iso {
            map.insert(metadata_keys::ISO.to_string(), iso.to_string());
        }
        if let Some(aperture) = self.aperture {
            map.insert(metadata_keys::APERTURE.to_string(), format_number(aperture));
        }
        if let Some(shutter) = &self.shutter_speed {
            map.insert(metadata_keys::SHUTTER_SPEED.to_string(), shutter.clone());
        }
        if let Some(focal) = self.focal_length {
            map.insert(metadata_keys::FOCAL_LENGTH.to_string(), format_number(focal));
        }
        if let Some(gps) = &self.gps {
            if let Ok(json) = serde_json::to_string(gps) {
                map.insert(metadata_keys::GPS.to_string(), json);
            }
        }
        map
    }
}

/// Round to two decimals and drop trailing zeros: `2.80` becomes `2.8`.
fn format_number(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let text = format!("{:.2}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
