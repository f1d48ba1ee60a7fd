use serde::{Deserialize, Serialize};

/// The slice of a gallery record this pipeline reads or mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    pub id: String,
    pub name: String,
    pub photo_count: i64,
    pub enable_watermark: bool,
    #[serde(default)]
    pub watermark_text: String,
    /// Free-form position name as entered by the photographer.
    #[serde(default)]
    pub watermark_position: String,
}

/// Watermark configuration handed to the optimized-rendition stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSettings {
    pub text: String,
    pub position: String,
}

impl Gallery {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Gallery {
            id: id.into(),
            name: name.into(),
            photo_count: 0,
            enable_watermark: false,
            watermark_text: String::new(),
            watermark_position: String::new(),
        }
    }

    /// Watermark to apply, if the gallery has one enabled with non-empty text.
    pub fn watermark(&self) -> Option<WatermarkSettings> {
        if !self.enable_watermark || self.watermark_text.trim().is_empty() {
            return None;
        }
        Some(WatermarkSettings {
            text: self.watermark_text.clone(),
            position: self.watermark_position.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_requires_flag_and_text() {
        let mut gallery = Gallery::new("gal_1", "Wedding");
        gallery.watermark_text = "© Studio".into();
        assert_eq!(gallery.watermark(), None);

        gallery.enable_watermark = true;
        let settings = gallery.watermark().unwrap();
        assert_eq!(settings.text, "© Studio");
        assert_eq!(settings.position, "");

        gallery.watermark_text = "  ".into();
        assert_eq!(gallery.watermark(), None);
    }
}
