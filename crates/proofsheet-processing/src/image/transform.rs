use image::DynamicImage;
use proofsheet_core::{RenditionConfig, WatermarkSettings};

use super::watermark::WatermarkSpec;
use super::{filters, resize, watermark};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{strategy} failed: {source}")]
    Failed {
        strategy: &'static str,
        #[source]
        source: Box<TransformError>,
    },
}

/// One image operation. Pure: the same input always yields the same output.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Scale down to fit within the bounds, preserving aspect ratio.
    /// Never upscales.
    ResizeToFit { max_width: u32, max_height: u32 },
    /// Scale and center-crop to exactly these dimensions.
    Fill { width: u32, height: u32 },
    Watermark(WatermarkSpec),
    Grayscale,
    Blur { sigma: f32 },
    Sharpen { sigma: f32, threshold: i32 },
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::ResizeToFit { .. } => "resize_to_fit",
            Transform::Fill { .. } => "fill",
            Transform::Watermark(_) => "watermark",
            Transform::Grayscale => "grayscale",
            Transform::Blur { .. } => "blur",
            Transform::Sharpen { .. } => "sharpen",
        }
    }

    pub fn apply(&self, img: DynamicImage) -> Result<DynamicImage, TransformError> {
        match self {
            Transform::ResizeToFit {
                max_width,
                max_height,
            } => resize::resize_to_fit(img, *max_width, *max_height),
            Transform::Fill { width, height } => resize::fill(img, *width, *height),
            Transform::Watermark(spec) => watermark::apply_watermark(img, spec),
            Transform::Grayscale => Ok(filters::grayscale(img)),
            Transform::Blur { sigma } => filters::blur(img, *sigma),
            Transform::Sharpen { sigma, threshold } => filters::sharpen(img, *sigma, *threshold),
        }
    }
}

/// Ordered composition of transforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformChain {
    steps: Vec<Transform>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, transform: Transform) -> Self {
        self.steps.push(transform);
        self
    }

    pub fn push(&mut self, transform: Transform) {
        self.steps.push(transform);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(Transform::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order. Stops at the first failure, wrapping it
    /// with the failing strategy's name.
    pub fn apply(&self, img: DynamicImage) -> Result<DynamicImage, TransformError> {
        self.steps.iter().try_fold(img, |img, step| {
            step.apply(img).map_err(|e| TransformError::Failed {
                strategy: step.name(),
                source: Box::new(e),
            })
        })
    }
}

/// Fixed-size center-cropped thumbnail.
pub fn thumbnail_chain(config: &RenditionConfig) -> TransformChain {
    TransformChain::new().then(Transform::Fill {
        width: config.thumbnail_width,
        height: config.thumbnail_height,
    })
}

/// Bounded resize, then the gallery watermark when one is configured.
pub fn optimized_chain(
    config: &RenditionConfig,
    watermark: Option<&WatermarkSettings>,
) -> TransformChain {
    let mut chain = TransformChain::new().then(Transform::ResizeToFit {
        max_width: config.optimized_max_width,
        max_height: config.optimized_max_height,
    });
    if let Some(settings) = watermark {
        chain.push(Transform::Watermark(WatermarkSpec::from(settings)));
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::WatermarkPosition;
    use image::{GenericImageView, Rgb, RgbImage};

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])))
    }

    #[test]
    fn chain_threads_output_into_next_step() {
        let chain = TransformChain::new()
            .then(Transform::ResizeToFit {
                max_width: 400,
                max_height: 400,
            })
            .then(Transform::Fill {
                width: 50,
                height: 20,
            });

        let out = chain.apply(image(1600, 800)).unwrap();
        assert_eq!(out.dimensions(), (50, 20));
        assert_eq!(chain.names(), vec!["resize_to_fit", "fill"]);
    }

    #[test]
    fn chain_short_circuits_with_strategy_name() {
        let chain = TransformChain::new()
            .then(Transform::Blur { sigma: -1.0 })
            .then(Transform::Fill {
                width: 10,
                height: 10,
            });

        match chain.apply(image(20, 20)) {
            Err(TransformError::Failed { strategy, .. }) => assert_eq!(strategy, "blur"),
            other => panic!("unexpected result: {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn empty_chain_is_identity() {
        let out = TransformChain::new().apply(image(7, 3)).unwrap();
        assert_eq!(out.dimensions(), (7, 3));
    }

    #[test]
    fn default_chains() {
        let config = RenditionConfig::default();
        assert_eq!(thumbnail_chain(&config).names(), vec!["fill"]);
        assert_eq!(optimized_chain(&config, None).names(), vec!["resize_to_fit"]);

        let settings = WatermarkSettings {
            text: "© Studio".to_string(),
            position: String::new(),
        };
        let chain = optimized_chain(&config, Some(&settings));
        assert_eq!(chain.names(), vec!["resize_to_fit", "watermark"]);
        assert_eq!(
            chain,
            TransformChain::new()
                .then(Transform::ResizeToFit {
                    max_width: 1920,
                    max_height: 1080
                })
                .then(Transform::Watermark(WatermarkSpec {
                    text: "© Studio".to_string(),
                    position: WatermarkPosition::BottomRight,
                }))
        );
    }
}
