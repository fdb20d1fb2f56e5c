use image::GrayImage;
use crate::{error::Result, traits::MaskPreprocessor};

/// Marks pixels strictly above `threshold` as foreground (255), the rest as 0
#[derive(Debug, Clone)]
pub struct ThresholdPreprocessor {
    pub threshold: u8,
}

impl Default for ThresholdPreprocessor {
    fn default() -> Self {
        Self { threshold: 1 }
    }
}

impl MaskPreprocessor for ThresholdPreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(imageproc::contrast::threshold(image, self.threshold))
    }
}

/// Whether any pixel of the mask is foreground
pub fn has_foreground(mask: &GrayImage) -> bool {
    mask.pixels().any(|pixel| pixel[0] > 0)
}
