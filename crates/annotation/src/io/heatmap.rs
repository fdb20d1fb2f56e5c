use std::path::Path;

use image::GrayImage;

use crate::error::{AnnotationError, Result};

/// A single-channel raster for one class; non-zero pixels are that class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHeatmap {
    pub label: String,
    pub raster: GrayImage,
}

impl ClassHeatmap {
    pub fn new(label: impl Into<String>, raster: GrayImage) -> Self {
        Self {
            label: label.into(),
            raster,
        }
    }

    /// Load an image file, converting it to 8-bit grayscale
    pub fn open<P: AsRef<Path>>(label: impl Into<String>, path: P) -> Result<Self> {
        let raster = image::open(path)?.to_luma8();
        Ok(Self::new(label, raster))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }
}

/// Check that every raster of a dictionary covers the same extent.
///
/// Returns the shared dimensions, or `None` for an empty dictionary.
pub fn common_dimensions(heatmaps: &[ClassHeatmap]) -> Result<Option<(u32, u32)>> {
    let Some(first) = heatmaps.first() else {
        return Ok(None);
    };
    let expected = first.dimensions();

    for heatmap in &heatmaps[1..] {
        let actual = heatmap.dimensions();
        if actual != expected {
            return Err(AnnotationError::HeatmapSizeMismatch {
                label: heatmap.label.clone(),
                expected,
                actual,
            });
        }
    }

    Ok(Some(expected))
}

/// Parse `LABEL=PATH` pairs as used on the command line.
pub fn parse_heatmap_arg(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((label, path)) if !label.is_empty() && !path.is_empty() => {
            Ok((label.to_string(), path.to_string()))
        }
        _ => Err(AnnotationError::InvalidArgument(format!(
            "expected LABEL=PATH, got {arg:?}"
        ))),
    }
}
