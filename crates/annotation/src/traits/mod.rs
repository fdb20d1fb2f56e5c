use geo_types::{Geometry, Polygon};
use image::GrayImage;

use crate::{error::Result, types::TracedContour};

/// Trait for turning a label raster into a binary mask
pub trait MaskPreprocessor: Send + Sync {
    /// Produce a mask where foreground pixels are non-zero
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for contour tracing algorithms
pub trait ContourTracer: Send + Sync {
    /// Trace outer and hole borders of a binary mask, with their nesting
    fn trace(&self, mask: &GrayImage) -> Result<Vec<TracedContour>>;
}

/// Trait for fixing polygons that fail the validity check
pub trait GeometryRepair: Send + Sync {
    /// Attempt a repair. `None` means no usable geometry came out of it.
    fn repair(&self, polygon: &Polygon<f64>) -> Option<Geometry<f64>>;
}
