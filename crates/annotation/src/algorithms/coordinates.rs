//! Mapping between raster pixels, slide pixels and the Y-up output space.

use std::collections::HashMap;

use crate::{
    error::{AnnotationError, Result},
    types::{Point, Ring},
};

/// Scale-then-flip transform from image coordinates (origin top-left, y down)
/// to the annotation platform's convention (origin bottom-left, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    /// Height of the slide in slide pixels
    pub reference_height: f64,
    /// Source-pixel to slide-pixel factor
    pub scale: f64,
}

impl CoordinateTransform {
    pub fn new(reference_height: f64, scale: f64) -> Self {
        Self {
            reference_height,
            scale,
        }
    }

    /// Identity scale, only the vertical flip
    pub fn flip_only(reference_height: f64) -> Self {
        Self::new(reference_height, 1.0)
    }

    pub fn apply(&self, points: &[Point]) -> Ring {
        to_output_space(points, self.reference_height, self.scale)
    }

    pub fn invert(&self, points: &[Point]) -> Ring {
        from_output_space(points, self.reference_height, self.scale)
    }
}

/// Scale every point, then flip the vertical axis. Returns a fresh ring.
pub fn to_output_space(points: &[Point], reference_height: f64, scale: f64) -> Ring {
    points
        .iter()
        .map(|&[x, y]| [x * scale, reference_height - y * scale])
        .collect()
}

/// Inverse of [`to_output_space`] for the same height and scale.
pub fn from_output_space(points: &[Point], reference_height: f64, scale: f64) -> Ring {
    points
        .iter()
        .map(|&[x, y]| [x / scale, (reference_height - y) / scale])
        .collect()
}

/// Microns per pixel of a slide along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideResolution {
    pub mpp_x: f64,
    pub mpp_y: f64,
}

impl SlideResolution {
    pub const MPP_X: &'static str = "openslide.mpp-x";
    pub const MPP_Y: &'static str = "openslide.mpp-y";
    pub const TIFF_X_RESOLUTION: &'static str = "tiff.XResolution";
    pub const TIFF_Y_RESOLUTION: &'static str = "tiff.YResolution";

    /// Read the resolution from slide metadata properties.
    ///
    /// Prefers the explicit mpp entries and falls back to the TIFF
    /// resolution tags, interpreted as pixels per centimetre.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let parse = |key: &str| -> Option<f64> {
            properties
                .get(key)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite() && *value > 0.0)
        };

        if let (Some(mpp_x), Some(mpp_y)) = (parse(Self::MPP_X), parse(Self::MPP_Y)) {
            return Ok(Self { mpp_x, mpp_y });
        }

        match (parse(Self::TIFF_X_RESOLUTION), parse(Self::TIFF_Y_RESOLUTION)) {
            (Some(res_x), Some(res_y)) => Ok(Self {
                mpp_x: 10_000.0 / res_x,
                mpp_y: 10_000.0 / res_y,
            }),
            _ => Err(AnnotationError::MissingResolution(format!(
                "neither {}/{} nor {}/{} hold positive numbers",
                Self::MPP_X,
                Self::MPP_Y,
                Self::TIFF_X_RESOLUTION,
                Self::TIFF_Y_RESOLUTION
            ))),
        }
    }

    /// Factor taking heatmap pixels to slide pixels.
    pub fn heatmap_to_slide_ratio(&self, reference_mpp: f64, heatmap_downsample: f64) -> f64 {
        reference_mpp * heatmap_downsample / self.mpp_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &[Point], b: &[Point]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(p, q)| (p[0] - q[0]).abs() < 1e-9 && (p[1] - q[1]).abs() < 1e-9)
    }

    #[test]
    fn scales_then_flips() {
        let ring = vec![[1.0, 2.0], [3.0, 0.0]];
        let out = to_output_space(&ring, 100.0, 4.0);
        assert_eq!(out, vec![[4.0, 92.0], [12.0, 100.0]]);
        // the input is untouched
        assert_eq!(ring, vec![[1.0, 2.0], [3.0, 0.0]]);
    }

    #[test]
    fn output_space_round_trip() {
        let ring = vec![[0.5, 7.25], [13.0, 2.0], [9.75, 40.125]];
        let transform = CoordinateTransform::new(1234.5, 3.9);
        assert!(approx_eq(&transform.invert(&transform.apply(&ring)), &ring));
    }

    #[test]
    fn resolution_prefers_openslide_mpp() {
        let props: HashMap<String, String> = [
            ("openslide.mpp-x", "0.25"),
            ("openslide.mpp-y", "0.26"),
            ("tiff.XResolution", "1000"),
            ("tiff.YResolution", "1000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let resolution = SlideResolution::from_properties(&props).unwrap();
        assert_eq!(resolution, SlideResolution { mpp_x: 0.25, mpp_y: 0.26 });
    }

    #[test]
    fn resolution_falls_back_to_tiff_tags() {
        let props: HashMap<String, String> = [("tiff.XResolution", "40000"), ("tiff.YResolution", "20000")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let resolution = SlideResolution::from_properties(&props).unwrap();
        assert!((resolution.mpp_x - 0.25).abs() < 1e-12);
        assert!((resolution.mpp_y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn missing_resolution_fails_fast() {
        let props: HashMap<String, String> = [("openslide.mpp-x", "abc")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let err = SlideResolution::from_properties(&props).unwrap_err();
        assert!(matches!(err, AnnotationError::MissingResolution(_)));
    }

    #[test]
    fn heatmap_ratio_uses_reference_mpp() {
        let resolution = SlideResolution { mpp_x: 0.2465, mpp_y: 0.2465 };
        assert!((resolution.heatmap_to_slide_ratio(0.2465, 16.0) - 16.0).abs() < 1e-9);
    }
}
