//! Conversions between vector annotations and per-class rasters.

use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point as PixelPoint};

use crate::{
    algorithms::{
        detection::attach_holes,
        preprocessing::has_foreground,
        winding::classify,
    },
    config::{ConversionConfig, HoleAttachment},
    error::{AnnotationError, Result},
    io::{
        heatmap::{common_dimensions, ClassHeatmap},
        structured::{HeatmapContours, StructuredContour},
        xml::{parse_annotations, XmlAnnotation},
    },
    traits::{ContourTracer, MaskPreprocessor},
    types::{Point, Ring, WindingOrder},
};

const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Render slide-pixel annotations into one heatmap per configured class.
///
/// Each raster is `round(slide / ratio)` pixels. Counter-clockwise rings are
/// filled, clockwise rings are carved back out, annotation by annotation.
/// Classes without annotations come out blank.
pub fn rasterize_annotations(
    annotations: &[XmlAnnotation],
    slide_size: (u32, u32),
    ratio: f64,
    config: &ConversionConfig,
) -> Result<Vec<ClassHeatmap>> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(AnnotationError::InvalidArgument(format!(
            "heatmap ratio must be positive, got {ratio}"
        )));
    }

    let width = (slide_size.0 as f64 / ratio).round().max(1.0) as u32;
    let height = (slide_size.1 as f64 / ratio).round().max(1.0) as u32;

    let mut heatmaps: Vec<ClassHeatmap> = config
        .classes()
        .map(|label| ClassHeatmap::new(label, GrayImage::new(width, height)))
        .collect();

    for annotation in annotations {
        let heatmap = heatmaps
            .iter_mut()
            .find(|heatmap| heatmap.label == annotation.label)
            .ok_or_else(|| AnnotationError::UnknownClass(annotation.label.clone()))?;

        let mut holes = Vec::new();
        for ring in &annotation.rings {
            let Some(pixels) = to_pixel_polygon(ring, ratio) else {
                continue;
            };
            match classify(ring) {
                WindingOrder::CounterClockwise => draw_polygon_mut(&mut heatmap.raster, &pixels, FOREGROUND),
                WindingOrder::Clockwise => holes.push(pixels),
                WindingOrder::Degenerate => {}
            }
        }
        for pixels in &holes {
            draw_polygon_mut(&mut heatmap.raster, pixels, BACKGROUND);
        }
    }

    tracing::info!(
        "Rasterized {} annotations into {} heatmaps of {}x{}",
        annotations.len(),
        heatmaps.len(),
        width,
        height
    );
    Ok(heatmaps)
}

/// Parse an annotation XML document and rasterize it, see [`rasterize_annotations`].
pub fn rasterize_xml(
    xml: &str,
    slide_size: (u32, u32),
    ratio: f64,
    config: &ConversionConfig,
) -> Result<Vec<ClassHeatmap>> {
    let annotations = parse_annotations(xml)?;
    rasterize_annotations(&annotations, slide_size, ratio, config)
}

/// Scale a ring down to raster pixels. `None` if fewer than three distinct
/// pixels remain; the closing point is never repeated.
fn to_pixel_polygon(ring: &[Point], ratio: f64) -> Option<Vec<PixelPoint<i32>>> {
    let mut pixels: Vec<PixelPoint<i32>> = Vec::with_capacity(ring.len());
    for &[x, y] in ring {
        let pixel = PixelPoint::new((x / ratio).round() as i32, (y / ratio).round() as i32);
        if pixels.last() != Some(&pixel) {
            pixels.push(pixel);
        }
    }
    while pixels.len() > 1 && pixels.first() == pixels.last() {
        pixels.pop();
    }

    (pixels.len() >= 3).then_some(pixels)
}

/// Trace heatmaps and express them as a structured result in slide pixels.
///
/// Every root contour becomes one shape whose rings are the root followed by
/// all of its descendants. Points are scaled by `slide / raster` and shifted
/// by the whole part of `offset`.
pub fn export_structured(
    heatmaps: &[ClassHeatmap],
    slide_size: (u32, u32),
    offset: (f64, f64),
    preprocessor: &dyn MaskPreprocessor,
    tracer: &dyn ContourTracer,
) -> Result<HeatmapContours> {
    let Some((width, height)) = common_dimensions(heatmaps)? else {
        return Ok(HeatmapContours::default());
    };

    let scale_x = slide_size.0 as f64 / width as f64;
    let scale_y = slide_size.1 as f64 / height as f64;
    let to_slide = |ring: &Ring| -> Ring {
        ring.iter()
            .map(|&[x, y]| [slide_pixel(x * scale_x, offset.0), slide_pixel(y * scale_y, offset.1)])
            .collect()
    };

    let mut contours = Vec::new();
    for heatmap in heatmaps {
        let mask = preprocessor.preprocess(&heatmap.raster)?;
        if !has_foreground(&mask) {
            continue;
        }

        let traced = tracer.trace(&mask)?;
        let roots = attach_holes(&traced, HoleAttachment::NearestRoot);

        let before = contours.len();
        for (index, contour) in traced.iter().enumerate() {
            if roots[index].is_some() {
                continue;
            }
            let rings = std::iter::once(to_slide(&contour.points))
                .chain(
                    traced
                        .iter()
                        .enumerate()
                        .filter(|(child, _)| roots[*child] == Some(index))
                        .map(|(_, child)| to_slide(&child.points)),
                )
                .collect();

            contours.push(StructuredContour {
                contour: rings,
                label: heatmap.label.clone(),
            });
        }
        tracing::debug!("{}: exported {} shapes", heatmap.label, contours.len() - before);
    }

    Ok(HeatmapContours { contours })
}

/// Round to one decimal, subtract the whole part of the offset, then drop the fraction.
fn slide_pixel(value: f64, offset: f64) -> f64 {
    ((value * 10.0).round() / 10.0 - offset.trunc()).trunc()
}
