pub mod builder;

use crate::{
    algorithms::{
        coordinates::CoordinateTransform,
        detection::{HierarchyAssembler, WindingAssembler},
        preprocessing::has_foreground,
        repair::finalize,
    },
    config::ConversionConfig,
    error::Result,
    io::{
        heatmap::{common_dimensions, ClassHeatmap},
        raster::export_structured,
        structured::{AnalysisResult, HeatmapContours},
        xml::parse_annotations,
    },
    traits::{ContourTracer, GeometryRepair, MaskPreprocessor},
    types::{ConversionOutput, Ring, ShapeDiagnostic},
};

/// The three ways an annotation source can arrive.
#[derive(Debug, Clone)]
pub enum MaskSource {
    /// Annotation XML document, coordinates in slide pixels
    Xml(String),
    /// One raster per class, all of the same size
    HeatmapDict(Vec<ClassHeatmap>),
    /// Analysis service result, coordinates in slide pixels
    StructuredApi(AnalysisResult),
}

impl MaskSource {
    pub fn kind(&self) -> &'static str {
        match self {
            MaskSource::Xml(_) => "xml",
            MaskSource::HeatmapDict(_) => "heatmap",
            MaskSource::StructuredApi(_) => "structured",
        }
    }
}

/// Placement of the source on the slide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideGeometry {
    /// Slide height in slide pixels, the flip reference
    pub height: f64,
    /// Heatmap-pixel to slide-pixel factor; vector sources ignore it
    pub heatmap_scale: f64,
}

impl SlideGeometry {
    pub fn new(height: f64, heatmap_scale: f64) -> Self {
        Self { height, heatmap_scale }
    }
}

/// Turns any [`MaskSource`] into labelled polygons in output space
pub struct Converter {
    config: ConversionConfig,
    preprocessor: Box<dyn MaskPreprocessor>,
    tracer: Box<dyn ContourTracer>,
    repair: Option<Box<dyn GeometryRepair>>,
}

impl Converter {
    pub fn builder() -> builder::ConverterBuilder {
        builder::ConverterBuilder::new()
    }

    /// Converter with default components driven by `config`
    pub fn from_config(config: ConversionConfig) -> Self {
        builder::ConverterBuilder::new().with_config(config).build()
    }

    pub fn new(
        config: ConversionConfig,
        preprocessor: Box<dyn MaskPreprocessor>,
        tracer: Box<dyn ContourTracer>,
        repair: Option<Box<dyn GeometryRepair>>,
    ) -> Self {
        Self {
            config,
            preprocessor,
            tracer,
            repair,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn convert(&self, source: &MaskSource, slide: SlideGeometry) -> Result<ConversionOutput> {
        tracing::debug!("Converting {} source, slide height {}", source.kind(), slide.height);

        let output = match source {
            MaskSource::Xml(document) => {
                let annotations = parse_annotations(document)?;
                self.convert_rings(
                    annotations.iter().map(|a| (a.label.as_str(), a.rings.as_slice())),
                    &CoordinateTransform::flip_only(slide.height),
                )
            }
            MaskSource::StructuredApi(result) => {
                if result.is_benign(&self.config.benign_score) {
                    tracing::info!("Summary score is '{}', nothing to convert", result.summary.score);
                    return Ok(ConversionOutput::default());
                }
                self.convert_structured(&result.heatmap, slide.height)
            }
            MaskSource::HeatmapDict(heatmaps) => self.convert_heatmaps(
                heatmaps,
                &CoordinateTransform::new(slide.height, slide.heatmap_scale),
            )?,
        };

        tracing::info!(
            "Converted {} source: {} polygons, {} rejected",
            source.kind(),
            output.polygons.len(),
            output.diagnostics.len()
        );
        Ok(output)
    }

    pub fn convert_structured(&self, heatmap: &HeatmapContours, slide_height: f64) -> ConversionOutput {
        self.convert_rings(
            heatmap.contours.iter().map(|c| (c.label.as_str(), c.contour.as_slice())),
            &CoordinateTransform::flip_only(slide_height),
        )
    }

    /// Vector sources: each entry is one shape whose rings are sorted by winding.
    fn convert_rings<'a>(
        &self,
        shapes: impl Iterator<Item = (&'a str, &'a [Ring])>,
        transform: &CoordinateTransform,
    ) -> ConversionOutput {
        let assembler = WindingAssembler::new(self.config.winding_policy, self.config.min_area);
        let mut output = ConversionOutput::default();

        for (index, (label, rings)) in shapes.enumerate() {
            match assembler.assemble(label, rings) {
                Ok(group) => output.polygons.push(finalize(&group, transform, self.repair.as_deref())),
                Err(reason) => {
                    tracing::warn!("Skipping shape {} of class '{}': {}", index, label, reason);
                    output.diagnostics.push(ShapeDiagnostic {
                        label: label.to_string(),
                        index,
                        reason,
                    });
                }
            }
        }

        output
    }

    /// Raster sources: threshold, trace and group every class independently.
    fn convert_heatmaps(&self, heatmaps: &[ClassHeatmap], transform: &CoordinateTransform) -> Result<ConversionOutput> {
        common_dimensions(heatmaps)?;

        let assembler = HierarchyAssembler::new(self.config.min_area, self.config.hole_attachment);
        let mut output = ConversionOutput::default();

        for heatmap in heatmaps {
            let mask = self.preprocessor.preprocess(&heatmap.raster)?;
            if !has_foreground(&mask) {
                tracing::debug!("{}: no foreground", heatmap.label);
                continue;
            }

            let contours = self.tracer.trace(&mask)?;
            let groups = assembler.assemble(&heatmap.label, &contours);
            tracing::info!("{}: {} contours, {} shapes", heatmap.label, contours.len(), groups.len());

            output.extend(ConversionOutput {
                polygons: groups
                    .iter()
                    .map(|group| finalize(group, transform, self.repair.as_deref()))
                    .collect(),
                diagnostics: Vec::new(),
            });
        }

        Ok(output)
    }

    /// Trace heatmaps into the structured result form, in slide pixels
    pub fn export_structured(
        &self,
        heatmaps: &[ClassHeatmap],
        slide_size: (u32, u32),
        offset: (f64, f64),
    ) -> Result<HeatmapContours> {
        export_structured(heatmaps, slide_size, offset, self.preprocessor.as_ref(), self.tracer.as_ref())
    }

    pub fn info(&self) -> String {
        format!(
            "Converter: winding policy {}, hole attachment {}, repair {}",
            self.config.winding_policy,
            self.config.hole_attachment,
            if self.repair.is_some() { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::winding::classify,
        config::WindingPolicy,
        types::{RejectReason, WindingOrder},
    };
    use geo_types::Geometry;
    use image::{GrayImage, Luma};

    fn block(image: &mut GrayImage, x0: u32, y0: u32, size: u32, value: u8) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn ring_winding(coords: &geo_types::LineString<f64>) -> WindingOrder {
        let points: Vec<[f64; 2]> = coords.coords().map(|c| [c.x, c.y]).collect();
        classify(&points[..points.len() - 1])
    }

    #[test]
    fn single_blob_becomes_one_scaled_polygon() {
        let mut raster = GrayImage::new(64, 64);
        block(&mut raster, 10, 20, 20, 3);
        let source = MaskSource::HeatmapDict(vec![ClassHeatmap::new("Pattern3", raster)]);

        let output = Converter::from_config(ConversionConfig::default())
            .convert(&source, SlideGeometry::new(1024.0, 16.0))
            .unwrap();

        assert_eq!(output.len(), 1);
        let polygon = &output.polygons[0];
        assert_eq!(polygon.label, "Pattern3");
        assert!(polygon.valid);
        assert_eq!(polygon.hole_count(), 0);

        let expected = 400.0 * 16.0 * 16.0;
        assert!((polygon.area() - expected).abs() / expected < 0.15, "area {}", polygon.area());

        let exterior = polygon.as_polygon().unwrap().exterior();
        // y flipped: top row 20 lands at 1024 - 320
        assert!(exterior.coords().any(|c| c.x == 160.0 && c.y == 704.0));
    }

    #[test]
    fn blob_with_hole_keeps_opposite_windings() {
        let mut raster = GrayImage::new(64, 64);
        block(&mut raster, 5, 5, 40, 3);
        block(&mut raster, 15, 15, 10, 0);
        let source = MaskSource::HeatmapDict(vec![ClassHeatmap::new("Pattern4", raster)]);

        let output = Converter::from_config(ConversionConfig::default())
            .convert(&source, SlideGeometry::new(64.0, 1.0))
            .unwrap();

        assert_eq!(output.len(), 1);
        let polygon = output.polygons[0].as_polygon().unwrap();
        assert_eq!(polygon.interiors().len(), 1);
        assert!(output.polygons[0].valid);

        let shell = ring_winding(polygon.exterior());
        let hole = ring_winding(&polygon.interiors()[0]);
        assert_ne!(shell, WindingOrder::Degenerate);
        assert_ne!(hole, WindingOrder::Degenerate);
        assert_ne!(shell, hole);
    }

    #[test]
    fn classes_are_traced_independently() {
        let mut pattern3 = GrayImage::new(32, 32);
        block(&mut pattern3, 2, 2, 6, 3);
        block(&mut pattern3, 20, 20, 6, 3);
        let mut pattern5 = GrayImage::new(32, 32);
        block(&mut pattern5, 10, 10, 8, 3);
        let empty = GrayImage::new(32, 32);

        let source = MaskSource::HeatmapDict(vec![
            ClassHeatmap::new("Pattern3", pattern3),
            ClassHeatmap::new("Pattern4", empty),
            ClassHeatmap::new("Pattern5", pattern5),
        ]);
        let output = Converter::from_config(ConversionConfig::default())
            .convert(&source, SlideGeometry::new(32.0, 1.0))
            .unwrap();

        let labels: Vec<&str> = output.polygons.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Pattern3", "Pattern3", "Pattern5"]);
    }

    #[test]
    fn diagonally_touching_blocks_are_repaired_into_a_multipolygon() {
        let mut raster = GrayImage::new(16, 16);
        block(&mut raster, 2, 2, 4, 3);
        block(&mut raster, 6, 6, 4, 3);
        let source = MaskSource::HeatmapDict(vec![ClassHeatmap::new("Pattern4", raster)]);

        let output = Converter::from_config(ConversionConfig::default())
            .convert(&source, SlideGeometry::new(100.0, 1.0))
            .unwrap();

        assert_eq!(output.len(), 1);
        let polygon = &output.polygons[0];
        assert!(polygon.valid);
        assert!(polygon.repaired);
        assert!(matches!(&polygon.geometry, Geometry::MultiPolygon(multi) if multi.0.len() == 2));
        assert!(output.to_wkt_list()[0].0.starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn mismatched_heatmaps_fail() {
        let source = MaskSource::HeatmapDict(vec![
            ClassHeatmap::new("Pattern3", GrayImage::new(8, 8)),
            ClassHeatmap::new("Pattern4", GrayImage::new(8, 9)),
        ]);
        assert!(Converter::from_config(ConversionConfig::default())
            .convert(&source, SlideGeometry::new(8.0, 1.0))
            .is_err());
    }

    #[test]
    fn benign_result_is_empty() {
        let result = AnalysisResult::from_json(
            r#"{"summary": {"score": "Benign"},
                "heatmap": {"contours": [{"contour": [[[0, 0], [0, 10], [10, 10], [10, 0]]], "label": "Pattern3"}]}}"#,
        )
        .unwrap();

        let output = Converter::from_config(ConversionConfig::default())
            .convert(&MaskSource::StructuredApi(result), SlideGeometry::new(100.0, 1.0))
            .unwrap();
        assert!(output.is_empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn structured_shapes_are_flipped_and_rejections_reported() {
        let result = AnalysisResult::from_json(
            r#"{"summary": {"score": "3 + 4"},
                "heatmap": {"contours": [
                    {"contour": [[[0, 0], [0, 10], [10, 10], [10, 0]], [[2, 2], [4, 2], [4, 4], [2, 4]]], "label": "Pattern4"},
                    {"contour": [[[0, 0], [10, 0], [10, 10], [0, 10]]], "label": "DCIS"},
                    {"contour": [[[0, 0], [0, 5], [5, 5], [5, 0]], [[20, 0], [20, 5], [25, 5], [25, 0]]], "label": "Pattern3"}
                ]}}"#,
        )
        .unwrap();
        let source = MaskSource::StructuredApi(result);

        let converter = Converter::from_config(ConversionConfig::default());
        let output = converter.convert(&source, SlideGeometry::new(100.0, 16.0)).unwrap();

        assert_eq!(output.len(), 1);
        let polygon = output.polygons[0].as_polygon().unwrap();
        assert_eq!(polygon.interiors().len(), 1);
        assert!(polygon.exterior().coords().any(|c| c.x == 10.0 && c.y == 90.0));
        assert!((output.polygons[0].area() - 96.0).abs() < 1e-9);

        assert_eq!(
            output.diagnostics,
            vec![
                ShapeDiagnostic { label: "DCIS".into(), index: 1, reason: RejectReason::NoShell },
                ShapeDiagnostic { label: "Pattern3".into(), index: 2, reason: RejectReason::MultipleShells { count: 2 } },
            ]
        );

        let lenient = Converter::builder().with_winding_policy(WindingPolicy::Lenient).build();
        let output = lenient.convert(&source, SlideGeometry::new(100.0, 1.0)).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn xml_source_produces_wkt() {
        let xml = r#"<Annotations>
            <Annotation class="IDC-P">
                <Coordinates>
                    <Coordinate x="100" y="100"/><Coordinate x="100" y="200"/>
                    <Coordinate x="200" y="200"/><Coordinate x="200" y="100"/>
                </Coordinates>
            </Annotation>
        </Annotations>"#;

        let output = Converter::from_config(ConversionConfig::default())
            .convert(&MaskSource::Xml(xml.to_string()), SlideGeometry::new(1000.0, 16.0))
            .unwrap();

        let wkt = output.to_wkt_list();
        assert_eq!(wkt.len(), 1);
        assert_eq!(wkt[0].1, "IDC-P");
        assert!(wkt[0].0.starts_with("POLYGON(("));
        assert!(wkt[0].0.contains("100 900"));
        assert!(matches!(output.polygons[0].geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn malformed_xml_fails_fast() {
        let converter = Converter::from_config(ConversionConfig::default());
        assert!(converter
            .convert(&MaskSource::Xml("<Annotations><Annotation>".into()), SlideGeometry::new(10.0, 1.0))
            .is_err());
    }
}
