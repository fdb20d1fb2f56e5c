//! # Slide Annotation Conversion Library
//!
//! Turns region annotations on whole-slide images into labelled polygons for
//! an annotation platform. Three sources are supported: annotation XML
//! exports, structured results from a remote analysis service, and
//! per-class heatmap rasters produced by a model.
//!
//! ## Core Features
//!
//! - **Winding-order classification**: shoelace sign decides shell vs hole
//! - **Contour tracing**: border following with the full nesting tree
//! - **Hole assembly**: shells with their holes, from the tree or from windings
//! - **Coordinate mapping**: scale to slide pixels and flip to a y-up frame
//! - **Validity and repair**: invalid polygons get one zero-width repair
//! - **WKT and GeoJSON output**: `(wkt, label)` pairs or a FeatureCollection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annotation::{ConversionConfig, Converter, MaskSource, SlideGeometry};
//!
//! let converter = Converter::from_config(ConversionConfig::default());
//!
//! let xml = std::fs::read_to_string("slide.xml")?;
//! let output = converter.convert(&MaskSource::Xml(xml), SlideGeometry::new(40_000.0, 1.0))?;
//!
//! for (wkt, label) in output.to_wkt_list() {
//!     println!("{label}: {wkt}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Heatmaps
//!
//! ```rust,no_run
//! use annotation::{ClassHeatmap, Converter, MaskSource, SlideGeometry, WindingPolicy};
//!
//! let converter = Converter::builder()
//!     .with_min_area(4.0)
//!     .with_winding_policy(WindingPolicy::Lenient)
//!     .build();
//!
//! let heatmaps = vec![
//!     ClassHeatmap::open("Pattern3", "pattern3.png")?,
//!     ClassHeatmap::open("Pattern4", "pattern4.png")?,
//! ];
//! let output = converter.convert(&MaskSource::HeatmapDict(heatmaps), SlideGeometry::new(40_000.0, 8.0))?;
//! output.save_geojson("slide.geojson", converter.config())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod io;
pub mod collaborators;
pub mod mcp;
pub mod typed_geojson;

// Re-exports for convenience
pub use error::{AnnotationError, Result};
pub use types::{
    BorderKind, ConversionOutput, LabeledPolygon, Point, RejectReason, Ring, RingGroup,
    ShapeDiagnostic, TracedContour, WindingOrder,
};
pub use config::{ChainApproximation, ConversionConfig, HoleAttachment, WindingPolicy};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{builder::ConverterBuilder, Converter, MaskSource, SlideGeometry};
pub use io::*;
pub use collaborators::{submit_annotations, AnalysisStatus, AnnotationSink, AnalysisService, SlideStore};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn create_test_heatmap() -> GrayImage {
        let mut img = GrayImage::new(100, 100);
        for y in 20..80 {
            for x in 20..80 {
                img.put_pixel(x, y, Luma([2u8]));
            }
        }
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
        img
    }

    #[test]
    fn test_heatmap_to_wkt() {
        let converter = Converter::builder().build();
        let source = MaskSource::HeatmapDict(vec![ClassHeatmap::new("Pattern5", create_test_heatmap())]);

        let output = converter
            .convert(&source, SlideGeometry::new(1600.0, 16.0))
            .expect("Should convert successfully");

        assert_eq!(output.len(), 1);
        let (wkt, label) = &output.to_wkt_list()[0];
        assert_eq!(label, "Pattern5");
        // shell and one hole
        assert_eq!(wkt.matches('(').count(), 3);
    }

    #[test]
    fn test_rasterize_then_convert_round_trip() {
        let xml = r#"<Annotations><Annotation class="Invasive"><Coordinates>
            <Coordinate x="160" y="160"/><Coordinate x="160" y="640"/>
            <Coordinate x="640" y="640"/><Coordinate x="640" y="160"/>
        </Coordinates></Annotation></Annotations>"#;
        let config = ConversionConfig::default();

        let heatmaps = rasterize_xml(xml, (1600, 1600), 16.0, &config).expect("Should rasterize");
        let converter = Converter::from_config(config);
        let output = converter
            .convert(&MaskSource::HeatmapDict(heatmaps), SlideGeometry::new(1600.0, 16.0))
            .expect("Should convert successfully");

        assert_eq!(output.len(), 1);
        assert_eq!(output.polygons[0].label, "Invasive");
        let area = output.polygons[0].area();
        assert!((area - 480.0 * 480.0).abs() / (480.0 * 480.0) < 0.1, "area {area}");
    }

    #[test]
    fn test_export_structured_then_convert() {
        let converter = Converter::builder().build();
        let heatmaps = vec![ClassHeatmap::new("Pattern4", create_test_heatmap())];

        let exported = converter
            .export_structured(&heatmaps, (1600, 1600), (0.0, 0.0))
            .expect("Should export");
        assert_eq!(exported.contours.len(), 1);
        assert_eq!(exported.contours[0].contour.len(), 2);

        let result = AnalysisResult {
            summary: AnalysisSummary {
                score: "4 + 4".to_string(),
                ..Default::default()
            },
            heatmap: exported,
        };
        let output = converter
            .convert(&MaskSource::StructuredApi(result), SlideGeometry::new(1600.0, 1.0))
            .expect("Should convert successfully");

        assert_eq!(output.len(), 1);
        assert_eq!(output.polygons[0].hole_count(), 1);
        assert!(output.diagnostics.is_empty());
    }
}
