pub mod geojson;
pub mod heatmap;
pub mod raster;
pub mod structured;
pub mod xml;

pub use heatmap::{common_dimensions, parse_heatmap_arg, ClassHeatmap};
pub use raster::{export_structured, rasterize_annotations, rasterize_xml};
pub use structured::{AnalysisResult, AnalysisSummary, HeatmapContours, StructuredContour};
pub use xml::{parse_annotations, XmlAnnotation};
