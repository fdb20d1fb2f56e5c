use annotation::{
    AnalysisResult, AnnotationError, ClassHeatmap, ConversionConfig, ConversionOutput, MaskSource,
    SlideGeometry, SlideResolution,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error("Missing heatmap scale: give 'heatmap_scale' or 'mpp_x'")]
    MissingScale,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// How converted polygons are written out
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One `label<TAB>wkt` line per polygon
    #[default]
    Wkt,
    /// A GeoJSON FeatureCollection
    Geojson,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wkt => "wkt",
            OutputFormat::Geojson => "geojson",
        }
    }
}

/// Serialize a conversion result in the requested format
pub fn render(output: &ConversionOutput, format: OutputFormat, config: &ConversionConfig) -> Result<String, AnnotateError> {
    match format {
        OutputFormat::Wkt => Ok(output
            .to_wkt_list()
            .into_iter()
            .map(|(wkt, label)| format!("{label}\t{wkt}\n"))
            .collect()),
        OutputFormat::Geojson => Ok(output.to_geojson_string(config)?),
    }
}

/// Heatmap-to-slide factor: the explicit value, else derived from the slide resolution
pub fn resolve_heatmap_scale(
    heatmap_scale: Option<f64>,
    mpp_x: Option<f64>,
    config: &ConversionConfig,
) -> Result<f64, AnnotateError> {
    if let Some(scale) = heatmap_scale {
        return Ok(scale);
    }
    let mpp_x = mpp_x.ok_or(AnnotateError::MissingScale)?;
    let properties = HashMap::from([
        (SlideResolution::MPP_X.to_string(), mpp_x.to_string()),
        (SlideResolution::MPP_Y.to_string(), mpp_x.to_string()),
    ]);
    let resolution = SlideResolution::from_properties(&properties)?;
    Ok(resolution.heatmap_to_slide_ratio(config.reference_mpp, config.heatmap_downsample))
}

/// Where one slide's annotations come from
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobSource {
    Xml { path: String },
    Structured { path: String },
    /// Class label to heatmap image path
    Heatmaps { classes: BTreeMap<String, String> },
}

impl JobSource {
    pub fn load(&self) -> Result<MaskSource, AnnotateError> {
        match self {
            JobSource::Xml { path } => Ok(MaskSource::Xml(fs::read_to_string(path)?)),
            JobSource::Structured { path } => Ok(MaskSource::StructuredApi(AnalysisResult::from_json_file(path)?)),
            JobSource::Heatmaps { classes } => {
                let heatmaps = classes
                    .iter()
                    .map(|(label, path)| ClassHeatmap::open(label.as_str(), path))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MaskSource::HeatmapDict(heatmaps))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SlideEntry {
    pub name: String,
    /// Slide height in slide pixels
    pub height: f64,
    pub heatmap_scale: Option<f64>,
    pub mpp_x: Option<f64>,
    pub source: JobSource,
}

impl SlideEntry {
    pub fn geometry(&self, config: &ConversionConfig) -> Result<SlideGeometry, AnnotateError> {
        let scale = match self.source {
            JobSource::Heatmaps { .. } => resolve_heatmap_scale(self.heatmap_scale, self.mpp_x, config)?,
            _ => 1.0,
        };
        Ok(SlideGeometry::new(self.height, scale))
    }
}

/// Batch of slides converted with one configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ConversionJob {
    pub output_dir: String,
    #[serde(default)]
    pub format: OutputFormat,
    /// Conversion configuration file; defaults apply when absent
    pub config: Option<String>,
    pub slides: Vec<SlideEntry>,
}

impl ConversionJob {
    /// Load ConversionJob from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, AnnotateError> {
        Ok(toml::from_str(content)?)
    }

    /// Load ConversionJob from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AnnotateError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the job
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AnnotateError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(AnnotateError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, AnnotateError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, AnnotateError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// The job's conversion configuration
    pub fn conversion_config(&self) -> Result<ConversionConfig, AnnotateError> {
        match &self.config {
            Some(path) => Ok(ConversionConfig::from_file(path)?),
            None => Ok(ConversionConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotation::{Converter, LabeledPolygon};
    use geo_types::{polygon, Geometry};

    const JOB: &str = r#"
output_dir = "out"
format = "geojson"

[[slides]]
name = "case-001"
height = 40000.0
source = { type = "xml", path = "case-001.xml" }

[[slides]]
name = "case-002"
height = 30000.0
mpp_x = 0.493
source = { type = "heatmaps", classes = { Pattern3 = "p3.png", Pattern4 = "p4.png" } }
"#;

    #[test]
    fn parses_job_file() {
        let job = ConversionJob::from_toml(JOB).unwrap();
        assert_eq!(job.format, OutputFormat::Geojson);
        assert_eq!(job.slides.len(), 2);
        assert_eq!(job.slides[0].source, JobSource::Xml { path: "case-001.xml".into() });
        assert!(matches!(&job.slides[1].source, JobSource::Heatmaps { classes } if classes.len() == 2));
        assert!(job.config.is_none());

        let round_trip = ConversionJob::from_json(&job.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, job);
    }

    #[test]
    fn geometry_depends_on_source() {
        let job = ConversionJob::from_toml(JOB).unwrap();
        let config = ConversionConfig::default();

        let xml = job.slides[0].geometry(&config).unwrap();
        assert_eq!(xml, SlideGeometry::new(40000.0, 1.0));

        let heatmaps = job.slides[1].geometry(&config).unwrap();
        assert!((heatmaps.heatmap_scale - 8.0).abs() < 1e-9);
    }

    #[test]
    fn heatmap_scale_needs_a_source() {
        let config = ConversionConfig::default();
        assert_eq!(resolve_heatmap_scale(Some(2.0), None, &config).unwrap(), 2.0);
        assert!(matches!(
            resolve_heatmap_scale(None, None, &config),
            Err(AnnotateError::MissingScale)
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            ConversionJob::from_file("job.yaml"),
            Err(AnnotateError::UnsupportedFileFormat)
        ));
    }

    #[test]
    fn renders_wkt_lines() {
        let output = ConversionOutput {
            polygons: vec![LabeledPolygon {
                label: "Pattern4".to_string(),
                geometry: Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0)]),
                valid: true,
                repaired: false,
            }],
            diagnostics: vec![],
        };

        let text = render(&output, OutputFormat::Wkt, &ConversionConfig::default()).unwrap();
        assert!(text.starts_with("Pattern4\tPOLYGON(("));
        assert_eq!(text.lines().count(), 1);

        let geojson = render(&output, OutputFormat::Geojson, &ConversionConfig::default()).unwrap();
        assert!(geojson.contains("FeatureCollection"));
        assert!(Converter::from_config(ConversionConfig::default()).info().contains("strict"));
    }
}
