use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{AnnotationError, Result};

/// How many counter-clockwise rings one structured shape may carry.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindingPolicy {
    /// Reject unless exactly one counter-clockwise ring exists
    #[default]
    Strict,
    /// Reject only when no counter-clockwise ring exists; the first one is the shell
    Lenient,
}

/// Which ancestor a traced non-root contour is attached to.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HoleAttachment {
    /// Outer borders are roots, hole borders attach to the outer border enclosing them
    #[default]
    ImmediateParent,
    /// Every nested contour attaches to its outermost ancestor
    NearestRoot,
}

/// Point reduction applied to traced contours.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Display)]
#[serde(tag = "method", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChainApproximation {
    /// Keep every border pixel
    None,
    /// Compress straight runs to their end points
    #[default]
    Simple,
    /// Douglas-Peucker corner cutting with the given tolerance in raster pixels
    DouglasPeucker {
        #[schemars(range(min = 0.0))]
        epsilon: f64,
    },
}

/// Settings for one conversion. Passed explicitly; nothing here is global.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    /// Raster values strictly above this are foreground
    pub foreground_threshold: u8,
    /// Contours (and structured holes) must enclose more than this area
    pub min_area: f64,
    pub winding_policy: WindingPolicy,
    pub hole_attachment: HoleAttachment,
    pub approximation: ChainApproximation,
    /// Attempt a zero-width repair on invalid polygons
    pub repair_invalid: bool,
    /// Overall score marking a slide with nothing to annotate
    pub benign_score: String,
    /// Microns per pixel the analysis model was run at
    pub reference_mpp: f64,
    /// Downsampling factor between the analysis input and the heatmap
    pub heatmap_downsample: f64,
    /// Class label to annotation-platform term ids
    pub terms: BTreeMap<String, Vec<u64>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        let terms = [
            ("Pattern3", 17243),
            ("Pattern4", 17257),
            ("Pattern5", 17285),
            ("IDC-P", 17299),
            ("Invasive", 17311),
            ("DCIS", 17321),
            ("Cancer", 17333),
        ]
        .into_iter()
        .map(|(label, term)| (label.to_string(), vec![term]))
        .collect();

        Self {
            foreground_threshold: 1,
            min_area: 0.0,
            winding_policy: WindingPolicy::default(),
            hole_attachment: HoleAttachment::default(),
            approximation: ChainApproximation::default(),
            repair_invalid: true,
            benign_score: "Benign".to_string(),
            reference_mpp: 0.2465,
            heatmap_downsample: 16.0,
            terms,
        }
    }
}

impl ConversionConfig {
    /// Term ids for a class label
    pub fn terms_for(&self, label: &str) -> Option<&[u64]> {
        self.terms.get(label).map(Vec::as_slice)
    }

    /// Class labels known to the term mapping, in sorted order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(AnnotationError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ConversionConfig)
    }
}
