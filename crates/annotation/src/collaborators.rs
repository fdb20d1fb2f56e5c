//! Interfaces to the slide store, the analysis service and the annotation
//! platform, plus the hand-off of converted polygons to the platform.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use strum::EnumString;

use crate::{
    algorithms::coordinates::SlideResolution,
    config::ConversionConfig,
    error::AnnotationError,
    io::structured::AnalysisResult,
    pipeline::SlideGeometry,
    types::ConversionOutput,
};

/// Task state reported by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
pub enum AnalysisStatus {
    #[strum(serialize = "FINISHED")]
    Finished,
    #[strum(serialize = "FAILED", serialize = "DOWNLOAD_FAILED")]
    Failed,
    /// Any other status string, e.g. `QUEUED` or `RUNNING`
    #[strum(default)]
    Pending(String),
}

impl AnalysisStatus {
    pub fn parse(status: &str) -> Self {
        // the catch-all variant makes parsing infallible
        Self::from_str(status).unwrap_or_else(|_| Self::Pending(status.to_string()))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Pending(_))
    }
}

/// Where the upload of a slide has to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub url: String,
    pub object_id: String,
}

/// Source of whole-slide images and their metadata
pub trait SlideStore {
    type Error: std::error::Error;

    /// Download the slide into `directory`, returning the file path
    fn download(&self, image_id: u64, directory: &Path) -> Result<PathBuf, Self::Error>;

    /// Width and height in slide pixels
    fn dimensions(&self, image_id: u64) -> Result<(u32, u32), Self::Error>;

    /// Slide metadata, e.g. `openslide.mpp-x`
    fn properties(&self, image_id: u64) -> Result<HashMap<String, String>, Self::Error>;
}

/// Flip height and heatmap scale of a stored slide.
pub fn slide_geometry<S: SlideStore>(
    store: &S,
    image_id: u64,
    config: &ConversionConfig,
) -> crate::error::Result<SlideGeometry> {
    let collaborator = |e: S::Error| AnnotationError::Collaborator(e.to_string());

    let (_, height) = store.dimensions(image_id).map_err(collaborator)?;
    let properties = store.properties(image_id).map_err(collaborator)?;
    let resolution = SlideResolution::from_properties(&properties)?;

    Ok(SlideGeometry::new(
        height as f64,
        resolution.heatmap_to_slide_ratio(config.reference_mpp, config.heatmap_downsample),
    ))
}

/// Remote analysis producing structured results
pub trait AnalysisService {
    type Error: std::error::Error;

    fn request_upload(&self, file_name: &str) -> Result<UploadTicket, Self::Error>;

    fn upload(&self, file: &Path, ticket: &UploadTicket) -> Result<(), Self::Error>;

    /// Start an analysis run, returning its task id
    fn start_analysis(&self, object_id: &str, model_type: &str) -> Result<String, Self::Error>;

    fn poll_status(&self, task_id: &str) -> Result<AnalysisStatus, Self::Error>;

    fn fetch_result(&self, task_id: &str) -> Result<AnalysisResult, Self::Error>;
}

/// Annotation platform accepting WKT polygons
pub trait AnnotationSink {
    type Error: std::error::Error;

    fn persist(&mut self, wkt: &str, image_id: u64, project_id: u64, terms: &[u64]) -> Result<(), Self::Error>;
}

/// Persist every polygon whose label maps to ontology terms.
///
/// Polygons with unmapped labels are skipped with a warning. Returns the
/// number of persisted polygons.
pub fn submit_annotations<S: AnnotationSink>(
    output: &ConversionOutput,
    config: &ConversionConfig,
    sink: &mut S,
    image_id: u64,
    project_id: u64,
) -> Result<usize, S::Error> {
    let mut persisted = 0;

    for polygon in &output.polygons {
        let Some(terms) = config.terms_for(&polygon.label) else {
            tracing::warn!("No terms for class '{}', skipping polygon", polygon.label);
            continue;
        };
        sink.persist(&polygon.to_wkt(), image_id, project_id, terms)?;
        persisted += 1;
    }

    tracing::info!("Persisted {} of {} polygons for image {}", persisted, output.len(), image_id);
    Ok(persisted)
}
