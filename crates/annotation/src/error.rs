use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Cannot read mpp: {0}")]
    MissingResolution(String),

    #[error("Malformed XML annotation: {0}")]
    MalformedXml(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Heatmap size mismatch: class '{label}' is {actual:?}, expected {expected:?}")]
    HeatmapSizeMismatch {
        label: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Unknown class label: {0}")]
    UnknownClass(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
