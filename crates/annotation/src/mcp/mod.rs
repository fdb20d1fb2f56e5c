use crate::{
    algorithms::coordinates::SlideResolution,
    config::ConversionConfig,
    error::AnnotationError,
    io::{heatmap::ClassHeatmap, structured::AnalysisResult},
    pipeline::{Converter, MaskSource, SlideGeometry},
    types::ConversionOutput,
};
use rmcp::{
    handler::server::tool::IntoCallToolResult, model::{CallToolResult, Content, ServerCapabilities, ServerInfo}, schemars, tool, Error as McpError, ServerHandler
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Request for converting an annotation XML export
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConvertXmlRequest {
    #[schemars(description = "Path to the annotation XML file")]
    pub path: String,
    #[schemars(description = "Slide height in slide pixels, used for the vertical flip")]
    pub slide_height: f64,
}

/// Request for converting an analysis service result
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConvertStructuredRequest {
    #[schemars(description = "Path to the result JSON file")]
    pub path: String,
    #[schemars(description = "Slide height in slide pixels, used for the vertical flip")]
    pub slide_height: f64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HeatmapInput {
    #[schemars(description = "Class label, e.g. Pattern4")]
    pub label: String,
    #[schemars(description = "Path to a grayscale heatmap image")]
    pub path: String,
}

/// Request for converting per-class heatmaps
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ConvertHeatmapsRequest {
    #[schemars(description = "One heatmap per class, all of the same size")]
    pub heatmaps: Vec<HeatmapInput>,
    #[schemars(description = "Slide height in slide pixels, used for the vertical flip")]
    pub slide_height: f64,
    #[schemars(description = "Heatmap-pixel to slide-pixel factor; derived from mpp_x when absent")]
    pub heatmap_scale: Option<f64>,
    #[schemars(description = "Slide resolution in microns per pixel", range(min = 0.01, max = 100.0))]
    pub mpp_x: Option<f64>,
}

/// Request for loading a configuration file
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadConfigRequest {
    #[schemars(description = "Path to a .toml or .json configuration file")]
    pub path: String,
}

#[derive(Debug, Serialize, schemars::JsonSchema, TS)]
pub struct WktPolygon {
    pub label: String,
    pub wkt: String,
    pub valid: bool,
    pub repaired: bool,
}

#[derive(Debug, Serialize, schemars::JsonSchema, TS)]
pub struct RejectedShape {
    pub label: String,
    pub index: usize,
    pub reason: String,
}

/// Response containing conversion results
#[derive(Debug, Serialize, schemars::JsonSchema, TS)]
#[ts(export)]
pub struct ConversionResponse {
    #[schemars(description = "Number of polygons produced")]
    pub polygon_count: usize,
    #[schemars(description = "Polygons as WKT with their class labels, in emission order")]
    pub polygons: Vec<WktPolygon>,
    #[schemars(description = "Shapes skipped because of ambiguous winding")]
    pub rejected: Vec<RejectedShape>,
    #[schemars(description = "GeoJSON representation of the polygons")]
    pub geojson: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionResponse {
    fn from_output(output: &ConversionOutput, config: &ConversionConfig) -> Self {
        let geojson = output
            .to_geojson(config)
            .and_then(|collection| Ok(serde_json::to_value(collection)?))
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }));

        Self {
            polygon_count: output.len(),
            polygons: output
                .polygons
                .iter()
                .map(|polygon| WktPolygon {
                    label: polygon.label.clone(),
                    wkt: polygon.to_wkt(),
                    valid: polygon.valid,
                    repaired: polygon.repaired,
                })
                .collect(),
            rejected: output
                .diagnostics
                .iter()
                .map(|diagnostic| RejectedShape {
                    label: diagnostic.label.clone(),
                    index: diagnostic.index,
                    reason: diagnostic.reason.to_string(),
                })
                .collect(),
            geojson,
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            polygon_count: 0,
            polygons: Vec::new(),
            rejected: Vec::new(),
            geojson: serde_json::Value::Null,
            error: Some(message),
        }
    }
}

impl IntoCallToolResult for ConversionResponse {
    fn into_call_tool_result(self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&self).unwrap_or_else(|_| format!("{:?}", self)),
        )]))
    }
}

/// MCP Server for slide annotation conversion
#[derive(Clone)]
pub struct AnnotationMcpServer {
    converter: Arc<RwLock<Converter>>,
}

impl AnnotationMcpServer {
    pub fn new() -> Self {
        Self::with_config(ConversionConfig::default())
    }

    pub fn with_config(config: ConversionConfig) -> Self {
        Self {
            converter: Arc::new(RwLock::new(Converter::from_config(config))),
        }
    }

    fn run(&self, source: MaskSource, slide: SlideGeometry) -> ConversionResponse {
        let converter = match self.converter.read() {
            Ok(converter) => converter,
            Err(_) => return ConversionResponse::error("Converter lock poisoned".to_string()),
        };

        match converter.convert(&source, slide) {
            Ok(output) => ConversionResponse::from_output(&output, converter.config()),
            Err(e) => ConversionResponse::error(format!("Conversion of {} source failed: {}", source.kind(), e)),
        }
    }

    fn heatmap_scale(&self, heatmap_scale: Option<f64>, mpp_x: Option<f64>) -> Result<f64, AnnotationError> {
        if let Some(scale) = heatmap_scale {
            return Ok(scale);
        }
        let mpp_x = mpp_x.ok_or_else(|| {
            AnnotationError::MissingResolution("give heatmap_scale or mpp_x".to_string())
        })?;
        let properties = HashMap::from([
            (SlideResolution::MPP_X.to_string(), mpp_x.to_string()),
            (SlideResolution::MPP_Y.to_string(), mpp_x.to_string()),
        ]);
        let resolution = SlideResolution::from_properties(&properties)?;

        let converter = self
            .converter
            .read()
            .map_err(|_| AnnotationError::InvalidArgument("converter lock poisoned".to_string()))?;
        let config = converter.config();
        Ok(resolution.heatmap_to_slide_ratio(config.reference_mpp, config.heatmap_downsample))
    }
}

impl Default for AnnotationMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool(tool_box)]
impl AnnotationMcpServer {
    #[tool(description = "Convert an annotation XML export into labelled WKT polygons")]
    fn convert_xml(
        &self,
        #[tool(aggr)] ConvertXmlRequest { path, slide_height }: ConvertXmlRequest,
    ) -> ConversionResponse {
        match std::fs::read_to_string(&path) {
            Ok(xml) => self.run(MaskSource::Xml(xml), SlideGeometry::new(slide_height, 1.0)),
            Err(e) => ConversionResponse::error(format!("Failed to read {}: {}", path, e)),
        }
    }

    #[tool(description = "Convert an analysis service result JSON into labelled WKT polygons; benign results give no polygons")]
    fn convert_structured_result(
        &self,
        #[tool(aggr)] ConvertStructuredRequest { path, slide_height }: ConvertStructuredRequest,
    ) -> ConversionResponse {
        match AnalysisResult::from_json_file(&path) {
            Ok(result) => self.run(MaskSource::StructuredApi(result), SlideGeometry::new(slide_height, 1.0)),
            Err(e) => ConversionResponse::error(format!("Failed to load result from {}: {}", path, e)),
        }
    }

    #[tool(description = "Trace per-class heatmap images into labelled WKT polygons with holes")]
    fn convert_heatmaps(
        &self,
        #[tool(aggr)] ConvertHeatmapsRequest { heatmaps, slide_height, heatmap_scale, mpp_x }: ConvertHeatmapsRequest,
    ) -> ConversionResponse {
        let scale = match self.heatmap_scale(heatmap_scale, mpp_x) {
            Ok(scale) => scale,
            Err(e) => return ConversionResponse::error(e.to_string()),
        };

        let loaded: Result<Vec<ClassHeatmap>, AnnotationError> = heatmaps
            .iter()
            .map(|input| ClassHeatmap::open(input.label.as_str(), &input.path))
            .collect();

        match loaded {
            Ok(loaded) => self.run(MaskSource::HeatmapDict(loaded), SlideGeometry::new(slide_height, scale)),
            Err(e) => ConversionResponse::error(format!("Failed to load heatmaps: {}", e)),
        }
    }

    #[tool(description = "Load a conversion configuration from a TOML or JSON file")]
    fn load_config(&self, #[tool(aggr)] LoadConfigRequest { path }: LoadConfigRequest) -> String {
        let config = match ConversionConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => return format!("Failed to load configuration from {}: {}", path, e),
        };

        match self.converter.write() {
            Ok(mut converter) => {
                *converter = Converter::from_config(config);
                format!("Configuration loaded from {}", path)
            }
            Err(_) => "Converter lock poisoned".to_string(),
        }
    }

    #[tool(description = "Get the active conversion configuration as JSON")]
    fn get_config(&self) -> String {
        match self.converter.read() {
            Ok(converter) => converter
                .config()
                .to_json()
                .unwrap_or_else(|e| format!("Failed to serialize configuration: {}", e)),
            Err(_) => "Converter lock poisoned".to_string(),
        }
    }

    #[tool(description = "Get the JSON schema of the conversion configuration")]
    fn get_config_schema(&self) -> String {
        serde_json::to_string_pretty(&ConversionConfig::schema())
            .unwrap_or_else(|e| format!("Failed to serialize schema: {}", e))
    }
}

#[tool(tool_box)]
impl ServerHandler for AnnotationMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Slide Annotation Conversion Server - Turn annotation XML exports, analysis results and per-class heatmaps into labelled WKT polygons with holes, in the annotation platform's y-up coordinates.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
