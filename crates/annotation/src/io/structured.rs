use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{error::Result, types::Ring};

/// Result document returned by the analysis service.
///
/// ```json
/// {"summary": {"score": "4 + 3"},
///  "heatmap": {"contours": [{"contour": [[[x, y], ...], ...], "label": "Pattern4"}]}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    #[serde(default)]
    pub heatmap: HeatmapContours,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    #[serde(default)]
    pub score: String,
    /// Any further summary keys, kept for property hand-off
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeatmapContours {
    #[serde(default)]
    pub contours: Vec<StructuredContour>,
}

/// One shape: all of its rings (any order, orientation decides the roles) and its class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredContour {
    pub contour: Vec<Ring>,
    #[serde(alias = "class")]
    pub label: String,
}

impl AnalysisResult {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn is_benign(&self, benign_score: &str) -> bool {
        self.summary.score == benign_score
    }

    /// Summary entries as display strings, score first.
    pub fn summary_properties(&self) -> Vec<(String, String)> {
        std::iter::once(("score".to_string(), self.summary.score.clone()))
            .chain(self.summary.extra.iter().map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT: &str = r#"{
        "summary": {"score": "4 + 3", "grade_group": 3, "model": "prostate-v2"},
        "heatmap": {"contours": [
            {"contour": [[[0, 0], [0, 10], [10, 10], [10, 0]], [[2, 2], [3, 2], [3, 3]]], "label": "Pattern4"},
            {"contour": [[[50, 50], [50, 60], [60, 60]]], "class": "IDC-P"}
        ]}
    }"#;

    #[test]
    fn parses_contours_and_class_alias() {
        let result = AnalysisResult::from_json(RESULT).unwrap();
        assert_eq!(result.summary.score, "4 + 3");
        assert_eq!(result.heatmap.contours.len(), 2);
        assert_eq!(result.heatmap.contours[0].contour.len(), 2);
        assert_eq!(result.heatmap.contours[0].contour[0][2], [10.0, 10.0]);
        assert_eq!(result.heatmap.contours[1].label, "IDC-P");
        assert!(!result.is_benign("Benign"));
    }

    #[test]
    fn benign_result_may_omit_heatmap() {
        let result = AnalysisResult::from_json(r#"{"summary": {"score": "Benign"}}"#).unwrap();
        assert!(result.is_benign("Benign"));
        assert!(result.heatmap.contours.is_empty());
    }

    #[test]
    fn summary_properties_render_values() {
        let result = AnalysisResult::from_json(RESULT).unwrap();
        let properties = result.summary_properties();
        assert_eq!(properties[0], ("score".to_string(), "4 + 3".to_string()));
        assert!(properties.contains(&("grade_group".to_string(), "3".to_string())));
        assert!(properties.contains(&("model".to_string(), "prostate-v2".to_string())));
    }

    #[test]
    fn rejects_missing_summary() {
        assert!(AnalysisResult::from_json(r#"{"heatmap": {"contours": []}}"#).is_err());
    }
}
