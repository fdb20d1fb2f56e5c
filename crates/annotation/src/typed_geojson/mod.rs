use std::marker::PhantomData;
use serde::{Deserialize, Serialize};
use geojson::{Geometry, JsonObject};
use ts_rs::TS;
use schemars::JsonSchema;

/// Properties for converted annotation features
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS, JsonSchema)]
#[ts(export)]
#[schemars(description = "Properties for converted annotation features")]
pub struct AnnotationProperties {
    #[schemars(description = "Position of the polygon in the conversion output")]
    pub id: u32,
    #[schemars(description = "Class label of the annotation")]
    pub label: String,
    #[schemars(description = "Ontology term ids mapped from the label")]
    pub terms: Vec<u64>,
    #[schemars(description = "Area in square slide pixels")]
    pub area: f64,
    #[schemars(description = "Number of holes in the geometry")]
    pub hole_count: usize,
    #[schemars(description = "Whether the geometry passed the validity check")]
    pub valid: bool,
    #[schemars(description = "Whether the geometry came out of a repair")]
    pub repaired: bool,
}

/// Type alias for annotation GeoJSON
pub type AnnotationGeoJson = TypedGeoJson<AnnotationProperties>;

/// A typed GeoJSON Feature that is generic over its properties.
#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: geojson::Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}

impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Tries to access the typed properties of the feature.
    pub fn properties(&self) -> Option<P> {
        self.feature.properties.as_ref().and_then(|p| {
            serde_json::from_value(serde_json::Value::Object(p.clone())).ok()
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum TypedGeoJson<P> {
    Geometry(Geometry),
    Feature(TypedFeature<P>),
    FeatureCollection(TypedFeatureCollection<P>),
}

impl<P> TypedGeoJson<P> {
    pub fn as_feature_collection(&self) -> Option<&TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl<P> TypedFeatureCollection<P> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl AnnotationGeoJson {
    fn filtered(&self, keep: impl Fn(&AnnotationProperties) -> bool) -> Vec<&TypedFeature<AnnotationProperties>> {
        match self.as_feature_collection() {
            Some(fc) => fc
                .features
                .iter()
                .filter(|feature| feature.properties().map(|props| keep(&props)).unwrap_or(false))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Features carrying the given class label
    pub fn features_with_label(&self, label: &str) -> Vec<&TypedFeature<AnnotationProperties>> {
        self.filtered(|props| props.label == label)
    }

    /// Features that failed the validity check even after repair
    pub fn invalid_features(&self) -> Vec<&TypedFeature<AnnotationProperties>> {
        self.filtered(|props| !props.valid)
    }

    /// Number of shapes rejected during assembly, from foreign members
    pub fn rejected_count(&self) -> Option<usize> {
        self.as_feature_collection()?
            .foreign_members
            .as_ref()?
            .get("rejected_count")?
            .as_u64()
            .map(|v| v as usize)
    }
}
