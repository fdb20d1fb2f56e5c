use geojson::{Feature, FeatureCollection, Geometry, Value};

use crate::{
    config::ConversionConfig,
    error::Result,
    typed_geojson::{AnnotationGeoJson, AnnotationProperties, TypedFeature, TypedFeatureCollection},
    types::{ConversionOutput, LabeledPolygon},
};

fn properties_of(id: usize, polygon: &LabeledPolygon, config: &ConversionConfig) -> AnnotationProperties {
    AnnotationProperties {
        id: id as u32,
        label: polygon.label.clone(),
        terms: config.terms_for(&polygon.label).map(<[u64]>::to_vec).unwrap_or_default(),
        area: polygon.area(),
        hole_count: polygon.hole_count(),
        valid: polygon.valid,
        repaired: polygon.repaired,
    }
}

impl ConversionOutput {
    fn collection_members(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut foreign_members = serde_json::Map::new();
        foreign_members.insert("polygon_count".to_string(), serde_json::Value::from(self.polygons.len()));
        foreign_members.insert("rejected_count".to_string(), serde_json::Value::from(self.diagnostics.len()));
        foreign_members
    }

    /// Export to typed GeoJSON, one feature per polygon in emission order
    pub fn to_typed_geojson(&self, config: &ConversionConfig) -> AnnotationGeoJson {
        let features = self
            .polygons
            .iter()
            .enumerate()
            .map(|(i, polygon)| {
                TypedFeature::new(
                    Some(Geometry::new(Value::from(&polygon.geometry))),
                    properties_of(i, polygon, config),
                )
            })
            .collect();

        AnnotationGeoJson::FeatureCollection(TypedFeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.collection_members()),
        })
    }

    pub fn to_geojson(&self, config: &ConversionConfig) -> Result<FeatureCollection> {
        let mut features = Vec::with_capacity(self.polygons.len());

        for (i, polygon) in self.polygons.iter().enumerate() {
            let properties = match serde_json::to_value(properties_of(i, polygon, config))? {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            };

            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&polygon.geometry))),
                id: Some(geojson::feature::Id::Number(serde_json::Number::from(i))),
                properties,
                foreign_members: None,
            });
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(self.collection_members()),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self, config: &ConversionConfig) -> Result<String> {
        let geojson = self.to_geojson(config)?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    pub fn save_geojson(&self, path: &str, config: &ConversionConfig) -> Result<()> {
        std::fs::write(path, self.to_geojson_string(config)?)?;
        Ok(())
    }
}
