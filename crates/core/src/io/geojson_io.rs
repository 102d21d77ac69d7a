//! GeoJSON vector layers
//!
//! The layer CRS is carried in the legacy `crs` member
//! (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32633"}}`)
//! that GDAL and most desktop tools still read and write.

use crate::crs::CRS;
use crate::error::Result;
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read a GeoJSON file (feature collection, single feature or bare geometry).
pub fn read_layer<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path.as_ref())?;
    let parsed: GeoJson = text.parse()?;
    let (features, crs) = match parsed {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(parse_crs_member);
            (fc.features, crs)
        }
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(g) => (vec![geojson::Feature::from(g)], None),
    };

    let features = features
        .into_iter()
        .map(convert_feature)
        .collect::<Result<Vec<_>>>()?;
    debug!("Read {} features from {}", features.len(), path.as_ref().display());
    Ok(FeatureCollection::with_crs(features, crs))
}

/// Write a layer as a GeoJSON feature collection, creating parent directories.
pub fn write_layer<P: AsRef<Path>>(layer: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let features = layer.iter().map(to_geojson_feature).collect();
    let foreign_members = layer.crs.as_ref().map(crs_member);
    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    fs::write(path, serde_json::to_string(&fc)?)?;
    debug!("Wrote {} features to {}", layer.len(), path.display());
    Ok(())
}

fn convert_feature(f: geojson::Feature) -> Result<Feature> {
    let geometry = f
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;
    let properties = f
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, from_json(v)))
        .collect();
    let id = f.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });
    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn to_geojson_feature(f: &Feature) -> geojson::Feature {
    let properties: JsonObject = f
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), to_json(v)))
        .collect();
    geojson::Feature {
        bbox: None,
        geometry: f
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: f.id.clone().map(Id::String),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n
                .as_f64()
                .map(AttributeValue::Float)
                .unwrap_or(AttributeValue::Null),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Float(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

fn parse_crs_member(members: &JsonObject) -> Option<CRS> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    Some(CRS::from_name(name))
}

fn crs_member(crs: &CRS) -> JsonObject {
    let name = match crs.epsg() {
        Some(code) => format!("urn:ogc:def:crs:EPSG::{code}"),
        None => crs.identifier(),
    };
    let mut members = JsonObject::new();
    members.insert(
        "crs".to_string(),
        serde_json::json!({ "type": "name", "properties": { "name": name } }),
    );
    members
}
