//! Pour point to basin lookup

use crate::vector::spatial::bounding_box;
use geo::{Contains, Geometry, Point};
use geofabric_core::{Error, FeatureCollection, Result};
use tracing::info;

/// First point of a pour point layer.
pub fn pour_point(layer: &FeatureCollection) -> Result<Point<f64>> {
    layer
        .iter()
        .find_map(|f| match f.geometry.as_ref()? {
            Geometry::Point(p) => Some(*p),
            Geometry::MultiPoint(mp) => mp.0.first().copied(),
            _ => None,
        })
        .ok_or_else(|| Error::InputValidation("pour point layer holds no point geometry".into()))
}

/// Identifier of the first basin whose interior contains `point`.
///
/// Both must share a CRS. A point on a shared boundary belongs to neither
/// neighbor, matching a strict "within" join.
pub fn locate_outlet(basins: &FeatureCollection, point: &Point<f64>, id_field: &str) -> Result<i64> {
    let (x, y) = (point.x(), point.y());
    for (index, feature) in basins.iter().enumerate() {
        let Some(geom) = feature.geometry.as_ref() else {
            continue;
        };
        let inside_box = bounding_box(geom).is_some_and(|b| b.contains_point(x, y));
        if !inside_box || !geom.contains(point) {
            continue;
        }
        let id = feature
            .get_i64(id_field)
            .ok_or_else(|| Error::MissingAttribute {
                field: id_field.to_string(),
                feature: index,
            })?;
        info!("Pour point ({:.4}, {:.4}) lies in basin {}", x, y, id);
        return Ok(id);
    }
    Err(Error::Topology(format!(
        "no basin contains the pour point ({}, {})",
        x, y
    )))
}
