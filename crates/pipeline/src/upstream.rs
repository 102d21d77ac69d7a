//! Layer loading, CRS alignment and upstream selection shared by the
//! delineation and subsetting pipelines

use geofabric_algorithms::hydrofabric::{locate_outlet, pour_point, DrainageGraph, HydrofabricSchema};
use geofabric_algorithms::vector::{area, metric_crs, reproject_geometry, reproject_layer};
use geofabric_core::io::read_layer;
use geofabric_core::{Error, FeatureCollection, Result, CRS};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// Read a vector layer, assuming EPSG:4326 when it declares no CRS.
pub fn load_layer(path: &Path) -> Result<FeatureCollection> {
    if !path.exists() {
        return Err(Error::InputValidation(format!("file not found: {}", path.display())));
    }
    let mut layer = read_layer(path)?;
    if layer.crs.is_none() {
        warn!("CRS is not defined for {}. Setting to EPSG:4326.", path.display());
        layer.crs = Some(CRS::wgs84());
    }
    Ok(layer)
}

/// Bring all three layers into one CRS: the basins', else the rivers', else
/// the pour point's, else EPSG:4326.
pub fn align_crs(
    basins: &FeatureCollection,
    rivers: &FeatureCollection,
    pour: &FeatureCollection,
) -> Result<(FeatureCollection, FeatureCollection, FeatureCollection)> {
    let target = basins
        .crs
        .clone()
        .or_else(|| rivers.crs.clone())
        .or_else(|| pour.crs.clone())
        .unwrap_or_else(CRS::wgs84);
    info!("Ensuring CRS consistency. Target CRS: {}", target);
    Ok((
        reproject_layer(basins, &target)?,
        reproject_layer(rivers, &target)?,
        reproject_layer(pour, &target)?,
    ))
}

/// Outcome of an upstream selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub basins: FeatureCollection,
    pub rivers: FeatureCollection,
    pub outlet: i64,
    pub members: BTreeSet<i64>,
}

/// Keep the basins and rivers that drain to the basin holding the pour point.
///
/// Basins are matched on `basin_key`, rivers on `river_key`; the graph is
/// built from the rivers under `schema`. An outlet missing from the graph
/// gives empty layers, with a warning.
pub fn select_upstream(
    basins: &FeatureCollection,
    rivers: &FeatureCollection,
    pour: &FeatureCollection,
    schema: &HydrofabricSchema,
    basin_key: &str,
    river_key: &str,
) -> Result<Selection> {
    let (basins, rivers, pour) = align_crs(basins, rivers, pour)?;
    let point = pour_point(&pour)?;
    let outlet = locate_outlet(&basins, &point, basin_key)?;

    let graph = DrainageGraph::from_rivers(&rivers, schema)?;
    let closure = graph.upstream_closure(outlet);
    info!("Found {} basins upstream of (and including) {}", closure.len(), outlet);

    let keep = |layer: FeatureCollection, key: &str| {
        let mut layer = layer;
        layer.retain(|f| f.get_i64(key).is_some_and(|id| closure.contains(id)));
        layer
    };
    let basins = keep(basins, basin_key);
    let rivers = keep(rivers, river_key);
    Ok(Selection {
        basins,
        rivers,
        outlet,
        members: closure.members,
    })
}

/// Set `field` to each feature's planar area in m², measured in the local
/// UTM zone when the layer is geographic.
pub fn set_metric_area(layer: &mut FeatureCollection, field: &str) -> Result<()> {
    let crs = layer.crs.clone().unwrap_or_else(CRS::wgs84);
    let metric = metric_crs(layer, &crs);
    for feature in layer.iter_mut() {
        let value = match &feature.geometry {
            Some(geom) => area(&reproject_geometry(geom, &crs, &metric)?),
            None => 0.0,
        };
        feature.set_property(field, value);
    }
    Ok(())
}

/// Set `field` to each feature's line length in metres.
pub fn set_metric_length(layer: &mut FeatureCollection, field: &str) -> Result<()> {
    let crs = layer.crs.clone().unwrap_or_else(CRS::wgs84);
    let metric = metric_crs(layer, &crs);
    for feature in layer.iter_mut() {
        let value = match &feature.geometry {
            Some(geom) => geofabric_algorithms::vector::length(&reproject_geometry(geom, &crs, &metric)?),
            None => 0.0,
        };
        feature.set_property(field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, line_string, point, Geometry, Rect};
    use geofabric_algorithms::hydrofabric::TDX;
    use geofabric_core::Feature;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon().into()
    }

    fn utm(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::with_crs(features, Some(CRS::from_epsg(32633)))
    }

    #[test]
    fn selection_filters_both_layers() {
        let basins = utm(vec![
            Feature::new(rect(0.0, 0.0, 10.0, 10.0)).with_property("streamID", 1i64),
            Feature::new(rect(0.0, 10.0, 10.0, 20.0)).with_property("streamID", 2i64),
            Feature::new(rect(10.0, 0.0, 20.0, 10.0)).with_property("streamID", 3i64),
        ]);
        let river = |id: i64, up1: i64, up2: i64| {
            Feature::default()
                .with_property("LINKNO", id)
                .with_property("USLINKNO1", up1)
                .with_property("USLINKNO2", up2)
        };
        // 3 drains elsewhere: 1 <- 2 only
        let rivers = utm(vec![river(1, 2, -9999), river(2, -9999, -9999), river(3, -9999, -9999)]);
        let pour = utm(vec![Feature::new(point!(x: 5.0, y: 5.0).into())]);

        let selection = select_upstream(&basins, &rivers, &pour, &TDX, "streamID", "LINKNO").unwrap();
        assert_eq!(selection.outlet, 1);
        assert_eq!(selection.members, BTreeSet::from([1, 2]));
        assert_eq!(selection.basins.len(), 2);
        assert_eq!(selection.rivers.len(), 2);
    }

    #[test]
    fn pour_point_outside_every_basin_is_topology_error() {
        let basins = utm(vec![Feature::new(rect(0.0, 0.0, 10.0, 10.0)).with_property("streamID", 1i64)]);
        let pour = utm(vec![Feature::new(point!(x: 50.0, y: 50.0).into())]);
        let err = select_upstream(&basins, &FeatureCollection::new(), &pour, &TDX, "streamID", "LINKNO").unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn areas_and_lengths_in_metres() {
        let mut basins = utm(vec![Feature::new(rect(0.0, 0.0, 1000.0, 2000.0))]);
        set_metric_area(&mut basins, "GRU_area").unwrap();
        assert_relative_eq!(basins.features[0].get_f64("GRU_area").unwrap(), 2_000_000.0);

        let mut rivers = utm(vec![Feature::new(line_string![(x: 0.0, y: 0.0), (x: 300.0, y: 400.0)].into())]);
        set_metric_length(&mut rivers, "Length").unwrap();
        assert_relative_eq!(rivers.features[0].get_f64("Length").unwrap(), 500.0);
    }

    #[test]
    fn missing_file_is_input_error() {
        assert!(matches!(
            load_layer(Path::new("/nonexistent/pour.geojson")),
            Err(Error::InputValidation(_))
        ));
    }
}
