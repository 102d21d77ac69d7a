//! End-to-end scenarios over the topology, outlet and merge algorithms.

use approx::assert_relative_eq;
use geo::{coord, point, Geometry, Rect};
use geofabric_algorithms::hydrofabric::{locate_outlet, DrainageGraph, HydrofabricSchema, MERIT, NWS, TDX};
use geofabric_algorithms::merge::{merge_small_polygons, total_area, MergeParams};
use geofabric_algorithms::polygonize::{polygonize, PolygonizeParams};
use geofabric_core::{Feature, FeatureCollection, GeoTransform, Raster, CRS};
use std::collections::BTreeSet;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
    Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon().into()
}

/// Basins X (id 1), Y (id 2) and Z (id 3); Y and Z drain into X.
fn confluence_basins(id_field: &str) -> FeatureCollection {
    FeatureCollection::with_crs(
        vec![
            Feature::new(rect(0.0, 0.0, 1000.0, 1000.0)).with_property(id_field, 1i64),
            Feature::new(rect(0.0, 1000.0, 1000.0, 2000.0)).with_property(id_field, 2i64),
            Feature::new(rect(1000.0, 0.0, 2000.0, 1000.0)).with_property(id_field, 3i64),
        ],
        Some(CRS::from_epsg(32633)),
    )
}

fn confluence_rivers(schema: &HydrofabricSchema) -> FeatureCollection {
    let segment = |id: i64| Feature::default().with_property(schema.river_id_field, id);
    let features = if schema.name == "NWS" {
        vec![
            segment(1).with_property("toCOMID", 0i64),
            segment(2).with_property("toCOMID", 1i64),
            segment(3).with_property("toCOMID", 1i64),
        ]
    } else {
        let none = schema.no_link;
        let mut outlet = segment(1);
        outlet.set_property(schema.link_fields[0], 2i64);
        outlet.set_property(schema.link_fields[1], 3i64);
        let mut out = vec![outlet, segment(2), segment(3)];
        for feature in &mut out {
            for field in schema.link_fields {
                if feature.get_property(field).is_none() {
                    feature.set_property(*field, none);
                }
            }
        }
        out
    };
    FeatureCollection::with_crs(features, Some(CRS::from_epsg(32633)))
}

#[test]
fn pour_point_in_confluence_outlet_selects_all_three() {
    for schema in [&MERIT, &TDX, &NWS] {
        let basins = confluence_basins(schema.basin_id_field);
        let rivers = confluence_rivers(schema);

        let outlet = locate_outlet(&basins, &point!(x: 500.0, y: 500.0), schema.basin_id_field).unwrap();
        assert_eq!(outlet, 1, "{}", schema.name);

        let graph = DrainageGraph::from_rivers(&rivers, schema).unwrap();
        let closure = graph.upstream_closure(outlet);
        assert!(closure.outlet_in_graph);
        assert_eq!(closure.members, BTreeSet::from([1, 2, 3]), "{}", schema.name);

        let headwater = graph.upstream_closure(2);
        assert_eq!(headwater.members, BTreeSet::from([2]), "{}", schema.name);
    }
}

#[test]
fn polygonized_grid_feeds_outlet_lookup() {
    #[rustfmt::skip]
    let data = vec![
        2, 2, 3, 3,
        2, 2, 3, 3,
        1, 1, 1, 1,
        1, 1, 1, 1,
    ];
    let mut grid = Raster::from_vec(data, 4, 4).unwrap();
    grid.set_transform(GeoTransform::new(0.0, 400.0, 100.0, -100.0));
    grid.set_crs(Some(CRS::from_epsg(32633)));

    let basins = polygonize(&grid, &PolygonizeParams::default()).unwrap();
    assert_eq!(basins.len(), 3);
    assert_eq!(locate_outlet(&basins, &point!(x: 150.0, y: 50.0), "DN").unwrap(), 1);
    assert_eq!(locate_outlet(&basins, &point!(x: 350.0, y: 350.0), "DN").unwrap(), 3);
    assert_relative_eq!(total_area(&basins), 160_000.0, epsilon = 1e-6);
}

#[test]
fn merged_confluence_keeps_area_and_meets_threshold() {
    // each basin is 1 km²; a 2.5 km² threshold leaves one polygon
    let basins = confluence_basins("GRU_ID");
    let params = MergeParams {
        min_area_km2: 2.5,
        ..MergeParams::default()
    };
    let result = merge_small_polygons(&basins, &params).unwrap();
    assert_relative_eq!(total_area(&result.layer), total_area(&basins), max_relative = 1e-6);
    assert_eq!(result.layer.len(), 1);
    assert_eq!(result.report.initial_count, 3);
    assert_eq!(result.report.merged_count, 2);
}
