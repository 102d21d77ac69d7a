//! Subsetting an existing hydrofabric to the network upstream of a pour point

use crate::config::GeofabricConfig;
use crate::delineate::GeofabricOutputs;
use crate::output::save_geofabric;
use crate::upstream::{load_layer, select_upstream, set_metric_area, set_metric_length};
use geofabric_algorithms::hydrofabric::{require, HydrofabricSchema};
use geofabric_core::{FeatureCollection, Result};
use tracing::info;

/// Subset basins and rivers together
#[derive(Debug, Clone)]
pub struct Subset {
    pub basins: FeatureCollection,
    pub rivers: FeatureCollection,
}

pub struct GeofabricSubsetter<'a> {
    config: &'a GeofabricConfig,
}

impl<'a> GeofabricSubsetter<'a> {
    pub fn new(config: &'a GeofabricConfig) -> Self {
        Self { config }
    }

    /// Load the source layers named in the configuration, subset and save.
    pub fn subset(&self) -> Result<GeofabricOutputs> {
        let fabric = self.config.fabric_type()?;
        let schema = require(fabric)?;
        let basins = load_layer(self.config.source_basins()?)?;
        let rivers = load_layer(self.config.source_rivers()?)?;
        let pour = load_layer(&self.config.pour_point_file()?)?;
        info!("Subsetting {} geofabric for {}", schema.name, self.config.domain()?);

        let Subset { mut basins, rivers } = subset_layers(&basins, &rivers, &pour, schema)?;

        let tag = format!("subset_{fabric}");
        let basins_path = self.config.output_basins_file(&tag)?;
        let rivers_path = self.config.output_rivers_file(&tag)?;
        save_geofabric(&mut basins, &rivers, &basins_path, &rivers_path)?;
        Ok(GeofabricOutputs {
            basins_path,
            rivers_path,
            basin_count: basins.len(),
            river_count: rivers.len(),
            merge: None,
        })
    }
}

/// Select the network draining to the pour point and add the derived fields
/// of `schema`.
pub fn subset_layers(
    basins: &FeatureCollection,
    rivers: &FeatureCollection,
    pour: &FeatureCollection,
    schema: &HydrofabricSchema,
) -> Result<Subset> {
    let selection = select_upstream(basins, rivers, pour, schema, schema.basin_id_field, schema.river_id_field)?;
    let mut subset = Subset {
        basins: selection.basins,
        rivers: selection.rivers,
    };
    derive_fields(&mut subset, schema)?;
    Ok(subset)
}

fn copy_field(layer: &mut FeatureCollection, from: &str, to: &str) {
    for feature in layer.iter_mut() {
        if let Some(value) = feature.get_property(from).cloned() {
            feature.set_property(to, value);
        }
    }
}

fn derive_fields(subset: &mut Subset, schema: &HydrofabricSchema) -> Result<()> {
    let basins = &mut subset.basins;
    let rivers = &mut subset.rivers;
    match schema.name {
        "NWS" => {
            copy_field(basins, "COMID", "GRU_ID");
            copy_field(basins, "COMID", "gru_to_seg");
            copy_field(rivers, "COMID", "LINKNO");
            copy_field(rivers, "toCOMID", "DSLINKNO");
        }
        "TDX" => {
            // `fid` is often implicit in the source format; fall back to streamID
            copy_field(basins, "streamID", "GRU_ID");
            copy_field(basins, "fid", "GRU_ID");
            copy_field(basins, "streamID", "gru_to_seg");
        }
        "MERIT" => {
            copy_field(basins, "COMID", "GRU_ID");
            copy_field(basins, "COMID", "gru_to_seg");
            copy_field(rivers, "COMID", "LINKNO");
            copy_field(rivers, "NextDownID", "DSLINKNO");
            set_metric_length(rivers, "Length")?;
            for river in rivers.iter_mut() {
                if let Some(slope) = river.remove_property("slope") {
                    river.set_property("Slope", slope);
                }
            }
        }
        _ => {
            copy_field(basins, schema.basin_id_field, "GRU_ID");
            copy_field(basins, schema.basin_id_field, "gru_to_seg");
        }
    }
    set_metric_area(basins, "GRU_area")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, line_string, point, Geometry, Rect};
    use geofabric_algorithms::hydrofabric::{MERIT, NWS, TDX};
    use geofabric_core::{Feature, CRS};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon().into()
    }

    fn utm(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::with_crs(features, Some(CRS::from_epsg(32633)))
    }

    fn pour() -> FeatureCollection {
        utm(vec![Feature::new(point!(x: 500.0, y: 500.0).into())])
    }

    fn basins(field: &str) -> FeatureCollection {
        utm(vec![
            Feature::new(rect(0.0, 0.0, 1000.0, 1000.0)).with_property(field, 11i64),
            Feature::new(rect(0.0, 1000.0, 1000.0, 2000.0)).with_property(field, 12i64),
        ])
    }

    #[test]
    fn nws_fields() {
        let rivers = utm(vec![
            Feature::new(line_string![(x: 500.0, y: 900.0), (x: 500.0, y: 100.0)].into())
                .with_property("COMID", 11i64)
                .with_property("toCOMID", 0i64),
            Feature::new(line_string![(x: 500.0, y: 1900.0), (x: 500.0, y: 1000.0)].into())
                .with_property("COMID", 12i64)
                .with_property("toCOMID", 11i64),
        ]);
        let subset = subset_layers(&basins("COMID"), &rivers, &pour(), &NWS).unwrap();
        assert_eq!(subset.basins.len(), 2);
        let upstream = &subset.rivers.features[1];
        assert_eq!(upstream.get_i64("LINKNO"), Some(12));
        assert_eq!(upstream.get_i64("DSLINKNO"), Some(11));
        let basin = &subset.basins.features[0];
        assert_eq!(basin.get_i64("GRU_ID"), Some(11));
        assert_eq!(basin.get_i64("gru_to_seg"), Some(11));
        assert_relative_eq!(basin.get_f64("GRU_area").unwrap(), 1_000_000.0);
    }

    #[test]
    fn tdx_uses_fid_when_present() {
        let mut layer = basins("streamID");
        layer.features[0].set_property("fid", 1i64);
        let rivers = utm(vec![
            Feature::default()
                .with_property("LINKNO", 11i64)
                .with_property("USLINKNO1", 12i64)
                .with_property("USLINKNO2", -9999i64),
            Feature::default()
                .with_property("LINKNO", 12i64)
                .with_property("USLINKNO1", -9999i64)
                .with_property("USLINKNO2", -9999i64),
        ]);
        let subset = subset_layers(&layer, &rivers, &pour(), &TDX).unwrap();
        assert_eq!(subset.basins.features[0].get_i64("GRU_ID"), Some(1));
        assert_eq!(subset.basins.features[0].get_i64("gru_to_seg"), Some(11));
        assert_eq!(subset.basins.features[1].get_i64("GRU_ID"), Some(12));
    }

    #[test]
    fn merit_fields() {
        let river = |id: i64, up: i64, down: i64| {
            Feature::new(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 250.0)].into())
                .with_property("COMID", id)
                .with_property("NextDownID", down)
                .with_property("up1", up)
                .with_property("up2", -9999i64)
                .with_property("up3", -9999i64)
                .with_property("slope", 0.01)
        };
        let rivers = utm(vec![river(11, 12, 0), river(12, -9999, 11)]);
        let subset = subset_layers(&basins("COMID"), &rivers, &pour(), &MERIT).unwrap();
        let r = &subset.rivers.features[0];
        assert_eq!(r.get_i64("LINKNO"), Some(11));
        assert_eq!(r.get_i64("DSLINKNO"), Some(0));
        assert_relative_eq!(r.get_f64("Length").unwrap(), 250.0);
        assert_eq!(r.get_f64("Slope"), Some(0.01));
        assert!(r.get_property("slope").is_none());
    }
}
