//! Lumped delineation: the whole area draining to the pour point as one basin

use crate::config::GeofabricConfig;
use crate::convert::Converter;
use crate::delineate::{require_file, runner_for};
use crate::output::{cleanup, fix_winding};
use crate::stage::StageRunner;
use crate::taudem::{lumped_stages, LUMPED_WATERSHED};
use crate::upstream::set_metric_area;
use geofabric_algorithms::vector::{from_multipolygon, guarded, to_multipolygon};
use geofabric_core::io::write_layer;
use geofabric_core::{Error, Feature, FeatureCollection, Result, CRS};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub struct LumpedDelineator<'a> {
    config: &'a GeofabricConfig,
    runner: StageRunner,
    converter: Converter,
}

impl<'a> LumpedDelineator<'a> {
    pub fn new(config: &'a GeofabricConfig) -> Self {
        Self {
            config,
            runner: runner_for(config),
            converter: Converter::new(&config.polygonize_command),
        }
    }

    pub fn with_runner(mut self, runner: StageRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Run the lumped steps and write `<domain>_riverBasins_lumped.geojson`.
    pub fn delineate(&self) -> Result<PathBuf> {
        let domain = self.config.domain()?;
        info!("Starting lumped watershed delineation for {}", domain);
        let dem = self.config.dem_file()?;
        require_file(&dem, "DEM file")?;
        let pour_point = self.config.pour_point_file()?;
        require_file(&pour_point, "Pour point file")?;

        let interim = self.config.lumped_interim_dir()?;
        fs::create_dir_all(&interim)?;
        let result = self.run(&dem, &pour_point, &interim);
        cleanup(&interim, self.config.cleanup_intermediate_files);

        match &result {
            Ok(path) => info!("Lumped watershed delineation completed: {}", path.display()),
            Err(e) => error!("Error in lumped watershed delineation: {}", e),
        }
        result
    }

    fn run(&self, dem: &Path, pour_point: &Path, interim: &Path) -> Result<PathBuf> {
        let stages = lumped_stages(dem, pour_point, interim, self.config.lumped_stream_threshold);
        self.runner.run_all(&stages)?;
        let layer = self
            .converter
            .convert(&interim.join(LUMPED_WATERSHED), &interim.join("watershed.geojson"))?;
        let mut basin = lumped_basin(layer)?;
        fix_winding(&mut basin);
        let output = self.config.output_basins_file("lumped")?;
        write_layer(&basin, &output)?;
        Ok(output)
    }
}

/// Dissolve the features labeled 1 into a single basin with `GRU_ID = 1`.
pub fn lumped_basin(layer: FeatureCollection) -> Result<FeatureCollection> {
    let crs = layer.crs.clone().or_else(|| {
        warn!("Watershed grid has no CRS. Setting to EPSG:4326.");
        Some(CRS::wgs84())
    });
    let parts: Vec<_> = layer
        .iter()
        .filter(|f| f.get_i64("DN") == Some(1))
        .filter_map(|f| f.geometry.as_ref().and_then(to_multipolygon))
        .flat_map(|mp| mp.0)
        .collect();
    if parts.is_empty() {
        return Err(Error::Topology("no polygon with ID = 1 found in the watershed layer".into()));
    }
    let dissolved = guarded("dissolve lumped watershed", || geo::unary_union(parts.iter()))
        .ok_or_else(|| Error::Geometry("failed to dissolve the lumped watershed".into()))?;

    let feature = Feature::new(from_multipolygon(dissolved))
        .with_property("GRU_ID", 1i64)
        .with_property("gru_to_seg", 1i64);
    let mut basin = FeatureCollection::with_crs(vec![feature], crs);
    set_metric_area(&mut basin, "GRU_area")?;
    Ok(basin)
}
