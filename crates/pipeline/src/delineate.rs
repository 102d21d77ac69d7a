//! Full delineation: DEM and pour point to basin and river layers

use crate::config::GeofabricConfig;
use crate::convert::Converter;
use crate::output::{cleanup, save_geofabric};
use crate::stage::StageRunner;
use crate::taudem::{DelineationSteps, BASINS, STREAMS, WATERSHEDS};
use crate::upstream::{load_layer, select_upstream, set_metric_area};
use geofabric_algorithms::hydrofabric::TAUDEM;
use geofabric_algorithms::merge::{merge_small_polygons, MergeReport};
use geofabric_core::{Error, FeatureCollection, Result, CRS};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where a pipeline wrote its layers
#[derive(Debug, Clone)]
pub struct GeofabricOutputs {
    pub basins_path: PathBuf,
    pub rivers_path: PathBuf,
    pub basin_count: usize,
    pub river_count: usize,
    pub merge: Option<MergeReport>,
}

/// Runs the flow-routing steps and turns their outputs into a geofabric.
pub struct GeofabricDelineator<'a> {
    config: &'a GeofabricConfig,
    runner: StageRunner,
    converter: Converter,
}

impl<'a> GeofabricDelineator<'a> {
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

    /// Validate inputs, run every step, build and save the geofabric.
    ///
    /// Interim files are removed afterwards, on failure too, unless
    /// `CLEANUP_INTERMEDIATE_FILES` is false.
    pub fn delineate(&self) -> Result<GeofabricOutputs> {
        let domain = self.config.domain()?;
        info!("Starting geofabric delineation for {}", domain);
        let steps = self.validate_inputs()?;
        fs::create_dir_all(&steps.interim)?;
        info!("Created interim directory: {}", steps.interim.display());

        let result = self.run(&steps);
        let interim_root = steps.interim.parent().unwrap_or(&steps.interim);
        cleanup(interim_root, self.config.cleanup_intermediate_files);

        match result {
            Ok(outputs) => {
                info!("Geofabric delineation completed for {}", domain);
                Ok(outputs)
            }
            Err(e) => {
                error!("Error in geofabric delineation: {}", e);
                Err(e)
            }
        }
    }

    /// Input checks that must pass before any external process starts.
    pub fn validate_inputs(&self) -> Result<DelineationSteps> {
        let dem = self.config.dem_file()?;
        require_file(&dem, "DEM file")?;
        let pour_point = self.config.pour_point_file()?;
        require_file(&pour_point, "Pour point file")?;
        Ok(DelineationSteps {
            dem,
            pour_point,
            interim: self.config.interim_dir()?,
            threshold: self.config.threshold()?,
            max_distance: self.config.move_outlets_max_distance,
        })
    }

    fn run(&self, steps: &DelineationSteps) -> Result<GeofabricOutputs> {
        self.runner.run_all(&steps.stages())?;

        let mut basins = self.converter.convert(&steps.file(WATERSHEDS), &steps.file(BASINS))?;
        if basins.crs.is_none() {
            warn!("Watershed grid has no CRS. Setting to EPSG:4326.");
            basins.crs = Some(CRS::wgs84());
        }
        let rivers = load_layer(&steps.file(STREAMS))?;
        let pour = load_layer(&steps.pour_point)?;
        self.build(basins, rivers, &pour)
    }

    /// Derive identifiers and areas, select the upstream network, merge
    /// small basins and save.
    pub fn build(
        &self,
        basins: FeatureCollection,
        rivers: FeatureCollection,
        pour: &FeatureCollection,
    ) -> Result<GeofabricOutputs> {
        let (mut basins, rivers) = derive_fields(basins, rivers)?;
        set_metric_area(&mut basins, "GRU_area")?;

        let (basins, mut rivers) = if self.config.delineate_by_pourpoint {
            let selection = select_upstream(&basins, &rivers, pour, &TAUDEM, "GRU_ID", "GRU_ID")?;
            (selection.basins, selection.rivers)
        } else {
            (basins, rivers)
        };

        let merged = merge_small_polygons(&basins, &self.config.merge_params())?;
        let mut basins = merged.layer;

        let basins_path = self.config.output_basins_file("delineate")?;
        let rivers_path = self.config.output_rivers_file("delineate")?;
        reproject_rivers_like(&mut rivers, &basins)?;
        save_geofabric(&mut basins, &rivers, &basins_path, &rivers_path)?;

        Ok(GeofabricOutputs {
            basins_path,
            rivers_path,
            basin_count: basins.len(),
            river_count: rivers.len(),
            merge: Some(merged.report),
        })
    }
}

/// Runner configured from `MAX_RETRIES`, `RETRY_DELAY`, `MPI_*` and `TAUDEM_DIR`.
pub(crate) fn runner_for(config: &GeofabricConfig) -> StageRunner {
    StageRunner::new(config.retry_policy(), config.launcher(), config.workers())
        .with_tool_dir(config.taudem_dir.as_deref())
}

/// Basins: `GRU_ID = DN` (dropping `DN`), `gru_to_seg = GRU_ID`.
/// Rivers: `GRU_ID = LINKNO`.
fn derive_fields(
    mut basins: FeatureCollection,
    mut rivers: FeatureCollection,
) -> Result<(FeatureCollection, FeatureCollection)> {
    for (index, basin) in basins.iter_mut().enumerate() {
        let id = basin
            .remove_property("DN")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::MissingAttribute {
                field: "DN".into(),
                feature: index,
            })?;
        basin.set_property("GRU_ID", id);
        basin.set_property("gru_to_seg", id);
    }
    for (index, river) in rivers.iter_mut().enumerate() {
        let id = TAUDEM.river_id(river, index)?;
        river.set_property("GRU_ID", id);
    }
    Ok((basins, rivers))
}

/// Rivers are written in the CRS of the basins.
fn reproject_rivers_like(rivers: &mut FeatureCollection, basins: &FeatureCollection) -> Result<()> {
    if let Some(target) = &basins.crs {
        *rivers = geofabric_algorithms::vector::reproject_layer(rivers, target)?;
    }
    Ok(())
}

pub(crate) fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::InputValidation(format!("{what} not found: {}", path.display())))
    }
}
