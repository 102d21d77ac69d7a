//! Run configuration
//!
//! Read from the project's YAML file. Keys are upper case, unknown keys are
//! ignored, and path options accept the string `default` to select the
//! conventional location inside the project directory.

use crate::stage::{Launcher, RetryPolicy};
use geofabric_algorithms::merge::{BatchSize, MergeParams};
use geofabric_core::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT: &str = "default";

/// Every option the engine recognizes
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GeofabricConfig {
    pub confluence_data_dir: Option<PathBuf>,
    pub domain_name: Option<String>,

    pub dem_path: String,
    pub dem_name: String,
    pub pour_point_shp_path: String,
    pub pour_point_shp_name: String,

    /// Source hydrofabric convention for subsetting (MERIT, TDX, NWS)
    pub geofabric_type: Option<String>,
    pub source_geofabric_basins_path: Option<PathBuf>,
    pub source_geofabric_rivers_path: Option<PathBuf>,
    pub output_basins_path: String,
    pub output_rivers_path: String,

    /// Directory holding the flow-routing executables; `PATH` when unset
    pub taudem_dir: Option<PathBuf>,
    pub mpi_processes: Option<usize>,
    /// `auto`, `none`, or the launcher program to use
    pub mpi_launcher: String,
    pub max_retries: u32,
    /// Seconds between attempts
    pub retry_delay: f64,
    pub cleanup_intermediate_files: bool,

    pub stream_threshold: Option<f64>,
    pub move_outlets_max_distance: f64,
    pub lumped_stream_threshold: f64,
    pub delineate_by_pourpoint: bool,

    /// Minimum basin size in km²
    pub min_gru_size: f64,
    /// Small polygons per merge batch; 0 merges all in one batch
    pub merge_batch_size: usize,
    pub simplify_tolerance: f64,
    pub polygonize_command: String,
}

impl Default for GeofabricConfig {
    fn default() -> Self {
        Self {
            confluence_data_dir: None,
            domain_name: None,
            dem_path: DEFAULT.into(),
            dem_name: DEFAULT.into(),
            pour_point_shp_path: DEFAULT.into(),
            pour_point_shp_name: DEFAULT.into(),
            geofabric_type: None,
            source_geofabric_basins_path: None,
            source_geofabric_rivers_path: None,
            output_basins_path: DEFAULT.into(),
            output_rivers_path: DEFAULT.into(),
            taudem_dir: None,
            mpi_processes: None,
            mpi_launcher: "auto".into(),
            max_retries: 3,
            retry_delay: 5.0,
            cleanup_intermediate_files: true,
            stream_threshold: None,
            move_outlets_max_distance: 200.0,
            lumped_stream_threshold: 100.0,
            delineate_by_pourpoint: true,
            min_gru_size: 5.0,
            merge_batch_size: 100,
            simplify_tolerance: 1.0,
            polygonize_command: "gdal_polygonize.py".into(),
        }
    }
}

fn missing(key: &str) -> Error {
    Error::InputValidation(format!("required configuration key {key} is not set"))
}

fn is_default(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(DEFAULT)
}

impl GeofabricConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InputValidation(format!("invalid configuration: {e}")))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::InputValidation(format!("cannot read configuration {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn domain(&self) -> Result<&str> {
        self.domain_name.as_deref().ok_or_else(|| missing("DOMAIN_NAME"))
    }

    /// `<CONFLUENCE_DATA_DIR>/domain_<DOMAIN_NAME>`
    pub fn project_dir(&self) -> Result<PathBuf> {
        let root = self.confluence_data_dir.as_ref().ok_or_else(|| missing("CONFLUENCE_DATA_DIR"))?;
        Ok(root.join(format!("domain_{}", self.domain()?)))
    }

    pub fn dem_file(&self) -> Result<PathBuf> {
        if !is_default(&self.dem_path) {
            return Ok(PathBuf::from(&self.dem_path));
        }
        let name = if is_default(&self.dem_name) {
            format!("domain_{}_elv.tif", self.domain()?)
        } else {
            self.dem_name.clone()
        };
        Ok(self.project_dir()?.join("attributes").join("elevation").join("dem").join(name))
    }

    pub fn pour_point_file(&self) -> Result<PathBuf> {
        let dir = if is_default(&self.pour_point_shp_path) {
            self.project_dir()?.join("shapefiles").join("pour_point")
        } else {
            PathBuf::from(&self.pour_point_shp_path)
        };
        if is_default(&self.pour_point_shp_name) {
            Ok(dir.join(format!("{}_pourPoint.geojson", self.domain()?)))
        } else if self.pour_point_shp_name.trim().is_empty() {
            Ok(dir)
        } else {
            Ok(dir.join(&self.pour_point_shp_name))
        }
    }

    /// Output basin layer; `tag` is `delineate`, `lumped` or `subset_<TYPE>`.
    pub fn output_basins_file(&self, tag: &str) -> Result<PathBuf> {
        if !is_default(&self.output_basins_path) {
            return Ok(PathBuf::from(&self.output_basins_path));
        }
        Ok(self
            .project_dir()?
            .join("shapefiles")
            .join("river_basins")
            .join(format!("{}_riverBasins_{tag}.geojson", self.domain()?)))
    }

    pub fn output_rivers_file(&self, tag: &str) -> Result<PathBuf> {
        if !is_default(&self.output_rivers_path) {
            return Ok(PathBuf::from(&self.output_rivers_path));
        }
        Ok(self
            .project_dir()?
            .join("shapefiles")
            .join("river_network")
            .join(format!("{}_riverNetwork_{tag}.geojson", self.domain()?)))
    }

    /// Scratch directory of the delineation steps. Cleanup removes its parent.
    pub fn interim_dir(&self) -> Result<PathBuf> {
        Ok(self.project_dir()?.join("taudem-interim-files").join("d8"))
    }

    pub fn lumped_interim_dir(&self) -> Result<PathBuf> {
        Ok(self.project_dir()?.join("shapefiles").join("tempdir"))
    }

    pub fn source_basins(&self) -> Result<&Path> {
        self.source_geofabric_basins_path
            .as_deref()
            .ok_or_else(|| missing("SOURCE_GEOFABRIC_BASINS_PATH"))
    }

    pub fn source_rivers(&self) -> Result<&Path> {
        self.source_geofabric_rivers_path
            .as_deref()
            .ok_or_else(|| missing("SOURCE_GEOFABRIC_RIVERS_PATH"))
    }

    pub fn fabric_type(&self) -> Result<&str> {
        self.geofabric_type.as_deref().ok_or_else(|| missing("GEOFABRIC_TYPE"))
    }

    pub fn threshold(&self) -> Result<f64> {
        match self.stream_threshold {
            Some(t) if t > 0.0 => Ok(t),
            Some(t) => Err(Error::InputValidation(format!("STREAM_THRESHOLD must be positive, got {t}"))),
            None => Err(missing("STREAM_THRESHOLD")),
        }
    }

    /// Worker processes per external step, defaulting to the host core count.
    pub fn workers(&self) -> usize {
        self.mpi_processes.filter(|&n| n > 0).unwrap_or_else(num_cpus::get)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            delay: Duration::from_secs_f64(self.retry_delay.max(0.0)),
        }
    }

    pub fn launcher(&self) -> Launcher {
        Launcher::parse(&self.mpi_launcher)
    }

    pub fn merge_params(&self) -> MergeParams {
        MergeParams {
            min_area_km2: self.min_gru_size,
            batch_size: match self.merge_batch_size {
                0 => BatchSize::Unbounded,
                n => BatchSize::Bounded(n),
            },
            simplify_tolerance: self.simplify_tolerance,
        }
    }
}
