//! Watershed grid to polygon layer, with a command-line fallback

use geofabric_algorithms::polygonize::{polygonize, PolygonizeParams};
use geofabric_core::io::{read_geotiff, read_layer, write_layer};
use geofabric_core::{Error, FeatureCollection, Raster, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Converts labeled grids to one polygon feature per label.
#[derive(Debug, Clone)]
pub struct Converter {
    /// Fallback program, invoked as `<command> -f GeoJSON <raster> <out> <layer> <field>`
    pub command: String,
    pub field: String,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            command: "gdal_polygonize.py".into(),
            field: "DN".into(),
        }
    }
}

impl Converter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Polygonize `raster` into `output` and return the layer.
    ///
    /// Fails with [`Error::PolygonizationFailure`] only when both the
    /// in-process and the command-line path fail.
    pub fn convert(&self, raster: &Path, output: &Path) -> Result<FeatureCollection> {
        let primary = self.in_process(raster).and_then(|layer| {
            write_layer(&layer, output)?;
            Ok(layer)
        });
        match primary {
            Ok(layer) => {
                info!("Polygonized {} into {} features", raster.display(), layer.len());
                Ok(layer)
            }
            Err(first) => {
                warn!("In-process polygonization failed: {}, trying command line method...", first);
                self.command_line(raster, output).map_err(|second| Error::PolygonizationFailure {
                    path: raster.to_path_buf(),
                    reason: format!("in-process: {first}; command line: {second}"),
                })
            }
        }
    }

    fn in_process(&self, raster: &Path) -> Result<FeatureCollection> {
        let grid: Raster<f64> = read_geotiff(raster)?;
        polygonize(
            &grid,
            &PolygonizeParams {
                field: self.field.clone(),
            },
        )
    }

    fn command_line(&self, raster: &Path, output: &Path) -> Result<FeatureCollection> {
        if output.exists() {
            fs::remove_file(output)?;
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let status = Command::new(&self.command)
            .args(["-f", "GeoJSON"])
            .arg(raster)
            .arg(output)
            .arg("watersheds")
            .arg(&self.field)
            .output()?;
        if !status.status.success() {
            return Err(Error::Other(format!(
                "{} exited with {}: {}",
                self.command,
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }
        let mut layer = read_layer(output)?;
        // background regions come back with label 0 or the nodata value
        layer.retain(|f| f.get_i64(&self.field).is_some_and(|v| v > 0));
        info!("Completed polygonization using command line method");
        Ok(layer)
    }
}
