//! Persisting result layers and removing interim files

use geofabric_algorithms::vector::{from_multipolygon, orient_ccw, to_multipolygon};
use geofabric_core::io::write_layer;
use geofabric_core::{FeatureCollection, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Rewrite polygon winding: counter-clockwise exteriors, clockwise holes.
pub fn fix_winding(layer: &mut FeatureCollection) {
    for feature in layer.iter_mut() {
        if let Some(mp) = feature.geometry.as_ref().and_then(to_multipolygon) {
            feature.geometry = Some(from_multipolygon(orient_ccw(&mp)));
        }
    }
}

/// Write the basin and river layers, fixing basin winding first.
pub fn save_geofabric(
    basins: &mut FeatureCollection,
    rivers: &FeatureCollection,
    basins_path: &Path,
    rivers_path: &Path,
) -> Result<()> {
    fix_winding(basins);
    write_layer(basins, basins_path)?;
    write_layer(rivers, rivers_path)?;
    info!("Basins saved to: {}", basins_path.display());
    info!("Rivers saved to: {}", rivers_path.display());
    Ok(())
}

/// Remove an interim directory tree if `enabled`; errors are only logged.
pub fn cleanup(dir: &Path, enabled: bool) {
    if !enabled || !dir.exists() {
        return;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => info!("Cleaned up intermediate files: {}", dir.display()),
        Err(e) => warn!("Could not remove {}: {}", dir.display(), e),
    }
}
