//! Transforms between arbitrary CRSs through GDAL and PROJ

use super::CRS;
use crate::error::{Error, Result};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};

/// Coordinate transform between two CRSs GDAL can resolve.
///
/// Geographic coordinates are always longitude first, matching the rest of
/// the engine regardless of the authority's axis order.
pub struct CrsTransform {
    inner: CoordTransform,
}

impl CrsTransform {
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        let source = spatial_ref(from)?;
        let target = spatial_ref(to)?;
        Ok(Self {
            inner: CoordTransform::new(&source, &target)?,
        })
    }

    /// Transform coordinate arrays in place.
    pub fn transform(&self, xs: &mut [f64], ys: &mut [f64]) -> Result<()> {
        let mut zs = vec![0.0; xs.len()];
        self.inner.transform_coords(xs, ys, &mut zs)?;
        Ok(())
    }

    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (mut xs, mut ys) = ([x], [y]);
        self.transform(&mut xs, &mut ys)?;
        Ok((xs[0], ys[0]))
    }
}

fn spatial_ref(crs: &CRS) -> Result<SpatialRef> {
    let mut srs = if let Some(code) = crs.epsg() {
        SpatialRef::from_epsg(code)?
    } else if let Some(wkt) = crs.wkt() {
        SpatialRef::from_wkt(wkt)?
    } else if let Some(proj) = crs.proj() {
        SpatialRef::from_proj4(proj)?
    } else {
        return Err(Error::UnsupportedCrs(format!("{} has no definition GDAL can read", crs)));
    };
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}
