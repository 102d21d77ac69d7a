//! Layer reprojection
//!
//! WGS84 to and from any UTM zone, and UTM to UTM through WGS84, are computed
//! natively. With the `gdal` feature every other pair goes through GDAL;
//! without it such pairs are an error. Layers that declare no CRS are treated
//! as WGS84.

use crate::vector::spatial::bounding_box;
use geo::{Coord, Geometry, MapCoords};
#[cfg(feature = "gdal")]
use geofabric_core::crs::CrsTransform;
use geofabric_core::crs::{utm_to_wgs84, wgs84_to_utm, UtmZone};
use geofabric_core::{Error, FeatureCollection, Result, CRS};
use tracing::warn;

/// The CRS a layer's coordinates are in, defaulting to WGS84.
pub fn effective_crs(layer: &FeatureCollection, name: &str) -> CRS {
    match &layer.crs {
        Some(crs) => crs.clone(),
        None => {
            warn!("CRS is not defined for {}; assuming EPSG:4326", name);
            CRS::wgs84()
        }
    }
}

/// UTM zone CRS containing the centre of a WGS84 layer's extent.
pub fn estimate_utm_crs(layer: &FeatureCollection) -> Option<CRS> {
    let extent = layer
        .iter()
        .filter_map(|f| f.geometry.as_ref().and_then(bounding_box))
        .reduce(|a, b| a.union(&b))?;
    let (lon, lat) = extent.center();
    Some(CRS::from_epsg(UtmZone::containing(lon, lat).epsg()))
}

/// A metric CRS in which planar areas of `layer` are meaningful.
///
/// Geographic layers get their local UTM zone; projected layers are used as
/// they are.
pub fn metric_crs(layer: &FeatureCollection, crs: &CRS) -> CRS {
    if crs.is_wgs84() {
        estimate_utm_crs(layer).unwrap_or_else(|| crs.clone())
    } else {
        crs.clone()
    }
}

/// Transform one geometry between two CRSs.
pub fn reproject_geometry(geom: &Geometry<f64>, from: &CRS, to: &CRS) -> Result<Geometry<f64>> {
    if from.is_equivalent(to) {
        return Ok(geom.clone());
    }
    let project = Transform::between(from, to)?;
    geom.try_map_coords(|c| project.apply(c))
}

/// Transform every feature of a layer into `to`.
pub fn reproject_layer(layer: &FeatureCollection, to: &CRS) -> Result<FeatureCollection> {
    let from = layer.crs.clone().unwrap_or_else(CRS::wgs84);
    let mut out = layer.clone();
    out.crs = Some(to.clone());
    if from.is_equivalent(to) {
        return Ok(out);
    }
    let project = Transform::between(&from, to)?;
    for feature in out.iter_mut() {
        if let Some(geom) = feature.geometry.as_mut() {
            *geom = geom.try_map_coords(|c| project.apply(c))?;
        }
    }
    Ok(out)
}

enum Transform {
    ToUtm(UtmZone),
    FromUtm(UtmZone),
    UtmToUtm(UtmZone, UtmZone),
    #[cfg(feature = "gdal")]
    Gdal(CrsTransform),
}

impl Transform {
    fn between(from: &CRS, to: &CRS) -> Result<Self> {
        match (from.utm_zone(), to.utm_zone()) {
            (None, Some(zone)) if from.is_wgs84() => Ok(Transform::ToUtm(zone)),
            (Some(zone), None) if to.is_wgs84() => Ok(Transform::FromUtm(zone)),
            (Some(a), Some(b)) => Ok(Transform::UtmToUtm(a, b)),
            _ => Self::general(from, to),
        }
    }

    #[cfg(feature = "gdal")]
    fn general(from: &CRS, to: &CRS) -> Result<Self> {
        Ok(Transform::Gdal(CrsTransform::new(from, to)?))
    }

    #[cfg(not(feature = "gdal"))]
    fn general(from: &CRS, to: &CRS) -> Result<Self> {
        Err(Error::UnsupportedCrs(format!(
            "no transform from {} to {} (build with the `gdal` feature for arbitrary CRSs)",
            from, to
        )))
    }

    fn apply(&self, c: Coord<f64>) -> Result<Coord<f64>> {
        let (x, y) = match self {
            Transform::ToUtm(zone) => wgs84_to_utm(c.x, c.y, *zone),
            Transform::FromUtm(zone) => utm_to_wgs84(c.x, c.y, *zone),
            Transform::UtmToUtm(a, b) => {
                let (lon, lat) = utm_to_wgs84(c.x, c.y, *a);
                wgs84_to_utm(lon, lat, *b)
            }
            #[cfg(feature = "gdal")]
            Transform::Gdal(transform) => transform.transform_point(c.x, c.y)?,
        };
        Ok(Coord { x, y })
    }
}
