//! Topology-preserving simplification of merged basin outlines

use crate::vector::guarded;
use geo::{LineString, MultiPolygon, Polygon, SimplifyVwPreserve};

/// Simplify a multipolygon with Visvalingam-Whyatt, preserving topology.
///
/// `tolerance` is a distance in CRS units; vertices whose effective triangle
/// is smaller than `tolerance²` are removed unless removing them would make
/// a ring cross itself or another ring. Rings never collapse below a valid
/// ring, so shared edges with neighbors move by at most about `tolerance`.
/// If the simplifier fails on degenerate input the shape is returned as is.
pub fn simplify_preserve(mp: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    if tolerance <= 0.0 {
        return mp.clone();
    }
    let epsilon = tolerance * tolerance;
    let Some(simplified) = guarded("simplify", || mp.simplify_vw_preserve(&epsilon)) else {
        return mp.clone();
    };
    MultiPolygon::new(simplified.0.into_iter().filter_map(drop_degenerate_rings).collect())
}

fn drop_degenerate_rings(polygon: Polygon<f64>) -> Option<Polygon<f64>> {
    let (exterior, interiors) = polygon.into_inner();
    if !is_ring(&exterior) {
        return None;
    }
    let interiors: Vec<LineString<f64>> = interiors.into_iter().filter(is_ring).collect();
    Some(Polygon::new(exterior, interiors))
}

fn is_ring(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
}
