//! Coverage gap repair after merging
//!
//! Simplifying merged outlines can shave slivers off the area the input
//! covered. Each sliver is handed back to a surviving polygon.

use super::arena::{Arena, Handle};
use crate::vector::{distance, guarded, multipolygon_bbox, repair, SpatialIndex};
use geo::{Area, BooleanOps, Centroid, MultiPolygon, Polygon};
use tracing::{debug, warn};

/// Union of every live polygon, `None` if the union failed.
pub(crate) fn coverage(arena: &Arena) -> Option<MultiPolygon<f64>> {
    let parts: Vec<&Polygon<f64>> = arena.live().flat_map(|(_, s)| s.shape.0.iter()).collect();
    guarded("coverage union", || geo::unary_union(parts))
}

/// Assign every positive-area part of `original - coverage(arena)` to a
/// polygon. Returns the number of gaps filled.
pub(crate) fn fill_gaps(arena: &mut Arena, original: &MultiPolygon<f64>) -> usize {
    let Some(current) = coverage(arena) else {
        warn!("Skipping gap repair: current coverage could not be built");
        return 0;
    };
    let Some(gaps) = guarded("coverage difference", || original.difference(&current)) else {
        return 0;
    };

    let index = arena.index();
    let mut filled = 0;
    for gap in gaps.0.into_iter().filter(|g| g.unsigned_area() > 0.0) {
        let Some(target) = receiver(arena, &index, &gap) else {
            warn!("No polygon found for a gap of {:.3} m²", gap.unsigned_area());
            continue;
        };
        let current = &arena.get(target).shape;
        let merged = guarded("gap union", || current.union(&MultiPolygon::new(vec![gap.clone()])))
            .and_then(|mp| repair(&mp));
        match merged {
            Some(shape) => {
                debug!("Gap of {:.3} m² assigned to polygon {}", gap.unsigned_area(), target);
                arena.replace_shape(target, shape);
                filled += 1;
            }
            None => warn!("Gap could not be merged into polygon {}", target),
        }
    }
    filled
}

/// The live polygon nearest to the gap by geometric distance, the lowest
/// handle among ties.
///
/// The index's nearest box to the gap centroid bounds the search radius, so
/// only polygons whose boxes fall within that radius are measured.
fn receiver(arena: &Arena, index: &SpatialIndex<Handle>, gap: &Polygon<f64>) -> Option<Handle> {
    let gap_mp = MultiPolygon::new(vec![gap.clone()]);
    let measure = |h: Handle| guarded("gap distance", || distance(&arena.get(h).shape, &gap_mp));
    let centroid = gap.centroid()?;
    let seed = index.nearest(centroid.x(), centroid.y())?;
    let (Some(bbox), Some(reach)) = (multipolygon_bbox(&gap_mp), measure(seed)) else {
        return Some(seed);
    };

    let nearest = index
        .query(&bbox.expanded(reach))
        .into_iter()
        .filter(|&h| arena.is_live(h))
        .filter_map(|h| measure(h).map(|d| (h, d)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(h, _)| h);
    nearest.or(Some(seed))
}
