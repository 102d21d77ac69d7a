//! Small-polygon merging
//!
//! Basins below a minimum area are merged into their largest bordering
//! neighbor until a full pass merges nothing. Coverage lost along
//! the way is handed back to surviving basins, and the result is renumbered
//! `GRU_ID = 1..N`.
//!
//! Work happens in a metric CRS: geographic layers are projected to their
//! local UTM zone and projected back at the end.

mod arena;
mod gaps;

use crate::maybe_rayon::map_ordered;
use crate::vector::{
    distance, effective_crs, from_multipolygon, guarded, is_empty, metric_crs, multipolygon_bbox, repair,
    reproject_layer, simplify_preserve, to_multipolygon, SpatialIndex,
};
use arena::{Arena, Handle, Slot};
use geo::{Area, BooleanOps, MultiPolygon, Validation};
use geofabric_core::{Algorithm, Error, FeatureCollection, Result};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// How many sub-threshold polygons are handled between index rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSize {
    Bounded(usize),
    /// Every sub-threshold polygon in one batch
    Unbounded,
}

/// Gap, in metres, below which two basins still count as bordering.
///
/// Reprojection and boolean operations leave shared edges a few
/// floating-point ulps apart, so an exact intersection test misses them.
pub const ADJACENCY_SNAP_M: f64 = 1e-3;

impl BatchSize {
    fn limit(self) -> usize {
        match self {
            BatchSize::Bounded(n) => n.max(1),
            BatchSize::Unbounded => usize::MAX,
        }
    }
}

/// Parameters for small-polygon merging
#[derive(Debug, Clone)]
pub struct MergeParams {
    /// Minimum basin area in km²
    pub min_area_km2: f64,
    pub batch_size: BatchSize,
    /// Simplification tolerance for merged outlines, in metres
    pub simplify_tolerance: f64,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            min_area_km2: 5.0,
            batch_size: BatchSize::Bounded(100),
            simplify_tolerance: 1.0,
        }
    }
}

/// Merge statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub initial_count: usize,
    pub merged_count: usize,
    pub gaps_filled: usize,
    pub final_count: usize,
    pub reduction_pct: f64,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} polygons ({} merged, {} gaps filled, {:.1}% reduction)",
            self.initial_count, self.final_count, self.merged_count, self.gaps_filled, self.reduction_pct
        )
    }
}

/// Merged layer plus statistics
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub layer: FeatureCollection,
    pub report: MergeReport,
}

/// Small-polygon merger
#[derive(Debug, Clone, Default)]
pub struct SmallPolygonMerger;

impl Algorithm for SmallPolygonMerger {
    type Input = FeatureCollection;
    type Output = MergeResult;
    type Params = MergeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SmallPolygonMerger"
    }

    fn description(&self) -> &'static str {
        "Merge basins below a minimum area into their largest neighbor and repair coverage gaps"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        merge_small_polygons(&input, &params)
    }
}

enum Outcome {
    Merged(Handle),
    /// Grew past the threshold since the batch was drawn
    AlreadyLarge,
    NoNeighbor,
    Invalid,
}

/// Merge basins smaller than `params.min_area_km2` into their neighbors.
///
/// Features whose geometry is not polygonal, or stays invalid after repair,
/// are dropped. Survivors keep their attributes and get `GRU_ID`,
/// `gru_to_seg` and `GRU_area` (m²) rewritten.
pub fn merge_small_polygons(layer: &FeatureCollection, params: &MergeParams) -> Result<MergeResult> {
    if !(params.min_area_km2 >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "min_area_km2",
            value: params.min_area_km2.to_string(),
            reason: "must be a non-negative number".into(),
        });
    }
    info!("Starting polygon merging (minimum size: {} km²)", params.min_area_km2);

    let source_crs = effective_crs(layer, "basins");
    let work_crs = metric_crs(layer, &source_crs);
    let working = reproject_layer(&FeatureCollection::with_crs(layer.features.clone(), Some(source_crs.clone())), &work_crs)?;
    let initial_count = working.len();

    let slots: Vec<Slot> = map_ordered(working.features, |feature| {
        let shape = feature.geometry.as_ref().and_then(to_multipolygon)?;
        let shape = repair(&shape)?;
        Some(Slot::new(feature, shape))
    })
    .into_iter()
    .flatten()
    .collect();
    if slots.len() < initial_count {
        warn!("Dropped {} empty or unrepairable geometries", initial_count - slots.len());
    }

    let mut arena = Arena::new(slots);
    let original_coverage = gaps::coverage(&arena);
    let merged_count = merge_loop(&mut arena, params);
    let gaps_filled = match &original_coverage {
        Some(original) => gaps::fill_gaps(&mut arena, original),
        None => {
            warn!("Skipping gap repair: input coverage could not be built");
            0
        }
    };

    let mut merged = FeatureCollection::with_crs(Vec::with_capacity(arena.live_count()), Some(work_crs));
    for (i, slot) in arena.into_live().enumerate() {
        let id = i as i64 + 1;
        let area_m2 = slot.shape.unsigned_area();
        let mut feature = slot.feature;
        feature.geometry = Some(from_multipolygon(slot.shape));
        feature.set_property("GRU_ID", id);
        feature.set_property("gru_to_seg", id);
        feature.set_property("GRU_area", area_m2);
        merged.push(feature);
    }
    let layer_out = reproject_layer(&merged, &source_crs)?;

    let final_count = layer_out.len();
    let report = MergeReport {
        initial_count,
        merged_count,
        gaps_filled,
        final_count,
        reduction_pct: if initial_count > 0 {
            (initial_count - final_count.min(initial_count)) as f64 / initial_count as f64 * 100.0
        } else {
            0.0
        },
    };
    info!("Polygon merging statistics:");
    info!("- Initial polygons: {}", report.initial_count);
    info!("- Merged {} small polygons", report.merged_count);
    info!("- Filled {} coverage gaps", report.gaps_filled);
    info!("- Final polygons: {}", report.final_count);
    info!("- Reduction: {:.1}%", report.reduction_pct);

    Ok(MergeResult { layer: layer_out, report })
}

/// Batched merging to a fixed point. Returns the number of merges.
///
/// Each pass walks every sub-threshold polygon in batches, rebuilding the
/// spatial index after each batch. Merging stops once a whole pass merges
/// nothing. A polygon with no neighbor against a fresh index is isolated and
/// skipped from then on; any other failure is retried in the next pass.
fn merge_loop(arena: &mut Arena, params: &MergeParams) -> usize {
    let mut merged = 0;
    let mut isolated: HashSet<Handle> = HashSet::new();

    loop {
        let pending: Vec<Handle> = arena
            .below(params.min_area_km2)
            .into_iter()
            .filter(|h| !isolated.contains(h))
            .collect();
        if pending.is_empty() || arena.live_count() <= 1 {
            break;
        }

        let mut pass_merges = 0;
        for batch in pending.chunks(params.batch_size.limit()) {
            let index = arena.index();
            let mut index_fresh = true;
            for &handle in batch {
                if !arena.is_live(handle) {
                    continue;
                }
                match merge_one(arena, &index, handle, params) {
                    Outcome::Merged(into) => {
                        debug!("Merged polygon {} into {}", handle, into);
                        pass_merges += 1;
                        index_fresh = false;
                    }
                    Outcome::AlreadyLarge => {}
                    Outcome::NoNeighbor if index_fresh => {
                        debug!("Polygon {} has no bordering neighbor", handle);
                        isolated.insert(handle);
                    }
                    Outcome::NoNeighbor => {
                        debug!("Polygon {} found no neighbor in a stale index; retrying next pass", handle);
                    }
                    Outcome::Invalid => {
                        warn!("Merging polygon {} produced an invalid geometry; retrying next pass", handle);
                    }
                }
            }
        }

        debug!("Merge pass finished with {} merges", pass_merges);
        merged += pass_merges;
        if pass_merges == 0 {
            break;
        }
    }
    merged
}

/// Distance under which two shapes are treated as sharing an edge.
fn adjacency_tolerance(params: &MergeParams) -> f64 {
    params.simplify_tolerance.max(0.0) + ADJACENCY_SNAP_M
}

fn merge_one(arena: &mut Arena, index: &SpatialIndex<Handle>, handle: Handle, params: &MergeParams) -> Outcome {
    let small = arena.get(handle);
    if small.area_km2 >= params.min_area_km2 {
        return Outcome::AlreadyLarge;
    }
    let Some(bbox) = multipolygon_bbox(&small.shape) else {
        return Outcome::NoNeighbor;
    };
    let tolerance = adjacency_tolerance(params);

    let neighbor = index
        .query(&bbox.expanded(tolerance))
        .into_iter()
        .filter(|&h| h != handle && arena.is_live(h))
        .filter(|&h| {
            guarded("neighbor test", || distance(&arena.get(h).shape, &small.shape) <= tolerance).unwrap_or(false)
        })
        .max_by(|&a, &b| arena.get(a).area_km2.total_cmp(&arena.get(b).area_km2).then(b.cmp(&a)));
    let Some(neighbor) = neighbor else {
        return Outcome::NoNeighbor;
    };

    let target = &arena.get(neighbor).shape;
    let Some(union) = guarded("merge union", || target.union(&small.shape)) else {
        return Outcome::Invalid;
    };
    let simplified = simplify_preserve(&union, params.simplify_tolerance);
    let shape = if !is_empty(&simplified) && simplified.is_valid() {
        simplified
    } else if !is_empty(&union) && union.is_valid() {
        union
    } else {
        return Outcome::Invalid;
    };

    arena.replace_shape(neighbor, shape);
    arena.supersede(handle);
    Outcome::Merged(neighbor)
}

/// Total planar area of a layer's polygons in its own units.
pub fn total_area(layer: &FeatureCollection) -> f64 {
    layer
        .iter()
        .filter_map(|f| f.geometry.as_ref().and_then(to_multipolygon))
        .map(|mp: MultiPolygon<f64>| mp.unsigned_area())
        .sum()
}
