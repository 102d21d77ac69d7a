//! Slot storage for polygons being merged
//!
//! Polygons never move: a merged-away polygon is only marked superseded, so
//! handles held by the spatial index stay valid until the next rebuild.

use crate::vector::{multipolygon_bbox, SpatialIndex};
use geo::{Area, MultiPolygon};
use geofabric_core::Feature;

/// Index of a slot in the arena.
pub type Handle = usize;

#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub feature: Feature,
    pub shape: MultiPolygon<f64>,
    /// Planar area in km²
    pub area_km2: f64,
    pub superseded: bool,
}

impl Slot {
    pub fn new(feature: Feature, shape: MultiPolygon<f64>) -> Self {
        let area_km2 = shape.unsigned_area() / 1_000_000.0;
        Self {
            feature,
            shape,
            area_km2,
            superseded: false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
}

impl Arena {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    pub fn get(&self, handle: Handle) -> &Slot {
        &self.slots[handle]
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        !self.slots[handle].superseded
    }

    pub fn live(&self) -> impl Iterator<Item = (Handle, &Slot)> {
        self.slots.iter().enumerate().filter(|(_, s)| !s.superseded)
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    pub fn replace_shape(&mut self, handle: Handle, shape: MultiPolygon<f64>) {
        let slot = &mut self.slots[handle];
        slot.area_km2 = shape.unsigned_area() / 1_000_000.0;
        slot.shape = shape;
    }

    pub fn supersede(&mut self, handle: Handle) {
        self.slots[handle].superseded = true;
    }

    /// Live handles below `min_area_km2`, in input order.
    pub fn below(&self, min_area_km2: f64) -> Vec<Handle> {
        self.live()
            .filter(|(_, s)| s.area_km2 < min_area_km2)
            .map(|(h, _)| h)
            .collect()
    }

    /// R-tree over the bounding boxes of all live slots.
    pub fn index(&self) -> SpatialIndex<Handle> {
        SpatialIndex::bulk_load(
            self.live()
                .filter_map(|(h, s)| multipolygon_bbox(&s.shape).map(|bb| (h, bb))),
        )
    }

    pub fn into_live(self) -> impl Iterator<Item = Slot> {
        self.slots.into_iter().filter(|s| !s.superseded)
    }
}
