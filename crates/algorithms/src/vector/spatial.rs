//! Bounding boxes and the R-tree used for neighbor queries

use geo::{BoundingRect, Geometry, MultiPolygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Closed-interval test, edges included.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grown by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn to_rectangle(self) -> Rectangle<[f64; 2]> {
        Rectangle::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }

    fn to_aabb(self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Bounding box of a geometry, `None` when it is empty.
pub fn bounding_box(geom: &Geometry<f64>) -> Option<BoundingBox> {
    geom.bounding_rect().map(|rect| BoundingBox {
        min_x: rect.min().x,
        min_y: rect.min().y,
        max_x: rect.max().x,
        max_y: rect.max().y,
    })
}

pub fn multipolygon_bbox(mp: &MultiPolygon<f64>) -> Option<BoundingBox> {
    mp.bounding_rect().map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

type Entry<H> = GeomWithData<Rectangle<[f64; 2]>, H>;

/// R-tree over bounding boxes keyed by an opaque handle.
///
/// The tree is immutable; callers rebuild it when the indexed geometry set
/// changes.
pub struct SpatialIndex<H: Copy + PartialEq> {
    tree: RTree<Entry<H>>,
}

impl<H: Copy + PartialEq> SpatialIndex<H> {
    pub fn bulk_load(items: impl IntoIterator<Item = (H, BoundingBox)>) -> Self {
        let entries: Vec<Entry<H>> = items
            .into_iter()
            .map(|(handle, bbox)| GeomWithData::new(bbox.to_rectangle(), handle))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles whose box intersects `bbox` (touching counts).
    pub fn query(&self, bbox: &BoundingBox) -> Vec<H> {
        self.tree
            .locate_in_envelope_intersecting(&bbox.to_aabb())
            .map(|entry| entry.data)
            .collect()
    }

    /// Handle whose box lies nearest to `(x, y)`; zero distance when inside.
    pub fn nearest(&self, x: f64, y: f64) -> Option<H> {
        self.tree.nearest_neighbor(&[x, y]).map(|entry| entry.data)
    }
}
