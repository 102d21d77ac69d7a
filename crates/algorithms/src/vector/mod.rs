//! Vector geometry operations used on basin and river layers

pub mod measurements;
pub mod repair;
pub mod reproject;
pub mod simplify;
pub mod spatial;

pub use measurements::{area, distance, from_multipolygon, length, to_multipolygon};
pub use repair::{guarded, is_empty, is_valid, orient_ccw, repair};
pub use reproject::{effective_crs, estimate_utm_crs, metric_crs, reproject_geometry, reproject_layer};
pub use simplify::simplify_preserve;
pub use spatial::{bounding_box, multipolygon_bbox, BoundingBox, SpatialIndex};
