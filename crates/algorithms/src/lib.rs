//! # Geofabric Algorithms
//!
//! Vector and topology algorithms for the geofabric engine.
//!
//! ## Available Algorithm Categories
//!
//! - **hydrofabric**: Schema registry, drainage graph, upstream closure, outlet location
//! - **polygonize**: Labeled watershed raster to polygon features
//! - **merge**: Small-polygon merging with gap repair
//! - **vector**: Area, simplify, repair, orientation, spatial index, reprojection

pub mod hydrofabric;
pub mod merge;
pub mod polygonize;
pub mod vector;

pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrofabric::{
        locate_outlet, pour_point, DrainageGraph, EdgeDirection, HydrofabricSchema, UpstreamClosure,
    };
    pub use crate::merge::{merge_small_polygons, BatchSize, MergeParams, MergeReport, MergeResult, SmallPolygonMerger};
    pub use crate::polygonize::{polygonize, Polygonize, PolygonizeParams};
    pub use crate::vector::{area, orient_ccw, reproject_layer};
    pub use geofabric_core::prelude::*;
}
