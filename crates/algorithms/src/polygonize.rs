//! Raster to polygon conversion for labeled watershed grids
//!
//! Every cell holding a positive label belongs to the watershed of that
//! label. Horizontal runs of equal labels become rectangles, vertically
//! stacked runs with the same extent are joined, and each label's rectangles
//! are dissolved into one (multi)polygon.

use crate::vector::{from_multipolygon, guarded};
use geo::{Coord, MultiPolygon, Polygon, Rect};
use geofabric_core::raster::{Raster, RasterElement};
use geofabric_core::{Algorithm, Error, Feature, FeatureCollection, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Parameters for polygonization
#[derive(Debug, Clone)]
pub struct PolygonizeParams {
    /// Attribute that receives the cell label
    pub field: String,
}

impl Default for PolygonizeParams {
    fn default() -> Self {
        Self {
            field: "DN".to_string(),
        }
    }
}

/// Polygonize algorithm
#[derive(Debug, Clone, Default)]
pub struct Polygonize;

impl Algorithm for Polygonize {
    type Input = Raster<f64>;
    type Output = FeatureCollection;
    type Params = PolygonizeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Polygonize"
    }

    fn description(&self) -> &'static str {
        "Convert a labeled watershed grid into one polygon feature per label"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        polygonize(&input, &params)
    }
}

/// A block of cells `[col0, col1) x [row0, row1)` sharing one label.
#[derive(Debug, Clone, Copy)]
struct Block {
    col0: usize,
    col1: usize,
    row0: usize,
    row1: usize,
}

/// Convert a label grid into features ordered by ascending label.
///
/// No-data cells and labels <= 0 are background. The output layer carries
/// the grid's CRS.
pub fn polygonize<T: RasterElement>(raster: &Raster<T>, params: &PolygonizeParams) -> Result<FeatureCollection> {
    let (rows, cols) = raster.shape();
    let data = raster.data();

    let mut blocks: BTreeMap<i64, Vec<Block>> = BTreeMap::new();
    // open blocks keyed by (label, col0, col1), extended while the run repeats
    let mut open: HashMap<(i64, usize, usize), Block> = HashMap::new();

    for row in 0..rows {
        let mut next_open = HashMap::with_capacity(open.len());
        let mut col = 0;
        while col < cols {
            let Some(label) = raster.label(data[(row, col)]) else {
                col += 1;
                continue;
            };
            let start = col;
            while col < cols && raster.label(data[(row, col)]) == Some(label) {
                col += 1;
            }
            let key = (label, start, col);
            let block = match open.remove(&key) {
                Some(mut b) => {
                    b.row1 = row + 1;
                    b
                }
                None => Block {
                    col0: start,
                    col1: col,
                    row0: row,
                    row1: row + 1,
                },
            };
            next_open.insert(key, block);
        }
        for ((label, _, _), block) in open.drain() {
            blocks.entry(label).or_default().push(block);
        }
        open = next_open;
    }
    for ((label, _, _), block) in open {
        blocks.entry(label).or_default().push(block);
    }

    let transform = raster.transform();
    let mut layer = FeatureCollection::with_crs(Vec::with_capacity(blocks.len()), raster.crs().cloned());
    for (label, cells) in blocks {
        let rects: Vec<Polygon<f64>> = cells
            .iter()
            .map(|b| {
                let (x0, y0) = transform.pixel_to_geo_corner(b.col0, b.row0);
                let (x1, y1) = transform.pixel_to_geo_corner(b.col1, b.row1);
                Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }).to_polygon()
            })
            .collect();
        let dissolved = if rects.len() == 1 {
            MultiPolygon::new(rects)
        } else {
            guarded("dissolve label", || geo::unary_union(rects.iter())).ok_or_else(|| {
                Error::Algorithm(format!("failed to dissolve cells of label {label}"))
            })?
        };
        debug!("Label {}: {} blocks -> {} part(s)", label, cells.len(), dissolved.0.len());
        layer.push(Feature::new(from_multipolygon(dissolved)).with_property(params.field.as_str(), label));
    }
    Ok(layer)
}
