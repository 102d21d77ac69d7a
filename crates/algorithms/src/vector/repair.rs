//! Validity, repair, winding order and panic-guarded geometry operations
//!
//! Boolean operations on real-world basin outlines occasionally hit
//! degenerate input. [`guarded`] turns such a failure into `None` so one bad
//! polygon is logged and skipped instead of aborting a whole run.

use geo::orient::{Direction, Orient};
use geo::{Area, MultiPolygon, Validation};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Run a geometry operation, converting a panic into `None`.
pub fn guarded<T>(what: &str, op: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!("Geometry operation `{}` failed: {}", what, reason);
            None
        }
    }
}

pub fn is_valid(mp: &MultiPolygon<f64>) -> bool {
    mp.is_valid()
}

/// Whether a multipolygon has no polygon of positive area.
pub fn is_empty(mp: &MultiPolygon<f64>) -> bool {
    mp.0.is_empty() || mp.unsigned_area() <= 0.0
}

/// Return a valid, non-empty version of `mp`, or `None`.
///
/// Invalid input is rebuilt by a self-union, which resolves
/// self-intersections and overlapping parts the way a zero-width buffer does.
pub fn repair(mp: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if is_empty(mp) {
        return None;
    }
    if is_valid(mp) {
        return Some(mp.clone());
    }
    let rebuilt = guarded("self-union", || geo::unary_union(mp.0.iter()))?;
    (!is_empty(&rebuilt) && is_valid(&rebuilt)).then_some(rebuilt)
}

/// Counter-clockwise exteriors and clockwise holes.
pub fn orient_ccw(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    mp.orient(Direction::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Polygon, Winding};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
    }

    #[test]
    fn valid_input_is_returned_unchanged() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]);
        assert_eq!(repair(&mp), Some(mp));
    }

    #[test]
    fn overlapping_parts_are_dissolved() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)]);
        assert!(!is_valid(&mp));
        let fixed = repair(&mp).unwrap();
        assert!(is_valid(&fixed));
        assert_relative_eq!(fixed.unsigned_area(), 150.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_input_is_dropped() {
        assert!(repair(&MultiPolygon::new(vec![])).is_none());
    }

    #[test]
    fn guarded_catches_panics() {
        assert_eq!(guarded("ok", || 3), Some(3));
        assert_eq!(guarded::<i32>("boom", || panic!("degenerate ring")), None);
    }

    #[test]
    fn orientation_is_counter_clockwise() {
        let cw = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)];
        assert!(cw.exterior().is_cw());
        let oriented = orient_ccw(&MultiPolygon::new(vec![cw]));
        assert!(oriented.0[0].exterior().is_ccw());
    }
}
