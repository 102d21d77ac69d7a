//! Planar measurements and geometry coercion

use geo::{Area, Distance, Euclidean, Geometry, LineString, MultiPolygon};

/// Unsigned planar area in squared CRS units.
///
/// Geographic layers must be projected first; square degrees are meaningless
/// for the area threshold.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Euclidean length of linear geometries in CRS units.
pub fn length(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Line(l) => l.delta().x.hypot(l.delta().y),
        Geometry::LineString(ls) => line_string_length(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().map(line_string_length).sum(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(length).sum(),
        _ => 0.0,
    }
}

fn line_string_length(ls: &LineString<f64>) -> f64 {
    ls.lines().map(|l| l.delta().x.hypot(l.delta().y)).sum()
}

/// Shortest planar distance between two multipolygons, zero when they
/// touch or overlap.
pub fn distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    b.0.iter()
        .map(|part| Euclidean.distance(a, part))
        .fold(f64::INFINITY, f64::min)
}

/// Polygonal content of a geometry as a multipolygon.
///
/// Returns `None` for geometries without area (points, lines).
pub fn to_multipolygon(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polys: Vec<_> = gc
                .0
                .iter()
                .filter_map(to_multipolygon)
                .flat_map(|mp| mp.0)
                .collect();
            (!polys.is_empty()).then(|| MultiPolygon::new(polys))
        }
        _ => None,
    }
}

/// Collapse a single-part multipolygon back to a polygon, as layer writers
/// and downstream tools expect.
pub fn from_multipolygon(mut mp: MultiPolygon<f64>) -> Geometry<f64> {
    if mp.0.len() == 1 {
        Geometry::Polygon(mp.0.remove(0))
    } else {
        Geometry::MultiPolygon(mp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Line, MultiLineString, Point};

    #[test]
    fn area_of_polygon_with_hole() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]],
        );
        assert_relative_eq!(area(&poly.into()), 96.0);
        assert_eq!(area(&Point::new(1.0, 1.0).into()), 0.0);
    }

    #[test]
    fn length_of_multilinestring() {
        let mls = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]),
            LineString::from(vec![(0.0, 0.0), (0.0, 2.5)]),
        ]);
        assert_relative_eq!(length(&mls.into()), 13.5);
        let segment = Line::new((0.0, 0.0), (6.0, 8.0));
        assert_relative_eq!(length(&segment.into()), 10.0);
    }

    #[test]
    fn distance_between_shapes() {
        let left = MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)]]);
        let near = MultiPolygon::new(vec![polygon![(x: 10.004, y: 2.0), (x: 20.0, y: 2.0), (x: 20.0, y: 8.0), (x: 10.004, y: 8.0)]]);
        let touching = MultiPolygon::new(vec![polygon![(x: 10.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 10.0)]]);
        assert_relative_eq!(distance(&left, &near), 0.004, epsilon = 1e-9);
        assert_eq!(distance(&left, &touching), 0.0);
        assert_eq!(distance(&left, &MultiPolygon::new(vec![])), f64::INFINITY);
    }

    #[test]
    fn polygon_round_trips_through_multipolygon() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let mp = to_multipolygon(&poly.clone().into()).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(from_multipolygon(mp), Geometry::Polygon(poly));
        assert!(to_multipolygon(&Point::new(0.0, 0.0).into()).is_none());
    }
}
