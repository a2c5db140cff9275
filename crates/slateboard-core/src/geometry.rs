//! Geometry helpers shared by selection and hit testing.

use kurbo::{Point, Rect, Vec2};

/// Whether two rectangles overlap (touching edges count as overlap).
pub fn rects_intersect(a: Rect, b: Rect) -> bool {
    !(a.x1 < b.x0 || b.x1 < a.x0 || a.y1 < b.y0 || b.y1 < a.y0)
}

/// Point-in-polygon by ray casting. Open polygons are treated as closed
/// between the last and first vertex.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        let crosses = (pi.y > point.y) != (pj.y > point.y);
        if crosses {
            let x_at = pi.x + (point.y - pi.y) / (pj.y - pi.y) * (pj.x - pi.x);
            if point.x < x_at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Whether a rectangle overlaps a lasso polygon. Tests the four corners
/// and the center of the rect; small rects fully inside the lasso and
/// lassos cutting through a corner are both caught.
pub fn rect_intersects_polygon(rect: Rect, polygon: &[Point]) -> bool {
    let probes = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
        rect.center(),
    ];
    if probes.iter().any(|&p| point_in_polygon(p, polygon)) {
        return true;
    }
    // A huge rect can surround the whole lasso without any probe inside.
    polygon
        .iter()
        .any(|p| p.x >= rect.x0 && p.x <= rect.x1 && p.y >= rect.y0 && p.y <= rect.y1)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_point_in_polygon() {
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square()));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &square()));
        assert!(!point_in_polygon(Point::new(5.0, -1.0), &square()));
    }

    #[test]
    fn test_degenerate_polygon_contains_nothing() {
        let line = vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)];
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &line));
    }

    #[test]
    fn test_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rects_intersect(a, Rect::new(5.0, 5.0, 15.0, 15.0)));
        assert!(rects_intersect(a, Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!rects_intersect(a, Rect::new(11.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn test_rect_intersects_polygon_corner_cut() {
        // Lasso clips only the top-left corner of the rect.
        let rect = Rect::new(5.0, 5.0, 20.0, 20.0);
        assert!(rect_intersects_polygon(rect, &square()));
    }

    #[test]
    fn test_rect_surrounding_polygon_intersects() {
        let rect = Rect::new(-100.0, -100.0, 100.0, 100.0);
        assert!(rect_intersects_polygon(rect, &square()));
    }

    #[test]
    fn test_point_to_segment_dist() {
        let d = point_to_segment_dist(
            Point::new(5.0, 5.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-9);
        // Beyond the endpoint, distance is to the endpoint itself.
        let d = point_to_segment_dist(
            Point::new(13.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_to_polyline_dist_picks_nearest_segment() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        let d = point_to_polyline_dist(Point::new(12.0, 8.0), &pts);
        assert!((d - 2.0).abs() < 1e-9);
    }
}
