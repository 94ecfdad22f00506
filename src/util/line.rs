//! Line segment helpers used by wall collision and ray queries

use serde::{Deserialize, Serialize};

use crate::util::point::Point2D;

/// Directed line segment from `p1` to `p2`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line2D {
    pub p1: Point2D,
    pub p2: Point2D,
}

impl Line2D {
    #[inline]
    pub fn new(p1: Point2D, p2: Point2D) -> Self {
        Self { p1, p2 }
    }

    #[inline]
    pub fn length_sq(&self) -> f64 {
        self.p1.distance_sq(self.p2)
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    /// Parameter of the orthogonal projection of `point` onto the infinite line.
    ///
    /// 0 maps to `p1`, 1 maps to `p2`. A zero-length segment yields NaN, which
    /// every range check downstream treats as "outside the segment".
    #[inline]
    pub fn projection_param(&self, point: Point2D) -> f64 {
        let d = self.p2 - self.p1;
        (point - self.p1).dot(d) / self.length_sq()
    }

    /// Point at parameter `t` along the segment
    #[inline]
    pub fn point_at(&self, t: f64) -> Point2D {
        self.p1 + (self.p2 - self.p1) * t
    }

    /// Intersection point of two segments, if they cross.
    ///
    /// Parallel and collinear segments report no intersection.
    pub fn intersection(&self, other: &Line2D) -> Option<Point2D> {
        let r = self.p2 - self.p1;
        let s = other.p2 - other.p1;
        let denom = r.cross(s);
        if denom == 0.0 {
            return None;
        }

        let qp = other.p1 - self.p1;
        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;

        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.point_at(t))
        } else {
            None
        }
    }

    /// Axis-aligned bounds as (min, max) corners
    pub fn bounds(&self) -> (Point2D, Point2D) {
        (
            Point2D::new(self.p1.x.min(self.p2.x), self.p1.y.min(self.p2.y)),
            Point2D::new(self.p1.x.max(self.p2.x), self.p1.y.max(self.p2.y)),
        )
    }
}

/// Distance along a ray to the first point on a circle's boundary.
///
/// `direction` must be a unit vector. Returns `None` when the ray misses the
/// circle or the hit lies beyond `max_range`. A ray starting inside the circle
/// hits at distance 0.
pub fn ray_circle_distance(
    origin: Point2D,
    direction: Point2D,
    max_range: f64,
    center: Point2D,
    radius: f64,
) -> Option<f64> {
    let to_center = center - origin;
    let c = to_center.length_sq() - radius * radius;
    if c < 0.0 {
        return Some(0.0);
    }

    let b = to_center.dot(direction);
    if b < 0.0 {
        return None;
    }

    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }

    let t = b - disc.sqrt();
    (t <= max_range).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_projection_param() {
        let line = Line2D::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0));
        assert!((line.projection_param(Point2D::new(5.0, 3.0)) - 0.5).abs() < EPSILON);
        assert!(line.projection_param(Point2D::new(-5.0, 3.0)) < 0.0);
        assert!(line.projection_param(Point2D::new(15.0, 3.0)) > 1.0);
    }

    #[test]
    fn test_degenerate_projection_is_nan() {
        let p = Point2D::new(1.0, 1.0);
        let line = Line2D::new(p, p);
        assert!(line.projection_param(Point2D::new(3.0, 3.0)).is_nan());
    }

    #[test]
    fn test_crossing_segments_intersect() {
        let a = Line2D::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0));
        let b = Line2D::new(Point2D::new(0.0, 10.0), Point2D::new(10.0, 0.0));
        let hit = a.intersection(&b).unwrap();
        assert!(hit.approx_eq(Point2D::new(5.0, 5.0), EPSILON));
    }

    #[test]
    fn test_disjoint_segments_do_not_intersect() {
        let a = Line2D::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0));
        let b = Line2D::new(Point2D::new(2.0, -1.0), Point2D::new(2.0, 1.0));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_parallel_segments_do_not_intersect() {
        let a = Line2D::new(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0));
        let b = Line2D::new(Point2D::new(0.0, 1.0), Point2D::new(10.0, 1.0));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_ray_circle_hit_and_miss() {
        let origin = Point2D::ZERO;
        let dir = Point2D::new(1.0, 0.0);
        let hit = ray_circle_distance(origin, dir, 100.0, Point2D::new(20.0, 0.0), 5.0);
        assert!((hit.unwrap() - 15.0).abs() < EPSILON);

        // Behind the ray
        assert!(ray_circle_distance(origin, dir, 100.0, Point2D::new(-20.0, 0.0), 5.0).is_none());
        // Off to the side
        assert!(ray_circle_distance(origin, dir, 100.0, Point2D::new(20.0, 10.0), 5.0).is_none());
        // Out of range
        assert!(ray_circle_distance(origin, dir, 10.0, Point2D::new(20.0, 0.0), 5.0).is_none());
    }

    #[test]
    fn test_ray_starting_inside_circle() {
        let hit = ray_circle_distance(
            Point2D::ZERO,
            Point2D::new(0.0, 1.0),
            50.0,
            Point2D::new(1.0, 0.0),
            5.0,
        );
        assert_eq!(hit, Some(0.0));
    }
}
