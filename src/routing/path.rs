use cgmath::prelude::*;

use crate::math::{approx_eq, closest_point_on_segment, normalize_or_zero, Point2d, Vector2d};

/// A point is carried over to its target once the step falls short of it by less than this.
const SNAP_AHEAD_SQ: f64 = 0.04;

/// A polyline of at least two points, optionally closed into a loop.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    points: Vec<Point2d>,
    closed: bool,
}

impl Path {
    /// Creates a path.
    ///
    /// # Panics
    /// Panics if there are fewer than two points.
    pub fn new(points: Vec<Point2d>, closed: bool) -> Self {
        assert!(points.len() >= 2, "a path needs at least two points");
        Self { points, closed }
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// The number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the last point joins back to the first.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Iterates over the segments of the path as pairs of points.
    pub fn segments(&self) -> impl Iterator<Item = [Point2d; 2]> + '_ {
        let closing = self
            .closed
            .then(|| [self.points[self.points.len() - 1], self.points[0]]);
        self.points
            .windows(2)
            .map(|w| [w[0], w[1]])
            .chain(closing)
    }

    /// Finds the point on the path closest to `point`, along with the index of
    /// the end of the segment it lies on (the *leading* index).
    pub fn closest_point(&self, point: Point2d) -> (Point2d, usize) {
        let len = self.points.len();
        let mut best = (self.points[0], 0);
        let mut min_dist = f64::INFINITY;
        for i in 0..len {
            let next = match i + 1 {
                n if n < len => n,
                _ if self.closed => 0,
                _ => break,
            };
            let candidate = closest_point_on_segment(point, self.points[i], self.points[next]);
            let dist = candidate.distance2(point);
            if dist < min_dist {
                min_dist = dist;
                best = (candidate, next);
            }
        }
        best
    }

    /// If `point` lies on the path, returns its leading index.
    pub fn contains(&self, point: Point2d) -> Option<usize> {
        let (closest, idx) = self.closest_point(point);
        approx_eq(closest, point).then_some(idx)
    }

    /// The heading at a point on the path with the given leading index.
    pub fn rotation_at(&self, point: Point2d, known: usize) -> Vector2d {
        let prev = match known {
            0 => self.points[self.points.len() - 1],
            i => self.points[i - 1],
        };
        normalize_or_zero(point - prev)
    }

    /// Advances `from`, whose leading index is `known`, by `distance` along the path.
    ///
    /// Returns the new point and its leading index. Open paths stop at their last
    /// point; closed paths wrap around.
    pub fn move_point(&self, from: Point2d, distance: f64, known: usize) -> (Point2d, usize) {
        if distance <= 0.0 {
            return (from, known);
        }
        let len = self.points.len();
        let (mut pos, mut idx, mut remaining) = (from, known, distance);
        // Each iteration consumes a segment; bound it in case every segment is empty.
        for _ in 0..2 * len + 2 {
            let target = self.points[idx];
            let diff = target - pos;
            if remaining * remaining < diff.magnitude2() - SNAP_AHEAD_SQ {
                return (pos + normalize_or_zero(diff) * remaining, idx);
            }
            remaining -= diff.magnitude();
            pos = target;
            let next = match idx + 1 {
                n if n < len => n,
                _ if self.closed => 0,
                _ => return (pos, idx),
            };
            if remaining <= 0.0 {
                return (pos, next);
            }
            idx = next;
        }
        (pos, idx)
    }
}
