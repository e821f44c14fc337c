use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Squared distance below which two points are considered equal.
pub const POINT_EPSILON_SQ: f64 = 0.001;

/// Rotates a vector 90 degrees anticlockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The unit normal pointing to the right-hand side of travel along `dir`.
pub fn right_normal(dir: Vector2d) -> Vector2d {
    -rot90(dir)
}

/// Normalises a vector, leaving the zero vector unchanged.
pub fn normalize_or_zero(vec: Vector2d) -> Vector2d {
    let mag2 = vec.magnitude2();
    if mag2 > 1e-12 {
        vec / mag2.sqrt()
    } else {
        Vector2d::zero()
    }
}

/// The signed turn between two directions on the ground plane.
///
/// Equals the vertical component of the 3D cross product `a × b` once the
/// plane is lifted into a y-up space, so it is negative for turns to the
/// left and positive for turns to the right.
pub fn cross_y(a: Vector2d, b: Vector2d) -> f64 {
    a.y * b.x - a.x * b.y
}

/// Whether two points coincide up to [POINT_EPSILON_SQ].
pub fn approx_eq(a: Point2d, b: Point2d) -> bool {
    (a - b).magnitude2() < POINT_EPSILON_SQ
}

/// Whether two vectors coincide up to [POINT_EPSILON_SQ].
pub fn approx_eq_vec(a: Vector2d, b: Vector2d) -> bool {
    (a - b).magnitude2() < POINT_EPSILON_SQ
}

/// Finds the point on the segment `a`-`b` closest to `p`.
pub fn closest_point_on_segment(p: Point2d, a: Point2d, b: Point2d) -> Point2d {
    let ab = b - a;
    let len2 = ab.magnitude2();
    if len2 == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// The yaw of a heading in degrees in `[0, 360)`, measured clockwise from the +y axis.
pub fn yaw_degrees(dir: Vector2d) -> f64 {
    let yaw = dir.x.atan2(dir.y).to_degrees();
    if yaw < 0.0 {
        yaw + 360.0
    } else {
        yaw
    }
}

/// The unit heading with the given yaw in degrees.
pub fn heading_from_yaw(yaw: f64) -> Vector2d {
    let rad = yaw.to_radians();
    Vector2d::new(rad.sin(), rad.cos())
}

/// Rotates the unit heading `from` towards `to` by the fraction `t` of the angle between them.
///
/// `t` is clamped to `[0, 1]`. A zero `to` leaves the heading unchanged.
pub fn slerp_heading(from: Vector2d, to: Vector2d, t: f64) -> Vector2d {
    let to = normalize_or_zero(to);
    if to == Vector2d::zero() {
        return from;
    }
    if from == Vector2d::zero() {
        return to;
    }
    let t = t.clamp(0.0, 1.0);
    let angle = from.x.mul_add(to.y, -from.y * to.x).atan2(from.dot(to));
    let (sin, cos) = (angle * t).sin_cos();
    Vector2d::new(from.x * cos - from.y * sin, from.x * sin + from.y * cos)
}
