//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use util::*;

mod util;

/// A 2D point on the ground plane.
pub type Point2d = Point2<f64>;

/// A 2D vector on the ground plane.
pub type Vector2d = Vector2<f64>;
