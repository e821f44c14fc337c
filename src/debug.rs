use crate::math::Point2d;
use serde_json::json;

thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Draws a route polyline in the given colour.
pub fn debug_route(points: &[Point2d], closed: bool, color: &str) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "route",
            "color": color,
            "closed": closed,
            "points": points.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
        }))
    })
}

pub fn debug_circle(name: &str, centre: Point2d, radius: f64) {
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "circle",
            "name": name,
            "centre": [centre.x, centre.y],
            "radius": radius
        }))
    })
}

pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
