use crate::error::{RoutingError, RoutingResult};
use crate::graph::{RoadGraph, RoadNode};
use crate::math::{approx_eq_vec, cross_y, normalize_or_zero, Point2d, Vector2d};
use crate::NodeId;

/// Distance from a road's centre line to the centre of a lane, in cells.
pub(crate) const LANE_OFFSET: f64 = 0.375 * 0.5;

/// Length of the short lead-in placed before and after each corner point, in world units.
const LEAD_IN: f64 = 0.05;

/// How far a lane point is pulled along the road at a 45 degree right turn, in lane offsets.
const WIDE_TURN_PULL: f64 = 3.5;

/// How far a lane point is pulled along the road at a right angle turn, in lane offsets.
const SHARP_TURN_PULL: f64 = 2.0;

/// Tolerance on turn values, which are exact only for axis-aligned roads.
const TURN_EPSILON: f64 = 1e-9;

/// The lane polyline of a route and the points where vehicles stop at either end.
#[derive(Clone, Debug)]
pub(crate) struct Geometry {
    pub points: Vec<Point2d>,
    pub start_point: Point2d,
    pub end_point: Point2d,
}

/// The pull applied entering node `i` with the turn `prev_dir × curr_dir`.
fn entry_pull(turn: f64) -> f64 {
    if turn <= TURN_EPSILON {
        0.0
    } else if turn < 1.0 - TURN_EPSILON {
        WIDE_TURN_PULL
    } else {
        SHARP_TURN_PULL
    }
}

/// The pull applied leaving towards node `i + 1` with the turn `curr_dir × next_dir`,
/// or `None` if the road doubles back there.
fn exit_pull(turn: f64) -> Option<f64> {
    if turn.abs() <= TURN_EPSILON {
        None
    } else if turn < 0.0 {
        Some(0.0)
    } else if turn < 1.0 - TURN_EPSILON {
        Some(WIDE_TURN_PULL)
    } else {
        Some(SHARP_TURN_PULL)
    }
}

/// Keeps `points[start..end]`, clamped to the points available.
fn window(mut points: Vec<Point2d>, start: usize, end: usize) -> Vec<Point2d> {
    let end = end.min(points.len());
    let start = start.min(end);
    points.truncate(end);
    points.drain(..start);
    points
}

/// Offsets a doubled node sequence onto the right-hand lane of each road it follows.
///
/// The sequence is walked as a loop, leaving out its final node. Entrance nodes at either
/// end are replaced by the waypoint path through their building to the given platform.
/// Temporary routes keep only the outbound half.
pub(crate) fn lane_points(
    graph: &RoadGraph,
    doubled: &[NodeId],
    platform1: usize,
    platform2: usize,
    is_temp: bool,
) -> RoutingResult<Geometry> {
    let ids = &doubled[..doubled.len().saturating_sub(1)];
    let count = ids.len();
    if count < 2 {
        return Err(RoutingError::DegenerateGeometry(count));
    }
    let nodes = ids
        .iter()
        .map(|id| graph.node(*id).ok_or(RoutingError::DeadNode(*id)))
        .collect::<Result<Vec<&RoadNode>, _>>()?;
    let end_idx = count / 2;
    let dist = LANE_OFFSET * graph.cell_size();

    let mut points: Vec<Point2d> = vec![];
    let mut pairs: Vec<(usize, [Point2d; 2])> = vec![];
    let mut marker: Option<usize> = None;
    let mut start_point = None;
    let mut end_point = None;

    for i in 0..count {
        let prev = nodes[(i + count - 1) % count].pos();
        let curr = nodes[i].pos();
        let next_node = nodes[(i + 1) % count];
        let next = next_node.pos();
        let over = nodes[(i + 2) % count].pos();

        let prev_dir = normalize_or_zero(curr - prev);
        let curr_dir = normalize_or_zero(next - curr);
        let next_dir = normalize_or_zero(over - next);
        let norm = Vector2d::new(curr_dir.y, -curr_dir.x);

        if !approx_eq_vec(prev_dir, curr_dir) {
            let pull = entry_pull(cross_y(prev_dir, curr_dir));
            let p1 = curr + norm * dist + curr_dir * dist * pull;
            match graph.building_of(ids[i]) {
                Some(building) => {
                    let entrance = building.entrance_by_direction(normalize_or_zero(prev - curr))?;
                    let p1 = p1 - (curr - entrance);
                    pairs.push((i, [p1 - norm * dist * 2.0, p1]));
                }
                None => {
                    points.push(p1 - curr_dir * LEAD_IN);
                    points.push(p1);
                }
            }
        }

        if !approx_eq_vec(curr_dir, next_dir) {
            let (p2, cap) = match exit_pull(cross_y(curr_dir, next_dir)) {
                Some(pull) => (next + norm * dist - curr_dir * dist * pull, None),
                None => {
                    marker.get_or_insert(points.len().saturating_sub(1));
                    (next + norm * dist, Some(next + curr_dir * dist))
                }
            };
            if !next_node.is_entrance() {
                points.push(p2);
                points.push(p2 + curr_dir * LEAD_IN);
                if let Some(p3) = cap {
                    if end_point.is_none() {
                        end_point = Some(p3);
                        points.push(p3);
                    } else {
                        start_point = Some(p3);
                        points.insert(0, p3);
                    }
                }
            }
        }
    }

    let pair_at = |idx: usize| pairs.iter().find(|(i, _)| *i == idx).map(|(_, pair)| *pair);
    let stub = |pair: [Point2d; 2], node: NodeId, platform: usize| -> RoutingResult<(Vec<Point2d>, Point2d)> {
        let building = graph.building_of(node).ok_or(RoutingError::InvalidEndpoint(node))?;
        Ok(building.path_between(pair[0], pair[1], platform)?)
    };
    let start_pair = pair_at(0);
    let marker = marker.unwrap_or(points.len());

    let points = match (start_pair, pair_at(end_idx)) {
        (start_pair, Some(end_pair)) => {
            let (end_stub, stop) = stub(end_pair, ids[end_idx], platform2)?;
            // The first cap found belongs to the start node when the end is an entrance.
            if start_point.is_none() {
                start_point = end_point.take();
            }
            end_point = Some(stop);
            let at = points.len() / 2;
            let marker = at + end_stub.len() / 2;
            let tail = points.split_off(at);
            points.extend(end_stub);
            points.extend(tail);
            match start_pair {
                Some(start_pair) => {
                    let (start_stub, stop) = stub(start_pair, ids[0], platform1)?;
                    start_point = Some(stop);
                    if is_temp {
                        let s = (start_stub.len() / 2).saturating_sub(1);
                        let points = start_stub.into_iter().chain(points).collect();
                        window(points, s, s + marker + s)
                    } else {
                        points.extend(start_stub);
                        points
                    }
                }
                None if is_temp => window(points, 0, marker + 1),
                None => points,
            }
        }
        (Some(start_pair), None) => {
            let (start_stub, stop) = stub(start_pair, ids[0], platform1)?;
            start_point = Some(stop);
            if is_temp {
                let n = start_stub.len();
                let points = start_stub.into_iter().chain(points).collect();
                window(points, (n / 2).saturating_sub(1), n + marker + 3)
            } else {
                points.extend(start_stub);
                points
            }
        }
        (None, None) if is_temp => window(points, 2, 2 + marker + 2),
        (None, None) => points,
    };

    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => Ok(Geometry {
            start_point: start_point.unwrap_or(*first),
            end_point: end_point.unwrap_or(*last),
            points,
        }),
        _ => Err(RoutingError::DegenerateGeometry(points.len())),
    }
}
