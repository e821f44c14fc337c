use cgmath::MetricSpace;
use ordered_float::OrderedFloat;
use pathfinding::directed::astar::astar;

use crate::error::{RoutingError, RoutingResult};
use crate::graph::RoadGraph;
use crate::NodeId;

/// Finds a path between two nodes and returns it doubled back on itself:
/// the `k` nodes from `from` to `goal`, then the way back without `goal`,
/// `2k - 1` nodes in all.
///
/// Both the step cost and the heuristic are the squared distance between nodes.
pub(crate) fn doubled_path(graph: &RoadGraph, from: NodeId, goal: NodeId) -> RoutingResult<Vec<NodeId>> {
    let goal_pos = graph.node(goal).ok_or(RoutingError::DeadNode(goal))?.pos();
    graph.node(from).ok_or(RoutingError::DeadNode(from))?;
    if from == goal {
        return Err(RoutingError::NoPath { from, to: goal });
    }

    let (forward, _) = astar(
        &from,
        |id| {
            let node = graph.node(*id);
            let pos = node.map(|n| n.pos());
            let links = node.map_or(&[][..], |n| n.links());
            links.iter().filter_map(move |link| {
                let cost = pos?.distance2(graph.node(*link)?.pos());
                Some((*link, OrderedFloat(cost)))
            })
        },
        |id| OrderedFloat(graph.node(*id).map_or(0.0, |n| n.pos().distance2(goal_pos))),
        |id| *id == goal,
    )
    .ok_or(RoutingError::NoPath { from, to: goal })?;

    let mut doubled = forward.clone();
    doubled.extend(forward.iter().rev().skip(1));
    Ok(doubled)
}
