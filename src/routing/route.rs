use std::collections::BTreeSet;

use itertools::Itertools;

use super::geometry::lane_points;
use super::search::doubled_path;
use super::{Path, RouteId};
use crate::error::{RoutingError, RoutingResult};
use crate::graph::RoadGraph;
use crate::math::{Point2d, Vector2d};
use crate::{NodeId, VehicleId, VehicleSet};

/// The colour a route is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RouteColor {
    #[default]
    White,
    Red,
}

/// Everything a successful search and layout produces, applied to a route at once.
#[derive(Clone, Debug)]
pub(crate) struct Plan {
    start_node: NodeId,
    end_node: NodeId,
    start_node_pos: Point2d,
    end_node_pos: Point2d,
    nodes: Vec<NodeId>,
    path: Path,
    start_point: Point2d,
    end_point: Point2d,
    platforms: (usize, usize),
    is_temp: bool,
}

impl Plan {
    /// Searches for a path between two nodes and lays out its lanes.
    pub fn new(
        graph: &RoadGraph,
        from: NodeId,
        to: NodeId,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<Self> {
        if from == to {
            return Err(RoutingError::SameEndpoints);
        }
        let start_node_pos = graph.node(from).ok_or(RoutingError::DeadNode(from))?.pos();
        let end_node_pos = graph.node(to).ok_or(RoutingError::DeadNode(to))?.pos();
        let nodes = doubled_path(graph, from, to)?;
        let geometry = lane_points(graph, &nodes, platform1, platform2, is_temp)?;
        Ok(Self {
            start_node: from,
            end_node: to,
            start_node_pos,
            end_node_pos,
            nodes,
            path: Path::new(geometry.points, !is_temp),
            start_point: geometry.start_point,
            end_point: geometry.end_point,
            platforms: (platform1, platform2),
            is_temp,
        })
    }

    /// Like [Plan::new], with the endpoints given as world positions.
    pub fn at(
        graph: &RoadGraph,
        from: Point2d,
        to: Point2d,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<Self> {
        let (from, to) = resolve_endpoints(graph, from, to)?;
        Self::new(graph, from, to, platform1, platform2, is_temp)
    }
}

/// Resolves two world positions to the nodes on their cells.
pub(crate) fn resolve_endpoints(graph: &RoadGraph, from: Point2d, to: Point2d) -> RoutingResult<(NodeId, NodeId)> {
    let world = graph.world();
    let from = world.snap(from).ok_or(RoutingError::NodeNotFound(from))?;
    let to = world.snap(to).ok_or(RoutingError::NodeNotFound(to))?;
    if from == to {
        return Err(RoutingError::SameEndpoints);
    }
    let from = graph.node_at(from).ok_or(RoutingError::NodeNotFound(from))?;
    let to = graph.node_at(to).ok_or(RoutingError::NodeNotFound(to))?;
    Ok((from, to))
}

/// A closed lane loop between two road nodes that vehicles shuttle along,
/// or a one-way temporary route taking a single vehicle back onto its main route.
#[derive(Clone, Debug)]
pub struct Route {
    id: RouteId,
    plan: Plan,
    is_daemon: bool,
    vehicles: BTreeSet<VehicleId>,
    color: RouteColor,
    draw: bool,
}

impl Route {
    pub(crate) fn new(id: RouteId, plan: Plan) -> Self {
        Self {
            id,
            plan,
            is_daemon: false,
            vehicles: BTreeSet::new(),
            color: RouteColor::White,
            draw: false,
        }
    }

    /// Gets the route ID.
    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn start_node(&self) -> NodeId {
        self.plan.start_node
    }

    pub fn end_node(&self) -> NodeId {
        self.plan.end_node
    }

    /// The position of the start node when the route was last built.
    pub fn start_node_position(&self) -> Point2d {
        self.plan.start_node_pos
    }

    /// The position of the end node when the route was last built.
    pub fn end_node_position(&self) -> Point2d {
        self.plan.end_node_pos
    }

    /// Where vehicles stop when travelling back towards the start.
    pub fn start_point(&self) -> Point2d {
        self.plan.start_point
    }

    /// Where vehicles stop when travelling towards the end.
    pub fn end_point(&self) -> Point2d {
        self.plan.end_point
    }

    /// The platforms used at the start and end buildings.
    pub fn platforms(&self) -> (usize, usize) {
        self.plan.platforms
    }

    pub fn path(&self) -> &Path {
        &self.plan.path
    }

    /// The node sequence from start to end and back to start.
    pub fn nodes(&self) -> &[NodeId] {
        &self.plan.nodes
    }

    /// Whether this is a single vehicle's way back onto its main route.
    pub fn is_temp(&self) -> bool {
        self.plan.is_temp
    }

    /// Whether the route is broken and waiting for the road graph to be repaired.
    pub fn is_daemon(&self) -> bool {
        self.is_daemon
    }

    pub fn color(&self) -> RouteColor {
        self.color
    }

    pub fn set_color(&mut self, color: RouteColor) {
        self.color = color;
    }

    /// Whether the route is drawn in the diagnostics frame.
    pub fn draw(&self) -> bool {
        self.draw
    }

    pub fn set_draw(&mut self, draw: bool) {
        self.draw = draw;
    }

    /// Rebuilds the route between two nodes, then flags every attached vehicle
    /// to re-derive its position. On failure the route is left untouched.
    pub fn set(
        &mut self,
        graph: &RoadGraph,
        vehicles: &mut VehicleSet,
        from: NodeId,
        to: NodeId,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<()> {
        self.replace(Plan::new(graph, from, to, platform1, platform2, is_temp)?);
        self.notify_vehicles(vehicles);
        Ok(())
    }

    /// Like [Route::set], with the endpoints given as world positions.
    pub fn set_at(
        &mut self,
        graph: &RoadGraph,
        vehicles: &mut VehicleSet,
        from: Point2d,
        to: Point2d,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<()> {
        self.replace(Plan::at(graph, from, to, platform1, platform2, is_temp)?);
        self.notify_vehicles(vehicles);
        Ok(())
    }

    /// Swaps in a new plan without notifying vehicles.
    pub(crate) fn replace(&mut self, plan: Plan) {
        if plan.is_temp {
            self.is_daemon = false;
        }
        self.plan = plan;
    }

    fn notify_vehicles(&self, vehicles: &mut VehicleSet) {
        for id in &self.vehicles {
            if let Some(vehicle) = vehicles.get_mut(*id) {
                vehicle.update_route();
            }
        }
    }

    /// Whether every road the route follows still exists.
    ///
    /// Permanent routes check their outbound half; temporary routes check every step.
    pub fn is_intact(&self, graph: &RoadGraph) -> bool {
        let nodes = &self.plan.nodes;
        let steps = if self.is_temp() {
            nodes.len().saturating_sub(1)
        } else {
            nodes.len() / 2
        };
        let linked = |id: NodeId| graph.node(id).map_or(false, |n| n.link_count() >= 1);
        nodes
            .iter()
            .tuple_windows()
            .take(steps)
            .all(|(a, b)| linked(*a) && linked(*b) && graph.contains_link(*a, *b))
    }

    /// Marks the route as broken or repaired. Vehicles are aborted on entering the
    /// daemon state and restarted on leaving it. Returns the temporary routes the
    /// aborted vehicles released. Temporary routes never become daemons.
    pub fn set_daemon(&mut self, daemon: bool, vehicles: &mut VehicleSet) -> Vec<RouteId> {
        if self.is_temp() || daemon == self.is_daemon {
            return vec![];
        }
        self.is_daemon = daemon;
        let mut released = vec![];
        for id in &self.vehicles {
            if let Some(vehicle) = vehicles.get_mut(*id) {
                if daemon {
                    released.extend(vehicle.abort("The route of this vehicle is daemon."));
                } else {
                    vehicle.restart("The route of this vehicle was rebuilt.");
                }
            }
        }
        released
    }

    /// If `point` lies on the route, returns its leading index.
    pub fn contains_point(&self, point: Point2d) -> Option<usize> {
        self.plan.path.contains(point)
    }

    /// Finds the closest point on the route and its leading index.
    pub fn closest_point(&self, point: Point2d) -> (Point2d, usize) {
        self.plan.path.closest_point(point)
    }

    /// Advances a point along the route. See [Path::move_point].
    pub fn move_point(&self, from: Point2d, distance: f64, known: usize) -> (Point2d, usize) {
        self.plan.path.move_point(from, distance, known)
    }

    /// The heading at a point on the route.
    pub fn rotation_at(&self, point: Point2d, known: usize) -> Vector2d {
        self.plan.path.rotation_at(point, known)
    }

    /// The vehicles travelling on this route.
    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.iter().copied()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn contains_vehicle(&self, id: VehicleId) -> bool {
        self.vehicles.contains(&id)
    }

    pub(crate) fn add_vehicle(&mut self, id: VehicleId) {
        self.vehicles.insert(id);
    }

    pub(crate) fn remove_vehicle(&mut self, id: VehicleId) -> bool {
        self.vehicles.remove(&id)
    }

    /// Detaches and aborts every vehicle of a permanent route.
    /// Returns the temporary routes the vehicles released.
    pub(crate) fn remove_all_vehicles(&mut self, vehicles: &mut VehicleSet) -> Vec<RouteId> {
        if self.is_temp() {
            return vec![];
        }
        let mut released = vec![];
        for id in std::mem::take(&mut self.vehicles) {
            if let Some(vehicle) = vehicles.get_mut(id) {
                released.extend(vehicle.abort("Removed from the main route."));
                vehicle.unbind();
            }
        }
        released
    }

    /// Detaches every vehicle, leaving the caller to attach them elsewhere.
    pub(crate) fn take_vehicles(&mut self) -> BTreeSet<VehicleId> {
        std::mem::take(&mut self.vehicles)
    }
}
