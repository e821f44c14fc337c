use std::collections::BTreeMap;

use log::{debug, warn};

use super::route::{resolve_endpoints, Plan};
use super::{Route, RouteId};
use crate::config::RoutingConfig;
use crate::error::{RoutingError, RoutingResult};
use crate::graph::RoadGraph;
use crate::math::Point2d;
use crate::{NodeId, VehicleSet};

/// Owns every route and keeps them consistent with the road graph.
///
/// Routes are swept every few ticks, or on the next tick once a rebuild is requested.
/// Broken permanent routes are rebuilt where a path remains, and otherwise become
/// daemons until the graph is repaired.
#[derive(Clone, Debug)]
pub struct RouteController {
    routes: BTreeMap<RouteId, Route>,
    /// The last route ID handed out.
    last_id: u16,
    /// Whether every route must be checked on the next tick.
    rebuild_all: bool,
    /// Ticks since the last sweep.
    frame: u32,
    sweep_interval: u32,
    /// Whether to draw every route, not just the ones flagged for drawing.
    draw_all: bool,
}

impl RouteController {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            routes: BTreeMap::new(),
            last_id: 0,
            rebuild_all: false,
            frame: 0,
            sweep_interval: config.sweep_interval,
            draw_all: false,
        }
    }

    /// Builds a route between two nodes and registers it.
    pub fn create_route(
        &mut self,
        graph: &RoadGraph,
        from: NodeId,
        to: NodeId,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<RouteId> {
        let plan = Plan::new(graph, from, to, platform1, platform2, is_temp)?;
        Ok(self.register(plan))
    }

    /// Builds a route between the nodes at two world positions and registers it.
    pub fn create_route_at(
        &mut self,
        graph: &RoadGraph,
        from: Point2d,
        to: Point2d,
        platform1: usize,
        platform2: usize,
        is_temp: bool,
    ) -> RoutingResult<RouteId> {
        let plan = Plan::at(graph, from, to, platform1, platform2, is_temp)?;
        Ok(self.register(plan))
    }

    fn register(&mut self, plan: Plan) -> RouteId {
        let id = self.next_id();
        self.routes.insert(id, Route::new(id, plan));
        debug!("Registered route {}", id);
        id
    }

    fn next_id(&mut self) -> RouteId {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            let id = RouteId(self.last_id);
            if !self.routes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Re-plans a temporary route between two world positions, keeping its platforms.
    /// Used by the route's own vehicle, so no vehicles are notified.
    pub(crate) fn replan_temp(
        &mut self,
        graph: &RoadGraph,
        id: RouteId,
        from: Point2d,
        to: Point2d,
    ) -> RoutingResult<()> {
        let route = self.routes.get_mut(&id).ok_or(RoutingError::RouteNotFound(id))?;
        let (platform1, platform2) = route.platforms();
        route.replace(Plan::at(graph, from, to, platform1, platform2, true)?);
        Ok(())
    }

    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub fn get_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.routes.get_mut(&id)
    }

    /// Iterates over the permanent routes.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().filter(|route| !route.is_temp())
    }

    /// The number of registered routes, temporary ones included.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Checks every route on the next tick.
    pub fn request_rebuild(&mut self) {
        self.rebuild_all = true;
    }

    pub fn draw_all(&self) -> bool {
        self.draw_all
    }

    pub fn set_draw_all(&mut self, draw_all: bool) {
        self.draw_all = draw_all;
    }

    /// Unregisters a route. The vehicles of a permanent route are aborted and
    /// unbound; the vehicle of a temporary route falls back to its main route.
    pub fn remove_route(&mut self, id: RouteId, vehicles: &mut VehicleSet) -> Option<Route> {
        let mut route = self.routes.remove(&id)?;
        if route.is_temp() {
            for vehicle in route.vehicles() {
                if let Some(vehicle) = vehicles.get_mut(vehicle) {
                    vehicle.forget_temp_route(id);
                }
            }
        } else {
            for temp in route.remove_all_vehicles(vehicles) {
                self.dispose_temp_route(temp);
            }
        }
        debug!("Removed route {}", id);
        Some(route)
    }

    /// Drops a temporary route its vehicle has finished with.
    /// Permanent routes are left alone. Callers must already have released the
    /// route from its vehicle; [RouteController::remove_route] does both.
    pub(crate) fn dispose_temp_route(&mut self, id: RouteId) -> bool {
        match self.routes.get(&id) {
            Some(route) if route.is_temp() => {
                self.routes.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Moves every vehicle of one permanent route onto another.
    pub fn reassign_vehicles(&mut self, from: RouteId, to: RouteId, vehicles: &mut VehicleSet) -> RoutingResult<()> {
        for id in [from, to] {
            match self.routes.get(&id) {
                Some(route) if !route.is_temp() => {}
                _ => return Err(RoutingError::RouteNotFound(id)),
            }
        }
        if from == to {
            return Ok(());
        }
        let moved = self
            .routes
            .get_mut(&from)
            .map(|route| route.take_vehicles())
            .unwrap_or_default();
        let mut released = vec![];
        for id in moved {
            if let Some(vehicle) = vehicles.get_mut(id) {
                released.extend(vehicle.set_route(to));
                if let Some(route) = self.routes.get_mut(&to) {
                    route.add_vehicle(id);
                }
            }
        }
        for temp in released {
            self.dispose_temp_route(temp);
        }
        Ok(())
    }

    /// Advances the controller by one tick, sweeping the routes when due.
    pub fn tick(&mut self, graph: &RoadGraph, vehicles: &mut VehicleSet) {
        self.frame += 1;
        if self.rebuild_all || self.frame >= self.sweep_interval {
            self.frame = 0;
            self.sweep(graph, vehicles);
        }
    }

    /// Checks every route against the road graph, rebuilding or retiring broken ones.
    fn sweep(&mut self, graph: &RoadGraph, vehicles: &mut VehicleSet) {
        let rebuild_all = std::mem::take(&mut self.rebuild_all);
        debug!("Sweeping {} routes (rebuild all: {})", self.routes.len(), rebuild_all);
        let mut released = vec![];

        for route in self.routes.values_mut() {
            if route.is_daemon() {
                released.extend(try_repair(route, graph, vehicles));
                continue;
            }
            if !rebuild_all && route.is_intact(graph) {
                continue;
            }
            if route.is_temp() {
                let end_dead = graph.node(route.end_node()).map_or(true, |node| node.link_count() == 0);
                if end_dead {
                    warn!("Temporary route {} leads to a dead node, skipping", route.id());
                    continue;
                }
                for id in route.vehicles() {
                    if let Some(vehicle) = vehicles.get_mut(id) {
                        vehicle.update_route();
                    }
                }
                continue;
            }

            let has_links = |id: NodeId| graph.node(id).map_or(false, |node| node.link_count() >= 1);
            if has_links(route.start_node()) && has_links(route.end_node()) {
                let (platform1, platform2) = route.platforms();
                let (from, to) = (route.start_node(), route.end_node());
                match route.set(graph, vehicles, from, to, platform1, platform2, false) {
                    Ok(()) => debug!("Rebuilt route {}", route.id()),
                    Err(err) => {
                        debug!("Route {} could not be rebuilt: {}", route.id(), err);
                        released.extend(route.set_daemon(true, vehicles));
                    }
                }
            } else {
                released.extend(try_repair(route, graph, vehicles));
            }
        }

        for temp in released {
            self.dispose_temp_route(temp);
        }
    }

    /// Draws every drawable route into the debug frame.
    #[cfg(feature = "debug")]
    pub fn display_routes(&self) {
        use crate::debug::debug_route;
        use crate::routing::RouteColor;

        for route in self.routes.values() {
            if route.is_daemon() || !(self.draw_all || route.draw()) {
                continue;
            }
            let color = match route.color() {
                RouteColor::White => "white",
                RouteColor::Red => "red",
            };
            debug_route(route.path().points(), route.path().is_closed(), color);
        }
    }
}

/// Tries to rebuild a route between the nodes found at its last known endpoint positions.
/// The route becomes a daemon if that fails, and stops being one if it succeeds.
/// Returns the temporary routes released by aborted vehicles.
fn try_repair(route: &mut Route, graph: &RoadGraph, vehicles: &mut VehicleSet) -> Vec<RouteId> {
    let endpoint = |id: NodeId| {
        graph
            .node(id)
            .map_or(false, |node| node.is_entrance() || node.link_count() == 1)
    };
    let resolved = resolve_endpoints(graph, route.start_node_position(), route.end_node_position())
        .ok()
        .filter(|(from, to)| endpoint(*from) && endpoint(*to));
    let Some((from, to)) = resolved else {
        return route.set_daemon(true, vehicles);
    };
    let (platform1, platform2) = route.platforms();
    match route.set(graph, vehicles, from, to, platform1, platform2, false) {
        Ok(()) => {
            debug!("Repaired route {}", route.id());
            route.set_daemon(false, vehicles)
        }
        Err(_) => route.set_daemon(true, vehicles),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::VehicleAttributes;
    use crate::vehicle::Vehicle;
    use crate::VehicleId;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    fn setup() -> (RoadGraph, RouteController, Vec<NodeId>) {
        let config = RoutingConfig { sweep_interval: 5, ..Default::default() };
        let mut graph = RoadGraph::new(&config);
        let seq = graph.build_road(&[p(0.0, 0.0), p(8.0, 0.0)]).unwrap();
        (graph, RouteController::new(&config), seq)
    }

    fn spawn(routes: &mut RouteController, vehicles: &mut VehicleSet, route: RouteId) -> VehicleId {
        let attributes = VehicleAttributes::default();
        let main = routes.get(route).unwrap();
        let id = vehicles.insert_with_key(|id| Vehicle::new(id, &attributes, main));
        routes.get_mut(route).unwrap().add_vehicle(id);
        id
    }

    #[test]
    fn ids_count_up_from_one() {
        let (graph, mut routes, seq) = setup();
        let a = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let b = routes.create_route(&graph, seq[1], seq[0], 0, 0, false).unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));
        assert_eq!(a.to_string(), "#1");
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn create_at_resolves_positions() {
        let (graph, mut routes, seq) = setup();
        let id = routes.create_route_at(&graph, p(0.5, 0.5), p(8.2, 0.9), 0, 0, false).unwrap();
        let route = routes.get(id).unwrap();
        assert_eq!((route.start_node(), route.end_node()), (seq[0], seq[1]));
        assert_eq!(route.nodes().len(), 3);

        assert_eq!(
            routes.create_route_at(&graph, p(0.2, 0.2), p(0.7, 0.7), 0, 0, false),
            Err(RoutingError::SameEndpoints)
        );
        assert_eq!(
            routes.create_route_at(&graph, p(0.5, 0.5), p(0.5, 5.5), 0, 0, false),
            Err(RoutingError::NodeNotFound(p(0.5, 5.5)))
        );
    }

    #[test]
    fn sweeps_on_the_interval_or_when_requested() {
        let (mut graph, mut routes, seq) = setup();
        let mut vehicles = VehicleSet::with_key();
        let id = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        graph.remove_link(seq[0], seq[1]);
        for _ in 0..4 {
            routes.tick(&graph, &mut vehicles);
        }
        assert!(!routes.get(id).unwrap().is_daemon());
        routes.tick(&graph, &mut vehicles);
        assert!(routes.get(id).unwrap().is_daemon());

        graph.add_link(seq[0], seq[1]);
        routes.request_rebuild();
        routes.tick(&graph, &mut vehicles);
        assert!(!routes.get(id).unwrap().is_daemon());
    }

    #[test]
    fn daemon_aborts_and_repair_restarts_vehicles() {
        let (mut graph, mut routes, seq) = setup();
        let mut vehicles = VehicleSet::with_key();
        let id = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let vehicle = spawn(&mut routes, &mut vehicles, id);

        graph.remove_link(seq[0], seq[1]);
        routes.request_rebuild();
        routes.tick(&graph, &mut vehicles);
        assert!(routes.get(id).unwrap().is_daemon());
        assert!(vehicles[vehicle].is_aborted());

        graph.add_link(seq[0], seq[1]);
        routes.request_rebuild();
        routes.tick(&graph, &mut vehicles);
        assert!(!routes.get(id).unwrap().is_daemon());
        assert!(!vehicles[vehicle].is_aborted());
    }

    #[test]
    fn rebuild_keeps_vehicles_and_flags_them() {
        let (graph, mut routes, seq) = setup();
        let mut vehicles = VehicleSet::with_key();
        let id = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let vehicle = spawn(&mut routes, &mut vehicles, id);
        routes.request_rebuild();
        routes.tick(&graph, &mut vehicles);
        let route = routes.get(id).unwrap();
        assert!(route.contains_vehicle(vehicle));
        assert!(!route.is_daemon());
        assert!(vehicles[vehicle].is_update_pending());
    }

    #[test]
    fn removing_a_route_unbinds_its_vehicles() {
        let (graph, mut routes, seq) = setup();
        let mut vehicles = VehicleSet::with_key();
        let id = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let vehicle = spawn(&mut routes, &mut vehicles, id);
        let removed = routes.remove_route(id, &mut vehicles).unwrap();
        assert_eq!(removed.vehicle_count(), 0);
        assert!(vehicles[vehicle].is_aborted());
        assert_eq!(vehicles[vehicle].route(), None);
        assert!(routes.is_empty());
    }

    #[test]
    fn temp_routes_are_hidden_and_disposable() {
        let (graph, mut routes, seq) = setup();
        let main = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let temp = routes.create_route(&graph, seq[0], seq[1], 0, 0, true).unwrap();
        assert_eq!(routes.routes().map(|r| r.id()).collect::<Vec<_>>(), vec![main]);
        assert!(!routes.dispose_temp_route(main));
        assert!(routes.dispose_temp_route(temp));
        assert_eq!(routes.len(), 1);
    }

    /// A road with a corner at (4.5, 0.5), carrying a permanent route and a
    /// temporary route over the same nodes. The vehicle rides both.
    fn corner_with_temp_route() -> (RoadGraph, RouteController, VehicleSet, Vec<NodeId>, RouteId, VehicleId) {
        let config = RoutingConfig { sweep_interval: 5, ..Default::default() };
        let mut graph = RoadGraph::new(&config);
        let seq = graph.build_road(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)]).unwrap();
        let mut routes = RouteController::new(&config);
        let mut vehicles = VehicleSet::with_key();
        let main = routes.create_route(&graph, seq[0], seq[2], 0, 0, false).unwrap();
        let temp = routes.create_route(&graph, seq[0], seq[2], 0, 0, true).unwrap();
        let vehicle = spawn(&mut routes, &mut vehicles, main);
        routes.get_mut(temp).unwrap().add_vehicle(vehicle);
        vehicles[vehicle].tick(0.0, &graph, &mut routes);
        assert!(!vehicles[vehicle].is_update_pending());
        (graph, routes, vehicles, seq, temp, vehicle)
    }

    #[test]
    fn broken_temp_route_flags_its_vehicle() {
        let (mut graph, mut routes, mut vehicles, seq, temp, vehicle) = corner_with_temp_route();
        assert!(graph.remove_link(seq[0], seq[1]));
        for _ in 0..5 {
            routes.tick(&graph, &mut vehicles);
        }
        let route = routes.get(temp).unwrap();
        assert!(!route.is_daemon());
        assert!(route.contains_vehicle(vehicle));
        assert!(vehicles[vehicle].is_update_pending());
    }

    #[test]
    fn temp_route_to_a_dead_node_is_skipped() {
        let (mut graph, mut routes, mut vehicles, seq, temp, vehicle) = corner_with_temp_route();
        let nodes = routes.get(temp).unwrap().nodes().to_vec();
        assert!(graph.remove_node(seq[2]));
        for _ in 0..5 {
            routes.tick(&graph, &mut vehicles);
        }
        assert_eq!(routes.get(temp).unwrap().nodes(), nodes.as_slice());
        assert!(!vehicles[vehicle].is_update_pending());
    }

    #[test]
    fn temp_route_to_an_isolated_node_is_skipped() {
        let (mut graph, mut routes, mut vehicles, seq, temp, vehicle) = corner_with_temp_route();
        assert!(graph.remove_link(seq[1], seq[2]));
        assert!(graph.is_alive(seq[2]));
        routes.request_rebuild();
        routes.tick(&graph, &mut vehicles);
        assert!(routes.get(temp).is_some());
        assert!(!vehicles[vehicle].is_update_pending());
    }

    #[test]
    fn reassigns_vehicles_between_routes() {
        let (graph, mut routes, seq) = setup();
        let mut vehicles = VehicleSet::with_key();
        let a = routes.create_route(&graph, seq[0], seq[1], 0, 0, false).unwrap();
        let b = routes.create_route(&graph, seq[1], seq[0], 0, 0, false).unwrap();
        let vehicle = spawn(&mut routes, &mut vehicles, a);
        routes.reassign_vehicles(a, b, &mut vehicles).unwrap();
        assert_eq!(routes.get(a).unwrap().vehicle_count(), 0);
        assert!(routes.get(b).unwrap().contains_vehicle(vehicle));
        assert_eq!(vehicles[vehicle].route(), Some(b));
    }
}
