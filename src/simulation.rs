use crate::building::EntranceLayout;
use crate::config::{RoutingConfig, VehicleAttributes};
#[cfg(feature = "debug")]
use crate::debug::{debug_circle, take_debug_frame};
use crate::error::{GraphError, RoutingError, RoutingResult};
use crate::graph::RoadGraph;
use crate::math::Point2d;
use crate::routing::{Route, RouteController, RouteId};
use crate::vehicle::Vehicle;
use crate::world::Entity;
use crate::{BuildingId, NodeId, SegmentId, VehicleId, VehicleSet};
use log::{debug, warn};
use rand_distr::Distribution;

/// Receives notice of routes built or rebuilt through a [Simulation].
pub trait RouteObserver {
    /// Called with the route's ID and the platform counts of the buildings at
    /// its start and end, zero where an end is not an entrance.
    fn route_built(&mut self, id: RouteId, platform_counts: [usize; 2]);
}

/// A change to an existing route.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RouteEdit {
    /// Rebuilds the route between the nodes at two new positions.
    Rebuild { from: Point2d, to: Point2d },
    /// Keeps the route's endpoints but changes the platforms it uses.
    Platforms { platform1: usize, platform2: usize },
}

/// A road network with routes and the vehicles driving them.
pub struct Simulation {
    /// The road network.
    graph: RoadGraph,
    /// The routes over the network.
    routes: RouteController,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// Notified of routes built through [Simulation::create_route] and [Simulation::edit_route].
    observer: Option<Box<dyn RouteObserver>>,
    /// The current frame of simulation.
    frame: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(&RoutingConfig::default())
    }
}

impl Simulation {
    /// Creates a new simulation.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            graph: RoadGraph::new(config),
            routes: RouteController::new(config),
            vehicles: VehicleSet::with_key(),
            observer: None,
            frame: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Sets the observer notified of built routes.
    pub fn set_observer(&mut self, observer: Box<dyn RouteObserver>) {
        self.observer = Some(observer);
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn routes(&self) -> &RouteController {
        &self.routes
    }

    /// Gets mutable access to the routes, e.g. to toggle drawing.
    pub fn routes_mut(&mut self) -> &mut RouteController {
        &mut self.routes
    }

    /// Gets the route with the given ID.
    pub fn get_route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Returns an iterator over the permanent routes.
    pub fn iter_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.routes()
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> &Vehicle {
        &self.vehicles[vehicle_id]
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Lays a road through the given points. Routes are checked on the next step.
    pub fn build_road(&mut self, points: &[Point2d]) -> Result<Vec<NodeId>, GraphError> {
        let nodes = self.graph.build_road(points)?;
        self.routes.request_rebuild();
        Ok(nodes)
    }

    /// Places an entrance building. Routes are checked on the next step.
    pub fn add_building(&mut self, layout: EntranceLayout) -> Result<BuildingId, GraphError> {
        let id = self.graph.add_building(layout)?;
        self.routes.request_rebuild();
        Ok(id)
    }

    /// Removes an entrance building and its node.
    pub fn remove_building(&mut self, id: BuildingId) -> bool {
        self.edited(|graph| graph.remove_building(id))
    }

    /// Removes a road segment along with any node it leaves redundant.
    pub fn remove_segment(&mut self, id: SegmentId) -> bool {
        self.edited(|graph| graph.remove_segment(id))
    }

    /// Removes a road node and its segments.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        self.edited(|graph| graph.remove_node(id))
    }

    /// Unlinks two road nodes, leaving their segment in place.
    pub fn remove_link(&mut self, a: NodeId, b: NodeId) -> bool {
        self.edited(|graph| graph.remove_link(a, b))
    }

    /// Links two road nodes.
    pub fn add_link(&mut self, a: NodeId, b: NodeId) -> bool {
        self.edited(|graph| graph.add_link(a, b))
    }

    /// Applies an edit to the road graph and requests a route check if it changed anything.
    fn edited(&mut self, edit: impl FnOnce(&mut RoadGraph) -> bool) -> bool {
        let changed = edit(&mut self.graph);
        if changed {
            self.routes.request_rebuild();
        }
        changed
    }

    /// Finds the route endpoint at a position: an entrance node, or a road node at the end of a road.
    fn endpoint_at(&self, pos: Point2d) -> RoutingResult<NodeId> {
        let cell = self.graph.world().snap(pos).ok_or(RoutingError::NodeNotFound(pos))?;
        let id = match self.graph.world().entity_at(cell) {
            Some(Entity::Node(id)) => id,
            Some(Entity::Building(id)) => self
                .graph
                .building(id)
                .map(|building| building.node())
                .ok_or(RoutingError::NodeNotFound(cell))?,
            _ => return Err(RoutingError::NodeNotFound(cell)),
        };
        let node = self.graph.node(id).ok_or(RoutingError::DeadNode(id))?;
        if node.is_entrance() || node.link_count() == 1 {
            Ok(id)
        } else {
            Err(RoutingError::InvalidEndpoint(id))
        }
    }

    fn notify_built(&mut self, id: RouteId) {
        let Some(route) = self.routes.get(id) else {
            return;
        };
        let platforms = |node: NodeId| self.graph.building_of(node).map_or(0, |b| b.platforms_count());
        let counts = [platforms(route.start_node()), platforms(route.end_node())];
        if let Some(observer) = self.observer.as_mut() {
            observer.route_built(id, counts);
        }
    }

    /// Creates a route between the road ends or entrances at two positions, using the first platforms.
    pub fn create_route(&mut self, from: Point2d, to: Point2d) -> RoutingResult<RouteId> {
        let result = self
            .endpoint_at(from)
            .and_then(|from| Ok((from, self.endpoint_at(to)?)))
            .and_then(|(from, to)| self.routes.create_route(&self.graph, from, to, 0, 0, false));
        match result {
            Ok(id) => {
                self.notify_built(id);
                Ok(id)
            }
            Err(err) => {
                warn!("Failed to create a route: {}", err);
                Err(err)
            }
        }
    }

    /// Changes the endpoints or platforms of an existing route.
    pub fn edit_route(&mut self, id: RouteId, edit: RouteEdit) -> RoutingResult<()> {
        let route = self.routes.get(id).ok_or(RoutingError::RouteNotFound(id))?;
        let (from, to, platform1, platform2, notify) = match edit {
            RouteEdit::Rebuild { from, to } => {
                let (from, to) = (self.endpoint_at(from)?, self.endpoint_at(to)?);
                if route.start_node() == from && route.end_node() == to {
                    debug!("Route {} already joins these nodes", id);
                    return Ok(());
                }
                (from, to, 0, 0, true)
            }
            RouteEdit::Platforms { platform1, platform2 } => {
                (route.start_node(), route.end_node(), platform1, platform2, false)
            }
        };

        let result = match self.routes.get_mut(id) {
            Some(route) => route.set(&self.graph, &mut self.vehicles, from, to, platform1, platform2, false),
            None => Err(RoutingError::RouteNotFound(id)),
        };
        match result {
            Ok(()) if notify => self.notify_built(id),
            Ok(()) => {}
            Err(ref err) => warn!("Failed to set the route {}: {}", id, err),
        }
        result
    }

    /// Removes a route. Its vehicles are aborted.
    pub fn remove_route(&mut self, id: RouteId) -> bool {
        self.routes.remove_route(id, &mut self.vehicles).is_some()
    }

    /// Moves every vehicle of one route onto another.
    pub fn reassign_vehicles(&mut self, from: RouteId, to: RouteId) -> RoutingResult<()> {
        self.routes.reassign_vehicles(from, to, &mut self.vehicles)
    }

    /// Adds a vehicle at the start of a permanent route.
    pub fn spawn_vehicle(&mut self, route: RouteId, attributes: &VehicleAttributes) -> RoutingResult<VehicleId> {
        let main = match self.routes.get(route) {
            Some(main) if !main.is_temp() => main,
            _ => return Err(RoutingError::RouteNotFound(route)),
        };
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, main));
        if let Some(main) = self.routes.get_mut(route) {
            main.add_vehicle(id);
        }
        Ok(id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, id: VehicleId) {
        let Some(vehicle) = self.vehicles.remove(id) else {
            return;
        };
        if let Some(route) = vehicle.route().and_then(|route| self.routes.get_mut(route)) {
            route.remove_vehicle(id);
        }
        if let Some(temp) = vehicle.temp_route() {
            self.routes.dispose_temp_route(temp);
        }
    }

    /// Randomly assigns a speed adjustment factor to each vehicle,
    /// which is sampled from a normal distribution with a mean of 1 (no adjustment)
    /// and standard deviation of `stddev`.
    pub fn randomise_speeds(&mut self, stddev: f64) {
        let mut rand = rand::thread_rng();
        let distr = rand_distr::Normal::new(1.0, stddev).expect("Invalid standard deviation");
        for (_, vehicle) in &mut self.vehicles {
            let factor = distr.sample(&mut rand).clamp(0.75, 1.25);
            vehicle.set_speed_adjust(factor);
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.routes.tick(&self.graph, &mut self.vehicles);
        for (_, vehicle) in &mut self.vehicles {
            vehicle.tick(dt, &self.graph, &mut self.routes);
        }
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.routes.display_routes();
            for vehicle in self.vehicles.values() {
                debug_circle("vehicle", vehicle.pos(), 0.1 * self.graph.cell_size());
            }
            self.debug = take_debug_frame();
        }
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    #[derive(Default)]
    struct Recorder(Rc<RefCell<Vec<(RouteId, [usize; 2])>>>);

    impl RouteObserver for Recorder {
        fn route_built(&mut self, id: RouteId, platform_counts: [usize; 2]) {
            self.0.borrow_mut().push((id, platform_counts));
        }
    }

    #[test]
    fn create_route_reports_to_the_observer() {
        let mut sim = Simulation::default();
        let built = Rc::new(RefCell::new(vec![]));
        sim.set_observer(Box::new(Recorder(built.clone())));
        sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
        assert_eq!(*built.borrow(), vec![(id, [0, 0])]);
    }

    #[test]
    fn endpoints_must_be_road_ends() {
        let mut sim = Simulation::default();
        let seq = sim.build_road(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)]).unwrap();
        assert_eq!(
            sim.create_route(p(4.5, 0.5), p(0.5, 0.5)),
            Err(RoutingError::InvalidEndpoint(seq[1]))
        );
        assert_eq!(
            sim.create_route(p(2.5, 0.5), p(0.5, 0.5)),
            Err(RoutingError::NodeNotFound(p(2.5, 0.5)))
        );
        assert!(sim.create_route(p(0.5, 0.5), p(4.5, 4.5)).is_ok());
    }

    #[test]
    fn edit_route_changes_endpoints_and_platforms() {
        let mut sim = Simulation::default();
        sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        let far = sim.build_road(&[p(0.0, 6.0), p(6.0, 6.0)]).unwrap();
        let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
        let before = sim.get_route(id).unwrap().path().clone();

        // Same endpoints: nothing to do.
        sim.edit_route(id, RouteEdit::Rebuild { from: p(0.5, 0.5), to: p(6.5, 0.5) })
            .unwrap();
        assert_eq!(sim.get_route(id).unwrap().path(), &before);

        // No path between the roads: the route keeps its old geometry.
        assert!(sim
            .edit_route(id, RouteEdit::Rebuild { from: p(0.5, 0.5), to: p(6.5, 6.5) })
            .is_err());
        assert_eq!(sim.get_route(id).unwrap().path(), &before);

        sim.edit_route(id, RouteEdit::Rebuild { from: p(0.5, 6.5), to: p(6.5, 6.5) })
            .unwrap();
        assert_eq!(sim.get_route(id).unwrap().end_node(), far[1]);

        sim.edit_route(id, RouteEdit::Platforms { platform1: 0, platform2: 0 })
            .unwrap();
        assert_eq!(sim.get_route(id).unwrap().platforms(), (0, 0));
    }

    #[test]
    fn randomised_speeds_stay_in_range() {
        let mut sim = Simulation::default();
        sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
        for _ in 0..20 {
            sim.spawn_vehicle(id, &VehicleAttributes::default()).unwrap();
        }
        sim.randomise_speeds(0.5);
        assert!(sim
            .iter_vehicles()
            .all(|v| (0.75..=1.25).contains(&v.speed_adjust())));
    }

    #[test]
    fn removed_vehicles_leave_their_route() {
        let mut sim = Simulation::default();
        sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
        let vehicle = sim.spawn_vehicle(id, &VehicleAttributes::default()).unwrap();
        assert!(sim.get_route(id).unwrap().contains_vehicle(vehicle));
        sim.remove_vehicle(vehicle);
        assert_eq!(sim.get_route(id).unwrap().vehicle_count(), 0);
        assert_eq!(sim.iter_vehicles().count(), 0);
    }
}
