use crate::config::VehicleAttributes;
use crate::graph::RoadGraph;
use crate::math::{heading_from_yaw, slerp_heading, yaw_degrees, Point2d, Vector2d};
use crate::routing::{Route, RouteColor, RouteController, RouteId};
use crate::VehicleId;
use cgmath::prelude::*;
use log::{info, warn};

/// Squared distance from a route's terminal point at which a vehicle has arrived.
const ARRIVAL_DIST_SQ: f64 = 0.015;

/// A vehicle shuttling back and forth along its main route.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    pub(crate) id: VehicleId,
    /// Travel speed in world units per second.
    move_speed: f64,
    /// A multiplier applied to `move_speed`.
    speed_adjust: f64,
    /// Heading interpolation rate, per second.
    rotate_speed: f64,
    /// Time spent stopped at either end of the route, in seconds.
    stop_time: f64,
    /// The world space position of the vehicle.
    pos: Point2d,
    /// A unit vector along the vehicle's heading.
    dir: Vector2d,
    /// The leading index of `pos` on the route being followed.
    idx: usize,
    /// The route the vehicle shuttles along.
    route: Option<RouteId>,
    /// The vehicle's own way back onto `route`, if it strayed from it.
    temp_route: Option<RouteId>,
    /// Whether the vehicle is heading from the start towards the end of its route.
    forward: bool,
    /// The node position the vehicle is heading for.
    destination: Point2d,
    /// Whether the vehicle must re-derive its place on its route.
    should_update: bool,
    can_move: bool,
    /// Remaining stop time in seconds.
    cooldown: f64,
    aborted: bool,
}

impl Vehicle {
    /// Creates a vehicle at the start of a route.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes, route: &Route) -> Self {
        Self {
            id,
            move_speed: attributes.move_speed,
            speed_adjust: 1.0,
            rotate_speed: attributes.rotate_speed,
            stop_time: attributes.stop_time,
            pos: route.start_point(),
            dir: Vector2d::zero(),
            idx: 0,
            route: Some(route.id()),
            temp_route: None,
            forward: true,
            destination: route.end_node_position(),
            should_update: true,
            can_move: true,
            cooldown: 0.0,
            aborted: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The world space position of the vehicle.
    pub fn pos(&self) -> Point2d {
        self.pos
    }

    /// A unit vector along the vehicle's heading, or zero before it first moves.
    pub fn dir(&self) -> Vector2d {
        self.dir
    }

    /// The vehicle's main route.
    pub fn route(&self) -> Option<RouteId> {
        self.route
    }

    /// The temporary route the vehicle is following back to its main route.
    pub fn temp_route(&self) -> Option<RouteId> {
        self.temp_route
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn destination(&self) -> Point2d {
        self.destination
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether the vehicle is moving rather than stopped at a route end.
    pub fn can_move(&self) -> bool {
        self.can_move
    }

    pub fn move_speed(&self) -> f64 {
        self.move_speed
    }

    /// Sets a multiplier on the vehicle's travel speed.
    pub(crate) fn set_speed_adjust(&mut self, factor: f64) {
        self.speed_adjust = factor;
    }

    pub fn speed_adjust(&self) -> f64 {
        self.speed_adjust
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    pub fn set_stop_time(&mut self, seconds: f64) {
        self.stop_time = seconds;
    }

    /// Whether the vehicle will re-derive its position on its next tick.
    pub fn is_update_pending(&self) -> bool {
        self.should_update
    }

    /// Flags the vehicle to re-derive its position on its route on its next tick.
    pub fn update_route(&mut self) {
        self.should_update = true;
    }

    /// Stops the vehicle for the given time.
    pub fn stop(&mut self, seconds: f64) {
        self.can_move = false;
        self.cooldown = seconds;
    }

    /// Halts the vehicle until it is restarted. Returns the temporary route it released.
    #[must_use]
    pub(crate) fn abort(&mut self, reason: &str) -> Option<RouteId> {
        self.aborted = true;
        warn!("Aborted: vehicle {:?}: {}!", self.id, reason);
        self.temp_route.take()
    }

    pub(crate) fn restart(&mut self, message: &str) {
        self.aborted = false;
        info!("Vehicle {:?}: {}", self.id, message);
    }

    /// Binds the vehicle to a new main route. Returns the temporary route it released.
    #[must_use]
    pub(crate) fn set_route(&mut self, route: RouteId) -> Option<RouteId> {
        if self.route == Some(route) {
            return None;
        }
        self.route = Some(route);
        self.update_route();
        self.can_move = true;
        self.aborted = false;
        self.temp_route.take()
    }

    /// Forgets the main route, leaving the vehicle to abort on its next tick.
    pub(crate) fn unbind(&mut self) {
        self.route = None;
    }

    /// Forgets a temporary route removed from under the vehicle.
    pub(crate) fn forget_temp_route(&mut self, id: RouteId) {
        if self.temp_route == Some(id) {
            self.temp_route = None;
            self.update_route();
        }
    }

    /// Advances the vehicle by `dt` seconds.
    pub(crate) fn tick(&mut self, dt: f64, graph: &RoadGraph, routes: &mut RouteController) {
        if self.aborted {
            return;
        }
        let main = match self.route.and_then(|id| routes.get(id)) {
            Some(main) => main,
            None => {
                let released = self.abort("Main route is null");
                self.dispose_temp(routes, released);
                return;
            }
        };
        if main.is_daemon() {
            return;
        }

        if self.should_update {
            self.should_update = false;
            if self.temp_route.is_some() {
                self.find_way(graph, routes);
            } else {
                self.destination = if self.forward {
                    main.end_node_position()
                } else {
                    main.start_node_position()
                };
                match main.contains_point(self.pos) {
                    Some(idx) => self.idx = idx,
                    None => self.find_way(graph, routes),
                }
            }
        }

        if self.can_move {
            self.advance(dt, routes);
        } else {
            self.cooldown -= dt;
            if self.cooldown <= 0.0 {
                self.cooldown = 0.0;
                self.can_move = true;
            }
        }
    }

    /// Builds or rebuilds the temporary route from the vehicle's position to its destination.
    fn find_way(&mut self, graph: &RoadGraph, routes: &mut RouteController) {
        let Some(main_id) = self.route else {
            return;
        };
        let mut from = self.pos;
        if graph.world().is_free(from) {
            if let Some(node) = graph.nearest_node(from).and_then(|id| graph.node(id)) {
                from = node.pos();
            }
        }
        let Some((platform1, platform2)) = routes.get(main_id).map(|r| r.platforms()) else {
            return;
        };

        let built = match self.temp_route {
            None => routes
                .create_route_at(graph, from, self.destination, platform1, platform2, true)
                .map(|id| {
                    self.temp_route = Some(id);
                    id
                }),
            Some(id) => routes.replan_temp(graph, id, from, self.destination).map(|_| id),
        };

        match built.ok().and_then(|id| routes.get_mut(id)) {
            Some(temp) => {
                temp.add_vehicle(self.id);
                temp.set_color(RouteColor::Red);
                self.destination = temp.end_node_position();
                match temp.contains_point(self.pos) {
                    Some(idx) => self.idx = idx,
                    None => (self.pos, self.idx) = temp.closest_point(self.pos),
                }
            }
            None => {
                warn!("Vehicle {:?}: unable to build a temporary route", self.id);
                let released = self.temp_route.take();
                self.dispose_temp(routes, released);
                if let Some(main) = routes.get(main_id) {
                    (self.pos, self.idx) = main.closest_point(self.pos);
                }
            }
        }
    }

    /// Moves the vehicle along its temporary or main route.
    fn advance(&mut self, dt: f64, routes: &mut RouteController) {
        let Some(main) = self.route.and_then(|id| routes.get(id)) else {
            return;
        };
        let temp = self.temp_route.and_then(|id| routes.get(id));
        let mut route = temp.unwrap_or(main);

        let (next, idx) = route.move_point(self.pos, self.move_speed * self.speed_adjust * dt, self.idx);
        self.idx = idx;
        self.dir = slerp_heading(self.dir, next - self.pos, self.rotate_speed * dt);
        self.pos = next;

        let terminal = if self.forward { route.end_point() } else { route.start_point() };
        let reached = next.distance2(terminal) < ARRIVAL_DIST_SQ;

        let mut released = None;
        if temp.is_some() {
            let rejoin = main
                .contains_point(next)
                .or_else(|| reached.then(|| main.closest_point(next).1));
            if let Some(main_idx) = rejoin {
                let half = main.path().len() / 2;
                if (self.forward && main_idx < half) || (!self.forward && main_idx >= half) {
                    route = main;
                    self.idx = main_idx;
                    released = self.temp_route.take();
                }
            }
        }

        if self.temp_route.is_none() && reached {
            if self.destination == route.start_node_position() {
                self.forward = true;
                self.destination = route.end_node_position();
            } else {
                self.forward = false;
                self.destination = route.start_node_position();
            }
            self.init_stop();
        }
        self.dispose_temp(routes, released);
    }

    /// Stops at a route end and squares the heading to the nearest multiple of 45 degrees.
    fn init_stop(&mut self) {
        self.stop(self.stop_time);
        if self.dir != Vector2d::zero() {
            let yaw = (yaw_degrees(self.dir) / 45.0).round() * 45.0;
            self.dir = heading_from_yaw(yaw);
        }
    }

    fn dispose_temp(&self, routes: &mut RouteController, temp: Option<RouteId>) {
        if let Some(id) = temp {
            routes.dispose_temp_route(id);
        }
    }
}
