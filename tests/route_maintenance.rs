//! Tests that routes follow edits to the road network.

use road_routing::{
    math::Point2d, NodeId, RoadGraph, RouteController, RoutingConfig, RoutingError, Simulation,
    VehicleAttributes,
};

fn p(x: f64, y: f64) -> Point2d {
    Point2d::new(x, y)
}

/// A straight road from (0.5, 0.5) to (8.5, 0.5) with a detour to the north
/// between (2.5, 0.5) and (6.5, 0.5).
fn detour() -> (Simulation, NodeId, NodeId, NodeId) {
    let mut sim = Simulation::default();
    sim.build_road(&[p(0.0, 0.0), p(8.0, 0.0)]).unwrap();
    sim.build_road(&[p(2.0, 0.0), p(2.0, 4.0), p(6.0, 4.0), p(6.0, 0.0)])
        .unwrap();
    let node = |sim: &Simulation, x, y| sim.graph().node_at(p(x, y)).unwrap();
    let (west, east, north) = (node(&sim, 2.5, 0.5), node(&sim, 6.5, 0.5), node(&sim, 2.5, 4.5));
    (sim, west, east, north)
}

/// Test that a route across a square visits each corner once each way.
#[test]
fn square_route_is_doubled() {
    let config = RoutingConfig::default();
    let mut graph = RoadGraph::new(&config);
    let seq = graph
        .build_road(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(0.0, 0.0)])
        .unwrap();
    let mut routes = RouteController::new(&config);
    let id = routes.create_route(&graph, seq[0], seq[2], 0, 0, false).unwrap();
    let route = routes.get(id).unwrap();
    assert_eq!(route.nodes().len(), 5);
    assert_eq!(route.nodes().first(), route.nodes().last());
    assert!(route.path().is_closed());
    assert!(route.is_intact(&graph));
}

/// Test that cutting a road reroutes over the detour, and that cutting
/// the detour too turns the route into a daemon until the road is restored.
#[test]
fn routes_reroute_then_go_daemon() {
    let (mut sim, west, east, north) = detour();
    let id = sim.create_route(p(0.5, 0.5), p(8.5, 0.5)).unwrap();
    let vehicle = sim.spawn_vehicle(id, &VehicleAttributes::default()).unwrap();
    assert_eq!(sim.get_route(id).unwrap().nodes().len(), 7);

    assert!(sim.remove_link(west, east));
    assert!(!sim.get_route(id).unwrap().is_intact(sim.graph()));
    sim.step(0.05);
    let route = sim.get_route(id).unwrap();
    assert!(!route.is_daemon());
    assert!(route.nodes().contains(&north));
    assert!(route.is_intact(sim.graph()));

    // The daemon transition aborts the vehicle within the same step.
    assert!(sim.remove_link(west, north));
    sim.step(0.05);
    assert!(sim.get_route(id).unwrap().is_daemon());
    assert!(sim.get_vehicle(vehicle).is_aborted());

    // Further steps leave a daemon alone.
    let pos = sim.get_vehicle(vehicle).pos();
    for _ in 0..40 {
        sim.step(0.05);
    }
    assert!(sim.get_route(id).unwrap().is_daemon());
    assert_eq!(sim.get_vehicle(vehicle).pos(), pos);

    assert!(sim.add_link(west, east));
    sim.step(0.05);
    assert!(!sim.get_route(id).unwrap().is_daemon());
    assert!(!sim.get_vehicle(vehicle).is_aborted());
}

/// Test that a route whose end road is removed becomes a daemon.
#[test]
fn removed_endpoint_makes_a_daemon() {
    let mut sim = Simulation::default();
    let seq = sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
    let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
    assert!(sim.remove_node(seq[1]));
    sim.step(0.05);
    assert!(sim.get_route(id).unwrap().is_daemon());
}

/// Test that a failed rebuild leaves the route exactly as it was.
#[test]
fn failed_set_keeps_the_route() {
    let config = RoutingConfig::default();
    let mut graph = RoadGraph::new(&config);
    let a = graph.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
    let b = graph.build_road(&[p(0.0, 6.0), p(6.0, 6.0)]).unwrap();
    let mut routes = RouteController::new(&config);
    let mut vehicles = slotmap::SlotMap::with_key();
    let id = routes.create_route(&graph, a[0], a[1], 0, 0, false).unwrap();

    let route = routes.get_mut(id).unwrap();
    let before = route.clone();
    assert_eq!(
        route.set(&graph, &mut vehicles, a[0], b[1], 0, 0, false),
        Err(RoutingError::NoPath { from: a[0], to: b[1] })
    );
    assert_eq!(route.path(), before.path());
    assert_eq!(route.nodes(), before.nodes());
    assert_eq!(route.end_node(), before.end_node());
    assert_eq!(route.end_point(), before.end_point());

    assert_eq!(
        route.set(&graph, &mut vehicles, a[0], a[0], 0, 0, false),
        Err(RoutingError::SameEndpoints)
    );
    assert_eq!(route.path(), before.path());

    assert!(graph.remove_node(b[0]));
    assert!(!graph.is_alive(b[1]));
    assert_eq!(
        route.set(&graph, &mut vehicles, a[0], b[1], 0, 0, false),
        Err(RoutingError::DeadNode(b[1]))
    );
    assert_eq!(route.nodes(), before.nodes());
}

/// Test that a route moved onto a point stays there for a zero distance.
#[test]
fn zero_distance_keeps_the_point() {
    let mut sim = Simulation::default();
    sim.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
    let id = sim.create_route(p(0.5, 0.5), p(6.5, 0.5)).unwrap();
    let route = sim.get_route(id).unwrap();
    let (point, idx) = route.closest_point(p(3.0, 0.0));
    assert_eq!(route.move_point(point, 0.0, idx), (point, idx));
}
