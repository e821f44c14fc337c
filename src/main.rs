use road_routing::cgmath::Point2;
use road_routing::{EntranceLayout, RoutingConfig, Simulation, VehicleAttributes};

fn main() {
    env_logger::init();

    let config = RoutingConfig::default();
    let mut sim = Simulation::new(&config);
    let depot = EntranceLayout::depot(Point2::new(0.5, 0.5), [0.0, 1.0].into(), 2, config.cell_size);
    if let Err(err) = sim.add_building(depot) {
        eprintln!("Could not place the depot: {}", err);
        return;
    }
    let road = [Point2::new(0.0, 1.0), Point2::new(0.0, 8.0), Point2::new(8.0, 8.0)];
    if let Err(err) = sim.build_road(&road) {
        eprintln!("Could not build the road: {}", err);
        return;
    }
    let route = match sim.create_route(Point2::new(0.5, 0.5), Point2::new(8.5, 8.5)) {
        Ok(route) => route,
        Err(err) => {
            eprintln!("Could not create the route: {}", err);
            return;
        }
    };
    for _ in 0..4 {
        if let Err(err) = sim.spawn_vehicle(route, &VehicleAttributes::default()) {
            eprintln!("Could not spawn a vehicle: {}", err);
            return;
        }
    }
    sim.randomise_speeds(0.1);

    println!("Simulating...");
    const NUM_FRAMES: usize = 2000;
    for frame in 0..NUM_FRAMES {
        sim.step(0.05);
        if frame % 200 == 0 {
            for vehicle in sim.iter_vehicles() {
                println!(
                    "frame {:>4}: vehicle at ({:.2}, {:.2}), heading {}",
                    frame,
                    vehicle.pos().x,
                    vehicle.pos().y,
                    if vehicle.is_forward() { "out" } else { "back" },
                );
            }
        }
    }
}
