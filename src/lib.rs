pub use building::{Entrance, EntranceBuilding, EntranceLayout, WayPoint, WayPointGraph, WayPointKind};
pub use cgmath;
pub use config::{RoutingConfig, VehicleAttributes};
pub use error::{EntranceError, GraphError, RoutingError};
pub use graph::{RoadGraph, RoadNode, RoadSegment};
pub use routing::{Path, Route, RouteColor, RouteController, RouteId};
pub use simulation::{RouteEdit, RouteObserver, Simulation};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::Vehicle;
pub use world::{CellKey, Entity, WorldGrid};

mod building;
mod config;
#[cfg(feature = "debug")]
mod debug;
mod error;
mod graph;
pub mod math;
mod routing;
mod simulation;
mod util;
mod vehicle;
mod world;

new_key_type! {
    /// Unique ID of a [RoadNode].
    pub struct NodeId;
    /// Unique ID of a [RoadSegment].
    pub struct SegmentId;
    /// Unique ID of an [EntranceBuilding].
    pub struct BuildingId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type NodeSet = SlotMap<NodeId, RoadNode>;
type SegmentSet = SlotMap<SegmentId, RoadSegment>;
type BuildingSet = SlotMap<BuildingId, EntranceBuilding>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
