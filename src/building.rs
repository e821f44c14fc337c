//! Buildings whose entrances connect to the road graph.

use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EntranceError;
use crate::math::{approx_eq, approx_eq_vec, normalize_or_zero, right_normal, Point2d, Vector2d};
use crate::{BuildingId, NodeId};
pub use waypoints::{WayPoint, WayPointGraph, WayPointKind};

mod waypoints;

/// An opening in the footprint of a building through which roads enter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entrance {
    /// The centre of the entrance cell.
    pub pos: Point2d,
    /// The unit direction a vehicle faces when leaving through this entrance.
    pub direction: Vector2d,
}

/// Describes the shape of an entrance building before it is placed.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntranceLayout {
    /// The position of the building's entrance node.
    pub node: Point2d,
    /// The centres of the lower-left and upper-right cells of the footprint.
    pub footprint: [Point2d; 2],
    /// The entrances, which must lie within the footprint.
    pub entrances: Vec<Entrance>,
    /// The waypoints vehicles follow inside the building.
    pub waypoints: WayPointGraph,
}

impl EntranceLayout {
    /// A 3x3 cell depot centred on `node` with a single entrance on the `facing` side.
    ///
    /// Vehicles enter on the left lane of the entrance, visit one of `platforms`
    /// stops laid out across the middle row and leave on the right lane.
    pub fn depot(node: Point2d, facing: Vector2d, platforms: usize, cell_size: f64) -> Self {
        let facing = normalize_or_zero(facing);
        let side = right_normal(facing);
        let lane = 0.375 * 0.5 * cell_size;
        let entrance = node + facing * cell_size;

        let mut points = vec![
            WayPoint::new(entrance - side * lane, WayPointKind::Receiver, &[]),
            WayPoint::new(entrance + side * lane, WayPointKind::Connector, &[]),
        ];
        let mut stops = vec![];
        for i in 0..platforms {
            let offset = (i as f64 - (platforms as f64 - 1.0) / 2.0) * 0.5 * cell_size;
            let idx = points.len();
            points[0].links.push(idx);
            points.push(WayPoint::new(node + side * offset, WayPointKind::Stop, &[1]));
            stops.push(idx);
        }

        let half = Vector2d::new(cell_size, cell_size);
        Self {
            node,
            footprint: [node - half, node + half],
            entrances: vec![Entrance {
                pos: entrance,
                direction: facing,
            }],
            waypoints: WayPointGraph { points, stops },
        }
    }

    /// Iterates over the centres of the cells the footprint covers.
    pub(crate) fn cells(&self, cell_size: f64) -> impl Iterator<Item = Point2d> {
        let [min, max] = self.footprint;
        let nx = ((max.x - min.x) / cell_size).round() as i64;
        let ny = ((max.y - min.y) / cell_size).round() as i64;
        (0..=ny).flat_map(move |j| {
            (0..=nx).map(move |i| min + Vector2d::new(i as f64, j as f64) * cell_size)
        })
    }
}

/// A placed building owning exactly one entrance node.
#[derive(Clone, Debug)]
pub struct EntranceBuilding {
    id: BuildingId,
    node: NodeId,
    layout: EntranceLayout,
}

impl EntranceBuilding {
    pub(crate) fn new(id: BuildingId, node: NodeId, layout: EntranceLayout) -> Self {
        Self { id, node, layout }
    }

    /// Gets the building ID.
    pub fn id(&self) -> BuildingId {
        self.id
    }

    /// Gets the entrance node of the building.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Gets the layout the building was placed with.
    pub fn layout(&self) -> &EntranceLayout {
        &self.layout
    }

    pub fn entrance_positions(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.layout.entrances.iter().map(|e| e.pos)
    }

    fn entrance(&self, pos: Point2d) -> Option<&Entrance> {
        self.layout.entrances.iter().find(|e| approx_eq(e.pos, pos))
    }

    /// Whether there is an entrance at `pos`.
    pub fn entrance_at(&self, pos: Point2d) -> bool {
        self.entrance(pos).is_some()
    }

    /// The outward direction of the entrance at `pos`.
    pub fn direction_of(&self, pos: Point2d) -> Option<Vector2d> {
        self.entrance(pos).map(|e| e.direction)
    }

    /// Whether there is an entrance at `pos` facing `dir`.
    pub fn entrance_facing(&self, pos: Point2d, dir: Vector2d) -> bool {
        self.direction_of(pos)
            .map_or(false, |d| approx_eq_vec(d, normalize_or_zero(dir)))
    }

    /// Gets the entrance lying in direction `dir` from the entrance node.
    /// A building with a single entrance always returns that one.
    pub fn entrance_by_direction(&self, dir: Vector2d) -> Result<Point2d, EntranceError> {
        if let [only] = self.layout.entrances.as_slice() {
            return Ok(only.pos);
        }
        self.layout
            .entrances
            .iter()
            .find(|e| approx_eq_vec((e.pos - self.layout.node).normalize(), dir))
            .map(|e| e.pos)
            .ok_or(EntranceError::NoEntranceInDirection(dir))
    }

    /// Gets the points a vehicle follows from the receiver near `from`, through
    /// the stop of `platform`, to the connector near `to`, and the stop point.
    pub fn path_between(
        &self,
        from: Point2d,
        to: Point2d,
        platform: usize,
    ) -> Result<(Vec<Point2d>, Point2d), EntranceError> {
        self.layout.waypoints.path_between(from, to, platform)
    }

    /// The number of platforms vehicles can stop at.
    pub fn platforms_count(&self) -> usize {
        self.layout.waypoints.platforms_count()
    }

    pub fn stop_points(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.layout.waypoints.stop_points()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::SlotMap;

    fn depot() -> EntranceBuilding {
        let mut ids = SlotMap::<BuildingId, ()>::with_key();
        let mut nodes = SlotMap::<NodeId, ()>::with_key();
        let layout = EntranceLayout::depot(Point2d::new(0.5, 0.5), Vector2d::new(0.0, 1.0), 2, 1.0);
        EntranceBuilding::new(ids.insert(()), nodes.insert(()), layout)
    }

    #[test]
    fn depot_layout() {
        let building = depot();
        assert_eq!(building.platforms_count(), 2);
        assert_eq!(building.layout().cells(1.0).count(), 9);
        assert!(building.entrance_at(Point2d::new(0.5, 1.5)));
        assert!(building.entrance_facing(Point2d::new(0.5, 1.5), Vector2d::new(0.0, 2.0)));
        assert!(!building.entrance_facing(Point2d::new(0.5, 1.5), Vector2d::new(1.0, 0.0)));
        assert_eq!(
            building.direction_of(Point2d::new(0.5, 1.5)),
            Some(Vector2d::new(0.0, 1.0))
        );
    }

    #[test]
    fn depot_stub_passes_the_platform() {
        let building = depot();
        let entrance = building.entrance_by_direction(Vector2d::new(0.0, 1.0)).unwrap();
        let side = Vector2d::new(0.1875, 0.0);
        let (points, stop) = building
            .path_between(entrance - side, entrance + side, 1)
            .unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], stop);
        assert_eq!(Some(&stop), building.stop_points().collect::<Vec<_>>().get(1));
    }
}
