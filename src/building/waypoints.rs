use pathfinding::directed::bfs::bfs;
use smallvec::SmallVec;

use crate::error::EntranceError;
use crate::math::Point2d;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linker waypoints are matched to a requested position within this squared distance.
const LINKER_MATCH_DIST_SQ: f64 = 0.4;

/// The role of a waypoint inside a building.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WayPointKind {
    /// An intermediate point.
    Path,
    /// A linker where vehicles arrive from the road.
    Receiver,
    /// A linker where vehicles leave towards the road.
    Connector,
    /// A platform where vehicles stop.
    Stop,
}

/// A position inside a building a vehicle can travel through.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WayPoint {
    pub pos: Point2d,
    pub kind: WayPointKind,
    /// Indices of the waypoints reachable from this one.
    pub links: SmallVec<[usize; 4]>,
}

impl WayPoint {
    pub fn new(pos: Point2d, kind: WayPointKind, links: &[usize]) -> Self {
        Self {
            pos,
            kind,
            links: links.into(),
        }
    }
}

/// The directed waypoint graph of a building.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WayPointGraph {
    /// The waypoints.
    pub points: Vec<WayPoint>,
    /// Indices of the stop waypoints, one per platform.
    pub stops: Vec<usize>,
}

impl WayPointGraph {
    /// The number of platforms.
    pub fn platforms_count(&self) -> usize {
        self.stops.len()
    }

    /// The positions of the stop waypoints, in platform order.
    /// Stops naming a missing waypoint are skipped.
    pub fn stop_points(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.stops.iter().filter_map(|idx| self.points.get(*idx)).map(|wp| wp.pos)
    }

    /// Finds the first waypoint of the given kind near `pos`.
    fn linker_near(&self, pos: Point2d, kind: WayPointKind) -> Result<usize, EntranceError> {
        use cgmath::MetricSpace;
        self.points
            .iter()
            .position(|wp| wp.kind == kind && wp.pos.distance2(pos) < LINKER_MATCH_DIST_SQ)
            .ok_or(EntranceError::NoWaypointNear(pos))
    }

    fn shortest(&self, from: usize, goal: usize) -> Result<Vec<usize>, EntranceError> {
        bfs(
            &from,
            |idx| self.points[*idx].links.iter().copied().filter(|l| *l < self.points.len()),
            |idx| *idx == goal,
        )
        .ok_or(EntranceError::Unreachable)
    }

    /// Gets the points from the receiver near `from` through the stop of `platform`
    /// to the connector near `to`, along with the stop point.
    pub fn path_between(
        &self,
        from: Point2d,
        to: Point2d,
        platform: usize,
    ) -> Result<(Vec<Point2d>, Point2d), EntranceError> {
        let stop = *self
            .stops
            .get(platform)
            .ok_or(EntranceError::PlatformOutOfRange {
                platform,
                count: self.stops.len(),
            })?;
        let stop_pos = self.points.get(stop).ok_or(EntranceError::MissingStop(stop))?.pos;
        let receiver = self.linker_near(from, WayPointKind::Receiver)?;
        let connector = self.linker_near(to, WayPointKind::Connector)?;

        let inbound = self.shortest(receiver, stop)?;
        let outbound = self.shortest(stop, connector)?;
        let points = inbound
            .iter()
            .chain(outbound.iter().skip(1))
            .map(|idx| self.points[*idx].pos)
            .collect();
        Ok((points, stop_pos))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_platforms() -> WayPointGraph {
        WayPointGraph {
            points: vec![
                WayPoint::new(Point2d::new(0.0, 0.0), WayPointKind::Receiver, &[1]),
                WayPoint::new(Point2d::new(0.0, 1.0), WayPointKind::Path, &[2, 3]),
                WayPoint::new(Point2d::new(-1.0, 2.0), WayPointKind::Stop, &[4]),
                WayPoint::new(Point2d::new(1.0, 2.0), WayPointKind::Stop, &[4]),
                WayPoint::new(Point2d::new(0.0, 3.0), WayPointKind::Path, &[5]),
                WayPoint::new(Point2d::new(0.5, 0.0), WayPointKind::Connector, &[]),
            ],
            stops: vec![2, 3],
        }
    }

    #[test]
    fn path_goes_through_the_platform() {
        let graph = two_platforms();
        let (points, stop) = graph
            .path_between(Point2d::new(0.1, 0.1), Point2d::new(0.5, 0.2), 1)
            .unwrap();
        assert_eq!(stop, Point2d::new(1.0, 2.0));
        assert_eq!(
            points,
            vec![
                Point2d::new(0.0, 0.0),
                Point2d::new(0.0, 1.0),
                Point2d::new(1.0, 2.0),
                Point2d::new(0.0, 3.0),
                Point2d::new(0.5, 0.0),
            ]
        );
    }

    #[test]
    fn bad_requests_are_errors() {
        let graph = two_platforms();
        let p = Point2d::new(0.0, 0.0);
        assert_eq!(
            graph.path_between(p, p, 2),
            Err(EntranceError::PlatformOutOfRange { platform: 2, count: 2 })
        );
        let far = Point2d::new(5.0, 5.0);
        assert_eq!(
            graph.path_between(far, Point2d::new(0.5, 0.0), 0),
            Err(EntranceError::NoWaypointNear(far))
        );
    }

    #[test]
    fn missing_stop_waypoints_are_errors() {
        let mut graph = two_platforms();
        graph.stops.push(9);
        assert_eq!(graph.platforms_count(), 3);
        assert_eq!(graph.stop_points().count(), 2);
        assert_eq!(
            graph.path_between(Point2d::new(0.1, 0.1), Point2d::new(0.5, 0.2), 2),
            Err(EntranceError::MissingStop(9))
        );
    }
}
