//! Error types of the routing core.

use thiserror::Error;

use crate::math::Point2d;
use crate::routing::RouteId;
use crate::NodeId;

/// Errors produced while building or rebuilding a route.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RoutingError {
    #[error("start and end of the route are the same")]
    SameEndpoints,

    #[error("no path from {from:?} to {to:?}")]
    NoPath { from: NodeId, to: NodeId },

    #[error("no road node at {0:?}")]
    NodeNotFound(Point2d),

    #[error("road node {0:?} is not alive")]
    DeadNode(NodeId),

    #[error("route {0} not found")]
    RouteNotFound(RouteId),

    #[error("road node {0:?} cannot be a route endpoint")]
    InvalidEndpoint(NodeId),

    #[error("entrance building: {0}")]
    Entrance(#[from] EntranceError),

    #[error("route geometry has only {0} points")]
    DegenerateGeometry(usize),
}

/// Errors produced by an entrance building's waypoint sub-graph.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EntranceError {
    #[error("no entrance faces direction {0:?}")]
    NoEntranceInDirection(crate::math::Vector2d),

    #[error("no linker waypoint near {0:?}")]
    NoWaypointNear(Point2d),

    #[error("platform {platform} out of range ({count} platforms)")]
    PlatformOutOfRange { platform: usize, count: usize },

    #[error("the stop waypoint is unreachable")]
    Unreachable,

    #[error("stop waypoint {0} does not exist")]
    MissingStop(usize),
}

/// Errors produced while editing the road graph.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("{0:?} lies outside the world")]
    OutOfBounds(Point2d),

    #[error("road leg from {0:?} to {1:?} is neither axis-aligned nor diagonal")]
    NotStraight(Point2d, Point2d),

    #[error("cell at {0:?} is occupied")]
    CellOccupied(Point2d),

    #[error("a road needs at least two distinct cells")]
    SameCell,

    #[error("road node {0:?} already has a link in that direction")]
    SlotOccupied(NodeId),

    #[error("{0:?} is not an entrance of the building there")]
    NotAnEntrance(Point2d),
}

/// Shorthand result type for route operations.
pub type RoutingResult<T> = Result<T, RoutingError>;
