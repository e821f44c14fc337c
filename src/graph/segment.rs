use crate::math::Point2d;
use crate::{NodeId, SegmentId};

/// A straight stretch of road between two linked nodes.
#[derive(Clone, Debug)]
pub struct RoadSegment {
    /// The segment ID.
    id: SegmentId,
    /// The end nodes.
    nodes: [NodeId; 2],
    /// The length in cells.
    length: u32,
}

impl RoadSegment {
    pub(crate) fn new(id: SegmentId, nodes: [NodeId; 2], positions: [Point2d; 2], cell_size: f64) -> Self {
        Self {
            id,
            nodes,
            length: cell_length(positions, cell_size),
        }
    }

    /// Gets the segment ID.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Gets the two end nodes.
    pub fn nodes(&self) -> [NodeId; 2] {
        self.nodes
    }

    /// Gets the length of the segment in cells.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Whether the segment ends at the given node.
    pub fn touches(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Gets the end opposite to `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }

    pub(crate) fn set_nodes(&mut self, nodes: [NodeId; 2], positions: [Point2d; 2], cell_size: f64) {
        self.nodes = nodes;
        self.length = cell_length(positions, cell_size);
    }
}

/// The number of cell steps between two cell centres along a straight leg.
pub(crate) fn cell_length([a, b]: [Point2d; 2], cell_size: f64) -> u32 {
    let diff = b - a;
    (diff.x.abs().max(diff.y.abs()) / cell_size).round() as u32
}

/// The cell centres strictly between the two ends of a straight leg.
pub(crate) fn interior_points(positions: [Point2d; 2], cell_size: f64) -> impl Iterator<Item = Point2d> {
    let [a, b] = positions;
    let steps = cell_length(positions, cell_size);
    (1..steps).map(move |i| a + (b - a) * (i as f64 / steps as f64))
}
