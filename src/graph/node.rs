use smallvec::SmallVec;

use crate::math::{normalize_or_zero, Point2d, Vector2d};
use crate::{BuildingId, NodeId};

/// A vertex of the road graph.
#[derive(Clone, Debug)]
pub struct RoadNode {
    /// The node ID.
    id: NodeId,
    /// The position of the node, at the centre of its cell.
    pos: Point2d,
    /// Which of the eight compass directions already hold a link.
    slots: [bool; 8],
    /// The linked neighbours, in the order they were linked.
    links: SmallVec<[NodeId; 8]>,
    /// The entrance building this node belongs to, if any.
    building: Option<BuildingId>,
}

impl RoadNode {
    pub(crate) fn new(id: NodeId, pos: Point2d, building: Option<BuildingId>) -> Self {
        Self {
            id,
            pos,
            slots: [false; 8],
            links: SmallVec::new(),
            building,
        }
    }

    /// Gets the node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Gets the position of the node.
    pub fn pos(&self) -> Point2d {
        self.pos
    }

    /// Whether this node is the entrance of a building.
    /// Entrance nodes accept any number of links in any direction.
    pub fn is_entrance(&self) -> bool {
        self.building.is_some()
    }

    /// The building owning this entrance node.
    pub fn building(&self) -> Option<BuildingId> {
        self.building
    }

    /// The linked neighbours.
    pub fn links(&self) -> &[NodeId] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether this node is linked to `other`.
    pub fn contains_link(&self, other: NodeId) -> bool {
        self.links.contains(&other)
    }

    /// Whether the direction slot with the given index holds a link.
    pub fn slot_occupied(&self, slot: usize) -> bool {
        self.slots[slot]
    }

    pub(crate) fn push_link(&mut self, other: NodeId, slot: usize) {
        self.links.push(other);
        if !self.is_entrance() {
            self.slots[slot] = true;
        }
    }

    pub(crate) fn drop_link(&mut self, other: NodeId, slot: usize) {
        self.links.retain(|id| *id != other);
        if !self.is_entrance() {
            self.slots[slot] = false;
        }
    }
}

/// Quantises a direction to one of eight compass steps, each component in `-1..=1`.
pub(crate) fn direction_step(dir: Vector2d) -> (i32, i32) {
    let d = normalize_or_zero(dir);
    let x = (2.0 * d.x).clamp(-1.0, 1.0).trunc() as i32;
    let y = (2.0 * d.y).clamp(-1.0, 1.0).trunc() as i32;
    (x, y)
}

/// Maps a compass step to its slot index.
pub(crate) fn slot_index((x, y): (i32, i32)) -> usize {
    match (x, y) {
        (0, 1) => 0,
        (0, _) => 2,
        (1, 0) => 1,
        (_, 0) => 3,
        (1, 1) => 4,
        (1, _) => 5,
        (_, 1) => 7,
        _ => 6,
    }
}

/// The slot a link from `from` to `to` occupies on `from`,
/// and the slot the same link occupies on `to`.
pub(crate) fn link_slots(from: Point2d, to: Point2d) -> (usize, usize) {
    let (x, y) = direction_step(to - from);
    (slot_index((x, y)), slot_index((-x, -y)))
}
