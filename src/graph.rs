//! The road graph: nodes, the segments between them and the buildings they lead into.

use cgmath::prelude::*;
use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use crate::building::{EntranceBuilding, EntranceLayout};
use crate::config::RoutingConfig;
use crate::error::GraphError;
use crate::math::{approx_eq_vec, normalize_or_zero, Point2d, Vector2d};
use crate::world::{Entity, WorldGrid};
use crate::{BuildingId, BuildingSet, NodeId, NodeSet, SegmentId, SegmentSet};
use node::link_slots;
pub use node::RoadNode;
use segment::interior_points;
pub use segment::RoadSegment;

mod node;
mod segment;

/// The road network together with the world grid it is laid out on.
#[derive(Clone, Debug)]
pub struct RoadGraph {
    nodes: NodeSet,
    segments: SegmentSet,
    buildings: BuildingSet,
    world: WorldGrid,
}

impl RoadGraph {
    /// Creates an empty road graph.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            nodes: NodeSet::default(),
            segments: SegmentSet::default(),
            buildings: BuildingSet::default(),
            world: WorldGrid::new(config),
        }
    }

    /// Gets the world grid.
    pub fn world(&self) -> &WorldGrid {
        &self.world
    }

    pub fn cell_size(&self) -> f64 {
        self.world.cell_size()
    }

    /// Gets a node, if it is alive.
    pub fn node(&self, id: NodeId) -> Option<&RoadNode> {
        self.nodes.get(id)
    }

    /// Whether the node is alive.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns an iterator over all the nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &RoadNode> {
        self.nodes.values()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.segments.get(id)
    }

    /// Returns an iterator over all the segments.
    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segments.values()
    }

    pub fn building(&self, id: BuildingId) -> Option<&EntranceBuilding> {
        self.buildings.get(id)
    }

    /// Returns an iterator over all the buildings.
    pub fn buildings(&self) -> impl Iterator<Item = &EntranceBuilding> {
        self.buildings.values()
    }

    /// Gets the building owning an entrance node.
    pub fn building_of(&self, node: NodeId) -> Option<&EntranceBuilding> {
        self.nodes
            .get(node)
            .and_then(|n| n.building())
            .and_then(|b| self.buildings.get(b))
    }

    /// Links two nodes, returning true if a new link was made.
    ///
    /// Nothing happens if the nodes are already linked, or if `a` is not an
    /// entrance and already has a link in the direction of `b`.
    ///
    /// # Panics
    /// Panics if either node is not alive.
    pub fn add_link(&mut self, a: NodeId, b: NodeId) -> bool {
        assert!(self.is_alive(a) && self.is_alive(b), "cannot link a dead road node");
        let (node_a, node_b) = (&self.nodes[a], &self.nodes[b]);
        if a == b || node_a.contains_link(b) {
            return false;
        }
        let (slot_a, slot_b) = link_slots(node_a.pos(), node_b.pos());
        if !node_a.is_entrance() && node_a.slot_occupied(slot_a) {
            return false;
        }
        self.nodes[a].push_link(b, slot_a);
        self.nodes[b].push_link(a, slot_b);
        true
    }

    /// Unlinks two nodes, returning true if a link was removed.
    pub fn remove_link(&mut self, a: NodeId, b: NodeId) -> bool {
        if !self.contains_link(a, b) {
            return false;
        }
        let (node_a, node_b) = (&self.nodes[a], &self.nodes[b]);
        let (slot_a, slot_b) = link_slots(node_a.pos(), node_b.pos());
        if !node_a.is_entrance() && !node_a.slot_occupied(slot_a) {
            return false;
        }
        self.nodes[a].drop_link(b, slot_a);
        self.nodes[b].drop_link(a, slot_b);
        true
    }

    /// Whether the two nodes are alive and linked.
    pub fn contains_link(&self, a: NodeId, b: NodeId) -> bool {
        self.is_alive(b) && self.nodes.get(a).map_or(false, |n| n.contains_link(b))
    }

    /// Removes every link of a node.
    pub fn clear_links(&mut self, a: NodeId) {
        let links = match self.nodes.get(a) {
            Some(node) => node.links().to_vec(),
            None => return,
        };
        for b in links {
            self.remove_link(a, b);
        }
    }

    /// Gets the segment joining two nodes.
    pub fn segment_between(&self, a: NodeId, b: NodeId) -> Option<SegmentId> {
        self.segments
            .values()
            .find(|s| s.touches(a) && s.touches(b))
            .map(|s| s.id())
    }

    /// Finds the node at a position: the node on that cell, the nearer end of the
    /// segment crossing it, or the entrance node of the building covering it.
    pub fn node_at(&self, pos: Point2d) -> Option<NodeId> {
        let pos = self.world.snap(pos)?;
        match self.world.entity_at(pos)? {
            Entity::Node(id) => Some(id),
            Entity::Segment(id) => {
                let [a, b] = self.segments.get(id)?.nodes();
                let dist_a = self.nodes.get(a)?.pos().distance2(pos);
                let dist_b = self.nodes.get(b)?.pos().distance2(pos);
                Some(if dist_a < dist_b { a } else { b })
            }
            Entity::Building(id) => self.buildings.get(id).map(|b| b.node()),
        }
    }

    /// Finds the node closest to a position.
    pub fn nearest_node(&self, pos: Point2d) -> Option<NodeId> {
        self.nodes
            .values()
            .min_by_key(|n| OrderedFloat(n.pos().distance2(pos)))
            .map(|n| n.id())
    }

    /// Adds an unlinked road node on a free cell.
    pub fn add_node(&mut self, pos: Point2d) -> Result<NodeId, GraphError> {
        let pos = self.world.snap(pos).ok_or(GraphError::OutOfBounds(pos))?;
        if !self.world.is_free(pos) {
            return Err(GraphError::CellOccupied(pos));
        }
        let id = self.nodes.insert_with_key(|id| RoadNode::new(id, pos, None));
        self.world.occupy(pos, Entity::Node(id));
        Ok(id)
    }

    /// Links two nodes with a new segment, or returns the segment already joining them.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<SegmentId, GraphError> {
        if let Some(existing) = self.segment_between(a, b) {
            return Ok(existing);
        }
        let (pa, pb) = (self.nodes[a].pos(), self.nodes[b].pos());
        if a == b {
            return Err(GraphError::SameCell);
        }
        let either_entrance = self.nodes[a].is_entrance() || self.nodes[b].is_entrance();
        if !either_entrance && !is_straight(pb - pa) {
            return Err(GraphError::NotStraight(pa, pb));
        }
        if !self.contains_link(a, b) && !self.add_link(a, b) {
            let blocked = if self.nodes[a].is_entrance() { b } else { a };
            return Err(GraphError::SlotOccupied(blocked));
        }
        let cell_size = self.cell_size();
        let id = self
            .segments
            .insert_with_key(|id| RoadSegment::new(id, [a, b], [pa, pb], cell_size));
        self.occupy_segment(id);
        Ok(id)
    }

    /// Inserts a new node on an interior cell of a segment, splitting it in two.
    pub fn split_segment(&mut self, id: SegmentId, pos: Point2d) -> Result<NodeId, GraphError> {
        let pos = self.world.snap(pos).ok_or(GraphError::OutOfBounds(pos))?;
        if self.world.entity_at(pos) != Some(Entity::Segment(id)) {
            return Err(GraphError::CellOccupied(pos));
        }
        let [a, b] = self.segments[id].nodes();
        self.vacate_segment(id);
        self.remove_link(a, b);

        let node = self.nodes.insert_with_key(|nid| RoadNode::new(nid, pos, None));
        self.world.occupy(pos, Entity::Node(node));
        self.add_link(a, node);
        self.add_link(node, b);

        let cell_size = self.cell_size();
        let (pa, pb) = (self.nodes[a].pos(), self.nodes[b].pos());
        self.segments[id].set_nodes([a, node], [pa, pos], cell_size);
        self.occupy_segment(id);
        let tail = self
            .segments
            .insert_with_key(|sid| RoadSegment::new(sid, [node, b], [pos, pb], cell_size));
        self.occupy_segment(tail);
        Ok(node)
    }

    /// Removes a segment and the link it carries, then collapses end nodes left redundant.
    pub fn remove_segment(&mut self, id: SegmentId) -> bool {
        let [a, b] = match self.segments.get(id) {
            Some(segment) => segment.nodes(),
            None => return false,
        };
        self.vacate_segment(id);
        self.segments.remove(id);
        self.remove_link(a, b);
        self.collapse_if_redundant(a);
        self.collapse_if_redundant(b);
        true
    }

    /// Removes a road node with its segments. Neighbours left without links are removed too.
    /// Entrance nodes are only removed together with their building.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let links = match self.nodes.get(id) {
            Some(node) if !node.is_entrance() => node.links().to_vec(),
            _ => return false,
        };
        self.detach_node(id);
        let pos = self.nodes[id].pos();
        self.world.vacate(pos, Entity::Node(id));
        self.nodes.remove(id);
        for link in links {
            if self.nodes.get(link).map_or(false, |n| !n.is_entrance() && n.link_count() == 0) {
                self.remove_node(link);
            }
        }
        true
    }

    /// Removes a node that no longer serves a purpose, returning true if the graph changed.
    ///
    /// A non-entrance node without links is removed. A non-entrance node with exactly
    /// two links pointing in opposite directions is merged away: its neighbours are
    /// linked directly and one of its segments is stretched over the other.
    pub fn collapse_if_redundant(&mut self, id: NodeId) -> bool {
        let (pos, links) = match self.nodes.get(id) {
            Some(node) if !node.is_entrance() => (node.pos(), node.links().to_vec()),
            _ => return false,
        };
        match *links.as_slice() {
            [] => {
                self.world.vacate(pos, Entity::Node(id));
                self.nodes.remove(id);
                true
            }
            [l1, l2] => {
                let (p1, p2) = (self.nodes[l1].pos(), self.nodes[l2].pos());
                let sum = normalize_or_zero(p1 - pos) + normalize_or_zero(p2 - pos);
                if !approx_eq_vec(sum, Vector2d::zero()) {
                    return false;
                }
                let (seg1, seg2) = match (self.segment_between(id, l1), self.segment_between(id, l2)) {
                    (Some(s1), Some(s2)) => (s1, s2),
                    _ => return false,
                };
                self.vacate_segment(seg1);
                self.vacate_segment(seg2);
                self.segments.remove(seg2);
                self.clear_links(id);
                self.world.vacate(pos, Entity::Node(id));
                self.nodes.remove(id);

                self.add_link(l1, l2);
                let cell_size = self.cell_size();
                self.segments[seg1].set_nodes([l1, l2], [p1, p2], cell_size);
                self.occupy_segment(seg1);
                true
            }
            _ => false,
        }
    }

    /// Lays a road through the cell centres `points`, joined by straight legs.
    ///
    /// Existing nodes on the way are reused, crossed segments are split and
    /// buildings are joined only through their entrances. Collinear nodes left
    /// with two links are merged afterwards. Returns the nodes the road passes.
    pub fn build_road(&mut self, points: &[Point2d]) -> Result<Vec<NodeId>, GraphError> {
        let cells = self.road_cells(points)?;

        // Decide which cells become nodes before touching the graph.
        let mut stops = vec![];
        for (i, (pos, corner)) in cells.iter().enumerate() {
            match self.world.entity_at(*pos) {
                None if *corner => stops.push(*pos),
                None => {}
                Some(Entity::Node(_) | Entity::Segment(_)) => stops.push(*pos),
                Some(Entity::Building(b)) => {
                    let building = &self.buildings[b];
                    let faces_road = [i.checked_sub(1), Some(i + 1)]
                        .into_iter()
                        .flatten()
                        .filter_map(|j| cells.get(j))
                        .any(|(other, _)| building.entrance_facing(*pos, *other - *pos));
                    if !faces_road {
                        return Err(GraphError::NotAnEntrance(*pos));
                    }
                    stops.push(*pos);
                }
            }
        }

        self.rollback_on_error(|graph| graph.lay_road(stops))
    }

    /// Turns the road's stop cells into linked nodes.
    fn lay_road(&mut self, stops: Vec<Point2d>) -> Result<Vec<NodeId>, GraphError> {
        let mut seq: Vec<NodeId> = vec![];
        for pos in stops {
            let node = match self.world.entity_at(pos) {
                None => self.add_node(pos)?,
                Some(Entity::Node(id)) => id,
                Some(Entity::Segment(id)) => self.split_segment(id, pos)?,
                Some(Entity::Building(id)) => self.buildings[id].node(),
            };
            if seq.last() != Some(&node) {
                seq.push(node);
            }
        }

        for (a, b) in seq.iter().copied().tuple_windows() {
            self.connect(a, b)?;
        }
        for node in &seq {
            self.collapse_if_redundant(*node);
        }
        seq.retain(|id| self.is_alive(*id));
        debug!("built road through {} nodes", seq.len());
        Ok(seq)
    }

    /// Runs an edit, restoring the graph as it was if the edit fails part way.
    fn rollback_on_error<T>(
        &mut self,
        edit: impl FnOnce(&mut Self) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let backup = self.clone();
        edit(self).map_err(|err| {
            debug!("road edit failed, graph restored: {}", err);
            *self = backup;
            err
        })
    }

    /// Places an entrance building and its entrance node.
    pub fn add_building(&mut self, layout: EntranceLayout) -> Result<BuildingId, GraphError> {
        let cell_size = self.cell_size();
        for cell in layout.cells(cell_size) {
            if !self.world.contains(cell) {
                return Err(GraphError::OutOfBounds(cell));
            }
            if !self.world.is_free(cell) {
                return Err(GraphError::CellOccupied(cell));
            }
        }
        let cells = layout.cells(cell_size).collect::<Vec<_>>();
        let nodes = &mut self.nodes;
        let id = self.buildings.insert_with_key(|bid| {
            let node = nodes.insert_with_key(|nid| RoadNode::new(nid, layout.node, Some(bid)));
            EntranceBuilding::new(bid, node, layout)
        });
        for cell in cells {
            self.world.occupy(cell, Entity::Building(id));
        }
        Ok(id)
    }

    /// Removes a building, its entrance node and the segments leading into it.
    pub fn remove_building(&mut self, id: BuildingId) -> bool {
        let building = match self.buildings.remove(id) {
            Some(building) => building,
            None => return false,
        };
        let node = building.node();
        let links = self.nodes[node].links().to_vec();
        self.detach_node(node);
        self.nodes.remove(node);
        for cell in building.layout().cells(self.cell_size()) {
            self.world.vacate(cell, Entity::Building(id));
        }
        for link in links {
            self.collapse_if_redundant(link);
        }
        true
    }

    /// Removes every segment touching a node, and with them its links.
    fn detach_node(&mut self, id: NodeId) {
        let touching = self
            .segments
            .values()
            .filter(|s| s.touches(id))
            .map(|s| s.id())
            .collect::<Vec<_>>();
        for seg in touching {
            self.vacate_segment(seg);
            self.segments.remove(seg);
        }
        self.clear_links(id);
    }

    fn segment_cells(&self, id: SegmentId) -> impl Iterator<Item = Point2d> {
        let [a, b] = self.segments[id].nodes();
        interior_points([self.nodes[a].pos(), self.nodes[b].pos()], self.cell_size())
    }

    fn occupy_segment(&mut self, id: SegmentId) {
        for cell in self.segment_cells(id).collect::<Vec<_>>() {
            self.world.occupy(cell, Entity::Segment(id));
        }
    }

    fn vacate_segment(&mut self, id: SegmentId) {
        for cell in self.segment_cells(id).collect::<Vec<_>>() {
            self.world.vacate(cell, Entity::Segment(id));
        }
    }

    /// Snaps the road's corner points and expands them into every cell the road crosses.
    /// Each cell is paired with whether it is a corner of the road.
    fn road_cells(&self, points: &[Point2d]) -> Result<Vec<(Point2d, bool)>, GraphError> {
        let corners = points
            .iter()
            .map(|p| self.world.snap(*p).ok_or(GraphError::OutOfBounds(*p)))
            .collect::<Result<Vec<_>, _>>()?;
        if corners.len() < 2 {
            return Err(GraphError::SameCell);
        }
        let cell_size = self.cell_size();
        let mut cells = vec![(corners[0], true)];
        for (a, b) in corners.iter().copied().tuple_windows() {
            if a == b {
                return Err(GraphError::SameCell);
            }
            if !is_straight(b - a) {
                return Err(GraphError::NotStraight(a, b));
            }
            cells.extend(interior_points([a, b], cell_size).map(|p| (p, false)));
            cells.push((b, true));
        }
        Ok(cells)
    }
}

/// Whether a leg runs along an axis or at 45 degrees to one.
fn is_straight(diff: Vector2d) -> bool {
    let (dx, dy) = (diff.x.abs(), diff.y.abs());
    dx < 1e-9 || dy < 1e-9 || (dx - dy).abs() < 1e-9
}

#[cfg(test)]
mod test {
    use super::*;

    fn graph() -> RoadGraph {
        RoadGraph::new(&RoutingConfig::default())
    }

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    #[test]
    fn links_are_symmetric_and_fill_slots() {
        let mut g = graph();
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(3.0, 0.0)).unwrap();
        let c = g.add_node(p(5.0, 0.0)).unwrap();

        assert!(g.add_link(a, b));
        assert!(!g.add_link(a, b));
        assert!(g.contains_link(b, a));
        // `c` lies in the same direction from `a` as `b` does.
        assert!(!g.add_link(a, c));

        assert!(g.remove_link(b, a));
        assert!(!g.contains_link(a, b));
        assert!(g.add_link(a, c));
        g.clear_links(a);
        assert_eq!(g.node(a).unwrap().link_count(), 0);
        assert_eq!(g.node(c).unwrap().link_count(), 0);
    }

    #[test]
    #[should_panic]
    fn linking_a_dead_node_panics() {
        let mut g = graph();
        let a = g.add_node(p(0.0, 0.0)).unwrap();
        let b = g.add_node(p(2.0, 0.0)).unwrap();
        g.remove_node(b);
        g.add_link(a, b);
    }

    #[test]
    fn failed_road_leaves_the_graph_untouched() {
        let mut g = graph();
        g.build_road(&[p(0.0, 4.0), p(4.0, 4.0)]).unwrap();
        let (nodes, segments) = (g.nodes().count(), g.segments().count());

        // Both nodes are added before the crooked leg fails to connect.
        let err = g.rollback_on_error(|g| g.lay_road(vec![p(0.5, 0.5), p(3.5, 1.5)]));
        assert_eq!(err, Err(GraphError::NotStraight(p(0.5, 0.5), p(3.5, 1.5))));
        assert_eq!(g.nodes().count(), nodes);
        assert_eq!(g.segments().count(), segments);
        assert!(g.world().is_free(p(0.5, 0.5)));
        assert!(g.world().is_free(p(3.5, 1.5)));
        assert!(g.node_at(p(0.5, 4.5)).is_some());
    }

    #[test]
    fn road_through_a_segment_splits_it() {
        let mut g = graph();
        let ends = g.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        assert_eq!(ends.len(), 2);
        assert_eq!(g.segments().count(), 1);
        assert_eq!(g.segments().next().unwrap().length(), 6);

        let cross = g.build_road(&[p(3.0, -3.0), p(3.0, 3.0)]).unwrap();
        assert_eq!(cross.len(), 3);
        let middle = g.node_at(p(3.0, 0.0)).unwrap();
        assert_eq!(g.node(middle).unwrap().link_count(), 4);
        assert_eq!(g.segments().count(), 4);
    }

    #[test]
    fn straight_joints_are_merged() {
        let mut g = graph();
        g.build_road(&[p(0.0, 0.0), p(3.0, 0.0)]).unwrap();
        g.build_road(&[p(3.0, 0.0), p(6.0, 0.0)]).unwrap();
        assert_eq!(g.nodes().count(), 2);
        assert_eq!(g.segments().count(), 1);
        assert!(g.node_at(p(3.0, 0.0)).is_some());
        assert_eq!(g.world().entity_at(p(3.0, 0.0)).map(|e| matches!(e, Entity::Segment(_))), Some(true));
    }

    #[test]
    fn removing_a_branch_collapses_the_junction() {
        let mut g = graph();
        g.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        g.build_road(&[p(3.0, 0.0), p(3.0, 4.0)]).unwrap();
        assert_eq!(g.nodes().count(), 4);

        let top = g.node_at(p(3.0, 4.0)).unwrap();
        let junction = g.node_at(p(3.0, 0.0)).unwrap();
        let branch = g.segment_between(junction, top).unwrap();
        assert!(g.remove_segment(branch));

        // The dangling end and the junction both vanish.
        assert!(!g.is_alive(top));
        assert!(!g.is_alive(junction));
        assert_eq!(g.nodes().count(), 2);
        assert_eq!(g.segments().count(), 1);
    }

    #[test]
    fn bent_roads_and_bad_legs() {
        let mut g = graph();
        let seq = g.build_road(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)]).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(
            g.build_road(&[p(0.0, 10.0), p(3.0, 11.0)]),
            Err(GraphError::NotStraight(p(0.5, 10.5), p(3.5, 11.5)))
        );
        assert_eq!(g.build_road(&[p(0.0, 10.0), p(0.2, 10.2)]), Err(GraphError::SameCell));
    }

    #[test]
    fn node_lookup_by_position() {
        let mut g = graph();
        let seq = g.build_road(&[p(0.0, 0.0), p(6.0, 0.0)]).unwrap();
        assert_eq!(g.node_at(p(1.0, 0.0)), Some(seq[0]));
        assert_eq!(g.node_at(p(5.0, 0.0)), Some(seq[1]));
        assert_eq!(g.node_at(p(0.0, 5.0)), None);
        assert_eq!(g.nearest_node(p(0.0, 5.0)), Some(seq[0]));
    }

    #[test]
    fn buildings_join_through_entrances() {
        let mut g = graph();
        let layout = EntranceLayout::depot(p(0.5, 0.5), Vector2d::new(0.0, 1.0), 1, 1.0);
        let b = g.add_building(layout).unwrap();
        let entrance_node = g.building(b).unwrap().node();

        // The side of the depot has no entrance.
        assert_eq!(
            g.build_road(&[p(1.5, 0.5), p(5.5, 0.5)]),
            Err(GraphError::NotAnEntrance(p(1.5, 0.5)))
        );

        let seq = g.build_road(&[p(0.5, 1.5), p(0.5, 6.5)]).unwrap();
        assert_eq!(seq[0], entrance_node);
        assert_eq!(g.node_at(p(0.0, 0.0)), Some(entrance_node));
        assert!(g.node(entrance_node).unwrap().is_entrance());

        assert!(g.remove_building(b));
        assert!(!g.is_alive(entrance_node));
        assert_eq!(g.nodes().count(), 0);
        assert_eq!(g.segments().count(), 0);
        assert!(g.world().is_free(p(0.5, 0.5)));
    }
}
