//! The cell grid the world is laid out on, used to find entities by position.

use std::collections::HashMap;

use crate::config::RoutingConfig;
use crate::math::Point2d;
use crate::util::Interval;
use crate::{BuildingId, NodeId, SegmentId};

/// The integer coordinates of a world cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub x: i32,
    pub y: i32,
}

/// Something occupying a world cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Node(NodeId),
    Segment(SegmentId),
    Building(BuildingId),
}

impl Entity {
    /// Segments give way to nodes and buildings placed on the same cell.
    fn priority(&self) -> u8 {
        match self {
            Entity::Segment(_) => 0,
            Entity::Node(_) | Entity::Building(_) => 1,
        }
    }
}

/// A square grid of cells centred on the origin.
#[derive(Clone, Debug)]
pub struct WorldGrid {
    cell_size: f64,
    bounds: Interval<f64>,
    cells: HashMap<CellKey, Entity>,
}

impl WorldGrid {
    /// Creates an empty world.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            cell_size: config.cell_size,
            bounds: Interval::disc(0.0, config.world_half_extent),
            cells: HashMap::new(),
        }
    }

    /// The side length of a cell.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Whether the point lies within the world.
    pub fn contains(&self, point: Point2d) -> bool {
        self.bounds.contains(point.x) && self.bounds.contains(point.y)
    }

    /// Gets the cell containing the point.
    pub fn cell_of(&self, point: Point2d) -> CellKey {
        CellKey {
            x: (point.x / self.cell_size).floor() as i32,
            y: (point.y / self.cell_size).floor() as i32,
        }
    }

    /// Gets the centre of a cell.
    pub fn centre_of(&self, cell: CellKey) -> Point2d {
        Point2d::new(
            (cell.x as f64 + 0.5) * self.cell_size,
            (cell.y as f64 + 0.5) * self.cell_size,
        )
    }

    /// Snaps a point to the centre of its cell, or `None` if it is outside the world.
    pub fn snap(&self, point: Point2d) -> Option<Point2d> {
        self.contains(point)
            .then(|| self.centre_of(self.cell_of(point)))
    }

    /// Gets the entity occupying the cell containing the point.
    pub fn entity_at(&self, point: Point2d) -> Option<Entity> {
        self.cells.get(&self.cell_of(point)).copied()
    }

    /// Whether nothing occupies the cell containing the point.
    pub fn is_free(&self, point: Point2d) -> bool {
        self.entity_at(point).is_none()
    }

    /// Gets the distinct entities whose cells intersect the rectangle `min`-`max`.
    pub fn entities_in_rect(&self, min: Point2d, max: Point2d) -> Vec<Entity> {
        let (lo, hi) = (self.cell_of(min), self.cell_of(max));
        let mut entities = vec![];
        for y in lo.y.min(hi.y)..=lo.y.max(hi.y) {
            for x in lo.x.min(hi.x)..=lo.x.max(hi.x) {
                if let Some(entity) = self.cells.get(&CellKey { x, y }) {
                    if !entities.contains(entity) {
                        entities.push(*entity);
                    }
                }
            }
        }
        entities
    }

    /// Places an entity on the cell containing the point.
    /// Returns false if a higher or equal priority entity is already there.
    pub(crate) fn occupy(&mut self, point: Point2d, entity: Entity) -> bool {
        let cell = self.cell_of(point);
        match self.cells.get(&cell) {
            Some(existing) if existing.priority() >= entity.priority() && *existing != entity => false,
            _ => {
                self.cells.insert(cell, entity);
                true
            }
        }
    }

    /// Removes the entity from the cell containing the point, if it is there.
    pub(crate) fn vacate(&mut self, point: Point2d, entity: Entity) {
        let cell = self.cell_of(point);
        if self.cells.get(&cell) == Some(&entity) {
            self.cells.remove(&cell);
        }
    }
}
