//! Uniform navigation grid over a rectangular world region
//!
//! Cells are squares of side `2 * node_radius`, laid out row-major from the
//! bottom-left corner. Walkability is sampled once, at construction time, and
//! never changes afterwards. A topology change means building a new grid.

use glam::{Vec2, Vec3};
use rand::Rng;
use rand::seq::IteratorRandom;
use smallvec::SmallVec;

use crate::core::config::{self, ConfigError, PathfindingConfig};
use crate::navigation::node::{GridCoord, Node, NodeIndex, SearchScratch};
use crate::navigation::probe::{CategoryMask, CollisionProbe};
use crate::navigation::search::{PathResult, find_path};

/// Neighbour list of a single cell
pub type Neighbors = SmallVec<[NodeIndex; 8]>;

/// Immutable 2D navigation grid
#[derive(Debug, Clone)]
pub struct Grid {
    center: Vec3,
    world_size: Vec2,
    node_radius: f32,
    width: usize,
    height: usize,
    unwalkable_mask: CategoryMask,
    nodes: Vec<Node>,
}

impl Grid {
    /// Build a grid, sampling every cell center against `probe`
    pub fn new(
        center: Vec3,
        world_size: Vec2,
        node_radius: f32,
        unwalkable_mask: CategoryMask,
        probe: &impl CollisionProbe,
    ) -> Result<Self, ConfigError> {
        Self::build(center, world_size, node_radius, unwalkable_mask, |point| {
            !probe.is_blocked(point, node_radius, unwalkable_mask)
        })
    }

    /// Build a grid from a validated config
    pub fn from_config(
        config: &PathfindingConfig,
        probe: &impl CollisionProbe,
    ) -> Result<Self, ConfigError> {
        Self::new(
            config.center,
            config.grid_world_size,
            config.node_radius,
            config.unwalkable_mask,
            probe,
        )
    }

    /// Build a grid from explicit walkability flags (row-major, `true` =
    /// walkable). Missing entries are walkable.
    pub fn from_walkability(
        center: Vec3,
        world_size: Vec2,
        node_radius: f32,
        cells: &[bool],
    ) -> Result<Self, ConfigError> {
        let mut index = 0;
        Self::build(center, world_size, node_radius, CategoryMask::NONE, |_| {
            let walkable = cells.get(index).copied().unwrap_or(true);
            index += 1;
            walkable
        })
    }

    fn build(
        center: Vec3,
        world_size: Vec2,
        node_radius: f32,
        unwalkable_mask: CategoryMask,
        mut sample: impl FnMut(Vec3) -> bool,
    ) -> Result<Self, ConfigError> {
        config::validate_grid(world_size, node_radius)?;
        let (width, height) = config::grid_dimensions(world_size, node_radius);

        let mut grid = Self {
            center,
            world_size,
            node_radius,
            width,
            height,
            unwalkable_mask,
            nodes: Vec::with_capacity(width * height),
        };

        for y in 0..height {
            for x in 0..width {
                let position = grid.world_point(x, y);
                let walkable = sample(position);
                grid.nodes
                    .push(Node::new(GridCoord::new(x, y), position, walkable));
            }
        }

        log::debug!(
            "Built {}x{} navigation grid ({} walkable cells)",
            width,
            height,
            grid.walkable_count()
        );
        Ok(grid)
    }

    /// Width in cells
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Half the side length of a cell
    #[must_use]
    pub fn node_radius(&self) -> f32 {
        self.node_radius
    }

    /// World-space center of the grid
    #[must_use]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// World extent covered by the grid
    #[must_use]
    pub fn world_size(&self) -> Vec2 {
        self.world_size
    }

    /// Categories that were sampled as blocking
    #[must_use]
    pub fn unwalkable_mask(&self) -> CategoryMask {
        self.unwalkable_mask
    }

    /// World position of the grid's bottom-left corner
    #[must_use]
    pub fn bottom_left(&self) -> Vec3 {
        self.center - (self.world_size / 2.0).extend(0.0)
    }

    /// Number of walkable cells
    #[must_use]
    pub fn walkable_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_walkable()).count()
    }

    /// Flat index of in-bounds coordinates
    #[must_use]
    pub fn index_of(&self, x: usize, y: usize) -> Option<NodeIndex> {
        (x < self.width && y < self.height).then(|| NodeIndex(y * self.width + x))
    }

    /// Node by flat index
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index.0)
    }

    /// Node by grid coordinates
    #[must_use]
    pub fn node_at(&self, x: usize, y: usize) -> Option<&Node> {
        self.index_of(x, y).and_then(|index| self.node(index))
    }

    /// World-space center of a cell.
    ///
    /// Coordinates outside the grid extrapolate along the same lattice.
    #[must_use]
    pub fn world_point(&self, x: usize, y: usize) -> Vec3 {
        let diameter = self.node_radius * 2.0;
        self.bottom_left()
            + Vec3::new(
                x as f32 * diameter + self.node_radius,
                y as f32 * diameter + self.node_radius,
                0.0,
            )
    }

    /// Index of the cell containing `position`, clamped to the grid bounds.
    ///
    /// Cells are measured from the bottom-left corner in steps of one cell
    /// diameter, so the covered extent is `width * diameter`, which differs
    /// from `world_size` when the size is not a whole number of cells.
    #[must_use]
    pub fn index_from_world_point(&self, position: Vec3) -> NodeIndex {
        let diameter = self.node_radius * 2.0;
        let local = (position - self.bottom_left()) / diameter;

        let x = (local.x.floor().max(0.0) as usize).min(self.width - 1);
        let y = (local.y.floor().max(0.0) as usize).min(self.height - 1);
        NodeIndex(y * self.width + x)
    }

    /// Node whose cell contains `position`.
    ///
    /// Points outside the grid resolve to the nearest boundary cell.
    #[must_use]
    pub fn node_from_world_point(&self, position: Vec3) -> &Node {
        &self.nodes[self.index_from_world_point(position).0]
    }

    /// World positions of every walkable cell, row-major from the bottom-left
    pub fn walkable_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.is_walkable())
            .map(|node| node.world_position)
    }

    /// World positions of walkable cells resting directly on blocked ones.
    ///
    /// These are the places a grounded agent can stand. The bottom row has
    /// nothing underneath and never qualifies.
    pub fn standing_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.is_walkable())
            .filter(|node| {
                let GridCoord { x, y } = node.coord;
                y.checked_sub(1)
                    .and_then(|below| self.node_at(x, below))
                    .is_some_and(|below| !below.is_walkable())
            })
            .map(|node| node.world_position)
    }

    /// Uniformly chosen walkable cell center, or `None` if every cell is blocked
    pub fn random_walkable_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec3> {
        let position = self.walkable_positions().choose(rng);
        if position.is_none() {
            log::warn!("No walkable cells to pick a position from");
        }
        position
    }

    /// Uniformly chosen standing position, or `None` if there is none
    pub fn random_standing_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec3> {
        let position = self.standing_positions().choose(rng);
        if position.is_none() {
            log::warn!("No standing positions to pick from");
        }
        position
    }

    /// In-bounds 8-connected neighbours of a cell, in a fixed order.
    ///
    /// Walkability is not filtered here.
    #[must_use]
    pub fn neighbors(&self, index: NodeIndex) -> Neighbors {
        let mut result = Neighbors::new();
        let Some(node) = self.node(index) else {
            return result;
        };
        let GridCoord { x, y } = node.coord;

        for dx in -1isize..=1 {
            for dy in -1isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy))
                else {
                    continue;
                };
                if let Some(neighbor) = self.index_of(nx, ny) {
                    result.push(neighbor);
                }
            }
        }

        result
    }

    /// Find a path between two world points with a throwaway scratchpad
    #[must_use]
    pub fn find_path(&self, start: Vec3, end: Vec3) -> PathResult {
        let mut scratch = SearchScratch::with_len(self.len());
        find_path(
            self,
            &mut scratch,
            self.index_from_world_point(start),
            self.index_from_world_point(end),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(size: f32, radius: f32) -> Grid {
        Grid::from_walkability(Vec3::ZERO, Vec2::splat(size), radius, &[]).unwrap()
    }

    #[test]
    fn test_dimensions_and_positions() {
        let grid = open_grid(10.0, 0.5);

        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 10);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid.bottom_left(), Vec3::new(-5.0, -5.0, 0.0));
        assert_eq!(grid.world_point(0, 0), Vec3::new(-4.5, -4.5, 0.0));
        assert_eq!(grid.world_point(9, 9), Vec3::new(4.5, 4.5, 0.0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Grid::from_walkability(Vec3::ZERO, Vec2::new(-1.0, 5.0), 0.5, &[]);
        assert!(matches!(result, Err(ConfigError::InvalidWorldSize(_))));

        let result = Grid::from_walkability(Vec3::ZERO, Vec2::splat(5.0), 0.0, &[]);
        assert!(matches!(result, Err(ConfigError::InvalidNodeRadius(_))));

        let result = Grid::from_walkability(Vec3::ZERO, Vec2::splat(1e12), 0.5, &[]);
        assert!(matches!(result, Err(ConfigError::GridTooLarge { .. })));
    }

    #[test]
    fn test_probe_sampling() {
        // Block everything with x > 0
        let probe = |p: Vec3, _r: f32, _m: CategoryMask| p.x > 0.0;
        let grid = Grid::new(Vec3::ZERO, Vec2::splat(4.0), 0.5, CategoryMask::ALL, &probe).unwrap();

        assert!(grid.node_at(0, 0).unwrap().is_walkable());
        assert!(grid.node_at(1, 3).unwrap().is_walkable());
        assert!(!grid.node_at(2, 0).unwrap().is_walkable());
        assert!(!grid.node_at(3, 3).unwrap().is_walkable());
        assert_eq!(grid.walkable_count(), 8);
    }

    #[test]
    fn test_probe_receives_radius_and_mask() {
        let mask = CategoryMask::bit(3);
        let probe = |_p: Vec3, r: f32, m: CategoryMask| r != 0.25 || m != mask;
        let grid = Grid::new(Vec3::ZERO, Vec2::splat(2.0), 0.25, mask, &probe).unwrap();

        assert_eq!(grid.walkable_count(), grid.len());
        assert_eq!(grid.unwalkable_mask(), mask);
    }

    #[test]
    fn test_node_from_world_point_contains_point() {
        let grid = open_grid(10.0, 0.5);
        let diameter = 1.0;

        for i in 0..40 {
            for j in 0..40 {
                let point = Vec3::new(-5.0 + i as f32 * 0.249, -5.0 + j as f32 * 0.251, 0.0);
                let node = grid.node_from_world_point(point);
                let offset = (point - node.world_position).abs();
                assert!(
                    offset.x <= diameter / 2.0 + 1e-4 && offset.y <= diameter / 2.0 + 1e-4,
                    "{point} resolved to cell at {}",
                    node.world_position
                );
            }
        }
    }

    #[test]
    fn test_contains_point_when_size_is_not_a_cell_multiple() {
        // 10 / 0.6 rounds to 17 cells, covering -5.0..5.2
        let grid = open_grid(10.0, 0.3);
        assert_eq!(grid.width(), 17);

        let node = grid.node_from_world_point(Vec3::new(-4.41, -4.41, 0.0));
        assert_eq!(node.coord, GridCoord::new(0, 0));

        for i in 0..102 {
            for j in 0..102 {
                let point = Vec3::new(-4.995 + i as f32 * 0.1, -4.995 + j as f32 * 0.1, 0.0);
                let node = grid.node_from_world_point(point);
                let offset = (point - node.world_position).abs();
                assert!(
                    offset.x <= 0.3 + 1e-4 && offset.y <= 0.3 + 1e-4,
                    "{point} resolved to cell at {}",
                    node.world_position
                );
            }
        }

        let node = grid.node_from_world_point(Vec3::new(5.15, 5.15, 0.0));
        assert_eq!(node.coord, GridCoord::new(16, 16));
    }

    #[test]
    fn test_node_from_world_point_clamps() {
        let grid = open_grid(10.0, 0.5);

        let node = grid.node_from_world_point(Vec3::new(55.0, 0.2, 0.0));
        assert_eq!(node.coord, GridCoord::new(9, 5));

        let node = grid.node_from_world_point(Vec3::new(-100.0, -100.0, 0.0));
        assert_eq!(node.coord, GridCoord::new(0, 0));

        let node = grid.node_from_world_point(Vec3::new(5.0, 5.0, 0.0));
        assert_eq!(node.coord, GridCoord::new(9, 9));
    }

    #[test]
    fn test_offset_center() {
        let grid = Grid::from_walkability(Vec3::new(100.0, 50.0, 0.0), Vec2::splat(4.0), 1.0, &[])
            .unwrap();

        assert_eq!(grid.width(), 2);
        assert_eq!(grid.world_point(0, 0), Vec3::new(99.0, 49.0, 0.0));
        let node = grid.node_from_world_point(Vec3::new(101.5, 48.5, 0.0));
        assert_eq!(node.coord, GridCoord::new(1, 0));
    }

    #[test]
    fn test_neighbors() {
        let grid = open_grid(3.0, 0.5);

        let center = grid.index_of(1, 1).unwrap();
        assert_eq!(grid.neighbors(center).len(), 8);

        let corner = grid.index_of(0, 0).unwrap();
        let neighbors = grid.neighbors(corner);
        assert_eq!(neighbors.len(), 3);
        assert_eq!(
            neighbors.as_slice(),
            &[
                grid.index_of(0, 1).unwrap(),
                grid.index_of(1, 0).unwrap(),
                grid.index_of(1, 1).unwrap(),
            ]
        );

        let edge = grid.index_of(2, 1).unwrap();
        assert_eq!(grid.neighbors(edge).len(), 5);
    }

    #[test]
    fn test_neighbors_out_of_range() {
        let grid = open_grid(3.0, 0.5);
        assert!(grid.neighbors(NodeIndex(100)).is_empty());
    }

    #[test]
    fn test_walkability_layout_is_row_major() {
        let mut cells = vec![true; 9];
        cells[5] = false; // (2, 1)
        let grid = Grid::from_walkability(Vec3::ZERO, Vec2::splat(3.0), 0.5, &cells).unwrap();

        assert!(!grid.node_at(2, 1).unwrap().is_walkable());
        assert!(grid.node_at(1, 2).unwrap().is_walkable());
    }

    #[test]
    fn test_walkable_and_standing_positions() {
        // Floor on the bottom row, one pillar cell at (1, 1)
        let mut cells = vec![true; 9];
        cells[0] = false;
        cells[1] = false;
        cells[2] = false;
        cells[4] = false;
        let grid = Grid::from_walkability(Vec3::ZERO, Vec2::splat(3.0), 0.5, &cells).unwrap();

        let walkable: Vec<Vec3> = grid.walkable_positions().collect();
        assert_eq!(walkable.len(), 5);
        assert_eq!(walkable[0], grid.world_point(0, 1));

        let standing: Vec<Vec3> = grid.standing_positions().collect();
        assert_eq!(
            standing,
            vec![grid.world_point(0, 1), grid.world_point(2, 1), grid.world_point(1, 2)]
        );
    }

    #[test]
    fn test_random_positions() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let mut cells = vec![true; 9];
        cells[..3].fill(false);
        let grid = Grid::from_walkability(Vec3::ZERO, Vec2::splat(3.0), 0.5, &cells).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let position = grid.random_walkable_position(&mut rng).unwrap();
            assert!(grid.node_from_world_point(position).is_walkable());

            let standing = grid.random_standing_position(&mut rng).unwrap();
            assert_eq!(grid.node_from_world_point(standing).coord.y, 1);
        }

        let blocked = Grid::from_walkability(Vec3::ZERO, Vec2::splat(3.0), 0.5, &[false; 9]).unwrap();
        assert_eq!(blocked.random_walkable_position(&mut rng), None);
        assert_eq!(blocked.random_standing_position(&mut rng), None);
    }
}
