//! Grid nodes and per-search scratch state

use glam::Vec3;

/// Cost of an axis-aligned step
pub const STRAIGHT_COST: u32 = 10;
/// Cost of a diagonal step (10 * sqrt(2), rounded)
pub const DIAGONAL_COST: u32 = 14;
/// g-cost of a node not reached yet
pub const UNVISITED: u32 = u32::MAX;

/// Index of a node in its grid's flat storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Integer grid coordinates of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCoord {
    pub x: usize,
    pub y: usize,
}

impl GridCoord {
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// One grid cell. Static data only; search state lives in [`SearchScratch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Grid coordinates
    pub coord: GridCoord,
    /// World-space center of the cell
    pub world_position: Vec3,
    walkable: bool,
}

impl Node {
    pub(crate) fn new(coord: GridCoord, world_position: Vec3, walkable: bool) -> Self {
        Self {
            coord,
            world_position,
            walkable,
        }
    }

    /// Check if agents may stand in this cell
    #[must_use]
    pub fn is_walkable(&self) -> bool {
        self.walkable
    }
}

/// Octile distance between two cells in fixed-point cost units.
///
/// Exact cost of the cheapest unobstructed route, so it doubles as an
/// admissible and consistent heuristic.
#[must_use]
pub fn diagonal_distance(a: GridCoord, b: GridCoord) -> u32 {
    let dx = a.x.abs_diff(b.x) as u32;
    let dy = a.y.abs_diff(b.y) as u32;
    let (short, long) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * short + STRAIGHT_COST * (long - short)
}

// ============================================================================
// Search Scratch
// ============================================================================

/// Search bookkeeping for a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeScratch {
    /// Best known cost from the start
    pub g_cost: u32,
    /// Heuristic estimate to the target
    pub h_cost: u32,
    /// Predecessor on the best known path
    pub parent: Option<NodeIndex>,
    /// Cost is final
    pub closed: bool,
}

impl NodeScratch {
    #[must_use]
    pub fn f_cost(&self) -> u32 {
        self.g_cost.saturating_add(self.h_cost)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for NodeScratch {
    fn default() -> Self {
        Self {
            g_cost: UNVISITED,
            h_cost: 0,
            parent: None,
            closed: false,
        }
    }
}

/// Search scratchpad keyed by node index.
///
/// Only one search may use a scratchpad at a time. Concurrent searches each
/// need their own.
#[derive(Debug, Clone, Default)]
pub struct SearchScratch {
    nodes: Vec<NodeScratch>,
    touched: Vec<usize>,
}

impl SearchScratch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratchpad sized for `len` nodes
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            nodes: vec![NodeScratch::default(); len],
            touched: Vec::new(),
        }
    }

    /// Prepare for a new search over a grid of `len` nodes.
    ///
    /// Resets every node touched by the previous search, or everything when
    /// the grid size changed.
    pub fn begin(&mut self, len: usize) {
        if self.nodes.len() != len {
            self.nodes.clear();
            self.nodes.resize(len, NodeScratch::default());
            self.touched.clear();
            return;
        }
        for &index in &self.touched {
            self.nodes[index].reset();
        }
        self.touched.clear();
    }

    /// Reset every node regardless of what was touched
    pub fn invalidate(&mut self) {
        self.nodes.iter_mut().for_each(NodeScratch::reset);
        self.touched.clear();
    }

    /// Scratch state of a node
    #[must_use]
    pub fn get(&self, index: NodeIndex) -> &NodeScratch {
        &self.nodes[index.0]
    }

    /// Mutable scratch state of a node, recording it for the next reset
    pub fn touch(&mut self, index: NodeIndex) -> &mut NodeScratch {
        let node = &mut self.nodes[index.0];
        if node.g_cost == UNVISITED && !node.closed {
            self.touched.push(index.0);
        }
        node
    }

    /// Number of nodes touched since the last reset
    #[must_use]
    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
