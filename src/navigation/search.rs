//! A* search over a navigation grid
//!
//! Steps cost 10 along an axis and 14 diagonally. The octile distance used as
//! heuristic is exact on an empty grid, so returned paths are optimal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;

use crate::navigation::grid::Grid;
use crate::navigation::node::{NodeIndex, SearchScratch, UNVISITED, diagonal_distance};

/// Result of pathfinding
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    /// Waypoints in world coordinates, start first
    pub waypoints: Vec<Vec3>,
    /// Total step cost in fixed-point units
    pub cost: u32,
}

impl PathResult {
    /// Empty result meaning "no path"
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if path was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Number of waypoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Total world-space length along the waypoints
    #[must_use]
    pub fn length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }
}

impl Default for PathResult {
    fn default() -> Self {
        Self {
            waypoints: Vec::new(),
            cost: 0,
        }
    }
}

/// Open set entry.
///
/// Ordered by `(f, h, seq)` so two nodes with equal keys never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f_cost: u32,
    h_cost: u32,
    seq: u64,
    index: NodeIndex,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap
        (other.f_cost, other.h_cost, other.seq).cmp(&(self.f_cost, self.h_cost, self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the cheapest walkable path from `start` to `target`.
///
/// Returns an empty result when either endpoint is blocked or out of range,
/// or when the target cannot be reached.
pub fn find_path(
    grid: &Grid,
    scratch: &mut SearchScratch,
    start: NodeIndex,
    target: NodeIndex,
) -> PathResult {
    let (Some(start_node), Some(target_node)) = (grid.node(start), grid.node(target)) else {
        log::warn!("Path endpoints {start:?} -> {target:?} are outside the grid");
        return PathResult::empty();
    };
    if !start_node.is_walkable() || !target_node.is_walkable() {
        log::trace!(
            "Path endpoint not walkable: {:?} -> {:?}",
            start_node.coord,
            target_node.coord
        );
        return PathResult::empty();
    }

    scratch.begin(grid.len());
    let target_coord = target_node.coord;

    let mut open_set = BinaryHeap::new();
    let mut seq = 0u64;

    let h_cost = diagonal_distance(start_node.coord, target_coord);
    let entry = scratch.touch(start);
    entry.g_cost = 0;
    entry.h_cost = h_cost;
    open_set.push(OpenEntry {
        f_cost: h_cost,
        h_cost,
        seq,
        index: start,
    });

    while let Some(current) = open_set.pop() {
        let current_g = {
            let node = scratch.touch(current.index);
            if node.closed {
                continue;
            }
            node.closed = true;
            node.g_cost
        };

        if current.index == target {
            return retrace(grid, scratch, start, target);
        }

        let Some(current_coord) = grid.node(current.index).map(|node| node.coord) else {
            continue;
        };
        for neighbor in grid.neighbors(current.index) {
            let Some(node) = grid.node(neighbor) else {
                continue;
            };
            if !node.is_walkable() || scratch.get(neighbor).closed {
                continue;
            }

            let tentative_g = current_g.saturating_add(diagonal_distance(current_coord, node.coord));
            let previous_g = scratch.get(neighbor).g_cost;
            if previous_g != UNVISITED && tentative_g >= previous_g {
                continue;
            }

            let h_cost = diagonal_distance(node.coord, target_coord);
            let entry = scratch.touch(neighbor);
            entry.g_cost = tentative_g;
            entry.h_cost = h_cost;
            entry.parent = Some(current.index);

            seq += 1;
            open_set.push(OpenEntry {
                f_cost: tentative_g.saturating_add(h_cost),
                h_cost,
                seq,
                index: neighbor,
            });
        }
    }

    // No path found
    PathResult::empty()
}

/// Walk predecessor links from the target back to the start
fn retrace(grid: &Grid, scratch: &SearchScratch, start: NodeIndex, target: NodeIndex) -> PathResult {
    let mut waypoints = Vec::new();
    let mut current = target;

    loop {
        let Some(node) = grid.node(current) else {
            break;
        };
        waypoints.push(node.world_position);
        if current == start {
            break;
        }
        match scratch.get(current).parent {
            Some(parent) => current = parent,
            None => break,
        }
    }

    waypoints.reverse();
    PathResult {
        waypoints,
        cost: scratch.get(target).g_cost,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::navigation::node::GridCoord;

    /// Build a grid from rows of text, top row first. `#` is blocked.
    fn grid_from_rows(rows: &[&str]) -> Grid {
        let height = rows.len();
        let width = rows[0].len();
        let mut cells = vec![true; width * height];
        for (row, line) in rows.iter().enumerate() {
            let y = height - 1 - row;
            for (x, c) in line.chars().enumerate() {
                cells[y * width + x] = c != '#';
            }
        }
        Grid::from_walkability(
            Vec3::ZERO,
            Vec2::new(width as f32, height as f32),
            0.5,
            &cells,
        )
        .unwrap()
    }

    fn search(grid: &Grid, from: (usize, usize), to: (usize, usize)) -> PathResult {
        let mut scratch = SearchScratch::new();
        find_path(
            grid,
            &mut scratch,
            grid.index_of(from.0, from.1).unwrap(),
            grid.index_of(to.0, to.1).unwrap(),
        )
    }

    fn coords(grid: &Grid, path: &PathResult) -> Vec<GridCoord> {
        path.waypoints
            .iter()
            .map(|&p| grid.node_from_world_point(p).coord)
            .collect()
    }

    /// Sum of step costs along the returned waypoints
    fn step_cost_sum(grid: &Grid, path: &PathResult) -> u32 {
        coords(grid, path)
            .windows(2)
            .map(|pair| diagonal_distance(pair[0], pair[1]))
            .sum()
    }

    #[test]
    fn test_open_entry_ordering() {
        let mut heap = BinaryHeap::new();
        let entry = |f_cost, h_cost, seq| OpenEntry {
            f_cost,
            h_cost,
            seq,
            index: NodeIndex(seq as usize),
        };
        heap.push(entry(50, 20, 0));
        heap.push(entry(40, 30, 1));
        heap.push(entry(40, 10, 2));
        heap.push(entry(40, 10, 3));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|e| e.seq).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    #[test]
    fn test_diagonal_corner_to_corner() {
        let grid = grid_from_rows(&[".........."; 10]);
        let path = search(&grid, (0, 0), (9, 9));

        assert_eq!(path.cost, 126);
        assert_eq!(path.len(), 10);
        assert_eq!(step_cost_sum(&grid, &path), 126);
        for (i, coord) in coords(&grid, &path).into_iter().enumerate() {
            assert_eq!(coord, GridCoord::new(i, i));
        }
    }

    #[test]
    fn test_start_equals_target() {
        let grid = grid_from_rows(&["....", "....", "...."]);
        let path = search(&grid, (2, 1), (2, 1));

        assert_eq!(path.len(), 1);
        assert_eq!(path.cost, 0);
        assert_eq!(path.waypoints[0], grid.node_at(2, 1).unwrap().world_position);
    }

    #[test]
    fn test_straight_line() {
        let grid = grid_from_rows(&["......"]);
        let path = search(&grid, (0, 0), (5, 0));

        assert_eq!(path.len(), 6);
        assert_eq!(path.cost, 50);
        assert!((path.length() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_wall_with_single_gap() {
        let grid = grid_from_rows(&[
            "....#....",
            "....#....",
            ".........",
            "....#....",
            "....#....",
            "....#....",
            "....#....",
        ]);
        let path = search(&grid, (0, 0), (8, 0));
        assert!(!path.is_empty());

        let in_column: Vec<GridCoord> = coords(&grid, &path)
            .into_iter()
            .filter(|c| c.x == 4)
            .collect();
        assert_eq!(in_column, vec![GridCoord::new(4, 4)]);
    }

    #[test]
    fn test_never_crosses_blocked_cells() {
        let grid = grid_from_rows(&[
            "..........",
            ".#######..",
            ".#.....#..",
            ".#.###.#..",
            ".#.#.#.#..",
            ".#.#...#..",
            ".#.#####..",
            ".#........",
            ".########.",
            "..........",
        ]);
        let path = search(&grid, (0, 0), (4, 5));
        assert!(!path.is_empty());
        for coord in coords(&grid, &path) {
            assert!(grid.node_at(coord.x, coord.y).unwrap().is_walkable());
        }
        assert_eq!(step_cost_sum(&grid, &path), path.cost);
    }

    #[test]
    fn test_optimal_around_obstacle() {
        let grid = grid_from_rows(&[
            ".....",
            "..#..",
            "..#..",
            "..#..",
            ".....",
        ]);
        // Straight route blocked; the detour has to reach row 0 or row 4
        let path = search(&grid, (0, 2), (4, 2));
        assert_eq!(path.cost, 4 * 14);
        assert_eq!(step_cost_sum(&grid, &path), path.cost);
    }

    #[test]
    fn test_enclosed_start_returns_empty() {
        let grid = grid_from_rows(&[".....", ".###.", ".#.#.", ".###.", "....."]);
        let path = search(&grid, (2, 2), (0, 0));
        assert!(path.is_empty());
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_blocked_endpoints_return_empty() {
        let grid = grid_from_rows(&["#..", "...", "..#"]);
        assert!(search(&grid, (2, 0), (0, 0)).is_empty());
        assert!(search(&grid, (0, 0), (0, 2)).is_empty());
    }

    #[test]
    fn test_out_of_range_index_returns_empty() {
        let grid = grid_from_rows(&["..."]);
        let mut scratch = SearchScratch::new();
        let path = find_path(&grid, &mut scratch, NodeIndex(0), NodeIndex(99));
        assert!(path.is_empty());
    }

    #[test]
    fn test_scratch_reuse_gives_same_result() {
        let grid = grid_from_rows(&[
            "......",
            ".####.",
            "......",
            "#####.",
            "......",
        ]);
        let mut scratch = SearchScratch::new();
        let a = grid.index_of(0, 0).unwrap();
        let b = grid.index_of(0, 4).unwrap();
        let c = grid.index_of(5, 2).unwrap();

        let first = find_path(&grid, &mut scratch, a, b);
        let _other = find_path(&grid, &mut scratch, c, a);
        let again = find_path(&grid, &mut scratch, a, b);

        assert!(!first.is_empty());
        assert_eq!(first, again);
    }

    #[test]
    fn test_unreachable_target_after_reuse() {
        let grid = grid_from_rows(&["..#..", "..#..", "..#.."]);
        let mut scratch = SearchScratch::new();
        let left = grid.index_of(0, 0).unwrap();
        let right = grid.index_of(4, 0).unwrap();
        let up = grid.index_of(1, 2).unwrap();

        assert!(!find_path(&grid, &mut scratch, left, up).is_empty());
        assert!(find_path(&grid, &mut scratch, left, right).is_empty());
    }

    #[test]
    fn test_grid_find_path_clamps_target() {
        let grid = grid_from_rows(&[".........."; 10]);
        let path = grid.find_path(Vec3::new(-4.5, 0.5, 0.0), Vec3::new(55.0, 0.5, 0.0));

        assert!(!path.is_empty());
        let last = *path.waypoints.last().unwrap();
        assert_eq!(grid.node_from_world_point(last).coord, GridCoord::new(9, 5));
    }

    #[test]
    fn test_deterministic_results() {
        let grid = grid_from_rows(&["........"; 8]);
        let first = search(&grid, (0, 3), (7, 5));
        for _ in 0..5 {
            assert_eq!(search(&grid, (0, 3), (7, 5)), first);
        }
    }
}
