//! Grid placement
//!
//! Projects floating-point module positions onto the pad grid. The mapping is
//! a derived view rebuilt every tick and never stored anywhere else.
//!
//! Placement is greedy: each node is quantized into the bounding box, and on
//! collision the resolver probes right, then down, then keeps moving right
//! until it finds a free cell or leaves the grid. Nodes that leave the grid
//! are not shown.

use crate::graph::{NodeId, Position};

/// Axis-aligned rectangle in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn around(position: Position) -> Self {
        Self::new(position.x, position.y, position.x, position.y)
    }

    fn include(&mut self, other: Bounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }
}

/// Node to cell assignment for one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridPlacement {
    columns: usize,
    rows: usize,
    cells: Vec<Option<NodeId>>,
}

impl GridPlacement {
    pub fn empty(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            cells: vec![None; columns * rows],
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_index(&self, column: usize, row: usize) -> usize {
        column + row * self.columns
    }

    pub fn node_at(&self, column: usize, row: usize) -> Option<NodeId> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells[self.cell_index(column, row)]
    }

    pub fn cell_of(&self, node: NodeId) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .position(|cell| *cell == Some(node))
            .map(|i| (i % self.columns, i / self.columns))
    }

    /// `(column, row, node)` for every occupied cell
    pub fn placed(&self) -> impl Iterator<Item = (usize, usize, NodeId)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            cell.map(|node| (i % self.columns, i / self.columns, node))
        })
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_free(&self, column: usize, row: usize) -> bool {
        column < self.columns && row < self.rows && self.cells[self.cell_index(column, row)].is_none()
    }
}

/// Builds placements for a fixed grid size
#[derive(Debug, Clone, Copy)]
pub struct GridResolver {
    columns: usize,
    rows: usize,
}

impl GridResolver {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    /// Place `nodes` in order
    ///
    /// The bounding box covers every node and `viewport` (when given), padded
    /// by one unit on the far side so a single node or a flat line still has
    /// a non-zero extent. Non-finite positions are skipped.
    pub fn resolve(&self, nodes: &[(NodeId, Position)], viewport: Option<Bounds>) -> GridPlacement {
        let mut placement = GridPlacement::empty(self.columns, self.rows);
        if self.columns == 0 || self.rows == 0 {
            return placement;
        }

        let finite = |p: &Position| p.x.is_finite() && p.y.is_finite();
        let mut bounds = viewport;
        for (_, position) in nodes.iter().filter(|(_, p)| finite(p)) {
            let point = Bounds::around(*position);
            bounds = Some(match bounds {
                Some(mut b) => {
                    b.include(point);
                    b
                }
                None => point,
            });
        }
        let Some(mut bounds) = bounds else {
            return placement;
        };
        bounds.max_x += 1.0;
        bounds.max_y += 1.0;

        let width = bounds.max_x - bounds.min_x;
        let height = bounds.max_y - bounds.min_y;

        for (node, position) in nodes.iter().filter(|(_, p)| finite(p)) {
            let mut column = quantize(position.x - bounds.min_x, width, self.columns);
            let mut row = quantize(position.y - bounds.min_y, height, self.rows);

            while column < self.columns && row < self.rows {
                if placement.is_free(column, row) {
                    let index = placement.cell_index(column, row);
                    placement.cells[index] = Some(*node);
                    break;
                }
                if placement.is_free(column + 1, row) {
                    column += 1;
                } else if placement.is_free(column, row + 1) {
                    row += 1;
                } else {
                    column += 1;
                }
            }
        }
        placement
    }
}

fn quantize(offset: f32, extent: f32, cells: usize) -> usize {
    let cell = (offset / extent * cells as f32).floor();
    if cell <= 0.0 {
        0
    } else {
        cell as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn node(index: u32) -> NodeId {
        NodeId {
            index,
            generation: 0,
        }
    }

    fn nodes_at(positions: &[(f32, f32)]) -> Vec<(NodeId, Position)> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| (node(i as u32), Position::new(x, y)))
            .collect()
    }

    #[test]
    fn test_single_node_lands_in_first_cell() {
        let placement = GridResolver::new(8, 8).resolve(&nodes_at(&[(250.0, 40.0)]), None);
        assert_eq!(placement.node_at(0, 0), Some(node(0)));
        assert_eq!(placement.len(), 1);
    }

    #[test]
    fn test_corners_map_to_corners() {
        let nodes = nodes_at(&[(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)]);
        let placement = GridResolver::new(8, 8).resolve(&nodes, None);
        assert_eq!(placement.cell_of(node(0)), Some((0, 0)));
        assert_eq!(placement.cell_of(node(1)), Some((7, 0)));
        assert_eq!(placement.cell_of(node(2)), Some((0, 7)));
        assert_eq!(placement.cell_of(node(3)), Some((7, 7)));
    }

    #[test]
    fn test_collision_probes_right_then_down() {
        // Three nodes quantizing into the same cell
        let nodes = nodes_at(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (100.0, 100.0)]);
        let placement = GridResolver::new(8, 8).resolve(&nodes, None);
        assert_eq!(placement.cell_of(node(0)), Some((0, 0)));
        assert_eq!(placement.cell_of(node(1)), Some((1, 0)));
        // Right of the origin is taken now, so the third probes down
        assert_eq!(placement.cell_of(node(2)), Some((0, 1)));
    }

    #[test]
    fn test_probe_moves_down_when_right_is_taken() {
        let nodes = nodes_at(&[(100.0, 0.0), (99.5, 0.0), (0.0, 100.0)]);
        let placement = GridResolver::new(8, 8).resolve(&nodes, None);
        assert_eq!(placement.cell_of(node(0)), Some((7, 0)));
        assert_eq!(placement.cell_of(node(1)), Some((7, 1)));
    }

    #[test]
    fn test_overflow_is_dropped_silently() {
        let positions: Vec<(f32, f32)> = (0..70).map(|i| (0.0, i as f32 * 0.001)).collect();
        let placement = GridResolver::new(8, 8).resolve(&nodes_at(&positions), None);
        assert!(placement.len() <= 64);
        let unique: HashSet<_> = placement.placed().map(|(c, r, _)| (c, r)).collect();
        assert_eq!(unique.len(), placement.len());
    }

    #[test]
    fn test_diagonal_of_ten_nodes_gets_ten_cells() {
        let positions: Vec<(f32, f32)> = (0..10)
            .map(|i| (i as f32 * 100.0 + 50.0, i as f32 * 100.0 + 50.0))
            .collect();
        let viewport = Bounds::new(0.0, 0.0, 1000.0, 1000.0);
        let placement = GridResolver::new(8, 8).resolve(&nodes_at(&positions), Some(viewport));

        let cells: HashSet<usize> = (0..10)
            .filter_map(|i| placement.cell_of(node(i)))
            .map(|(c, r)| placement.cell_index(c, r))
            .collect();
        assert_eq!(cells.len(), 10);
    }

    #[test]
    fn test_non_finite_positions_are_skipped() {
        let nodes = nodes_at(&[(f32::NAN, 0.0), (10.0, 10.0)]);
        let placement = GridResolver::new(8, 8).resolve(&nodes, None);
        assert_eq!(placement.cell_of(node(0)), None);
        assert_eq!(placement.cell_of(node(1)), Some((0, 0)));
    }

    #[test]
    fn test_non_square_grid() {
        let nodes = nodes_at(&[(0.0, 0.0), (100.0, 100.0)]);
        let placement = GridResolver::new(8, 4).resolve(&nodes, None);
        assert_eq!(placement.cell_of(node(1)), Some((7, 3)));
    }

    proptest! {
        #[test]
        fn prop_placement_is_injective(
            positions in proptest::collection::hash_set((0i32..2000, 0i32..2000), 0..=64)
        ) {
            let positions: Vec<(f32, f32)> =
                positions.into_iter().map(|(x, y)| (x as f32, y as f32)).collect();
            let placement = GridResolver::new(8, 8).resolve(&nodes_at(&positions), None);

            let mut seen = HashSet::new();
            for (column, row, node) in placement.placed() {
                prop_assert!(column < 8 && row < 8);
                prop_assert!(seen.insert(node), "node placed twice");
            }
        }

        #[test]
        fn prop_placement_is_deterministic(
            positions in proptest::collection::vec((-500.0f32..500.0, -500.0f32..500.0), 0..=64)
        ) {
            let nodes = nodes_at(&positions);
            let resolver = GridResolver::new(8, 8);
            prop_assert_eq!(resolver.resolve(&nodes, None), resolver.resolve(&nodes, None));
        }
    }
}
