//! Dependency graph for formula cells.
//!
//! Tracks, for every formula cell, the cells its formula reads, and the
//! reverse: for every cell, the formula cells that read it.
//!
//! # Invariants
//!
//! 1. **Symmetry:** `b ∈ reads[a]` iff `a ∈ read_by[b]`.
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **Atomic updates:** `replace_edges` is the only mutator that touches
//!    both maps.

use rustc_hash::{FxHashMap, FxHashSet};

use tabula_core::Position;

#[derive(Clone, Debug, Default)]
pub struct DepGraph {
    /// For each formula cell, the cells its formula reads.
    reads: FxHashMap<Position, FxHashSet<Position>>,
    /// For each cell, the formula cells whose formulas read it.
    read_by: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells the formula at `cell` reads.
    pub fn reads_of(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.reads
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Formula cells that read `cell`.
    pub fn readers_of(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.read_by
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True if at least one formula reads `cell`.
    pub fn is_read(&self, cell: Position) -> bool {
        self.read_by.contains_key(&cell)
    }

    /// Cells with outgoing edges (cells whose content is a referencing
    /// formula).
    pub fn formula_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.reads.keys().copied()
    }

    /// Number of cells with outgoing edges.
    pub fn formula_cell_count(&self) -> usize {
        self.reads.len()
    }

    /// Number of cells read by at least one formula.
    pub fn read_cell_count(&self) -> usize {
        self.read_by.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.reads.values().map(|s| s.len()).sum()
    }

    /// Replace all outgoing edges of `cell` atomically.
    ///
    /// Removes `cell` from the reader set of every old read, then inserts
    /// it into the reader set of every new one. Pass an empty set to retire
    /// the cell's edges entirely.
    pub fn replace_edges(&mut self, cell: Position, new_reads: FxHashSet<Position>) {
        if let Some(old_reads) = self.reads.remove(&cell) {
            for read in old_reads {
                if let Some(readers) = self.read_by.get_mut(&read) {
                    readers.remove(&cell);
                    if readers.is_empty() {
                        self.read_by.remove(&read);
                    }
                }
            }
        }

        if new_reads.is_empty() {
            return;
        }

        for &read in &new_reads {
            self.read_by.entry(read).or_default().insert(cell);
        }
        self.reads.insert(cell, new_reads);
    }

    /// Retire all outgoing edges of `cell`.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Would pointing `cell` at `new_reads` close a cycle?
    ///
    /// True iff `cell` is reachable from some candidate read along existing
    /// `reads` edges; self-reference is the length-1 case. The candidate
    /// edges themselves are never materialized: the check runs against the
    /// committed graph only, so a rejected set leaves no trace.
    pub fn would_create_cycle(&self, cell: Position, new_reads: &FxHashSet<Position>) -> bool {
        if new_reads.contains(&cell) {
            return true;
        }
        new_reads.iter().any(|&read| self.can_reach(read, cell))
    }

    /// Depth-first reachability from `start` to `target` over `reads`
    /// edges. The visited set bounds the walk by the number of cells that
    /// have edges, so it terminates on any graph shape.
    fn can_reach(&self, start: Position, target: Position) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(reads) = self.reads.get(&current) {
                stack.extend(reads.iter().copied().filter(|p| !visited.contains(p)));
            }
        }

        false
    }

    /// Check both maps against the invariants. Panics on violation.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, reads) in &self.reads {
            assert!(!reads.is_empty(), "empty reads set stored for {cell}");
            for read in reads {
                assert!(
                    self.read_by.get(read).map_or(false, |s| s.contains(cell)),
                    "missing read_by edge: {read} should list {cell}"
                );
            }
        }

        for (cell, readers) in &self.read_by {
            assert!(!readers.is_empty(), "empty read_by set stored for {cell}");
            for reader in readers {
                assert!(
                    self.reads.get(reader).map_or(false, |s| s.contains(cell)),
                    "missing reads edge: {reader} should list {cell}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(a1: &str) -> Position {
        Position::from_a1(a1).unwrap()
    }

    fn set(cells: &[Position]) -> FxHashSet<Position> {
        cells.iter().copied().collect()
    }

    #[test]
    fn replace_edges_populates_both_maps() {
        let mut graph = DepGraph::new();
        let (a1, a2, a3) = (pos("A1"), pos("A2"), pos("A3"));

        graph.replace_edges(a3, set(&[a1, a2]));
        graph.assert_consistent();

        assert_eq!(graph.reads_of(a3).count(), 2);
        assert!(graph.readers_of(a1).any(|c| c == a3));
        assert!(graph.readers_of(a2).any(|c| c == a3));
        assert_eq!(graph.formula_cell_count(), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn replace_edges_retires_old_edges() {
        let mut graph = DepGraph::new();
        let (a1, a2, a3, b1) = (pos("A1"), pos("A2"), pos("A3"), pos("B1"));

        graph.replace_edges(a3, set(&[a1, a2]));
        graph.replace_edges(a3, set(&[b1]));
        graph.assert_consistent();

        assert_eq!(graph.reads_of(a3).collect::<Vec<_>>(), vec![b1]);
        assert!(!graph.is_read(a1));
        assert!(!graph.is_read(a2));
        assert!(graph.is_read(b1));
    }

    #[test]
    fn clear_cell_leaves_no_dangling_entries() {
        let mut graph = DepGraph::new();
        let (a1, a2, a3) = (pos("A1"), pos("A2"), pos("A3"));

        graph.replace_edges(a3, set(&[a1, a2]));
        graph.clear_cell(a3);
        graph.assert_consistent();

        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.read_cell_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let graph = DepGraph::new();
        let a1 = pos("A1");
        assert!(graph.would_create_cycle(a1, &set(&[a1])));
    }

    #[test]
    fn two_cell_cycle() {
        let mut graph = DepGraph::new();
        let (a1, b1) = (pos("A1"), pos("B1"));

        graph.replace_edges(a1, set(&[b1]));
        assert!(graph.would_create_cycle(b1, &set(&[a1])));
    }

    #[test]
    fn transitive_cycle() {
        let mut graph = DepGraph::new();
        let (a1, a2, a3) = (pos("A1"), pos("A2"), pos("A3"));

        // A2 reads A1, A3 reads A2; pointing A1 at A3 closes the loop.
        graph.replace_edges(a2, set(&[a1]));
        graph.replace_edges(a3, set(&[a2]));
        assert!(graph.would_create_cycle(a1, &set(&[a3])));
    }

    #[test]
    fn no_false_positive_on_shared_reads() {
        let mut graph = DepGraph::new();
        let (a1, a2, b1) = (pos("A1"), pos("A2"), pos("B1"));

        graph.replace_edges(a2, set(&[a1]));
        assert!(!graph.would_create_cycle(b1, &set(&[a1])));
        assert!(!graph.would_create_cycle(b1, &set(&[a2])));
        assert!(!graph.would_create_cycle(b1, &set(&[a1, a2])));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DepGraph::new();
        let (a1, a2, a3, a4) = (pos("A1"), pos("A2"), pos("A3"), pos("A4"));

        graph.replace_edges(a2, set(&[a1]));
        graph.replace_edges(a3, set(&[a1]));
        assert!(!graph.would_create_cycle(a4, &set(&[a2, a3])));

        graph.replace_edges(a4, set(&[a2, a3]));
        graph.assert_consistent();
        assert!(graph.would_create_cycle(a1, &set(&[a4])));
    }

    #[test]
    fn cycle_check_does_not_mutate() {
        let mut graph = DepGraph::new();
        let (a1, b1) = (pos("A1"), pos("B1"));

        graph.replace_edges(a1, set(&[b1]));
        assert!(graph.would_create_cycle(b1, &set(&[a1])));
        graph.assert_consistent();

        assert_eq!(graph.formula_cell_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.is_read(a1));
    }
}
