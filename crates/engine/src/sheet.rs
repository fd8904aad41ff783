//! The sheet: sparse cell storage and the sole mutator of the dependency
//! graph.
//!
//! Every mutation is a single transaction. Position validation, formula
//! parsing, and the cycle check all run before anything changes; a failure
//! leaves cells, edges, and caches exactly as they were.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tabula_core::{Position, SheetError, Size, Value};

use crate::cell::{Cell, CellContent};
use crate::dep_graph::DepGraph;
use crate::resolve::CellReader;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sheet {
    cells: FxHashMap<Position, Cell>,
    /// Derived from cell content; skipped by serde. Call `rebuild_deps`
    /// after deserializing.
    #[serde(skip)]
    deps: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cell at `pos` from raw input text.
    ///
    /// Input is classified as empty, formula (leading `=` with a non-empty
    /// body), or literal text. For formulas, edges to every referenced cell
    /// are committed along with the content, auto-creating empty cells for
    /// positions that don't exist yet, and the cycle check runs first:
    /// a rejected edit returns [`SheetError::CircularDependency`] with the
    /// sheet untouched.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        let content = CellContent::from_input(text)?;

        // Candidate edges: deduplicated, valid targets only. Out-of-range
        // references stay in the formula (they evaluate to #REF!) but never
        // become edges.
        let new_reads: FxHashSet<Position> = content
            .referenced_cells()
            .into_iter()
            .filter(|p| p.is_valid())
            .collect();

        if self.deps.would_create_cycle(pos, &new_reads) {
            log::debug!("rejected edit at {pos}: it would close a dependency cycle");
            return Err(SheetError::CircularDependency);
        }

        // Commit. Placeholders first, so every edge targets a stored cell.
        for &read in &new_reads {
            self.cells.entry(read).or_default();
        }
        self.deps.replace_edges(pos, new_reads);
        self.cells.entry(pos).or_default().set_content(content);
        self.invalidate(pos, true);
        Ok(())
    }

    /// Clear the cell at `pos`.
    ///
    /// Equivalent to setting empty text, plus storage reclamation: the cell
    /// object is dropped unless some formula still reads it. A retained
    /// empty cell reads as absent externally and resolves as blank for its
    /// readers.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        if !self.cells.contains_key(&pos) {
            return Ok(());
        }

        self.deps.clear_cell(pos);
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.set_content(CellContent::Empty);
        }
        self.invalidate(pos, true);
        if !self.deps.is_read(pos) {
            self.cells.remove(&pos);
        }
        Ok(())
    }

    /// The cell at `pos`, if it holds anything.
    ///
    /// Placeholder cells kept alive only because formulas read them carry
    /// no text and read as absent here.
    pub fn get_cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(self.cells.get(&pos).filter(|cell| !cell.is_empty()))
    }

    /// Evaluated value at `pos`. Absent cells read as blank text.
    pub fn value(&self, pos: Position) -> Result<Value, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(match self.cells.get(&pos) {
            Some(cell) => cell.value(&CellReader::new(self)),
            None => Value::Text(String::new()),
        })
    }

    /// Raw text at `pos` (formulas canonicalized). Absent cells are `""`.
    pub fn text(&self, pos: Position) -> Result<String, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        Ok(self.cells.get(&pos).map(Cell::text).unwrap_or_default())
    }

    /// Cells the formula at `pos` reads: ascending, valid, deduplicated.
    pub fn referenced_cells(&self, pos: Position) -> Result<Vec<Position>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition);
        }
        let mut reads: Vec<Position> = self.deps.reads_of(pos).collect();
        reads.sort();
        Ok(reads)
    }

    /// True if at least one formula reads `pos`.
    pub fn is_referenced(&self, pos: Position) -> bool {
        self.deps.is_read(pos)
    }

    /// Smallest bounding box containing every cell with non-empty text.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for (pos, cell) in &self.cells {
            if !cell.is_empty() {
                size.rows = size.rows.max(pos.row + 1);
                size.cols = size.cols.max(pos.col + 1);
            }
        }
        size
    }

    /// Rendered values of the printable area, row-major, blanks for absent
    /// cells.
    pub fn values(&self) -> Vec<Vec<String>> {
        self.grid(|cell| cell.value(&CellReader::new(self)).to_string())
    }

    /// Raw texts of the printable area, row-major.
    pub fn texts(&self) -> Vec<Vec<String>> {
        self.grid(Cell::text)
    }

    /// Number of stored cells, placeholders included.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Rebuild the dependency graph from stored content.
    ///
    /// The graph is derived state and skipped by serde; call this after
    /// deserializing a sheet. Placeholders for referenced-but-missing
    /// positions are recreated as well.
    pub fn rebuild_deps(&mut self) {
        self.deps = DepGraph::new();
        let edges: Vec<(Position, FxHashSet<Position>)> = self
            .cells
            .iter()
            .filter_map(|(&pos, cell)| {
                let reads: FxHashSet<Position> = cell
                    .content()
                    .referenced_cells()
                    .into_iter()
                    .filter(|p| p.is_valid())
                    .collect();
                (!reads.is_empty()).then_some((pos, reads))
            })
            .collect();

        for (pos, reads) in edges {
            for &read in &reads {
                self.cells.entry(read).or_default();
            }
            self.deps.replace_edges(pos, reads);
        }
        log::debug!(
            "rebuilt dependency graph: {} formula cells, {} edges",
            self.deps.formula_cell_count(),
            self.deps.edge_count()
        );
    }

    pub(crate) fn stored(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(&pos)
    }

    /// Clear the cache at `start` (unconditionally when `force`) and walk
    /// read-by edges clearing dependent caches. The walk stops at cells
    /// whose cache is already absent: everything downstream of those is
    /// already invalid.
    fn invalidate(&self, start: Position, force: bool) {
        let mut stack = vec![(start, force)];
        while let Some((pos, force)) = stack.pop() {
            let Some(cell) = self.cells.get(&pos) else {
                continue;
            };
            if force || cell.has_cached() {
                cell.clear_cache();
                stack.extend(self.deps.readers_of(pos).map(|reader| (reader, false)));
            }
        }
    }

    fn grid<F: Fn(&Cell) -> String>(&self, render: F) -> Vec<Vec<String>> {
        let size = self.printable_size();
        (0..size.rows)
            .map(|row| {
                (0..size.cols)
                    .map(|col| {
                        self.cells
                            .get(&Position::new(row, col))
                            .filter(|cell| !cell.is_empty())
                            .map(&render)
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
impl Sheet {
    /// Audit the structural invariants. Panics on violation.
    pub fn assert_invariants(&self) {
        self.deps.assert_consistent();

        // Every edge endpoint is a stored cell, and no committed formula
        // can reach itself.
        for cell in self.deps.formula_cells() {
            assert!(self.cells.contains_key(&cell), "formula cell {cell} not stored");
            let reads: FxHashSet<Position> = self.deps.reads_of(cell).collect();
            for read in &reads {
                assert!(self.cells.contains_key(read), "edge target {read} not stored");
            }
            assert!(
                !self.deps.would_create_cycle(cell, &reads),
                "committed graph has a cycle through {cell}"
            );
        }

        // An uncached formula cell has no cached transitive reader.
        for (&pos, cell) in &self.cells {
            if matches!(cell.content(), CellContent::Formula(_)) && !cell.has_cached() {
                let mut stack: Vec<Position> = self.deps.readers_of(pos).collect();
                let mut seen: FxHashSet<Position> = FxHashSet::default();
                while let Some(reader) = stack.pop() {
                    if !seen.insert(reader) {
                        continue;
                    }
                    assert!(
                        !self.cells[&reader].has_cached(),
                        "stale cache at {reader}, which reads uncached {pos}"
                    );
                    stack.extend(self.deps.readers_of(reader));
                }
            }
        }
    }
}
