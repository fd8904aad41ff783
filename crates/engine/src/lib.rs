//! In-memory spreadsheet engine.
//!
//! A [`Sheet`] is a sparse grid of cells holding text, numbers, or formulas.
//! Formula cells derive their value from other cells; the sheet keeps a
//! bidirectional dependency graph so that edits reject cycles before
//! committing anything and invalidate exactly the caches the edit can
//! affect.

pub mod cell;
pub mod dep_graph;
pub mod sheet;

mod resolve;

#[cfg(test)]
pub mod harness;

pub use cell::{Cell, CellContent, ESCAPE_MARKER, FORMULA_MARKER};
pub use dep_graph::DepGraph;
pub use sheet::Sheet;

pub use tabula_core::{EvalError, Position, SheetError, Size, Value};
pub use tabula_formula::Formula;
