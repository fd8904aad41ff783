//! Structural errors: failures that abort an operation outright.
//!
//! Computed errors (`#REF!` and friends) are not here; those are values.
//! See `value::EvalError`.

use thiserror::Error;

/// An error that aborts a sheet operation before any state is touched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetError {
    /// Coordinate outside the grid bounds, or malformed reference text.
    #[error("invalid cell position")]
    InvalidPosition,
    /// Committing the formula would let a cell reach itself through the
    /// dependency graph.
    #[error("formula would introduce a circular dependency")]
    CircularDependency,
    /// The formula body could not be parsed.
    #[error("formula syntax error: {0}")]
    Syntax(String),
}
