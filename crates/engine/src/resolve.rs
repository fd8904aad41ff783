//! Bridge between formula evaluation and cell values.

use tabula_core::{EvalError, Position, Value};
use tabula_formula::CellResolver;

use crate::sheet::Sheet;

/// Resolves referenced cells to numbers while a formula evaluates.
///
/// Resolution rules:
/// - invalid position: `#REF!`
/// - no stored cell: `0`
/// - number: itself
/// - text: empty resolves to `0`; otherwise the text must parse as a
///   complete number or the read fails with `#VALUE!`
/// - error value: propagated unchanged, aborting the read
pub(crate) struct CellReader<'a> {
    sheet: &'a Sheet,
}

impl<'a> CellReader<'a> {
    pub(crate) fn new(sheet: &'a Sheet) -> Self {
        Self { sheet }
    }
}

impl CellResolver for CellReader<'_> {
    fn value(&self, pos: Position) -> Result<f64, EvalError> {
        if !pos.is_valid() {
            return Err(EvalError::Ref);
        }
        let Some(cell) = self.sheet.stored(pos) else {
            return Ok(0.0);
        };
        match cell.value(self) {
            Value::Number(n) => Ok(n),
            Value::Text(text) if text.is_empty() => Ok(0.0),
            Value::Text(text) => text.parse().map_err(|_| EvalError::Value),
            Value::Error(e) => Err(e),
        }
    }
}
