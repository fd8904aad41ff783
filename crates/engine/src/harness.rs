//! Test support: positions from A1 text and sheets from literal entries.
//!
//! Use together with `Sheet::assert_invariants` to audit graph symmetry,
//! acyclicity, cache soundness, and placeholder retention after mutations.

use tabula_core::Position;

use crate::sheet::Sheet;

/// Parse an A1 reference, panicking on bad test input.
pub fn pos(a1: &str) -> Position {
    Position::from_a1(a1).unwrap_or_else(|| panic!("bad test position {a1:?}"))
}

/// Build a sheet from `(position, input)` pairs, panicking on rejection.
pub fn sheet_with(entries: &[(&str, &str)]) -> Sheet {
    let mut sheet = Sheet::new();
    for (at, text) in entries {
        sheet
            .set_cell(pos(at), text)
            .unwrap_or_else(|e| panic!("set {at} to {text:?} failed: {e}"));
    }
    sheet.assert_invariants();
    sheet
}
