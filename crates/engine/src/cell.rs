//! Cell content and cached evaluation.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use tabula_core::{Position, SheetError, Value};
use tabula_formula::{CellResolver, Formula};

/// First character marking formula input.
pub const FORMULA_MARKER: char = '=';
/// Leading character forcing the rest of the input to be literal text,
/// even if it looks like a formula.
pub const ESCAPE_MARKER: char = '\'';

/// What a cell holds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellContent {
    #[default]
    Empty,
    /// Literal text, stored verbatim (escape marker included).
    Text(String),
    Formula(Formula),
}

impl CellContent {
    /// Classify raw input text.
    ///
    /// Empty input is an empty cell. Input starting with the formula marker
    /// plus at least one more character parses as a formula; a parse failure
    /// aborts with [`SheetError::Syntax`] and nothing is built. Everything
    /// else is literal text, including a lone `=` and anything behind the
    /// escape marker.
    pub fn from_input(input: &str) -> Result<CellContent, SheetError> {
        if input.is_empty() {
            Ok(CellContent::Empty)
        } else if input.len() > 1 && input.starts_with(FORMULA_MARKER) {
            let formula = Formula::parse(&input[1..]).map_err(|e| SheetError::Syntax(e.to_string()))?;
            Ok(CellContent::Formula(formula))
        } else {
            Ok(CellContent::Text(input.to_string()))
        }
    }

    /// Raw text of the content, as the user would re-edit it. Formula text
    /// is the marker plus the canonically re-rendered expression.
    pub fn text(&self) -> String {
        match self {
            CellContent::Empty => String::new(),
            CellContent::Text(text) => text.clone(),
            CellContent::Formula(formula) => format!("{}{}", FORMULA_MARKER, formula.expression()),
        }
    }

    /// Positions the content references (formulas only), unfiltered:
    /// duplicates and invalid positions are the caller's to drop.
    pub fn referenced_cells(&self) -> Vec<Position> {
        match self {
            CellContent::Formula(formula) => formula.referenced_cells(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }
}

/// One cell: content plus the cached result of its last evaluation.
///
/// The cache is interior-mutable so reads through `&Sheet` can fill it; the
/// sheet clears it (and every transitive reader's) on mutation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cell {
    content: CellContent,
    #[serde(skip)]
    cache: RefCell<Option<Value>>,
}

impl Cell {
    pub fn new(content: CellContent) -> Self {
        Self {
            content,
            cache: RefCell::new(None),
        }
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    /// Raw text, as entered (escape marker kept, formulas canonicalized).
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub(crate) fn has_cached(&self) -> bool {
        self.cache.borrow().is_some()
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.borrow_mut().take();
    }

    /// Evaluated value. Formula evaluation is lazy and cached; evaluation
    /// errors come back as [`Value::Error`], never as a failure.
    pub(crate) fn value<R: CellResolver>(&self, cells: &R) -> Value {
        match &self.content {
            CellContent::Empty => Value::Text(String::new()),
            CellContent::Text(text) => {
                let text = text.strip_prefix(ESCAPE_MARKER).unwrap_or(text);
                Value::Text(text.to_string())
            }
            CellContent::Formula(formula) => {
                if let Some(cached) = self.cache.borrow().clone() {
                    return cached;
                }
                let value = match formula.evaluate(cells) {
                    Ok(n) => Value::Number(n),
                    Err(e) => Value::Error(e),
                };
                *self.cache.borrow_mut() = Some(value.clone());
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell as Counter;

    use tabula_core::EvalError;

    use super::*;

    fn no_cells(_: Position) -> Result<f64, EvalError> {
        panic!("no cell reads expected");
    }

    #[test]
    fn classifies_input() {
        assert_eq!(CellContent::from_input("").unwrap(), CellContent::Empty);
        assert!(matches!(
            CellContent::from_input("=A1+1").unwrap(),
            CellContent::Formula(_)
        ));
        assert_eq!(
            CellContent::from_input("=").unwrap(),
            CellContent::Text("=".into())
        );
        assert_eq!(
            CellContent::from_input("'=A1").unwrap(),
            CellContent::Text("'=A1".into())
        );
        assert_eq!(
            CellContent::from_input("hello").unwrap(),
            CellContent::Text("hello".into())
        );
    }

    #[test]
    fn bad_formula_is_a_syntax_error() {
        match CellContent::from_input("=1+") {
            Err(SheetError::Syntax(_)) => {}
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn text_round_trip() {
        assert_eq!(CellContent::from_input("'123").unwrap().text(), "'123");
        assert_eq!(CellContent::from_input("= 1 + 2").unwrap().text(), "=1+2");
        assert_eq!(CellContent::from_input("").unwrap().text(), "");
    }

    #[test]
    fn value_strips_one_escape_marker() {
        let cell = Cell::new(CellContent::from_input("'123").unwrap());
        assert_eq!(cell.value(&no_cells), Value::Text("123".into()));
        let cell = Cell::new(CellContent::from_input("''x").unwrap());
        assert_eq!(cell.value(&no_cells), Value::Text("'x".into()));
        let cell = Cell::new(CellContent::from_input("plain").unwrap());
        assert_eq!(cell.value(&no_cells), Value::Text("plain".into()));
    }

    #[test]
    fn formula_value_is_cached() {
        let calls = Counter::new(0u32);
        let resolver = |_: Position| -> Result<f64, EvalError> {
            calls.set(calls.get() + 1);
            Ok(5.0)
        };
        let cell = Cell::new(CellContent::from_input("=A1").unwrap());
        assert_eq!(cell.value(&resolver), Value::Number(5.0));
        assert_eq!(cell.value(&resolver), Value::Number(5.0));
        assert_eq!(calls.get(), 1);

        cell.clear_cache();
        assert_eq!(cell.value(&resolver), Value::Number(5.0));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn evaluation_errors_become_values() {
        let cell = Cell::new(CellContent::from_input("=1/0").unwrap());
        assert_eq!(cell.value(&no_cells), Value::Error(EvalError::Div0));
        assert!(cell.has_cached());
    }

    #[test]
    fn serde_keeps_content_and_drops_cache() {
        let cell = Cell::new(CellContent::from_input("=A1*2").unwrap());
        let resolver = |_: Position| -> Result<f64, EvalError> { Ok(3.0) };
        assert_eq!(cell.value(&resolver), Value::Number(6.0));

        let json = serde_json::to_string(&cell).unwrap();
        let restored: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.content(), cell.content());
        assert!(!restored.has_cached());
    }
}
