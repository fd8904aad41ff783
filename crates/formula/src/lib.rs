//! Formula parsing and evaluation.
//!
//! A [`Formula`] is the parsed body of a `=`-cell, without the marker. It
//! evaluates against a [`CellResolver`], re-renders as canonical text, and
//! reports the positions it references.

pub mod eval;
pub mod parser;

use serde::{Deserialize, Serialize};
use tabula_core::{EvalError, Position};

pub use eval::CellResolver;
pub use parser::ParseError;

use parser::Expr;

/// A parsed formula expression.
///
/// Serializes as its canonical source text and re-parses on deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    /// Parse a formula body (the text after the `=` marker).
    pub fn parse(body: &str) -> Result<Formula, ParseError> {
        Ok(Formula {
            expr: parser::parse(body)?,
        })
    }

    /// Evaluate against the given cell resolver.
    ///
    /// The first resolver or arithmetic error aborts the evaluation and is
    /// returned unchanged.
    pub fn evaluate<R: CellResolver>(&self, cells: &R) -> Result<f64, EvalError> {
        eval::evaluate(&self.expr, cells)
    }

    /// Canonical text of the expression, without the leading marker.
    ///
    /// Not necessarily byte-identical to the parsed source: whitespace is
    /// dropped and parentheses are reduced to what operator precedence
    /// requires.
    pub fn expression(&self) -> String {
        self.expr.to_string()
    }

    /// Positions the expression references, in source order.
    ///
    /// May contain duplicates and invalid positions; callers filter.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut refs = Vec::new();
        self.expr.collect_refs(&mut refs);
        refs
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> String {
        formula.expression()
    }
}

impl TryFrom<String> for Formula {
    type Error = ParseError;

    fn try_from(body: String) -> Result<Self, Self::Error> {
        Formula::parse(&body)
    }
}
