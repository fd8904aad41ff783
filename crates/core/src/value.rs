//! Cell values and the computed-error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A computed error a formula can evaluate to.
///
/// These are data, not failures: they display as their token, feed into
/// other formulas, and propagate through evaluation like any number would.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalError {
    /// Reference to a position outside the grid.
    Ref,
    /// An operand that is text but not a number.
    Value,
    /// Division by zero.
    Div0,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ref => "#REF!",
            Self::Value => "#VALUE!",
            Self::Div0 => "#DIV/0!",
        })
    }
}

/// What a cell evaluates to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Number(f64),
    Error(EvalError),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}
