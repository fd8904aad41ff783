//! Expression evaluation against a cell resolver.

use tabula_core::{EvalError, Position};

use crate::parser::{BinOp, Expr, UnOp};

/// Supplies the numeric value of a referenced cell during evaluation.
///
/// An error returned here aborts the evaluation and surfaces as the
/// formula's computed error value.
pub trait CellResolver {
    fn value(&self, pos: Position) -> Result<f64, EvalError>;
}

impl<F> CellResolver for F
where
    F: Fn(Position) -> Result<f64, EvalError>,
{
    fn value(&self, pos: Position) -> Result<f64, EvalError> {
        self(pos)
    }
}

pub(crate) fn evaluate<R: CellResolver>(expr: &Expr, cells: &R) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ref(pos) => cells.value(*pos),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, cells)?;
            Ok(match op {
                UnOp::Plus => v,
                UnOp::Minus => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, cells)?;
            let r = evaluate(right, cells)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        Err(EvalError::Div0)
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}
