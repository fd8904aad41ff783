// Formula tokenizer, parser, and canonical renderer.
// Grammar: numbers, cell refs (A1), unary + -, binary + - * /, parentheses.

use std::fmt;

use tabula_core::Position;
use thiserror::Error;

/// Error produced when a formula body fails to parse.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum UnOp {
    Plus,
    Minus,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Ref(Position),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub(crate) fn collect_refs(&self, refs: &mut Vec<Position>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ref(pos) => refs.push(*pos),
            Expr::Unary { operand, .. } => operand.collect_refs(refs),
            Expr::Binary { left, right, .. } => {
                left.collect_refs(refs);
                right.collect_refs(refs);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(_) | Expr::Ref(_) => 3,
            Expr::Unary { .. } => 2,
            Expr::Binary {
                op: BinOp::Mul | BinOp::Div,
                ..
            } => 1,
            Expr::Binary {
                op: BinOp::Add | BinOp::Sub,
                ..
            } => 0,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Expr::Ref(pos) => {
                if pos.is_valid() {
                    f.write_str(&pos.to_a1())
                } else {
                    f.write_str("#REF!")
                }
            }
            Expr::Unary { op, operand } => {
                let sign = match op {
                    UnOp::Plus => '+',
                    UnOp::Minus => '-',
                };
                if operand.precedence() < self.precedence() {
                    write!(f, "{sign}({operand})")
                } else {
                    write!(f, "{sign}{operand}")
                }
            }
            Expr::Binary { op, left, right } => {
                let prec = self.precedence();
                let symbol = match op {
                    BinOp::Add => '+',
                    BinOp::Sub => '-',
                    BinOp::Mul => '*',
                    BinOp::Div => '/',
                };
                if left.precedence() < prec {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, "{symbol}")?;
                // The right operand of - and / also needs parentheses at
                // equal precedence: 1-(2-3) is not 1-2-3.
                let needs_parens = right.precedence() < prec
                    || (right.precedence() == prec && matches!(op, BinOp::Sub | BinOp::Div));
                if needs_parens {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ref(Position),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b'+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            b'-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            b'*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            b'/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // Optional exponent: e/E, optional sign, then digits.
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &input[start..i];
                let n: f64 = text
                    .parse()
                    .map_err(|_| ParseError::new(format!("bad number `{text}`"), start))?;
                tokens.push((Token::Number(n), start));
            }
            b'A'..=b'Z' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_uppercase() {
                    i += 1;
                }
                let letters_end = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i == letters_end {
                    return Err(ParseError::new(
                        format!("expected a row number after `{}`", &input[start..letters_end]),
                        start,
                    ));
                }
                // Out-of-range references keep their slot in the expression;
                // they evaluate to #REF! instead of failing the parse.
                let pos = Position::from_a1(&input[start..i]).unwrap_or(Position::NONE);
                tokens.push((Token::Ref(pos), start));
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", other as char),
                    i,
                ))
            }
        }
    }

    Ok(tokens)
}

pub(crate) fn parse(body: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(body)?;
    if tokens.is_empty() {
        return Err(ParseError::new("empty formula", 0));
    }
    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(ParseError::new("unexpected trailing input", tokens[pos].1));
    }
    Ok(expr)
}

fn parse_add_sub(tokens: &[(Token, usize)], pos: usize) -> Result<(Expr, usize), ParseError> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match tokens[pos].0 {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            _ => break,
        };
        let (right, next) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = next;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[(Token, usize)], pos: usize) -> Result<(Expr, usize), ParseError> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match tokens[pos].0 {
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            _ => break,
        };
        let (right, next) = parse_unary(tokens, pos + 1)?;
        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = next;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[(Token, usize)], pos: usize) -> Result<(Expr, usize), ParseError> {
    if pos < tokens.len() {
        let op = match tokens[pos].0 {
            Token::Plus => Some(UnOp::Plus),
            Token::Minus => Some(UnOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            let (operand, next) = parse_unary(tokens, pos + 1)?;
            return Ok((
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
                next,
            ));
        }
    }
    parse_primary(tokens, pos)
}

fn parse_primary(tokens: &[(Token, usize)], pos: usize) -> Result<(Expr, usize), ParseError> {
    let Some(&(token, offset)) = tokens.get(pos) else {
        let end = tokens.last().map(|&(_, o)| o + 1).unwrap_or(0);
        return Err(ParseError::new("unexpected end of formula", end));
    };

    match token {
        Token::Number(n) => Ok((Expr::Number(n), pos + 1)),
        Token::Ref(p) => Ok((Expr::Ref(p), pos + 1)),
        Token::LParen => {
            let (inner, next) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(next) {
                Some((Token::RParen, _)) => Ok((inner, next + 1)),
                _ => Err(ParseError::new("expected `)`", offset)),
            }
        }
        _ => Err(ParseError::new(
            "expected a number, cell reference, or `(`",
            offset,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(body: &str) -> String {
        parse(body).unwrap().to_string()
    }

    #[test]
    fn renders_canonically() {
        assert_eq!(render("1+2*3"), "1+2*3");
        assert_eq!(render("1 + 2\t* 3"), "1+2*3");
        assert_eq!(render("(1+2)*3"), "(1+2)*3");
        assert_eq!(render("1+(2*3)"), "1+2*3");
        assert_eq!(render("((A1))"), "A1");
        assert_eq!(render("1.50"), "1.5");
        assert_eq!(render("1e3"), "1000");
    }

    #[test]
    fn keeps_parens_that_change_meaning() {
        assert_eq!(render("1-(2-3)"), "1-(2-3)");
        assert_eq!(render("8/(4/2)"), "8/(4/2)");
        assert_eq!(render("(1+2)-3"), "1+2-3");
        assert_eq!(render("(2*3)/4"), "2*3/4");
        assert_eq!(render("-(1+2)"), "-(1+2)");
        assert_eq!(render("-A1*B1"), "-A1*B1");
    }

    #[test]
    fn rendered_text_reparses_to_the_same_expression() {
        for body in ["1+2*3", "(1+2)*3", "1-(2-3)", "-(A1+B2)/C3", "8/(4/2)-1"] {
            let expr = parse(body).unwrap();
            let reparsed = parse(&expr.to_string()).unwrap();
            assert_eq!(expr, reparsed, "canonical text drifted for {body}");
        }
    }

    #[test]
    fn parses_unary_chains() {
        let expr = parse("--2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnOp::Minus,
                operand: Box::new(Expr::Unary {
                    op: UnOp::Minus,
                    operand: Box::new(Expr::Number(2.0)),
                }),
            }
        );
    }

    #[test]
    fn out_of_range_reference_renders_as_ref_error() {
        assert_eq!(render("ZZZZZ1"), "#REF!");
        assert_eq!(render("A99999+1"), "#REF!+1");
    }

    #[test]
    fn rejects_malformed_input() {
        for body in ["", "1+", "(1+2", "1)2", "A", "1..2", "foo", "1,2", "A1 B1"] {
            assert!(parse(body).is_err(), "accepted {body:?}");
        }
    }

    #[test]
    fn error_carries_offset() {
        let err = parse("1+%").unwrap_err();
        assert_eq!(err.offset, 2);
        let err = parse("1 2").unwrap_err();
        assert_eq!(err.message, "unexpected trailing input");
    }
}
