//! Calculated-column formulas
//!
//! A restricted arithmetic expression language replacing the original
//! runtime-eval approach: `+ - * /`, unary minus, parentheses, dot- or
//! comma-decimal literals and named variables resolved against a row.
//!
//! A formula is parsed once up front; parse errors abort the definition.
//! Evaluation failures on a single row (a variable the row does not carry)
//! degrade that row's value to `None` instead of aborting the batch.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::ingest::Table;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("unexpected '{found}' at position {pos}")]
    UnexpectedToken { pos: usize, found: String },

    #[error("formula ends unexpectedly")]
    UnexpectedEnd,

    #[error("unexpected trailing input at position {pos}")]
    TrailingInput { pos: usize },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// A parsed formula, reusable across rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    ast: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.expression()?;
        if let Some((pos, _)) = parser.peek() {
            return Err(FormulaError::TrailingInput { pos });
        }
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a row's named values. Division follows IEEE
    /// semantics (a zero divisor yields an infinity, not an error).
    pub fn evaluate(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
        eval(&self.ast, vars)
    }

    /// Per-row degrade: any evaluation failure becomes `None`.
    pub fn evaluate_or_null(&self, vars: &HashMap<String, f64>) -> Option<f64> {
        self.evaluate(vars).ok()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Evaluate a formula for every row of a table. Rows where evaluation
/// fails come back as `None`; the rest of the batch is unaffected.
pub fn calculated_column(table: &Table, formula: &Formula) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let vars: HashMap<String, f64> = table
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.values[row]))
            .collect();
        out.push(formula.evaluate_or_null(&vars));
    }
    out
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push((i, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((i, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((i, Token::Star));
                i += 1;
            }
            '/' => {
                tokens.push((i, Token::Slash));
                i += 1;
            }
            '(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // One decimal separator, dot or comma, then more digits
                if i < chars.len()
                    && (chars[i] == '.' || chars[i] == ',')
                    && i + 1 < chars.len()
                    && chars[i + 1].is_ascii_digit()
                {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.replace(',', ".").parse().map_err(|_| {
                    FormulaError::UnexpectedChar { pos: start, ch: c }
                })?;
                tokens.push((start, Token::Number(value)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push((start, Token::Ident(name)));
            }
            other => return Err(FormulaError::UnexpectedChar { pos: i, ch: other }),
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(p, t)| (*p, t))
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        while let Some((_, token)) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.factor()?;
        while let Some((_, token)) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // factor := '-' factor | primary
    fn factor(&mut self) -> Result<Expr, FormulaError> {
        if let Some((_, Token::Minus)) = self.peek() {
            self.advance();
            let inner = self.factor()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.primary()
    }

    // primary := number | ident | '(' expression ')'
    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some((_, Token::Number(value))) => Ok(Expr::Number(value)),
            Some((_, Token::Ident(name))) => Ok(Expr::Variable(name)),
            Some((_, Token::LParen)) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some((_, Token::RParen)) => Ok(inner),
                    Some((pos, found)) => Err(FormulaError::UnexpectedToken {
                        pos,
                        found: found.to_string(),
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((pos, found)) => Err(FormulaError::UnexpectedToken {
                pos,
                found: found.to_string(),
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn eval(expr: &Expr, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Variable(name) => vars
            .get(name)
            .copied()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::Negate(inner) => Ok(-eval(inner, vars)?),
        Expr::Binary(op, left, right) => {
            let l = eval(left, vars)?;
            let r = eval(right, vars)?;
            Ok(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parse_table;

    fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_precedence_and_parens() {
        let f = Formula::parse("1 + 2 * 3").unwrap();
        assert_eq!(f.evaluate(&vars(&[])).unwrap(), 7.0);

        let f = Formula::parse("(1 + 2) * 3").unwrap();
        assert_eq!(f.evaluate(&vars(&[])).unwrap(), 9.0);

        let f = Formula::parse("10 - 4 - 3").unwrap();
        assert_eq!(f.evaluate(&vars(&[])).unwrap(), 3.0); // left associative
    }

    #[test]
    fn test_unary_minus() {
        let f = Formula::parse("-x + 5").unwrap();
        assert_eq!(f.evaluate(&vars(&[("x", 2.0)])).unwrap(), 3.0);

        let f = Formula::parse("--4").unwrap();
        assert_eq!(f.evaluate(&vars(&[])).unwrap(), 4.0);
    }

    #[test]
    fn test_comma_decimals_in_literals() {
        let f = Formula::parse("2,5 * leistung").unwrap();
        assert_eq!(f.evaluate(&vars(&[("leistung", 4.0)])).unwrap(), 10.0);
    }

    #[test]
    fn test_unknown_variable_degrades_to_none() {
        let f = Formula::parse("a + b").unwrap();
        assert_eq!(
            f.evaluate(&vars(&[("a", 1.0)])),
            Err(FormulaError::UnknownVariable("b".to_string()))
        );
        assert_eq!(f.evaluate_or_null(&vars(&[("a", 1.0)])), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Formula::parse(""), Err(FormulaError::Empty));
        assert_eq!(Formula::parse("  "), Err(FormulaError::Empty));
        assert!(matches!(
            Formula::parse("1 +"),
            Err(FormulaError::UnexpectedEnd)
        ));
        assert!(matches!(
            Formula::parse("(1 + 2"),
            Err(FormulaError::UnexpectedEnd)
        ));
        assert!(matches!(
            Formula::parse("1 2"),
            Err(FormulaError::TrailingInput { .. })
        ));
        assert!(matches!(
            Formula::parse("a # b"),
            Err(FormulaError::UnexpectedChar { ch: '#', .. })
        ));
    }

    #[test]
    fn test_division_is_ieee() {
        let f = Formula::parse("1 / x").unwrap();
        assert_eq!(f.evaluate(&vars(&[("x", 0.0)])).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_calculated_column_degrades_per_row() {
        let text = "t;press;saw\n\
                    01.02.2024 00:00;2;3\n\
                    01.02.2024 01:00;4;5\n";
        let table = parse_table(text, None).unwrap();

        let f = Formula::parse("press * 2 + saw").unwrap();
        assert_eq!(
            calculated_column(&table, &f),
            vec![Some(7.0), Some(13.0)]
        );

        // Referencing a missing column nulls every row but doesn't abort
        let f = Formula::parse("press + ghost").unwrap();
        assert_eq!(calculated_column(&table, &f), vec![None, None]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn addition_matches_rust(a in -1e6f64..1e6, b in -1e6f64..1e6) {
                let f = Formula::parse("a + b").unwrap();
                let got = f.evaluate(&vars(&[("a", a), ("b", b)])).unwrap();
                prop_assert!((got - (a + b)).abs() < 1e-9);
            }

            #[test]
            fn literal_round_trip(value in 0.1f64..1e6) {
                let text = format!("{value}");
                let f = Formula::parse(&text).unwrap();
                let got = f.evaluate(&HashMap::new()).unwrap();
                prop_assert!((got - value).abs() < 1e-9);
            }
        }
    }
}
