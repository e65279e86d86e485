//! Sandboxed arithmetic formulas for KPI definitions.
//!
//! Supports numeric literals (with an optional `e` exponent), identifiers,
//! `+ - * /`, unary minus/plus and parentheses. Nothing else is evaluated: a formula can only read the
//! variable values handed to [`Expression::evaluate`].

use crate::error::{ModelError, Result};
use std::fmt;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A parsed formula such as `"(NetProfit / Revenue) * 100"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
    variables: Vec<String>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let error = |details: String| ModelError::InvalidFormula {
            formula: source.to_string(),
            details,
        };

        let tokens = tokenize(source).map_err(error)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
        };
        let root = parser.expression().map_err(error)?;
        if let Some(token) = parser.peek() {
            return Err(error(format!("unexpected token {:?}", token)));
        }

        let mut variables = Vec::new();
        collect_variables(&root, &mut variables);

        Ok(Self {
            source: source.to_string(),
            root,
            variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct identifiers in order of first appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluates the formula, resolving each identifier through `lookup`.
    /// Division by a zero divisor yields [`ModelError::DivisionByZero`].
    pub fn evaluate<F>(&self, lookup: F) -> Result<f64>
    where
        F: Fn(&str) -> f64,
    {
        eval(&self.root, &lookup)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn eval<F>(expr: &Expr, lookup: &F) -> Result<f64>
where
    F: Fn(&str) -> f64,
{
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Variable(name) => Ok(lookup(name)),
        Expr::Negate(inner) => Ok(-eval(inner, lookup)?),
        Expr::Binary { op, lhs, rhs } => {
            let left = eval(lhs, lookup)?;
            let right = eval(rhs, lookup)?;
            match op {
                BinaryOp::Add => Ok(left + right),
                BinaryOp::Sub => Ok(left - right),
                BinaryOp::Mul => Ok(left * right),
                BinaryOp::Div => {
                    if right == 0.0 {
                        Err(ModelError::DivisionByZero)
                    } else {
                        Ok(left / right)
                    }
                }
            }
        }
    }
}

fn collect_variables(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Negate(inner) => collect_variables(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_variables(lhs, out);
            collect_variables(rhs, out);
        }
    }
}

fn tokenize(source: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if let Some(len) = exponent_len(&chars[i..]) {
                    i += len;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

/// Length of an `e`/`E` exponent suffix such as `e3` or `E-2`, if `rest` starts with one.
fn exponent_len(rest: &[char]) -> Option<usize> {
    if !matches!(rest.first(), Some('e' | 'E')) {
        return None;
    }
    let sign = usize::from(matches!(rest.get(1), Some('+' | '-')));
    let digits = rest[1 + sign..].iter().take_while(|c| c.is_ascii_digit()).count();
    (digits > 0).then_some(1 + sign + digits)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek().and_then(|t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        }) {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek().and_then(|t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            _ => None,
        }) {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> std::result::Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Negate(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> std::result::Result<Expr, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(*value)),
            Some(Token::Ident(name)) => Ok(Expr::Variable(name.clone())),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of formula".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(formula: &str, vars: &[(&str, f64)]) -> Result<f64> {
        let expression = Expression::parse(formula)?;
        expression.evaluate(|name| {
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        })
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(eval_with("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert_eq!(eval_with("(1 + 2) * 3", &[]).unwrap(), 9.0);
        assert_eq!(eval_with("10 - 4 - 3", &[]).unwrap(), 3.0);
        assert_eq!(eval_with("-2 * -3", &[]).unwrap(), 6.0);
        assert_eq!(eval_with("8 / 4 / 2", &[]).unwrap(), 1.0);
    }

    #[test]
    fn test_exponent_literals() {
        assert_eq!(eval_with("1e3 + x", &[("x", 5.0)]).unwrap(), 1005.0);
        assert!((eval_with("2.5E-2 * 4", &[]).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(eval_with("1e+2", &[]).unwrap(), 100.0);
        assert!(Expression::parse("1e").is_err());
    }

    #[test]
    fn test_variables() {
        let value = eval_with(
            "NetProfit / Revenue * 100",
            &[("NetProfit", 200.0), ("Revenue", 1000.0)],
        )
        .unwrap();
        assert!((value - 20.0).abs() < 1e-12);

        let expression = Expression::parse("(Revenue - COGS) / Revenue").unwrap();
        assert_eq!(expression.variables(), &["Revenue", "COGS"]);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            eval_with("NetProfit / Revenue", &[("NetProfit", 5.0)]),
            Err(ModelError::DivisionByZero)
        ));
    }

    #[test]
    fn test_rejects_non_arithmetic_input() {
        assert!(Expression::parse("__import__('os')").is_err());
        assert!(Expression::parse("Revenue ** 2").is_err());
        assert!(Expression::parse("(Revenue").is_err());
        assert!(Expression::parse("Revenue;").is_err());
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("1..2").is_err());
    }
}
