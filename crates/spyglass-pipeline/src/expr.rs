//! The formula expression language.
//!
//! A small statically-typed arithmetic interpreter: every expression
//! evaluates to an `f64` against a per-timestamp variable environment.
//! Variables are sibling query names; functions come from the fixed
//! registry in [`crate::functions`].
//!
//! The grammar is standard infix arithmetic with `+ - * / % ^`,
//! parentheses, unary minus, and call syntax. `^` is right-associative and
//! binds tighter than unary minus, so `-2^2` is `-4` and `2^3^2` is `512`.
//! Unknown functions and arity mismatches are rejected at parse time.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};
use crate::functions;

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division; division by zero yields an infinity or NaN, never an error.
    Div,
    /// Floating-point remainder.
    Mod,
    /// Exponentiation.
    Pow,
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Literal(f64),
    /// A reference to a sibling query's value.
    Variable(String),
    /// Unary negation.
    UnaryNeg(Box<Expr>),
    /// A binary operation.
    BinaryOp {
        /// The operator.
        op: BinaryOperator,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A call to a registry function.
    Call {
        /// The function name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parses an expression string.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ExpressionParse` for syntax errors and
    /// `PipelineError::UnknownFunction` for calls to unregistered functions.
    pub fn parse(expression: &str) -> Result<Self> {
        let mut parser = Parser::new(expression);
        let expr = parser.expression()?;
        parser.skip_whitespace();
        if parser.position < parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates this expression against a variable environment.
    ///
    /// Numeric anomalies (division by zero, domain errors) follow IEEE 754
    /// semantics and surface as NaN or infinities in the returned value; the
    /// caller decides whether to keep such points.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownVariable` when a variable is absent
    /// from the environment.
    pub fn eval(&self, env: &HashMap<String, f64>) -> Result<f64> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Variable(name) => {
                env.get(name)
                    .copied()
                    .ok_or_else(|| PipelineError::UnknownVariable { name: name.clone() })
            }
            Self::UnaryNeg(inner) => Ok(-inner.eval(env)?),
            Self::BinaryOp { op, lhs, rhs } => {
                let lhs = lhs.eval(env)?;
                let rhs = rhs.eval(env)?;
                Ok(match op {
                    BinaryOperator::Add => lhs + rhs,
                    BinaryOperator::Sub => lhs - rhs,
                    BinaryOperator::Mul => lhs * rhs,
                    BinaryOperator::Div => lhs / rhs,
                    BinaryOperator::Mod => lhs % rhs,
                    BinaryOperator::Pow => lhs.powf(rhs),
                })
            }
            Self::Call { name, args } => {
                let def = functions::lookup(name).ok_or_else(|| PipelineError::UnknownFunction {
                    name: name.clone(),
                    position: 0,
                })?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(env)?);
                }
                Ok((def.eval)(&values))
            }
        }
    }
}

/// Recursive-descent parser over the expression characters.
struct Parser {
    chars: Vec<char>,
    position: usize,
    source: String,
}

impl Parser {
    fn new(expression: &str) -> Self {
        Self {
            chars: expression.chars().collect(),
            position: 0,
            source: expression.to_string(),
        }
    }

    fn error(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::ExpressionParse {
            expression: self.source.clone(),
            position: self.position,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .chars
            .get(self.position)
            .is_some_and(|c| c.is_whitespace())
        {
            self.position += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.position).copied()
    }

    /// additive := multiplicative { ('+' | '-') multiplicative }
    fn expression(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(c) = self.peek() {
            let op = match c {
                '+' => BinaryOperator::Add,
                '-' => BinaryOperator::Sub,
                _ => break,
            };
            self.position += 1;
            let rhs = self.term()?;
            lhs = Expr::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// multiplicative := unary { ('*' | '/' | '%') unary }
    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(c) = self.peek() {
            let op = match c {
                '*' => BinaryOperator::Mul,
                '/' => BinaryOperator::Div,
                '%' => BinaryOperator::Mod,
                _ => break,
            };
            self.position += 1;
            let rhs = self.unary()?;
            lhs = Expr::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// unary := '-' unary | power
    fn unary(&mut self) -> Result<Expr> {
        if self.peek() == Some('-') {
            self.position += 1;
            return Ok(Expr::UnaryNeg(Box::new(self.unary()?)));
        }
        self.power()
    }

    /// power := atom [ '^' unary ]   (right-associative)
    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.peek() == Some('^') {
            self.position += 1;
            let exponent = self.unary()?;
            return Ok(Expr::BinaryOp {
                op: BinaryOperator::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    /// atom := number | identifier [ '(' arguments ')' ] | '(' expression ')'
    fn atom(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('(') => {
                self.position += 1;
                let inner = self.expression()?;
                if self.peek() != Some(')') {
                    return Err(self.error("expected ')'"));
                }
                self.position += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
            None => Err(self.error("expected an operand")),
        }
    }

    fn number(&mut self) -> Result<Expr> {
        let start = self.position;
        while self
            .chars
            .get(self.position)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            self.position += 1;
        }
        if self
            .chars
            .get(self.position)
            .is_some_and(|c| *c == 'e' || *c == 'E')
        {
            self.position += 1;
            if self
                .chars
                .get(self.position)
                .is_some_and(|c| *c == '+' || *c == '-')
            {
                self.position += 1;
            }
            while self
                .chars
                .get(self.position)
                .is_some_and(char::is_ascii_digit)
            {
                self.position += 1;
            }
        }
        let text: String = self.chars[start..self.position].iter().collect();
        text.parse::<f64>()
            .map(Expr::Literal)
            .map_err(|_| self.error(format!("invalid number {text:?}")))
    }

    fn identifier(&mut self) -> Result<Expr> {
        let start = self.position;
        while self
            .chars
            .get(self.position)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            self.position += 1;
        }
        let name: String = self.chars[start..self.position].iter().collect();

        if self.peek() != Some('(') {
            return Ok(Expr::Variable(name));
        }

        let Some(def) = functions::lookup(&name) else {
            return Err(PipelineError::UnknownFunction {
                name,
                position: start,
            });
        };
        self.position += 1;
        let mut args = Vec::new();
        if self.peek() == Some(')') {
            self.position += 1;
        } else {
            loop {
                args.push(self.expression()?);
                match self.peek() {
                    Some(',') => self.position += 1,
                    Some(')') => {
                        self.position += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')' in argument list")),
                }
            }
        }
        if args.len() != def.arity {
            return Err(self.error(format!(
                "function {name:?} takes {} argument(s), got {}",
                def.arity,
                args.len()
            )));
        }
        Ok(Expr::Call { name, args })
    }
}
