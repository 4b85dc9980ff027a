use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, space0},
    combinator::{all_consuming, map, map_res},
    error::VerboseError,
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::primitives::identifier;

/// Possible failures while parsing or evaluating an arithmetic expression
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ExpressionError {
    /// A symbol was referenced that is neither predefined, bound by `EQU`,
    /// nor a label
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    /// The right hand side of `/` or `%` evaluated to zero
    #[error("division by zero")]
    DivisionByZero,

    /// The text did not match the expression grammar
    #[error("malformed expression `{0}`")]
    Malformed(String),
}

/// A mapping from symbol names to integer values.
///
/// Holds the predefined simulation parameters (`CORESIZE` and friends),
/// accumulates `EQU` definitions during assembly, and is overlaid with label
/// offsets during the second pass.  Symbol names are case-sensitive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Environment {
    /// Bound symbol values
    symbols: HashMap<String, i64>,
}

impl Environment {
    /// An environment with no bound symbols
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The conventional predefined symbols at their pMARS default values
    #[must_use]
    pub fn standard() -> Self {
        let mut env = Self::new();
        env.define("CORESIZE", 8000);
        env.define("CYCLES", 80_000);
        env.define("ROUNDS", 1);
        env.define("MAXPROCESSES", 8000);
        env.define("MAXLENGTH", 100);
        env.define("MINDISTANCE", 100);
        env
    }

    /// Bind a symbol, replacing any previous binding of the same name
    pub fn define(&mut self, name: impl Into<String>, value: i64) {
        self.symbols.insert(name.into(), value);
    }

    /// The value bound to a symbol, if any
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).copied()
    }

    /// A copy of this environment with additional bindings layered on top.
    /// Bindings in `overrides` shadow existing ones.
    #[must_use]
    pub fn extended<I>(&self, overrides: I) -> Self
    where I: IntoIterator<Item = (String, i64)> {
        let mut extended = self.clone();
        for (name, value) in overrides {
            extended.define(name, value);
        }
        extended
    }
}

/// The binary operators of the expression language
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (integer division)
    Div,
    /// `%` (integer remainder)
    Rem,
}

/// A parsed arithmetic expression.
///
/// The grammar supports integer literals, symbol references, unary `+`/`-`,
/// the binary operators `+ - * / %` with standard precedence, and
/// parentheses.  There are no comparisons and no function calls.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expr {
    /// An integer literal
    Number(i64),
    /// A reference resolved against the [`Environment`] at evaluation time
    Symbol(String),
    /// Unary negation
    Negate(Box<Expr>),
    /// A binary operation
    Binary {
        /// The operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate this expression against an environment.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressionError::UndefinedSymbol`] for a reference to an
    /// unbound symbol and [`ExpressionError::DivisionByZero`] when the right
    /// hand side of `/` or `%` evaluates to zero.
    pub fn eval(&self, env: &Environment) -> Result<i64, ExpressionError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Symbol(name) => env.lookup(name).ok_or_else(|| {
                ExpressionError::UndefinedSymbol(name.clone())
            }),
            Self::Negate(inner) => Ok(inner.eval(env)?.wrapping_neg()),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(env)?;
                let rhs = rhs.eval(env)?;
                match op {
                    BinOp::Add => Ok(lhs.wrapping_add(rhs)),
                    BinOp::Sub => Ok(lhs.wrapping_sub(rhs)),
                    BinOp::Mul => Ok(lhs.wrapping_mul(rhs)),
                    BinOp::Div => {
                        if rhs == 0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs.wrapping_div(rhs))
                        }
                    }
                    BinOp::Rem => {
                        if rhs == 0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs.wrapping_rem(rhs))
                        }
                    }
                }
            }
        }
    }

    /// Box a binary operation node
    fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Parse a complete expression, requiring that the whole input is consumed
/// apart from surrounding whitespace.
///
/// # Errors
///
/// Returns [`ExpressionError::Malformed`] when the input does not match the
/// expression grammar.
pub fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    all_consuming(terminated(expression, space0))(input).map_or_else(
        |_| Err(ExpressionError::Malformed(input.trim().to_owned())),
        |(_, expr)| Ok(expr),
    )
}

/// Parses an expression without requiring that all input is consumed.
/// `* / %` bind tighter than `+ -`; both levels are left-associative.
pub fn expression(
    input: &str,
) -> IResult<&str, Expr, VerboseError<&str>> {
    let (input, init) = term(input)?;
    fold_many0(
        pair(
            preceded(space0, alt((tag("+"), tag("-")))),
            term,
        ),
        move || init.clone(),
        |lhs, (op, rhs)| {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            Expr::binary(op, lhs, rhs)
        },
    )(input)
}

/// Parses a `* / %` precedence level
fn term(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    let (input, init) = factor(input)?;
    fold_many0(
        pair(
            preceded(space0, alt((tag("*"), tag("/"), tag("%")))),
            factor,
        ),
        move || init.clone(),
        |lhs, (op, rhs)| {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            };
            Expr::binary(op, lhs, rhs)
        },
    )(input)
}

/// Parses a literal, symbol, unary sign, or parenthesized group
fn factor(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    preceded(
        space0,
        alt((
            map(preceded(tag("-"), factor), |inner| {
                Expr::Negate(Box::new(inner))
            }),
            preceded(tag("+"), factor),
            delimited(tag("("), expression, preceded(space0, tag(")"))),
            map(map_res(digit1, str::parse), Expr::Number),
            map(identifier, |name: &str| Expr::Symbol(name.to_owned())),
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse and evaluate in one step against an environment
    fn eval_with(input: &str, env: &Environment) -> i64 {
        parse_expression(input)
            .unwrap_or_else(|e| panic!("failed to parse {input}: {e}"))
            .eval(env)
            .unwrap_or_else(|e| panic!("failed to evaluate {input}: {e}"))
    }

    /// Parse and evaluate in one step against an empty environment
    fn eval(input: &str) -> i64 {
        eval_with(input, &Environment::new())
    }

    #[test]
    fn literals_and_unary_signs() {
        assert_eq!(eval("0"), 0);
        assert_eq!(eval("1234"), 1234);
        assert_eq!(eval("-7"), -7);
        assert_eq!(eval("+7"), 7);
        assert_eq!(eval("--7"), 7);
        assert_eq!(eval(" 42 "), 42);
    }

    #[test]
    fn additive_operators_are_left_associative() {
        assert_eq!(eval("1 + 2 + 3"), 6);
        assert_eq!(eval("10 - 2 - 3"), 5);
        assert_eq!(eval("10-2+3"), 11);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval("2 + 3 * 4"), 14);
        assert_eq!(eval("2 * 3 + 4"), 10);
        assert_eq!(eval("20 / 2 - 3"), 7);
        assert_eq!(eval("20 % 6 * 2"), 4);
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(eval("(2 + 3) * 4"), 20);
        assert_eq!(eval("2 * (3 + 4)"), 14);
        assert_eq!(eval("((1))"), 1);
        assert_eq!(eval("-(2 + 3)"), -5);
    }

    #[test]
    fn symbols_resolve_through_the_environment() {
        let mut env = Environment::new();
        env.define("step", 2004);
        env.define("CORESIZE", 8000);
        assert_eq!(eval_with("step", &env), 2004);
        assert_eq!(eval_with("CORESIZE - step", &env), 5996);
        assert_eq!(eval_with("step * 2 + 1", &env), 4009);
    }

    #[test]
    fn standard_environment_has_the_pmars_defaults() {
        let env = Environment::standard();
        assert_eq!(eval_with("CORESIZE", &env), 8000);
        assert_eq!(eval_with("CYCLES", &env), 80_000);
        assert_eq!(eval_with("MAXPROCESSES", &env), 8000);
        assert_eq!(eval_with("MINDISTANCE", &env), 100);
    }

    #[test]
    fn extended_bindings_shadow_existing_ones() {
        let mut env = Environment::new();
        env.define("x", 1);
        let extended =
            env.extended([("x".to_owned(), 10), ("y".to_owned(), 2)]);
        assert_eq!(eval_with("x + y", &extended), 12);
        // the original environment is unchanged
        assert_eq!(eval_with("x", &env), 1);
    }

    #[test]
    fn undefined_symbols_are_reported() {
        let expr = parse_expression("missing + 1").unwrap();
        assert_eq!(
            expr.eval(&Environment::new()),
            Err(ExpressionError::UndefinedSymbol("missing".to_owned()))
        );
    }

    #[test]
    fn division_by_zero_is_reported() {
        for input in ["1 / 0", "1 % 0", "5 / (3 - 3)"] {
            let expr = parse_expression(input).unwrap();
            assert_eq!(
                expr.eval(&Environment::new()),
                Err(ExpressionError::DivisionByZero),
                "expected division by zero from {input}"
            );
        }
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let malformed = ["", "1 +", "(1", "1)", "2 ** 3", "a b", "1 < 2"];
        for input in malformed {
            assert!(
                parse_expression(input).is_err(),
                "expected a parse failure for `{input}`"
            );
        }
    }
}
