use std::collections::HashMap;

use redcode::{Metadata, RelaxedCompleteInstruction, RelaxedWarrior};
use thiserror::Error;

use crate::{
    expression::{parse_expression, Environment, Expr, ExpressionError},
    line_parser::{
        end_line, equ_line, info_line, instruction_line, org_line, InfoLine,
        SourceInstruction,
    },
    primitives::{identifier, opcode_name},
};

/// Possible failures while assembling redcode source
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AssembleError {
    /// A line matched neither a pseudo-op nor the instruction grammar, or an
    /// assembled value was out of range
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based source line
        line: usize,
        /// What went wrong
        message: String,
    },

    /// An expression could not be evaluated
    #[error("expression error at line {line}: {source}")]
    Expression {
        /// 1-based source line
        line: usize,
        /// The evaluator's failure
        source: ExpressionError,
    },

    /// An `;assert` condition evaluated to zero
    #[error("assertion failed at line {line}: {expression}")]
    AssertionFailed {
        /// 1-based source line
        line: usize,
        /// The text of the condition
        expression: String,
    },
}

/// An instruction from the first pass, with its field expressions not yet
/// evaluated
struct PendingInstruction {
    /// 1-based source line, for error reporting
    line: usize,
    /// The parsed instruction and field expressions
    parsed: SourceInstruction,
}

/// Assemble redcode source text into a [`RelaxedWarrior`].
///
/// `env` supplies the predefined symbols (conventionally `CORESIZE`,
/// `CYCLES`, `ROUNDS`, `MAXPROCESSES`, `MAXLENGTH`, and `MINDISTANCE`; see
/// [`Environment::standard`]).  The first pass classifies lines, collects
/// metadata, binds `EQU` symbols, and records label addresses.  The second
/// pass evaluates each instruction's field expressions with labels resolved
/// *relative to the instruction using them*, and the start offset with labels
/// resolved absolutely.
///
/// ```
/// # use redcode_asm::{assemble, Environment};
/// let dwarf = "
///     ;name dwarf
///     ORG start
///     loop   ADD.AB #2004, start
///     start  MOV    2, 2
///            JMP    loop
/// ";
/// let warrior = assemble(dwarf, &Environment::standard()).unwrap();
/// assert_eq!(warrior.metadata.name.as_deref(), Some("dwarf"));
/// assert_eq!(warrior.start, 1);
/// assert_eq!(warrior.code.len(), 3);
/// ```
///
/// # Errors
///
/// Returns an [`AssembleError`] naming the offending source line for
/// malformed lines, unevaluable expressions, and failed `;assert`s.
pub fn assemble(
    source: &str,
    env: &Environment,
) -> Result<RelaxedWarrior, AssembleError> {
    let mut environment = env.clone();
    let mut labels: HashMap<String, i64> = HashMap::new();
    let mut pending: Vec<PendingInstruction> = Vec::new();
    let mut metadata = Metadata::default();
    let mut strategy: Vec<String> = Vec::new();
    let mut start: Option<(usize, Expr)> = None;
    let mut seen_redcode_marker = false;

    for (line_no, raw) in source.lines().enumerate() {
        let line_no = line_no.wrapping_add(1);
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(';') {
            match info_line(line) {
                Ok((_, InfoLine::Redcode)) => {
                    if seen_redcode_marker {
                        // a second ;redcode ends the warrior
                        break;
                    }
                    // the first ;redcode discards everything parsed so far
                    pending.clear();
                    labels.clear();
                    environment = env.clone();
                    seen_redcode_marker = true;
                }
                Ok((_, InfoLine::Name(text))) => {
                    metadata.name = Some(text.to_owned());
                }
                Ok((_, InfoLine::Author(text))) => {
                    metadata.author = Some(text.to_owned());
                }
                Ok((_, InfoLine::Date(text))) => {
                    metadata.date = Some(text.to_owned());
                }
                Ok((_, InfoLine::Version(text))) => {
                    metadata.version = Some(text.to_owned());
                }
                Ok((_, InfoLine::Strategy(text))) => {
                    strategy.push(text.to_owned());
                }
                Ok((_, InfoLine::Assert(text))) => {
                    check_assertion(text, &environment, line_no)?;
                }
                // any other ;-prefixed line is an ordinary comment
                Err(_) => {}
            }
            continue;
        }

        // strip an inline comment tail before interpreting the line
        let line = line.split(';').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if let Ok((_, expr)) = org_line(line) {
            start = Some((line_no, expr));
            continue;
        }
        if let Ok((_, maybe_expr)) = end_line(line) {
            if let Some(expr) = maybe_expr {
                start = Some((line_no, expr));
            }
            // stop processing, end of redcode
            break;
        }
        if let Ok((_, (name, expr))) = equ_line(line) {
            let value = expr.eval(&environment).map_err(|source| {
                AssembleError::Expression { line: line_no, source }
            })?;
            environment.define(name, value);
            continue;
        }

        // peel off any leading labels
        let mut line = line;
        while let Ok((after, candidate)) = identifier(line) {
            if opcode_name(candidate).is_some() {
                break;
            }
            let following = after.trim_start();
            if following.is_empty() || following.len() == after.len() {
                // a label must be separated from further content by
                // whitespace
                break;
            }
            labels.insert(
                candidate.to_owned(),
                i64::try_from(pending.len()).unwrap_or(i64::MAX),
            );
            line = following;
        }

        // at last, the line should match an instruction
        match instruction_line(line) {
            Ok((_, parsed)) => {
                pending.push(PendingInstruction { line: line_no, parsed });
            }
            Err(_) => {
                return Err(AssembleError::Syntax {
                    line: line_no,
                    message: format!("expected instruction: \"{line}\""),
                })
            }
        }
    }

    if !strategy.is_empty() {
        metadata.strategy = Some(strategy.join("\n"));
    }

    // evaluate the start offset with absolute label addresses
    let absolute = environment.extended(labels.clone());
    let start = match start {
        None => 0,
        Some((line, expr)) => {
            let value = expr.eval(&absolute).map_err(|source| {
                AssembleError::Expression { line, source }
            })?;
            let length = i64::try_from(pending.len()).unwrap_or(i64::MAX);
            if value < 0 || (value > 0 && value >= length) {
                return Err(AssembleError::Syntax {
                    line,
                    message: format!(
                        "start offset {value} is outside the warrior"
                    ),
                });
            }
            value
        }
    };

    // second pass: evaluate field expressions with relative label addresses
    let mut code = Vec::with_capacity(pending.len());
    for (n, instruction) in pending.iter().enumerate() {
        let offset = i64::try_from(n).unwrap_or(i64::MAX);
        let relative = environment.extended(
            labels
                .iter()
                .map(|(name, address)| {
                    (name.clone(), address.wrapping_sub(offset))
                }),
        );
        let evaluate = |expr: &Expr| {
            expr.eval(&relative).map_err(|source| {
                AssembleError::Expression { line: instruction.line, source }
            })
        };
        code.push(RelaxedCompleteInstruction {
            instr: instruction.parsed.instr,
            a_field: evaluate(&instruction.parsed.a_expr)?,
            b_field: evaluate(&instruction.parsed.b_expr)?,
        });
    }

    Ok(RelaxedWarrior { metadata, code, start })
}

/// Evaluate an `;assert` condition, failing when it is zero
fn check_assertion(
    text: &str,
    environment: &Environment,
    line: usize,
) -> Result<(), AssembleError> {
    let expr = parse_expression(text)
        .map_err(|source| AssembleError::Expression { line, source })?;
    let value = expr
        .eval(environment)
        .map_err(|source| AssembleError::Expression { line, source })?;
    if value == 0 {
        return Err(AssembleError::AssertionFailed {
            line,
            expression: text.to_owned(),
        });
    }
    Ok(())
}
