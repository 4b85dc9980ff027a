use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{space0, space1},
    combinator::{eof, map, map_opt, opt, rest, verify},
    error::VerboseError,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use redcode::{default_modifiers, AddrMode, Instruction};

use crate::{
    expression::{expression, Expr},
    primitives::{addr_mode, identifier, modifier_name, opcode_name},
};

/// The recognized info comments.  Anything else starting with `;` is an
/// ordinary comment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InfoLine<'a> {
    /// A `;redcode` marker, optionally suffixed as in `;redcode-94`
    Redcode,
    /// `;name` content
    Name(&'a str),
    /// `;author` content
    Author(&'a str),
    /// `;date` content
    Date(&'a str),
    /// `;version` content
    Version(&'a str),
    /// One `;strategy` (or `;strat`) line
    Strategy(&'a str),
    /// The text of an `;assert` condition
    Assert(&'a str),
}

/// A parsed instruction line: the instruction with its modifier resolved
/// (explicit or defaulted from the conversion table) and the operand field
/// expressions, still to be evaluated by the second pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceInstruction {
    /// Opcode, modifier, and addressing modes
    pub instr: Instruction,
    /// The A-field expression
    pub a_expr: Expr,
    /// The B-field expression
    pub b_expr: Expr,
}

/// Parses an entire info comment line.  Fails for lines that don't carry one
/// of the reserved comment prefixes.
pub fn info_line(
    input: &str,
) -> IResult<&str, InfoLine<'_>, VerboseError<&str>> {
    preceded(
        tag(";"),
        alt((
            map(redcode_marker, |_| InfoLine::Redcode),
            map(keyed_comment("name"), InfoLine::Name),
            map(keyed_comment("author"), InfoLine::Author),
            map(keyed_comment("date"), InfoLine::Date),
            map(keyed_comment("version"), InfoLine::Version),
            // "strategy" must be tried before its "strat" abbreviation
            map(keyed_comment("strategy"), InfoLine::Strategy),
            map(keyed_comment("strat"), InfoLine::Strategy),
            map(keyed_comment("assert"), InfoLine::Assert),
        )),
    )(input)
}

/// Matches `redcode` plus an optional suffix such as `-94`, to the end of the
/// line
fn redcode_marker(input: &str) -> IResult<&str, (), VerboseError<&str>> {
    map(
        tuple((
            tag_no_case("redcode"),
            take_while(|c: char| {
                c.is_ascii_alphanumeric() || c == '-' || c == '_'
            }),
            eof,
        )),
        |_| (),
    )(input)
}

/// Builds a parser for one keyed info comment, e.g. `name ...`, returning the
/// trimmed value text
fn keyed_comment(
    key: &'static str,
) -> impl FnMut(&str) -> IResult<&str, &str, VerboseError<&str>> {
    move |input| {
        map(
            preceded(
                pair(tag_no_case(key), space1),
                verify(rest, |text: &str| !text.trim().is_empty()),
            ),
            str::trim,
        )(input)
    }
}

/// Parses an entire `ORG expr` line
pub fn org_line(input: &str) -> IResult<&str, Expr, VerboseError<&str>> {
    delimited(
        pair(tag_no_case("ORG"), space1),
        expression,
        pair(space0, eof),
    )(input)
}

/// Parses an entire `END [expr]` line
pub fn end_line(
    input: &str,
) -> IResult<&str, Option<Expr>, VerboseError<&str>> {
    delimited(
        tag_no_case("END"),
        opt(preceded(space1, expression)),
        pair(space0, eof),
    )(input)
}

/// Parses an entire `NAME EQU expr` line, returning the symbol name and its
/// still-unevaluated expression
pub fn equ_line(
    input: &str,
) -> IResult<&str, (&str, Expr), VerboseError<&str>> {
    terminated(
        pair(
            identifier,
            preceded(
                delimited(space1, tag_no_case("EQU"), space1),
                expression,
            ),
        ),
        pair(space0, eof),
    )(input)
}

/// Parses an entire instruction line:
/// `opcode [.modifier] [mode] expr [, [mode] expr]`.
///
/// A missing mode defaults to `$` (direct), a missing operand to `$0`, and a
/// missing modifier is filled from the ICWS'88 to '94 conversion table once
/// both addressing modes are known.
pub fn instruction_line(
    input: &str,
) -> IResult<&str, SourceInstruction, VerboseError<&str>> {
    let (input, opcode) = map_opt(identifier, opcode_name)(input)?;
    let (input, modifier) = opt(preceded(
        delimited(space0, tag("."), space0),
        map_opt(identifier, modifier_name),
    ))(input)?;
    let (input, a_operand) = opt(operand)(input)?;
    let (input, b_operand) = opt(preceded(
        delimited(space0, tag(","), space0),
        operand,
    ))(input)?;
    let (input, _) = pair(space0, eof)(input)?;

    let (a_mode, a_expr) = with_defaults(a_operand);
    let (b_mode, b_expr) = with_defaults(b_operand);
    let modifier = modifier
        .unwrap_or_else(|| default_modifiers(opcode, a_mode, b_mode));
    Ok((
        input,
        SourceInstruction {
            instr: Instruction {
                opcode,
                modifier,
                a_addr_mode: a_mode,
                b_addr_mode: b_mode,
            },
            a_expr,
            b_expr,
        },
    ))
}

/// Parses one operand: an optional addressing mode sigil followed by a field
/// expression
fn operand(
    input: &str,
) -> IResult<&str, (Option<AddrMode>, Expr), VerboseError<&str>> {
    pair(opt(preceded(space0, addr_mode)), expression)(input)
}

/// Applies the operand defaulting rules: direct mode and a zero field
fn with_defaults(operand: Option<(Option<AddrMode>, Expr)>) -> (AddrMode, Expr) {
    operand.map_or_else(
        || (AddrMode::Direct, Expr::Number(0)),
        |(mode, expr)| (mode.unwrap_or(AddrMode::Direct), expr),
    )
}
