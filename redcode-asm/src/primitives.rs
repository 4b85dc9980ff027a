use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::satisfy,
    combinator::{map, recognize},
    error::VerboseError,
    multi::many0_count,
    sequence::pair,
    IResult,
};
use redcode::{AddrMode, AddrMode::*, Modifier, Opcode};

/// Matches an identifier: a letter followed by letters, digits, and
/// underscores.  Identifiers name labels and `EQU` symbols, and opcode and
/// modifier mnemonics are identifiers with reserved (case-insensitive) names.
pub fn identifier(input: &str) -> IResult<&str, &str, VerboseError<&str>> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        many0_count(satisfy(|c| c.is_ascii_alphanumeric() || c == '_')),
    ))(input)
}

/// The opcode named by an identifier, compared case-insensitively against the
/// full token.  `None` for identifiers that aren't opcode mnemonics, which
/// the assembler treats as labels.
#[must_use]
pub fn opcode_name(name: &str) -> Option<Opcode> {
    match name.to_ascii_uppercase().as_str() {
        "DAT" => Some(Opcode::Dat),
        "MOV" => Some(Opcode::Mov),
        "ADD" => Some(Opcode::Add),
        "SUB" => Some(Opcode::Sub),
        "MUL" => Some(Opcode::Mul),
        "DIV" => Some(Opcode::Div),
        "MOD" => Some(Opcode::Mod),
        "JMP" => Some(Opcode::Jmp),
        "JMZ" => Some(Opcode::Jmz),
        "JMN" => Some(Opcode::Jmn),
        "DJN" => Some(Opcode::Djn),
        "SPL" => Some(Opcode::Spl),
        "SLT" => Some(Opcode::Slt),
        "CMP" => Some(Opcode::Cmp),
        "SEQ" => Some(Opcode::Seq),
        "SNE" => Some(Opcode::Sne),
        "NOP" => Some(Opcode::Nop),
        "LDP" => Some(Opcode::Ldp),
        "STP" => Some(Opcode::Stp),
        _ => None,
    }
}

/// The modifier named by an identifier, compared case-insensitively against
/// the full token
#[must_use]
pub fn modifier_name(name: &str) -> Option<Modifier> {
    match name.to_ascii_uppercase().as_str() {
        "A" => Some(Modifier::A),
        "B" => Some(Modifier::B),
        "AB" => Some(Modifier::AB),
        "BA" => Some(Modifier::BA),
        "F" => Some(Modifier::F),
        "X" => Some(Modifier::X),
        "I" => Some(Modifier::I),
        _ => None,
    }
}

/// Consumes exactly one addressing mode sigil
pub fn addr_mode(input: &str) -> IResult<&str, AddrMode, VerboseError<&str>> {
    alt((
        map(tag("#"), |_| Immediate),
        map(tag("$"), |_| Direct),
        map(tag("*"), |_| IndirectA),
        map(tag("@"), |_| IndirectB),
        map(tag("{"), |_| PredecA),
        map(tag("<"), |_| PredecB),
        map(tag("}"), |_| PostincA),
        map(tag(">"), |_| PostincB),
    ))(input)
}
