use core::fmt;

use serde::{Deserialize, Serialize};

/// Fields hold values that are positive offsets from their own core address.
/// They are stored and used modulo `core_size`.
pub type FieldValue = u32;

/// The opcode portion of an instruction.
///
/// Covers the '88 and '94 ICWS standard opcodes.  [`Opcode::Ldp`] and
/// [`Opcode::Stp`] are the pMARS P-space extensions: they are recognized by
/// the assembler but the simulator does not implement P-space and reports an
/// error when asked to execute one.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum Opcode {
    /// Remove the current task from a warrior's task queue
    Dat,

    /// Replace the B-target with the A-value and queue the next instruction
    Mov,

    /// Replace the B-target with the sum of the A/B values, and queue the next
    /// instruction
    Add,

    /// Replace the B-target with the B-value minus the A-value, and queue the
    /// next instruction
    Sub,

    /// Replace the B-target with the A-value times the B-value, and queue the
    /// next instruction
    Mul,

    /// Replace the B-target with the B-value divided by the A-value, queueing
    /// the next instruction only when no division by zero was attempted
    Div,

    /// Replace the B-target with the remainder of the B-value divided by the
    /// A-value, queueing the next instruction only when no division by zero
    /// was attempted
    Mod,

    /// Queue the sum of the program counter and the A-pointer
    Jmp,

    /// Queue the sum of the program counter and the A-pointer if the B-value
    /// is zero, and otherwise queue the next instruction
    Jmz,

    /// Queue the sum of the program counter and the A-pointer if any part of
    /// the B-value is not zero, and otherwise queue the next instruction
    Jmn,

    /// Decrement the B-value and B-target, then queue the sum of the program
    /// counter and the A-pointer if the decremented B-value is not zero, and
    /// otherwise queue the next instruction
    Djn,

    /// Queue the next instruction, and then queue the sum of the program
    /// counter and the A-pointer.  If the queue is full, only the next
    /// instruction is queued.
    Spl,

    /// Compare the A-value to the B-value.  If every part of the A-value is
    /// less than the corresponding part of the B-value, queue the instruction
    /// after next, and otherwise queue the next instruction.
    Slt,

    /// Identical in execution to [`Opcode::Seq`], kept as the '88 mnemonic
    Cmp,

    /// Compare the A-value to the B-value.  If every part is equal, queue the
    /// instruction after next, and otherwise queue the next instruction.
    Seq,

    /// Compare the A-value to the B-value.  If any part of the A-value is not
    /// equal to the corresponding part of the B-value, queue the instruction
    /// after next, and otherwise queue the next instruction.
    Sne,

    /// Queue the next instruction and do nothing else
    Nop,

    /// P-space load, declared but not simulated
    Ldp,

    /// P-space store, declared but not simulated
    Stp,
}

#[allow(clippy::use_debug)]
impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Debug formatter to get the identifier of this variant
        write!(f, "{self:?}")
    }
}

/// The opcode modifier portion of a redcode instruction
///
/// The modifier selects which fields of the A and B instructions participate
/// in an operation, per the '94 ICWS standard
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum Modifier {
    /// Read the A-numbers of both instructions, write the A-number of the
    /// B-target
    A,

    /// Read the B-numbers of both instructions, write the B-number of the
    /// B-target
    B,

    /// Read the A-number of the A-instruction and the B-number of the
    /// B-instruction, write the B-number of the B-target
    AB,

    /// Read the B-number of the A-instruction and the A-number of the
    /// B-instruction, write the A-number of the B-target
    BA,

    /// Read both numbers of both instructions, write both numbers of the
    /// B-target pairwise (A to A, B to B)
    F,

    /// Read both numbers of both instructions, write both numbers of the
    /// B-target exchanged (A to B, B to A)
    X,

    /// Read and write entire instructions
    I,
}

#[allow(clippy::use_debug)]
impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use Debug formatter to get the identifier of this variant
        write!(f, "{self:?}")
    }
}

/// The addressing mode applied to a field of an instruction
///
/// Covers the eight modes of the '94 ICWS standard.  The sigil mapping is
/// `#` immediate, `$` direct, `*`/`@` indirect through the A/B-number,
/// `{`/`<` predecrement indirect, and `}`/`>` postincrement indirect.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
pub enum AddrMode {
    /// Represented by `#`.  An immediate operand merely serves as storage for
    /// data: both its read and write pointers are zero, so the operand refers
    /// to the current instruction.
    Immediate,

    /// Represented by `$`.  A direct operand is an offset from the program
    /// counter.
    Direct,

    /// Represented by `*`.  The operand's number points at an instruction
    /// whose A-number supplies the secondary offset.
    IndirectA,

    /// Represented by `@`.  The operand's number points at an instruction
    /// whose B-number supplies the secondary offset.
    IndirectB,

    /// Represented by `{`.  As [`AddrMode::IndirectA`], with the A-number of
    /// the pointed-to instruction decremented before use.
    PredecA,

    /// Represented by `<`.  As [`AddrMode::IndirectB`], with the B-number of
    /// the pointed-to instruction decremented before use.
    PredecB,

    /// Represented by `}`.  As [`AddrMode::IndirectA`], with the A-number of
    /// the pointed-to instruction incremented after the operand's register
    /// value has been captured.
    PostincA,

    /// Represented by `>`.  As [`AddrMode::IndirectB`], with the B-number of
    /// the pointed-to instruction incremented after the operand's register
    /// value has been captured.
    PostincB,
}

impl AddrMode {
    /// Whether this mode resolves through a secondary offset stored in
    /// another instruction
    #[must_use]
    pub const fn is_indirect(self) -> bool {
        !matches!(self, Self::Immediate | Self::Direct)
    }

    /// Whether the secondary offset is taken from the A-number of the
    /// pointed-to instruction (as opposed to the B-number)
    #[must_use]
    pub const fn uses_a_number(self) -> bool {
        matches!(self, Self::IndirectA | Self::PredecA | Self::PostincA)
    }
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Immediate => write!(f, "#"),
            Self::Direct => write!(f, "$"),
            Self::IndirectA => write!(f, "*"),
            Self::IndirectB => write!(f, "@"),
            // "{{" is escaped form of "{"
            Self::PredecA => write!(f, "{{"),
            Self::PredecB => write!(f, "<"),
            // "}}" is escaped form of "}"
            Self::PostincA => write!(f, "}}"),
            Self::PostincB => write!(f, ">"),
        }
    }
}

/// A Redcode assembly instruction including modifier and addressing modes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode portion of a redcode instruction e.g. `DAT` or `JMP`
    pub opcode: Opcode,
    /// The modifier portion of a redcode instruction e.g. `.BA` or `.X`
    pub modifier: Modifier,
    /// The addressing mode used by the A field e.g. `>` or `$`
    pub a_addr_mode: AddrMode,
    /// The addressing mode used by the B field e.g. `>` or `$`
    pub b_addr_mode: AddrMode,
}

/// A Redcode instruction (opcode, modifier, modes) along with field values.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct CompleteInstruction {
    /// The opcode, modifier, and modes used by this instruction
    pub instr: Instruction,
    /// The A-field stored in this instruction
    pub a_field: FieldValue,
    /// The B-field stored in this instruction
    pub b_field: FieldValue,
}

impl fmt::Display for CompleteInstruction {
    /// Formats an instruction as a '94 loadfile syntax instruction.
    ///
    /// ```
    /// # use redcode::*;
    /// let a = CompleteInstruction {
    ///     instr: Instruction {
    ///         opcode: Opcode::Add,
    ///         modifier: Modifier::AB,
    ///         a_addr_mode: AddrMode::Immediate,
    ///         b_addr_mode: AddrMode::Direct,
    ///     },
    ///     a_field: 16,
    ///     b_field: 32,
    /// };
    ///
    /// assert_eq!(a.to_string(), "Add.AB #16, $32");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} {}{}, {}{}",
            self.instr.opcode,
            self.instr.modifier,
            self.instr.a_addr_mode,
            self.a_field,
            self.instr.b_addr_mode,
            self.b_field
        )
    }
}

impl Default for Instruction {
    /// The default instruction, `DAT.F $0, $0`, is what an empty core cell
    /// holds per ICWS '94.
    fn default() -> Self {
        Self {
            opcode: Opcode::Dat,
            modifier: Modifier::F,
            a_addr_mode: AddrMode::Direct,
            b_addr_mode: AddrMode::Direct,
        }
    }
}

/// The descriptive metadata a warrior carries in its info comments
/// (`;name`, `;author`, and friends)
#[derive(
    Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct Metadata {
    /// Content of the `;name` comment
    pub name: Option<String>,
    /// Content of the `;author` comment
    pub author: Option<String>,
    /// Content of the `;date` comment
    pub date: Option<String>,
    /// Content of the `;version` comment
    pub version: Option<String>,
    /// Accumulated `;strategy` comment lines, joined with newlines
    pub strategy: Option<String>,
}

/// An assembled redcode program with fields already reduced modulo a core
/// size
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Warrior {
    /// Descriptive metadata from the warrior's info comments
    pub metadata: Metadata,
    /// A sequence of complete compiled redcode instructions
    pub code: Vec<CompleteInstruction>,
    /// Offset *into the warrior* where execution begins
    pub start: FieldValue,
}

impl Default for Warrior {
    fn default() -> Self {
        Self {
            metadata: Metadata::default(),
            code: vec![CompleteInstruction::default()],
            start: 0,
        }
    }
}

/// Determine the modifier an instruction without one receives, per the
/// ICWS'88 to ICWS'94 conversion table
#[must_use]
pub const fn default_modifiers(
    op: Opcode,
    a_mode: AddrMode,
    b_mode: AddrMode,
) -> Modifier {
    #[allow(clippy::match_same_arms)]
    match (op, a_mode, b_mode) {
        // Dat and Nop always default to .F
        (Opcode::Nop | Opcode::Dat, ..) => Modifier::F,
        // Mov and Cmp
        // 1) .AB if A-mode is immediate
        // 2) .B if B-mode is immediate and A-mode isn't
        // 3) .I if neither A nor B mode is immediate
        (Opcode::Mov | Opcode::Cmp, AddrMode::Immediate, _) => Modifier::AB,
        (Opcode::Mov | Opcode::Cmp, _, AddrMode::Immediate) => Modifier::B,
        (Opcode::Mov | Opcode::Cmp, ..) => Modifier::I,
        // Add, Sub, Mul, Div, and Mod
        // 1) .AB if A-mode is immediate
        // 2) .B if B-mode is immediate and A-mode isn't
        // 3) .F if neither A nor B mode is immediate
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            AddrMode::Immediate,
            _,
        ) => Modifier::AB,
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            _,
            AddrMode::Immediate,
        ) => Modifier::B,
        (
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod,
            ..,
        ) => Modifier::F,
        // Slt, Seq, Sne, Ldp, and Stp
        // 1) .AB if A-mode is immediate
        // 2) .B in all other cases
        (
            Opcode::Slt | Opcode::Seq | Opcode::Sne | Opcode::Ldp | Opcode::Stp,
            AddrMode::Immediate,
            _,
        ) => Modifier::AB,
        (
            Opcode::Slt | Opcode::Seq | Opcode::Sne | Opcode::Ldp | Opcode::Stp,
            ..,
        ) => Modifier::B,
        // Jmp, Jmz, Jmn, Djn, Spl are always .B
        (
            Opcode::Jmp | Opcode::Jmz | Opcode::Jmn | Opcode::Djn | Opcode::Spl,
            ..,
        ) => Modifier::B,
    }
}

/// Utilities for enumerating and iterating over all valid redcode instructions
pub mod test_utils {
    use super::*;

    /// All valid opcodes including the declared P-space extensions
    pub const OPCODES: [Opcode; 19] = [
        Opcode::Dat,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Jmp,
        Opcode::Jmz,
        Opcode::Jmn,
        Opcode::Djn,
        Opcode::Spl,
        Opcode::Slt,
        Opcode::Cmp,
        Opcode::Seq,
        Opcode::Sne,
        Opcode::Nop,
        Opcode::Ldp,
        Opcode::Stp,
    ];

    /// All valid modifiers for '88 and '94 redcode
    pub const MODIFIERS: [Modifier; 7] = [
        Modifier::A,
        Modifier::B,
        Modifier::AB,
        Modifier::BA,
        Modifier::F,
        Modifier::X,
        Modifier::I,
    ];

    /// All valid addressing modes for '88 and '94 redcode
    pub const ADDR_MODES: [AddrMode; 8] = [
        AddrMode::Immediate,
        AddrMode::Direct,
        AddrMode::IndirectA,
        AddrMode::IndirectB,
        AddrMode::PredecA,
        AddrMode::PredecB,
        AddrMode::PostincA,
        AddrMode::PostincB,
    ];

    /// iterate over every valid redcode instruction
    pub fn all_instructions() -> impl Iterator<Item = Instruction> {
        itertools::iproduct!(
            OPCODES.iter(),
            MODIFIERS.iter(),
            ADDR_MODES.iter(),
            ADDR_MODES.iter()
        )
        .map(|(o, m, a, b)| Instruction {
            opcode: *o,
            modifier: *m,
            a_addr_mode: *a,
            b_addr_mode: *b,
        })
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::test_utils::all_instructions;

    #[test]
    fn test_instr_default_equ() {
        let default: Instruction = Default::default();
        let manual = Instruction {
            opcode: Opcode::Dat,
            modifier: Modifier::F,
            a_addr_mode: AddrMode::Direct,
            b_addr_mode: AddrMode::Direct,
        };
        assert_eq!(default, manual);
    }

    #[test]
    fn test_default_warrior() {
        let default: Warrior = Default::default();
        let manual = Warrior {
            metadata: Metadata::default(),
            code: vec![CompleteInstruction::default()],
            start: 0,
        };
        assert_eq!(default, manual);
    }

    #[test]
    fn enumerate_instructions_are_unique() {
        let instructions: Vec<Instruction> =
            test_utils::all_instructions().collect();
        let unique_instructions: Vec<Instruction> =
            test_utils::all_instructions().unique().collect();

        assert_eq!(instructions.len(), unique_instructions.len());
    }

    #[test]
    fn enumerate_instructions_right_number() {
        let expected_number = test_utils::OPCODES.len()
            * test_utils::MODIFIERS.len()
            * test_utils::ADDR_MODES.len()
            * test_utils::ADDR_MODES.len();
        assert_eq!(all_instructions().count(), expected_number);
    }

    #[test]
    fn all_instructions_have_unique_display() {
        let a_field = 123;
        let b_field = 456;
        let instructions_displayed: Vec<String> =
            test_utils::all_instructions()
                .map(|instr| CompleteInstruction {
                    instr,
                    a_field,
                    b_field,
                })
                .map(|x| x.to_string())
                .collect();

        let unique_display_reprs =
            instructions_displayed.iter().unique().count();
        assert_eq!(unique_display_reprs, instructions_displayed.len());
    }

    #[test]
    fn all_values_support_to_u8() {
        use num_traits::cast::ToPrimitive;
        // num_traits specifies that if the number of variants is within the
        // range of the specified type, then ToPrimitive should always return
        // Some.  Test that this remains true, or that more variants haven't
        // been added which break the assumption that all values fit in a u8

        for op in test_utils::OPCODES {
            assert!(op.to_u8().is_some());
        }
        for modifier in test_utils::MODIFIERS {
            assert!(modifier.to_u8().is_some());
        }
        for mode in test_utils::ADDR_MODES {
            assert!(mode.to_u8().is_some());
        }
    }

    #[test]
    fn conversion_table_is_a_pure_function() {
        // Applying the default-modifier table twice is the same as applying
        // it once, for every opcode and mode combination
        for instr in all_instructions() {
            let once = default_modifiers(
                instr.opcode,
                instr.a_addr_mode,
                instr.b_addr_mode,
            );
            let twice = default_modifiers(
                instr.opcode,
                instr.a_addr_mode,
                instr.b_addr_mode,
            );
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn conversion_table_spot_checks() {
        let cases = [
            (Opcode::Add, AddrMode::Immediate, AddrMode::Direct, Modifier::AB),
            (Opcode::Add, AddrMode::Direct, AddrMode::Immediate, Modifier::B),
            (Opcode::Add, AddrMode::Direct, AddrMode::Direct, Modifier::F),
            (Opcode::Dat, AddrMode::Immediate, AddrMode::Immediate, Modifier::F),
            (Opcode::Mov, AddrMode::Direct, AddrMode::Direct, Modifier::I),
            (Opcode::Mov, AddrMode::Immediate, AddrMode::Direct, Modifier::AB),
            (Opcode::Seq, AddrMode::Direct, AddrMode::Direct, Modifier::B),
            (Opcode::Sne, AddrMode::Immediate, AddrMode::PredecB, Modifier::AB),
            (Opcode::Jmp, AddrMode::Direct, AddrMode::Immediate, Modifier::B),
            (Opcode::Spl, AddrMode::PostincA, AddrMode::Direct, Modifier::B),
        ];
        for (op, a_mode, b_mode, expected) in cases {
            assert_eq!(
                default_modifiers(op, a_mode, b_mode),
                expected,
                "wrong default modifier for {op} {a_mode} {b_mode}"
            );
        }
    }
}
