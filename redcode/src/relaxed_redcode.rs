use core::fmt;

use crate::{
    CompleteInstruction, FieldValue, Instruction, Metadata, Warrior,
};

/// A [`CompleteInstruction`] that allows field values less than zero or
/// greater than `core_size`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct RelaxedCompleteInstruction {
    /// The opcode, modifier, and modes used by this instruction
    pub instr: Instruction,
    /// The A-field stored in this instruction, interpreted modulo `core_size`
    pub a_field: i64,
    /// The B-field stored in this instruction, interpreted modulo `core_size`
    pub b_field: i64,
}

impl RelaxedCompleteInstruction {
    /// Convert into a [`CompleteInstruction`] by evaluating fields modulo
    /// `core_size`
    #[must_use]
    pub fn normalize(&self, core_size: u32) -> CompleteInstruction {
        CompleteInstruction {
            instr: self.instr,
            a_field: normalize(self.a_field, core_size),
            b_field: normalize(self.b_field, core_size),
        }
    }
}

impl fmt::Display for RelaxedCompleteInstruction {
    /// Formats an instruction as a '94 loadfile syntax instruction, keeping
    /// signed field values
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

/// A [`Warrior`] with [`RelaxedCompleteInstruction`]s that allow field values
/// less than zero or greater than `core_size`.
///
/// This is what the assembler produces: label arithmetic routinely yields
/// negative offsets, and the core size that would fix them up is a property
/// of the simulation, not of the source text.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct RelaxedWarrior {
    /// Descriptive metadata from the warrior's info comments
    pub metadata: Metadata,
    /// A sequence of redcode instructions
    pub code: Vec<RelaxedCompleteInstruction>,
    /// Offset from the start of the warrior where execution begins
    pub start: i64,
}

impl RelaxedWarrior {
    /// Convert into a [`Warrior`] consisting of [`CompleteInstruction`]s by
    /// evaluating fields modulo `core_size`
    #[must_use]
    pub fn normalize(&self, core_size: u32) -> Warrior {
        let code = self
            .code
            .iter()
            .map(|insn| insn.normalize(core_size))
            .collect();
        Warrior {
            metadata: self.metadata.clone(),
            code,
            start: normalize(self.start, core_size),
        }
    }
}

impl fmt::Display for RelaxedWarrior {
    /// Formats a warrior as redcode source: info comments, an `ORG`, and one
    /// instruction per line.  Feeding the output back through the assembler
    /// reproduces the same instructions and start offset.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.metadata.name {
            writeln!(f, ";name {name}")?;
        }
        if let Some(author) = &self.metadata.author {
            writeln!(f, ";author {author}")?;
        }
        if let Some(date) = &self.metadata.date {
            writeln!(f, ";date {date}")?;
        }
        if let Some(version) = &self.metadata.version {
            writeln!(f, ";version {version}")?;
        }
        if let Some(strategy) = &self.metadata.strategy {
            for line in strategy.lines() {
                writeln!(f, ";strategy {line}")?;
            }
        }
        writeln!(f, "ORG {}", self.start)?;
        for insn in &self.code {
            writeln!(f, "{insn}")?;
        }
        Ok(())
    }
}

/// Evaluate a value as if it is a core offset, wrapping around at `core_size`.
///
/// # Panics
///
/// Will panic if `core_size` is zero.
#[must_use]
pub fn normalize(value: i64, core_size: u32) -> FieldValue {
    assert!(core_size > 0, "cannot normalize against an empty core");
    let wrapped = value.rem_euclid(i64::from(core_size));
    FieldValue::try_from(wrapped).unwrap_or(0)
}
