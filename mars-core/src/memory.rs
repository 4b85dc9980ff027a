use redcode::CompleteInstruction;

use crate::{mars::MarsError, CoreAddr};

/// The shared circular memory holding all instructions.
///
/// Every address is reduced modulo the core size, so the first instruction
/// follows the last.  Two additional bounds, the read and write limits,
/// constrain how far an indirect pointer may reach; with both limits equal
/// to the core size (the default) the folding operations degenerate to a
/// plain modulus.
///
/// Stored field values are always in `[0, core_size)`.  Negative offsets are
/// represented by their positive complement and recovered for display with
/// [`Core::signed`]; nothing in the core points back at anything.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Core {
    /// The instructions, exactly `size` of them
    cells: Vec<CompleteInstruction>,
    /// Number of cells, cached as a `CoreAddr`
    size: CoreAddr,
    /// Bound folded over indirect read pointers
    read_limit: CoreAddr,
    /// Bound folded over indirect write pointers
    write_limit: CoreAddr,
}

impl Core {
    /// Construct a core of `size` cells filled with the initial instruction
    /// `DAT.F $0, $0`.
    ///
    /// # Errors
    ///
    /// Returns [`MarsError::InvalidParam`] when `size` is zero or a limit is
    /// zero or exceeds `size`.
    pub fn new(
        size: CoreAddr,
        read_limit: CoreAddr,
        write_limit: CoreAddr,
    ) -> Result<Self, MarsError> {
        if size == 0 {
            return Err(MarsError::InvalidParam("core size cannot be zero"));
        }
        if read_limit == 0 || read_limit > size {
            return Err(MarsError::InvalidParam(
                "read limit must be between 1 and the core size",
            ));
        }
        if write_limit == 0 || write_limit > size {
            return Err(MarsError::InvalidParam(
                "write limit must be between 1 and the core size",
            ));
        }
        Ok(Self {
            cells: vec![
                CompleteInstruction::default();
                usize::try_from(size).map_err(|_err| {
                    MarsError::InvalidParam("core size too large")
                })?
            ],
            size,
            read_limit,
            write_limit,
        })
    }

    /// Number of cells in the core
    #[must_use]
    pub const fn size(&self) -> CoreAddr {
        self.size
    }

    /// All cells in address order
    #[must_use]
    pub fn cells(&self) -> &[CompleteInstruction] {
        &self.cells
    }

    /// Copy of the instruction at an address, reduced modulo the core size
    #[must_use]
    pub fn get(&self, addr: CoreAddr) -> CompleteInstruction {
        let index = usize::try_from(addr % self.size).unwrap_or(0);
        self.cells.get(index).copied().unwrap_or_default()
    }

    /// Mutable reference to the instruction at an address, reduced modulo
    /// the core size.  Callers are responsible for keeping stored fields
    /// inside `[0, core_size)`.
    pub fn get_mut(&mut self, addr: CoreAddr) -> &mut CompleteInstruction {
        let index = usize::try_from(addr % self.size).unwrap_or(0);
        // the index is in range: cells holds exactly `size` elements
        &mut self.cells[index]
    }

    /// Store an instruction at an address, reducing the address and both
    /// fields modulo the core size
    pub fn set(&mut self, addr: CoreAddr, instruction: CompleteInstruction) {
        let trimmed = CompleteInstruction {
            instr: instruction.instr,
            a_field: instruction.a_field % self.size,
            b_field: instruction.b_field % self.size,
        };
        *self.get_mut(addr) = trimmed;
    }

    /// Rewrite every cell with the same instruction
    pub fn clear(&mut self, fill: CompleteInstruction) {
        let trimmed = CompleteInstruction {
            instr: fill.instr,
            a_field: fill.a_field % self.size,
            b_field: fill.b_field % self.size,
        };
        self.cells.fill(trimmed);
    }

    /// Reduce a value to `[0, core_size)`
    #[must_use]
    pub const fn trim(&self, value: CoreAddr) -> CoreAddr {
        value % self.size
    }

    /// The sum of an address and an offset, reduced modulo the core size
    #[must_use]
    pub fn add(&self, base: CoreAddr, offset: CoreAddr) -> CoreAddr {
        let sum = u64::from(base).wrapping_add(u64::from(offset));
        CoreAddr::try_from(sum % u64::from(self.size)).unwrap_or(0)
    }

    /// Fold an operand offset through the read-limit window
    #[must_use]
    pub fn fold_read(&self, pointer: u64) -> CoreAddr {
        self.fold(pointer, self.read_limit)
    }

    /// Fold an operand offset through the write-limit window
    #[must_use]
    pub fn fold_write(&self, pointer: u64) -> CoreAddr {
        self.fold(pointer, self.write_limit)
    }

    /// Fold a pointer through a limit window.
    ///
    /// The remainder modulo the limit is centered around zero: remainders
    /// beyond half the limit wrap to the equivalent negative offset, which
    /// modulo the core size is an address just below it.  With the limit
    /// equal to the core size this is a plain modulus.
    fn fold(&self, pointer: u64, limit: CoreAddr) -> CoreAddr {
        let mut result =
            CoreAddr::try_from(pointer % u64::from(limit)).unwrap_or(0);
        if result > limit / 2 {
            result = result.wrapping_add(self.size.wrapping_sub(limit));
        }
        result
    }

    /// Map a stored value to the signed offset it represents: values beyond
    /// half the core size are the negative offsets wrapped around
    #[must_use]
    pub const fn signed(&self, value: CoreAddr) -> i64 {
        if value <= self.size / 2 {
            value as i64
        } else {
            value as i64 - self.size as i64
        }
    }

    /// One more than a field value, wrapped at the core size
    #[must_use]
    pub fn bump_up(&self, value: CoreAddr) -> CoreAddr {
        self.add(value, 1)
    }

    /// One less than a field value, wrapped at the core size
    #[must_use]
    pub fn bump_down(&self, value: CoreAddr) -> CoreAddr {
        self.add(value, self.size.wrapping_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use redcode::{AddrMode, Instruction, Modifier, Opcode};

    use super::*;

    /// An 8000 cell core with both limits at the core size
    fn default_core() -> Core {
        Core::new(8000, 8000, 8000).unwrap()
    }

    #[test]
    fn new_core_is_filled_with_dat() {
        let core = default_core();
        assert_eq!(core.size(), 8000);
        for addr in [0, 1, 4000, 7999] {
            let cell = core.get(addr);
            assert_eq!(cell.instr.opcode, Opcode::Dat);
            assert_eq!(cell.instr.modifier, Modifier::F);
            assert_eq!(cell.instr.a_addr_mode, AddrMode::Direct);
            assert_eq!(cell.a_field, 0);
            assert_eq!(cell.b_field, 0);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Core::new(0, 1, 1).is_err());
        assert!(Core::new(8000, 0, 8000).is_err());
        assert!(Core::new(8000, 8000, 8001).is_err());
        assert!(Core::new(8000, 4000, 4000).is_ok());
    }

    #[test]
    fn addresses_wrap_around() {
        let mut core = default_core();
        let marker = CompleteInstruction {
            instr: Instruction {
                opcode: Opcode::Nop,
                modifier: Modifier::F,
                a_addr_mode: AddrMode::Direct,
                b_addr_mode: AddrMode::Direct,
            },
            a_field: 1,
            b_field: 2,
        };
        core.set(8000, marker);
        assert_eq!(core.get(0), marker);
        assert_eq!(core.get(16_000), marker);
    }

    #[test]
    fn set_trims_stored_fields() {
        let mut core = default_core();
        let oversized = CompleteInstruction {
            instr: Instruction::default(),
            a_field: 8001,
            b_field: 16_000,
        };
        core.set(5, oversized);
        assert_eq!(core.get(5).a_field, 1);
        assert_eq!(core.get(5).b_field, 0);
    }

    #[test]
    fn trim_is_a_plain_modulus() {
        let core = default_core();
        for value in [0, 1, 7999, 8000, 8001, 20_000] {
            assert_eq!(core.trim(value), value % 8000);
        }
    }

    #[test]
    fn folding_degenerates_to_trim_at_full_limit() {
        let core = default_core();
        for pointer in (0..20_000).step_by(7) {
            assert_eq!(
                core.fold_read(pointer),
                CoreAddr::try_from(pointer % 8000).unwrap()
            );
            assert_eq!(core.fold_write(pointer), core.fold_read(pointer));
        }
    }

    #[test]
    fn folding_centers_the_window_around_zero() {
        let core = Core::new(8000, 100, 100).unwrap();
        // small forward offsets pass through
        assert_eq!(core.fold_read(10), 10);
        assert_eq!(core.fold_read(50), 50);
        // offsets beyond half the limit wrap to just below the core size
        assert_eq!(core.fold_read(51), 51 + 8000 - 100);
        assert_eq!(core.fold_read(99), 99 + 8000 - 100);
        // and reduce modulo the limit first
        assert_eq!(core.fold_read(110), 10);
    }

    #[test]
    fn folding_maps_into_the_core_and_is_idempotent() {
        // idempotence over a limit that divides the core size
        let core = Core::new(8000, 400, 400).unwrap();
        for pointer in 0..1000 {
            let folded = core.fold_read(pointer);
            assert!(folded < 8000);
            assert_eq!(core.fold_read(u64::from(folded)), folded);
        }
    }

    #[test]
    fn signed_recovers_negative_offsets() {
        let core = default_core();
        assert_eq!(core.signed(0), 0);
        assert_eq!(core.signed(1), 1);
        assert_eq!(core.signed(4000), 4000);
        assert_eq!(core.signed(4001), -3999);
        assert_eq!(core.signed(7999), -1);
    }

    #[test]
    fn bump_wraps_at_the_core_size() {
        let core = default_core();
        assert_eq!(core.bump_up(7999), 0);
        assert_eq!(core.bump_up(0), 1);
        assert_eq!(core.bump_down(0), 7999);
        assert_eq!(core.bump_down(1), 0);
    }

    #[test]
    fn clear_rewrites_every_cell() {
        let mut core = default_core();
        let marker = CompleteInstruction {
            instr: Instruction {
                opcode: Opcode::Nop,
                modifier: Modifier::F,
                a_addr_mode: AddrMode::Direct,
                b_addr_mode: AddrMode::Direct,
            },
            a_field: 7,
            b_field: 7,
        };
        core.set(123, marker);
        core.clear(CompleteInstruction::default());
        assert_eq!(core.get(123), CompleteInstruction::default());
    }
}
