use redcode::{AddrMode, CompleteInstruction};

use crate::{
    events::{CoreEvent, CoreObserver},
    memory::Core,
    CoreAddr,
};

/// The results of the operand phase for one instruction: the resolved read
/// and write addresses for both operands and the register snapshots captured
/// during evaluation.
///
/// Because predecrement and postincrement modes modify the core, the
/// register snapshots are not guaranteed to match the in-core values by the
/// time the opcode executes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EvaluatedOperands {
    /// Absolute address the A operand reads from
    pub a_read: CoreAddr,
    /// Absolute address the A operand would write to
    pub a_write: CoreAddr,
    /// Absolute address the B operand reads from
    pub b_read: CoreAddr,
    /// Absolute address the B operand writes to
    pub b_write: CoreAddr,
    /// Snapshot of the instruction at [`EvaluatedOperands::a_read`]
    pub a_register: CompleteInstruction,
    /// Snapshot of the instruction at [`EvaluatedOperands::b_read`]
    pub b_register: CompleteInstruction,
}

/// Evaluate both operands of the instruction `ir` executing at `pc`.
///
/// The A operand is evaluated completely, including its predecrement and
/// postincrement side effects, before the B operand's evaluation begins.
/// Read pointers and write pointers are chased independently, each folded
/// through its own limit window.
pub(crate) fn evaluate(
    warrior: usize,
    pc: CoreAddr,
    ir: &CompleteInstruction,
    core: &mut Core,
    observer: &mut dyn CoreObserver,
) -> EvaluatedOperands {
    let (a_read, a_write, a_register) = evaluate_operand(
        warrior,
        pc,
        ir.instr.a_addr_mode,
        ir.a_field,
        core,
        observer,
    );
    let (b_read, b_write, b_register) = evaluate_operand(
        warrior,
        pc,
        ir.instr.b_addr_mode,
        ir.b_field,
        core,
        observer,
    );
    EvaluatedOperands {
        a_read,
        a_write,
        b_read,
        b_write,
        a_register,
        b_register,
    }
}

/// Evaluate one operand, returning its absolute read address, absolute write
/// address, and the register snapshot taken from the read address
fn evaluate_operand(
    warrior: usize,
    pc: CoreAddr,
    mode: AddrMode,
    number: CoreAddr,
    core: &mut Core,
    observer: &mut dyn CoreObserver,
) -> (CoreAddr, CoreAddr, CompleteInstruction) {
    if mode == AddrMode::Immediate {
        // both pointers are zero: the operand refers to the current
        // instruction
        return (pc, pc, core.get(pc));
    }

    let mut read = core.fold_read(u64::from(number));
    let mut write = core.fold_write(u64::from(number));

    if mode.is_indirect() {
        // the cell holding the write chase's secondary offset, and the
        // target of any predecrement or postincrement
        let indirect = core.add(pc, write);

        match mode {
            AddrMode::PredecA => {
                let decremented = core.bump_down(core.get(indirect).a_field);
                core.get_mut(indirect).a_field = decremented;
                observer.on_event(warrior, indirect, CoreEvent::ADec);
            }
            AddrMode::PredecB => {
                let decremented = core.bump_down(core.get(indirect).b_field);
                core.get_mut(indirect).b_field = decremented;
                observer.on_event(warrior, indirect, CoreEvent::BDec);
            }
            _ => {}
        }

        // chase the read and write pointers independently, each through its
        // own limit
        let read_base = core.add(pc, read);
        let read_secondary = secondary_field(mode, core.get(read_base));
        read = core
            .fold_read(u64::from(read).wrapping_add(u64::from(read_secondary)));
        let write_secondary = secondary_field(mode, core.get(indirect));
        write = core.fold_write(
            u64::from(write).wrapping_add(u64::from(write_secondary)),
        );

        let read_addr = core.add(pc, read);
        let register = core.get(read_addr);

        // postincrement after the register snapshot is taken
        match mode {
            AddrMode::PostincA => {
                let incremented = core.bump_up(core.get(indirect).a_field);
                core.get_mut(indirect).a_field = incremented;
                observer.on_event(warrior, indirect, CoreEvent::AInc);
            }
            AddrMode::PostincB => {
                let incremented = core.bump_up(core.get(indirect).b_field);
                core.get_mut(indirect).b_field = incremented;
                observer.on_event(warrior, indirect, CoreEvent::BInc);
            }
            _ => {}
        }

        return (read_addr, core.add(pc, write), register);
    }

    // direct mode
    let read_addr = core.add(pc, read);
    (read_addr, core.add(pc, write), core.get(read_addr))
}

/// The field of a pointed-to instruction that supplies an indirect mode's
/// secondary offset
fn secondary_field(mode: AddrMode, cell: CompleteInstruction) -> CoreAddr {
    if mode.uses_a_number() {
        cell.a_field
    } else {
        cell.b_field
    }
}

#[cfg(test)]
mod tests {
    use redcode::{Instruction, Modifier, Opcode};

    use super::*;
    use crate::events::NullObserver;

    /// A small core with markers so each cell is distinguishable
    fn test_core(size: CoreAddr) -> Core {
        let mut core = Core::new(size, size, size).unwrap();
        for addr in 0..size {
            core.set(
                addr,
                CompleteInstruction {
                    instr: Instruction {
                        opcode: Opcode::Nop,
                        modifier: Modifier::F,
                        a_addr_mode: AddrMode::Direct,
                        b_addr_mode: AddrMode::Direct,
                    },
                    a_field: 0,
                    b_field: 0,
                },
            );
        }
        core
    }

    /// Build the executing instruction for operand tests
    fn executing(
        a_mode: AddrMode,
        a: CoreAddr,
        b_mode: AddrMode,
        b: CoreAddr,
    ) -> CompleteInstruction {
        CompleteInstruction {
            instr: Instruction {
                opcode: Opcode::Mov,
                modifier: Modifier::I,
                a_addr_mode: a_mode,
                b_addr_mode: b_mode,
            },
            a_field: a,
            b_field: b,
        }
    }

    #[test]
    fn direct_operands_offset_from_the_pc() {
        let mut core = test_core(8);
        let ir = executing(AddrMode::Direct, 2, AddrMode::Direct, 3);
        let regs = evaluate(0, 6, &ir, &mut core, &mut NullObserver);
        assert_eq!(regs.a_read, 0); // 6 + 2 wraps around
        assert_eq!(regs.a_write, 0);
        assert_eq!(regs.b_read, 1);
        assert_eq!(regs.b_write, 1);
    }

    #[test]
    fn immediate_operands_point_at_the_instruction_itself() {
        let mut core = test_core(8);
        let ir = executing(AddrMode::Immediate, 5, AddrMode::Immediate, 6);
        let regs = evaluate(0, 3, &ir, &mut core, &mut NullObserver);
        assert_eq!(regs.a_read, 3);
        assert_eq!(regs.b_write, 3);
        assert_eq!(regs.a_register, core.get(3));
    }

    #[test]
    fn indirect_operands_chase_the_secondary_offset() {
        let mut core = test_core(8);
        core.get_mut(1).b_field = 3;
        let ir = executing(AddrMode::IndirectB, 1, AddrMode::Direct, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        // 0 + 1 points at cell 1, whose B-number 3 gives 1 + 3 = 4
        assert_eq!(regs.a_read, 4);
        assert_eq!(regs.a_write, 4);

        core.get_mut(2).a_field = 5;
        let ir = executing(AddrMode::IndirectA, 2, AddrMode::Direct, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        assert_eq!(regs.a_read, 7);
    }

    #[test]
    fn predecrement_happens_before_the_chase() {
        let mut core = test_core(8);
        // cell 1 starts at zero, so the decrement wraps to size - 1
        let ir = executing(AddrMode::PredecA, 1, AddrMode::Direct, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        assert_eq!(core.get(1).a_field, 7);
        // the chase reads the already decremented secondary offset
        assert_eq!(regs.a_read, 0); // (1 + 7) % 8
    }

    #[test]
    fn postincrement_happens_after_the_snapshot() {
        let mut core = test_core(8);
        core.get_mut(1).a_field = 3;
        core.get_mut(4).b_field = 9 % 8;
        let ir = executing(AddrMode::PostincA, 1, AddrMode::Direct, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        // the register snapshot is of cell 1 + 3 = 4, before the increment
        assert_eq!(regs.a_read, 4);
        assert_eq!(regs.a_register.b_field, 1);
        // and the increment lands in the pointing cell afterwards
        assert_eq!(core.get(1).a_field, 4);
    }

    #[test]
    fn a_operand_side_effects_precede_b_evaluation() {
        let mut core = test_core(8);
        core.get_mut(0).b_field = 2;
        // A postincrements cell 0's A-number, which the B operand's chase
        // then reads
        let ir = executing(AddrMode::PostincA, 0, AddrMode::IndirectA, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        // A: chase through cell 0's A-number (0), snapshot cell 0, then
        // increment it to 1
        assert_eq!(regs.a_read, 0);
        assert_eq!(regs.a_register.a_field, 0);
        // B: cell 0's A-number is already 1 by the time it is chased
        assert_eq!(regs.b_read, 1);
        assert_eq!(core.get(0).a_field, 1);
    }

    #[test]
    fn read_and_write_pointers_fold_through_their_own_limits() {
        // a write limit tighter than the read limit sends reads and writes
        // to different cells
        let mut core = Core::new(80, 80, 8).unwrap();
        core.get_mut(20).b_field = 0;
        let ir = executing(AddrMode::IndirectB, 20, AddrMode::Direct, 0);
        let regs = evaluate(0, 0, &ir, &mut core, &mut NullObserver);
        // read pointer: 20 folds within the read limit of 80
        assert_eq!(regs.a_read, 20);
        // write pointer: 20 % 8 = 4, which is within half the limit
        assert_eq!(regs.a_write, 4);
    }

    #[test]
    fn predecrement_events_are_reported() {
        use core::cell::RefCell;

        /// Observer that records every event it sees
        struct Recorder<'a> {
            /// Shared event log
            log: &'a RefCell<Vec<(usize, CoreAddr, CoreEvent)>>,
        }
        impl CoreObserver for Recorder<'_> {
            fn on_event(
                &mut self,
                warrior: usize,
                address: CoreAddr,
                event: CoreEvent,
            ) {
                self.log.borrow_mut().push((warrior, address, event));
            }
        }

        let log = RefCell::new(Vec::new());
        let mut core = test_core(8);
        let ir = executing(AddrMode::PredecB, 1, AddrMode::PostincB, 2);
        let _regs =
            evaluate(3, 0, &ir, &mut core, &mut Recorder { log: &log });
        assert_eq!(
            log.into_inner(),
            vec![(3, 1, CoreEvent::BDec), (3, 2, CoreEvent::BInc)]
        );
    }
}
