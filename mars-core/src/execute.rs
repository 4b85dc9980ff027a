use redcode::{CompleteInstruction, Modifier, Opcode};

use crate::{
    events::{CoreEvent, CoreObserver},
    memory::Core,
    operands::EvaluatedOperands,
    processes::TaskQueues,
    CoreAddr,
};

/// Everything an opcode implementation needs: the evaluated operands, the
/// executing instruction, and mutable access to the core and the task
/// queues.
pub(crate) struct OpContext<'a> {
    /// Index of the warrior executing this task
    pub warrior: usize,
    /// Address of the executing instruction
    pub pc: CoreAddr,
    /// Snapshot of the executing instruction, taken before the operand phase
    pub ir: CompleteInstruction,
    /// Resolved operand pointers and register snapshots
    pub regs: EvaluatedOperands,
    /// The core memory
    pub core: &'a mut Core,
    /// All warriors' task queues
    pub queues: &'a mut TaskQueues,
    /// Event sink
    pub observer: &'a mut dyn CoreObserver,
}

impl OpContext<'_> {
    /// Queue the instruction `delta` cells past the executing one
    fn enqueue_offset(&mut self, delta: CoreAddr) {
        let successor = self.core.add(self.pc, delta);
        self.queues.enqueue(self.warrior, successor);
    }

    /// Queue the A operand's read target (the jump destination)
    fn enqueue_jump(&mut self) {
        self.queues.enqueue(self.warrior, self.regs.a_read);
    }

    /// Report an event at an address
    fn emit(&mut self, address: CoreAddr, event: CoreEvent) {
        self.observer.on_event(self.warrior, address, event);
    }
}

/// `DAT`: do nothing past operand evaluation.  Queueing no successor removes
/// the process from the simulation.
pub(crate) fn dat_op(_ctx: &mut OpContext) {}

/// `MOV`: copy fields (or for `.I` the whole instruction) from the A read
/// target into the B write target
pub(crate) fn mov_op(ctx: &mut OpContext) {
    let ira = ctx.regs.a_register;
    let source = ctx.regs.a_read;
    let target = ctx.regs.b_write;
    match ctx.ir.instr.modifier {
        Modifier::A => {
            ctx.core.get_mut(target).a_field = ira.a_field;
            ctx.emit(source, CoreEvent::ARead);
            ctx.emit(target, CoreEvent::AWrite);
        }
        Modifier::B => {
            ctx.core.get_mut(target).b_field = ira.b_field;
            ctx.emit(source, CoreEvent::BRead);
            ctx.emit(target, CoreEvent::BWrite);
        }
        Modifier::AB => {
            ctx.core.get_mut(target).b_field = ira.a_field;
            ctx.emit(source, CoreEvent::ARead);
            ctx.emit(target, CoreEvent::BWrite);
        }
        Modifier::BA => {
            ctx.core.get_mut(target).a_field = ira.b_field;
            ctx.emit(source, CoreEvent::BRead);
            ctx.emit(target, CoreEvent::AWrite);
        }
        Modifier::F => {
            let cell = ctx.core.get_mut(target);
            cell.a_field = ira.a_field;
            cell.b_field = ira.b_field;
            ctx.emit(source, CoreEvent::ARead);
            ctx.emit(source, CoreEvent::BRead);
            ctx.emit(target, CoreEvent::AWrite);
            ctx.emit(target, CoreEvent::BWrite);
        }
        Modifier::X => {
            // exchange: the A-number lands in the B slot and vice versa
            let cell = ctx.core.get_mut(target);
            cell.b_field = ira.a_field;
            cell.a_field = ira.b_field;
            ctx.emit(source, CoreEvent::ARead);
            ctx.emit(source, CoreEvent::BRead);
            ctx.emit(target, CoreEvent::AWrite);
            ctx.emit(target, CoreEvent::BWrite);
        }
        Modifier::I => {
            *ctx.core.get_mut(target) = ira;
            ctx.emit(source, CoreEvent::IRead);
            ctx.emit(target, CoreEvent::IWrite);
        }
    }
    ctx.enqueue_offset(1);
}

/// One arithmetic store: which field of the B write target receives
/// `lhs op rhs`
struct ArithStore {
    /// Store into the A-number (as opposed to the B-number)
    to_a_field: bool,
    /// Left operand, from the IRB snapshot
    lhs: CoreAddr,
    /// Right operand, from the IRA snapshot
    rhs: CoreAddr,
    /// Which field of IRA supplied `rhs` (for read event reporting)
    rhs_from_a: bool,
    /// Which field of IRB supplied `lhs` (for read event reporting)
    lhs_from_a: bool,
}

/// `ADD`/`SUB`/`MUL`/`DIV`/`MOD`: combine fields of the register snapshots
/// as `IRB op IRA` and store into the B write target.
///
/// A zero divisor anywhere aborts the instruction: nothing is stored, no
/// successor is queued, and the process dies.
pub(crate) fn arithmetic_op(ctx: &mut OpContext) {
    let ira = ctx.regs.a_register;
    let irb = ctx.regs.b_register;
    let opcode = ctx.ir.instr.opcode;
    let size = ctx.core.size();

    let (first, second): (ArithStore, Option<ArithStore>) =
        match ctx.ir.instr.modifier {
            Modifier::A => (
                ArithStore {
                    to_a_field: true,
                    lhs: irb.a_field,
                    rhs: ira.a_field,
                    rhs_from_a: true,
                    lhs_from_a: true,
                },
                None,
            ),
            Modifier::B => (
                ArithStore {
                    to_a_field: false,
                    lhs: irb.b_field,
                    rhs: ira.b_field,
                    rhs_from_a: false,
                    lhs_from_a: false,
                },
                None,
            ),
            Modifier::AB => (
                ArithStore {
                    to_a_field: false,
                    lhs: irb.b_field,
                    rhs: ira.a_field,
                    rhs_from_a: true,
                    lhs_from_a: false,
                },
                None,
            ),
            Modifier::BA => (
                ArithStore {
                    to_a_field: true,
                    lhs: irb.a_field,
                    rhs: ira.b_field,
                    rhs_from_a: false,
                    lhs_from_a: true,
                },
                None,
            ),
            Modifier::F | Modifier::I => (
                ArithStore {
                    to_a_field: true,
                    lhs: irb.a_field,
                    rhs: ira.a_field,
                    rhs_from_a: true,
                    lhs_from_a: true,
                },
                Some(ArithStore {
                    to_a_field: false,
                    lhs: irb.b_field,
                    rhs: ira.b_field,
                    rhs_from_a: false,
                    lhs_from_a: false,
                }),
            ),
            Modifier::X => (
                ArithStore {
                    to_a_field: false,
                    lhs: irb.b_field,
                    rhs: ira.a_field,
                    rhs_from_a: true,
                    lhs_from_a: false,
                },
                Some(ArithStore {
                    to_a_field: true,
                    lhs: irb.a_field,
                    rhs: ira.b_field,
                    rhs_from_a: false,
                    lhs_from_a: true,
                }),
            ),
        };

    // compute every result before touching the core: a zero divisor in
    // either half means nothing is stored at all
    let first_result = perform_arithmetic(opcode, first.lhs, first.rhs, size);
    let second_result = second
        .as_ref()
        .map(|s| perform_arithmetic(opcode, s.lhs, s.rhs, size));
    let (Some(first_value), second_value) = (first_result, second_result)
    else {
        return;
    };
    let second_value = match second_value {
        None => None,
        Some(Some(value)) => Some(value),
        // division by zero in the second half
        Some(None) => return,
    };

    apply_arith_store(ctx, &first, first_value);
    if let (Some(store), Some(value)) = (second, second_value) {
        apply_arith_store(ctx, &store, value);
    }
    ctx.enqueue_offset(1);
}

/// Store one arithmetic result and report the reads and the store
fn apply_arith_store(ctx: &mut OpContext, store: &ArithStore, value: CoreAddr) {
    let target = ctx.regs.b_write;
    let cell = ctx.core.get_mut(target);
    if store.to_a_field {
        cell.a_field = value;
    } else {
        cell.b_field = value;
    }
    let rhs_event = if store.rhs_from_a {
        CoreEvent::ARead
    } else {
        CoreEvent::BRead
    };
    let lhs_event = if store.lhs_from_a {
        CoreEvent::ARead
    } else {
        CoreEvent::BRead
    };
    let arith_event = if store.to_a_field {
        CoreEvent::AArith
    } else {
        CoreEvent::BArith
    };
    let a_read = ctx.regs.a_read;
    let b_read = ctx.regs.b_read;
    ctx.emit(a_read, rhs_event);
    ctx.emit(b_read, lhs_event);
    ctx.emit(target, arith_event);
}

/// Apply one binary arithmetic operation modulo the core size.  `None` marks
/// a division or modulus by zero.
fn perform_arithmetic(
    opcode: Opcode,
    lhs: CoreAddr,
    rhs: CoreAddr,
    size: CoreAddr,
) -> Option<CoreAddr> {
    let wide_size = u64::from(size);
    let reduce = |value: u64| {
        CoreAddr::try_from(value % wide_size).unwrap_or(0)
    };
    match opcode {
        Opcode::Add => {
            Some(reduce(u64::from(lhs).wrapping_add(u64::from(rhs))))
        }
        Opcode::Sub => Some(reduce(
            u64::from(lhs)
                .wrapping_add(wide_size)
                .wrapping_sub(u64::from(rhs)),
        )),
        Opcode::Mul => {
            Some(reduce(u64::from(lhs).wrapping_mul(u64::from(rhs))))
        }
        Opcode::Div => (rhs != 0).then(|| lhs / rhs),
        Opcode::Mod => (rhs != 0).then(|| lhs % rhs),
        // arithmetic_op is only dispatched for the five opcodes above
        _ => None,
    }
}

/// `JMP`: queue the A operand's target unconditionally
pub(crate) fn jmp_op(ctx: &mut OpContext) {
    ctx.enqueue_jump();
}

/// Which zero test a conditional jump applies to the IRB snapshot
fn jump_test_is_zero(modifier: Modifier, irb: &CompleteInstruction) -> bool {
    match modifier {
        Modifier::A | Modifier::BA => irb.a_field == 0,
        Modifier::B | Modifier::AB => irb.b_field == 0,
        Modifier::F | Modifier::X | Modifier::I => {
            irb.a_field == 0 && irb.b_field == 0
        }
    }
}

/// Report the field reads a conditional jump performed on its B operand
fn emit_jump_reads(ctx: &mut OpContext, modifier: Modifier) {
    let tested = ctx.regs.b_read;
    match modifier {
        Modifier::A | Modifier::BA => ctx.emit(tested, CoreEvent::ARead),
        Modifier::B | Modifier::AB => ctx.emit(tested, CoreEvent::BRead),
        Modifier::F | Modifier::X | Modifier::I => {
            ctx.emit(tested, CoreEvent::ARead);
            ctx.emit(tested, CoreEvent::BRead);
        }
    }
}

/// `JMZ`: jump when the tested part of the B-value is zero
pub(crate) fn jmz_op(ctx: &mut OpContext) {
    let modifier = ctx.ir.instr.modifier;
    emit_jump_reads(ctx, modifier);
    if jump_test_is_zero(modifier, &ctx.regs.b_register) {
        ctx.enqueue_jump();
    } else {
        ctx.enqueue_offset(1);
    }
}

/// `JMN`: jump when any tested part of the B-value is non-zero
pub(crate) fn jmn_op(ctx: &mut OpContext) {
    let modifier = ctx.ir.instr.modifier;
    emit_jump_reads(ctx, modifier);
    if jump_test_is_zero(modifier, &ctx.regs.b_register) {
        ctx.enqueue_offset(1);
    } else {
        ctx.enqueue_jump();
    }
}

/// `DJN`: decrement the selected fields of both the B write target and the
/// IRB snapshot, then jump as `JMN` would on the decremented snapshot
pub(crate) fn djn_op(ctx: &mut OpContext) {
    let modifier = ctx.ir.instr.modifier;
    let target = ctx.regs.b_write;
    let mut irb = ctx.regs.b_register;

    let decrement_a = !matches!(modifier, Modifier::B | Modifier::AB);
    let decrement_b = !matches!(modifier, Modifier::A | Modifier::BA);
    if decrement_a {
        let decremented = ctx.core.bump_down(ctx.core.get(target).a_field);
        ctx.core.get_mut(target).a_field = decremented;
        irb.a_field = ctx.core.bump_down(irb.a_field);
        ctx.emit(target, CoreEvent::ADec);
    }
    if decrement_b {
        let decremented = ctx.core.bump_down(ctx.core.get(target).b_field);
        ctx.core.get_mut(target).b_field = decremented;
        irb.b_field = ctx.core.bump_down(irb.b_field);
        ctx.emit(target, CoreEvent::BDec);
    }

    emit_jump_reads(ctx, modifier);
    if jump_test_is_zero(modifier, &irb) {
        ctx.enqueue_offset(1);
    } else {
        ctx.enqueue_jump();
    }
}

/// `SPL`: queue the fall-through first, then the split target.  The queue
/// cap applies to each independently.
pub(crate) fn spl_op(ctx: &mut OpContext) {
    ctx.enqueue_offset(1);
    ctx.enqueue_jump();
}

/// The comparisons shared by `SLT`, `CMP`/`SEQ`, and `SNE`: skip the next
/// instruction when the condition holds for every selected field pair
fn comparison_op(
    ctx: &mut OpContext,
    condition: impl Fn(CoreAddr, CoreAddr) -> bool,
) -> bool {
    let ira = ctx.regs.a_register;
    let irb = ctx.regs.b_register;
    match ctx.ir.instr.modifier {
        Modifier::A => {
            emit_comparison_reads(ctx, true, true);
            condition(ira.a_field, irb.a_field)
        }
        Modifier::B => {
            emit_comparison_reads(ctx, false, false);
            condition(ira.b_field, irb.b_field)
        }
        Modifier::AB => {
            emit_comparison_reads(ctx, true, false);
            condition(ira.a_field, irb.b_field)
        }
        Modifier::BA => {
            emit_comparison_reads(ctx, false, true);
            condition(ira.b_field, irb.a_field)
        }
        Modifier::F | Modifier::I => {
            emit_comparison_reads(ctx, true, true);
            emit_comparison_reads(ctx, false, false);
            condition(ira.a_field, irb.a_field)
                && condition(ira.b_field, irb.b_field)
        }
        Modifier::X => {
            emit_comparison_reads(ctx, true, false);
            emit_comparison_reads(ctx, false, true);
            condition(ira.a_field, irb.b_field)
                && condition(ira.b_field, irb.a_field)
        }
    }
}

/// Report the field reads of one comparison pair
fn emit_comparison_reads(ctx: &mut OpContext, a_from_a: bool, b_from_a: bool) {
    let a_read = ctx.regs.a_read;
    let b_read = ctx.regs.b_read;
    ctx.emit(
        a_read,
        if a_from_a { CoreEvent::ARead } else { CoreEvent::BRead },
    );
    ctx.emit(
        b_read,
        if b_from_a { CoreEvent::ARead } else { CoreEvent::BRead },
    );
}

/// `SLT`: skip when the A-value is less than the B-value.  `SLT.I` behaves
/// as `SLT.F`.
pub(crate) fn slt_op(ctx: &mut OpContext) {
    let skip = comparison_op(ctx, |a, b| a < b);
    ctx.enqueue_offset(if skip { 2 } else { 1 });
}

/// `CMP`/`SEQ`: skip when the A-value equals the B-value.  With `.I` the
/// whole instructions must match.
pub(crate) fn seq_op(ctx: &mut OpContext) {
    let skip = if ctx.ir.instr.modifier == Modifier::I {
        let a_read = ctx.regs.a_read;
        let b_read = ctx.regs.b_read;
        ctx.emit(a_read, CoreEvent::IRead);
        ctx.emit(b_read, CoreEvent::IRead);
        ctx.regs.a_register == ctx.regs.b_register
    } else {
        comparison_op(ctx, |a, b| a == b)
    };
    ctx.enqueue_offset(if skip { 2 } else { 1 });
}

/// `SNE`: skip when the compared parts differ.  Multi-field modifiers
/// require every selected pair to differ; with `.I` the whole instructions
/// are compared.
pub(crate) fn sne_op(ctx: &mut OpContext) {
    let skip = if ctx.ir.instr.modifier == Modifier::I {
        let a_read = ctx.regs.a_read;
        let b_read = ctx.regs.b_read;
        ctx.emit(a_read, CoreEvent::IRead);
        ctx.emit(b_read, CoreEvent::IRead);
        ctx.regs.a_register != ctx.regs.b_register
    } else {
        comparison_op(ctx, |a, b| a != b)
    };
    ctx.enqueue_offset(if skip { 2 } else { 1 });
}

/// `NOP`: queue the next instruction and nothing else
pub(crate) fn nop_op(ctx: &mut OpContext) {
    ctx.enqueue_offset(1);
}
