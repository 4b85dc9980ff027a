use rand::{rngs::StdRng, Rng, SeedableRng};
use redcode::{CompleteInstruction, Opcode, RelaxedWarrior, Warrior};
use thiserror::Error;

use crate::{
    events::{CoreEvent, CoreObserver, NullObserver},
    execute::{
        arithmetic_op, dat_op, djn_op, jmn_op, jmp_op, jmz_op, mov_op, nop_op,
        seq_op, slt_op, sne_op, spl_op, OpContext,
    },
    memory::Core,
    operands,
    processes::TaskQueues,
    CoreAddr,
};

/// Possible failures while constructing or running a simulation
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum MarsError {
    /// Out of range or otherwise illegal configuration or warriors
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// A core cell holds an opcode this simulator does not implement
    #[error("cannot execute {opcode} at address {address}: \
             not implemented by this simulator")]
    InvalidInstruction {
        /// The offending opcode
        opcode: Opcode,
        /// Where in the core it was encountered
        address: CoreAddr,
    },
}

/// Configuration for a [`Mars`] simulation.
///
/// The defaults are the conventional tournament settings: an 8000 cell core,
/// an 80000 cycle budget, warriors separated by at least 100 cells, and the
/// process cap and both indirection limits equal to the core size.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarsOptions {
    /// Number of cells in the core
    pub core_size: CoreAddr,
    /// Cycle budget used by [`Mars::run`]
    pub cycles: u32,
    /// Per-warrior task queue cap; `None` means the core size
    pub max_processes: Option<u32>,
    /// Minimum gap between adjacent warriors at load time
    pub minimum_separation: CoreAddr,
    /// Indirect read pointer window; `None` means the core size
    pub read_limit: Option<CoreAddr>,
    /// Indirect write pointer window; `None` means the core size
    pub write_limit: Option<CoreAddr>,
    /// Shift each warrior to a random position within its span.  When false,
    /// warriors load at the start of their spans, which is the reproducible
    /// configuration used for testing.
    pub randomize: bool,
    /// Seed for the placement generator; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for MarsOptions {
    fn default() -> Self {
        Self {
            core_size: 8000,
            cycles: 80_000,
            max_processes: None,
            minimum_separation: 100,
            read_limit: None,
            write_limit: None,
            randomize: true,
            seed: None,
        }
    }
}

/// The MARS: a core, the warriors loaded into it, and their task queues.
///
/// Each [`Mars::step`] executes one task per live warrior in load order.
/// Drivers call [`Mars::run`] to play a round, or `step` directly to
/// interleave their own bookkeeping (and their own stop conditions) between
/// cycles.
pub struct Mars {
    /// The shared core memory
    core: Core,
    /// Warriors in load order, normalized to the core size
    warriors: Vec<Warrior>,
    /// Load position of each warrior
    positions: Vec<CoreAddr>,
    /// Per-warrior task queues
    queues: TaskQueues,
    /// Cycle budget for [`Mars::run`]
    cycles: u32,
    /// Minimum gap between adjacent warriors
    minimum_separation: CoreAddr,
    /// Whether placement is randomized within each span
    randomize: bool,
    /// Placement generator
    rng: StdRng,
    /// Event sink, a no-op unless a visualizer subscribes
    observer: Box<dyn CoreObserver>,
}

impl Mars {
    /// Build a simulation and load `warriors` into the core.
    ///
    /// The core is divided into one equal span per warrior.  Warrior `n`
    /// loads at the start of span `n`, shifted by a uniformly random amount
    /// that keeps it at least `minimum_separation` cells clear of the next
    /// span when `randomize` is set.  Each warrior starts with a single task
    /// at its entry point.
    ///
    /// # Errors
    ///
    /// Returns [`MarsError::InvalidParam`] for a zero-sized core, limits or
    /// process caps that are zero or exceed the core size, an empty warrior,
    /// a warrior longer than its span, or a start offset outside a warrior's
    /// code.
    pub fn new(
        options: MarsOptions,
        warriors: &[RelaxedWarrior],
    ) -> Result<Self, MarsError> {
        let core = Core::new(
            options.core_size,
            options.read_limit.unwrap_or(options.core_size),
            options.write_limit.unwrap_or(options.core_size),
        )?;
        let max_processes =
            options.max_processes.unwrap_or(options.core_size);
        if max_processes == 0 {
            return Err(MarsError::InvalidParam(
                "the process cap cannot be zero",
            ));
        }

        let warriors: Vec<Warrior> = warriors
            .iter()
            .map(|warrior| warrior.normalize(options.core_size))
            .collect();
        let span = span_size(options.core_size, warriors.len());
        for warrior in &warriors {
            let length =
                CoreAddr::try_from(warrior.code.len()).unwrap_or(CoreAddr::MAX);
            if length == 0 {
                return Err(MarsError::InvalidParam(
                    "cannot load a warrior with no instructions",
                ));
            }
            if length > span {
                return Err(MarsError::InvalidParam(
                    "warrior does not fit within its span of the core",
                ));
            }
            if warrior.start >= length {
                return Err(MarsError::InvalidParam(
                    "warrior start offset lies outside its code",
                ));
            }
        }

        let rng = options.seed.map_or_else(
            StdRng::from_entropy,
            StdRng::seed_from_u64,
        );
        let queue_count = warriors.len();
        let mut mars = Self {
            core,
            warriors,
            positions: Vec::with_capacity(queue_count),
            queues: TaskQueues::new(
                queue_count,
                usize::try_from(max_processes).unwrap_or(usize::MAX),
            ),
            cycles: options.cycles,
            minimum_separation: options.minimum_separation,
            randomize: options.randomize,
            rng,
            observer: Box::new(NullObserver),
        };
        mars.load_warriors();
        Ok(mars)
    }

    /// Copy every warrior into the core and seed its task queue
    fn load_warriors(&mut self) {
        let count = self.warriors.len();
        let span = span_size(self.core.size(), count);
        self.positions.clear();
        for index in 0..count {
            let Some(warrior) = self.warriors.get(index) else {
                continue;
            };
            let length = CoreAddr::try_from(warrior.code.len())
                .unwrap_or(CoreAddr::MAX);
            let base =
                span.wrapping_mul(CoreAddr::try_from(index).unwrap_or(0));
            let shift = if self.randomize {
                let slack = span
                    .saturating_sub(length)
                    .saturating_sub(self.minimum_separation);
                self.rng.gen_range(0..=slack)
            } else {
                0
            };
            let position = self.core.add(base, shift);
            for (offset, instruction) in warrior.code.iter().enumerate() {
                let addr = self.core.add(
                    position,
                    CoreAddr::try_from(offset).unwrap_or(0),
                );
                self.core.set(addr, *instruction);
            }
            let entry = self.core.add(position, warrior.start);
            self.queues.enqueue(index, entry);
            log::debug!(
                "loaded warrior {index} ({}) at {position}, first task {entry}",
                warrior.metadata.name.as_deref().unwrap_or("anonymous"),
            );
            self.positions.push(position);
        }
    }

    /// Run one simulation step: execute one task of every live warrior, in
    /// warrior order.  Warriors with empty queues are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`MarsError::InvalidInstruction`] when a task lands on an
    /// opcode this simulator does not implement.  The offending process has
    /// already been popped and is simply gone; the simulation can continue.
    pub fn step(&mut self) -> Result<(), MarsError> {
        for warrior in 0..self.warriors.len() {
            let Some(pc) = self.queues.pop(warrior) else {
                continue;
            };
            self.execute_task(warrior, pc)?;
            if !self.queues.is_alive(warrior) {
                log::trace!("warrior {warrior} has no processes left");
            }
        }
        Ok(())
    }

    /// Run [`Mars::step`] until the cycle budget is exhausted or at most one
    /// warrior is alive (none when a single warrior plays alone).  Returns
    /// the number of cycles executed.
    ///
    /// # Errors
    ///
    /// Propagates the first [`MarsError`] from [`Mars::step`].
    pub fn run(&mut self) -> Result<u32, MarsError> {
        let stop_threshold = usize::from(self.warriors.len() >= 2);
        let mut executed = 0;
        while executed < self.cycles
            && self.queues.alive_count() > stop_threshold
        {
            self.step()?;
            executed = executed.wrapping_add(1);
        }
        Ok(executed)
    }

    /// Clear the core and reload the warriors, as before a new round.
    /// Randomized placements are redrawn from the same generator.
    pub fn reset(&mut self) {
        self.core.clear(CompleteInstruction::default());
        self.queues.clear();
        self.load_warriors();
    }

    /// Fetch, evaluate, and execute the instruction at `pc` as a task of
    /// `warrior`
    fn execute_task(
        &mut self,
        warrior: usize,
        pc: CoreAddr,
    ) -> Result<(), MarsError> {
        // snapshot the executing instruction before operand evaluation can
        // modify the core
        let ir = self.core.get(pc);
        let regs = operands::evaluate(
            warrior,
            pc,
            &ir,
            &mut self.core,
            &mut *self.observer,
        );
        self.observer.on_event(warrior, pc, CoreEvent::Executed);

        let mut ctx = OpContext {
            warrior,
            pc,
            ir,
            regs,
            core: &mut self.core,
            queues: &mut self.queues,
            observer: &mut *self.observer,
        };
        match ir.instr.opcode {
            Opcode::Dat => dat_op(&mut ctx),
            Opcode::Mov => mov_op(&mut ctx),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod => arithmetic_op(&mut ctx),
            Opcode::Jmp => jmp_op(&mut ctx),
            Opcode::Jmz => jmz_op(&mut ctx),
            Opcode::Jmn => jmn_op(&mut ctx),
            Opcode::Djn => djn_op(&mut ctx),
            Opcode::Spl => spl_op(&mut ctx),
            Opcode::Slt => slt_op(&mut ctx),
            Opcode::Cmp | Opcode::Seq => seq_op(&mut ctx),
            Opcode::Sne => sne_op(&mut ctx),
            Opcode::Nop => nop_op(&mut ctx),
            Opcode::Ldp | Opcode::Stp => {
                return Err(MarsError::InvalidInstruction {
                    opcode: ir.instr.opcode,
                    address: pc,
                })
            }
        }
        Ok(())
    }

    /// The core memory
    #[must_use]
    pub const fn core(&self) -> &Core {
        &self.core
    }

    /// The warriors in load order, normalized to the core size
    #[must_use]
    pub fn warriors(&self) -> &[Warrior] {
        &self.warriors
    }

    /// The position each warrior was loaded at, in load order
    #[must_use]
    pub fn positions(&self) -> &[CoreAddr] {
        &self.positions
    }

    /// The queued program counters of a warrior, next task first
    #[must_use]
    pub fn task_queue(&self, warrior: usize) -> Vec<CoreAddr> {
        self.queues.tasks(warrior)
    }

    /// Whether a warrior has at least one process left
    #[must_use]
    pub fn alive(&self, warrior: usize) -> bool {
        self.queues.is_alive(warrior)
    }

    /// Number of warriors with at least one process left
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.queues.alive_count()
    }

    /// The cycle budget used by [`Mars::run`]
    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Subscribe an observer to the event stream, replacing the previous one
    pub fn set_observer(&mut self, observer: Box<dyn CoreObserver>) {
        self.observer = observer;
    }
}

/// The span of core each warrior may load into: the core divided equally
fn span_size(core_size: CoreAddr, warriors: usize) -> CoreAddr {
    CoreAddr::try_from(warriors).map_or(0, |count| {
        if count == 0 {
            core_size
        } else {
            core_size / count
        }
    })
}
