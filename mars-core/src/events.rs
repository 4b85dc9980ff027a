use crate::CoreAddr;

/// A fine-grained observation of something the simulator did to a core cell.
///
/// Events exist for observability only: they never affect simulation state,
/// and their ordering mirrors the two phases of instruction execution.
/// Decrements and increments fire during the operand phase, reads, writes,
/// and arithmetic stores fire during opcode execution, and
/// [`CoreEvent::Executed`] fires once per task in between.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CoreEvent {
    /// The instruction at this address was executed
    Executed,
    /// A whole instruction was written here (`MOV.I`)
    IWrite,
    /// A whole instruction was read from here
    IRead,
    /// The A-number was read
    ARead,
    /// The A-number was overwritten
    AWrite,
    /// The B-number was read
    BRead,
    /// The B-number was overwritten
    BWrite,
    /// The A-number was incremented by a postincrement mode
    AInc,
    /// The A-number was decremented by a predecrement mode or `DJN`
    ADec,
    /// The B-number was incremented by a postincrement mode
    BInc,
    /// The B-number was decremented by a predecrement mode or `DJN`
    BDec,
    /// An arithmetic result was stored in the A-number
    AArith,
    /// An arithmetic result was stored in the B-number
    BArith,
}

/// A sink for [`CoreEvent`]s, called inline while the simulator runs.
///
/// Visualizers and debuggers implement this to watch a battle; the simulator
/// itself never reads anything back from an observer.
pub trait CoreObserver {
    /// Report that `event` happened at `address` while executing a task
    /// belonging to the warrior at index `warrior`
    fn on_event(
        &mut self,
        warrior: usize,
        address: CoreAddr,
        event: CoreEvent,
    );
}

/// The default observer: discards every event
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NullObserver;

impl CoreObserver for NullObserver {
    fn on_event(
        &mut self,
        _warrior: usize,
        _address: CoreAddr,
        _event: CoreEvent,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_observer_accepts_everything() {
        let mut observer = NullObserver;
        observer.on_event(0, 0, CoreEvent::Executed);
        observer.on_event(7, 7999, CoreEvent::BDec);
    }
}
