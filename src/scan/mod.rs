mod item;
pub mod quantity;
mod sequencer;
mod step;

pub use item::{PickLine, WorkItem};
pub use quantity::{Bound, Tally};
pub use sequencer::{
    Confirmation, ContainerMode, QuantityGate, ScanOutcome, ScanRules, ScanSequencer,
    SequencerState, Signal,
};
pub use step::{ApplicableSteps, Step, StepKind, StepOrder};
