mod clock;
mod engine;
mod sequencer;

pub use clock::{ClockReading, ProgressClock};
pub use engine::{BreathingEngine, EngineOptions, TimerState};
pub use sequencer::{ActivePhase, CycleCounter, PhaseSequencer, TickOutcome, Transition};
