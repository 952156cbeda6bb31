//! The breathing phase state machine.
//!
//! Active phases (duration > 0) are laid out once per pattern in cycle order
//! and the current position is tracked by index. Zero-duration phases never
//! enter the list, so they can never be visited.

use std::time::{Duration, Instant};

use super::clock::{ClockReading, ProgressClock};
use crate::pattern::{BreathingPattern, Phase};

/// Counts full traversals of the active phase list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounter {
    completed: u32,
    limit: Option<u32>,
}

impl CycleCounter {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            completed: 0,
            limit: limit.filter(|l| *l > 0),
        }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Record one wraparound. Returns the new count.
    pub fn increment(&mut self) -> u32 {
        self.completed = self.completed.saturating_add(1);
        self.completed
    }

    pub fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|l| self.completed >= l)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePhase {
    pub phase: Phase,
    pub duration: Duration,
}

/// One phase change applied during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    /// True when the change wrapped from the last active phase to the first.
    pub wrapped: bool,
    /// Cycle count after this transition.
    pub completed_cycles: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub reading: ClockReading,
    pub transitions: Vec<Transition>,
    /// The configured cycle limit was reached during this tick.
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct PhaseSequencer {
    phases: Vec<ActivePhase>,
    index: usize,
    clock: ProgressClock,
    cycles: CycleCounter,
}

impl PhaseSequencer {
    /// Enter the first active phase at `now`.
    pub fn new(pattern: &BreathingPattern, now: Instant, max_cycles: Option<u32>) -> Self {
        let mut phases: Vec<ActivePhase> = pattern
            .active_phases()
            .into_iter()
            .map(|phase| ActivePhase {
                phase,
                duration: pattern.duration(phase),
            })
            .collect();
        if phases.is_empty() {
            // Unreachable for validated patterns (inhale > 0); keep the
            // machine well-formed anyway.
            phases.push(ActivePhase {
                phase: Phase::Inhale,
                duration: Duration::from_secs(1),
            });
        }
        let clock = ProgressClock::new(now, phases[0].duration);
        Self {
            phases,
            index: 0,
            clock,
            cycles: CycleCounter::new(max_cycles),
        }
    }

    pub fn phases(&self) -> &[ActivePhase] {
        &self.phases
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> ActivePhase {
        self.phases[self.index]
    }

    pub fn current_phase(&self) -> Phase {
        self.current().phase
    }

    pub fn clock(&self) -> &ProgressClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ProgressClock {
        &mut self.clock
    }

    pub fn completed_cycles(&self) -> u32 {
        self.cycles.completed()
    }

    pub fn cycle_limit(&self) -> Option<u32> {
        self.cycles.limit()
    }

    /// Apply the transition rule at `now`.
    ///
    /// Each elapsed boundary is processed in order and the next phase is
    /// anchored at the exact boundary instant, so a late tick catches up
    /// every phase and every wraparound it missed.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut transitions = Vec::new();
        let mut reading = self.clock.sample(now);
        let mut finished = false;

        while reading.complete {
            let boundary = self.clock.phase_end();
            let transition = self.advance();
            let next = self.current();
            self.clock.reanchor(boundary, next.duration);
            transitions.push(transition);

            if transition.wrapped && self.cycles.limit_reached() {
                finished = true;
                break;
            }
            reading = self.clock.sample(now);
        }

        if finished {
            reading = self.clock.sample(self.clock.phase_start());
        }

        TickOutcome {
            reading,
            transitions,
            finished,
        }
    }

    /// Step to the next active phase in cyclic order.
    fn advance(&mut self) -> Transition {
        let from = self.current_phase();
        let next = (self.index + 1) % self.phases.len();
        let wrapped = next == 0;
        self.index = next;
        if wrapped {
            self.cycles.increment();
        }
        Transition {
            from,
            to: self.current_phase(),
            wrapped,
            completed_cycles: self.cycles.completed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{validate, PatternDraft};

    fn pattern(inhale: u32, hold: u32, exhale: u32, hold_after: u32) -> BreathingPattern {
        validate(&PatternDraft::new("t", inhale, hold, exhale, hold_after)).unwrap()
    }

    fn at(t0: Instant, secs: f64) -> Instant {
        t0 + Duration::from_secs_f64(secs)
    }

    #[test]
    fn active_list_skips_zero_phases() {
        let t0 = Instant::now();
        let seq = PhaseSequencer::new(&pattern(4, 0, 6, 0), t0, None);
        let phases: Vec<Phase> = seq.phases().iter().map(|p| p.phase).collect();
        assert_eq!(phases, vec![Phase::Inhale, Phase::Exhale]);
    }

    #[test]
    fn box_pattern_wraps_after_sixteen_seconds() {
        let t0 = Instant::now();
        let mut seq = PhaseSequencer::new(&pattern(4, 4, 4, 4), t0, None);
        let outcome = seq.tick(at(t0, 16.0));
        assert_eq!(outcome.transitions.len(), 4);
        assert!(outcome.transitions[3].wrapped);
        assert_eq!(seq.completed_cycles(), 1);
        assert_eq!(seq.current_phase(), Phase::Inhale);
        assert_eq!(outcome.reading.fraction, 0.0);
    }

    #[test]
    fn late_tick_counts_every_wrap() {
        let t0 = Instant::now();
        let mut seq = PhaseSequencer::new(&pattern(4, 0, 6, 0), t0, None);
        // 35s = three full 10s cycles plus 5s (1s into exhale).
        let outcome = seq.tick(at(t0, 35.0));
        assert_eq!(seq.completed_cycles(), 3);
        assert_eq!(outcome.transitions.iter().filter(|t| t.wrapped).count(), 3);
        assert_eq!(seq.current_phase(), Phase::Exhale);
        assert!((outcome.reading.fraction - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn cycle_limit_stops_at_boundary() {
        let t0 = Instant::now();
        let mut seq = PhaseSequencer::new(&pattern(4, 0, 6, 0), t0, Some(2));
        let outcome = seq.tick(at(t0, 45.0));
        assert!(outcome.finished);
        assert_eq!(seq.completed_cycles(), 2);
        assert_eq!(seq.clock().phase_start(), at(t0, 20.0));
    }

    #[test]
    fn counter_ignores_zero_limit() {
        let mut c = CycleCounter::new(Some(0));
        assert_eq!(c.limit(), None);
        c.increment();
        assert!(!c.limit_reached());
        assert_eq!(c.completed(), 1);
    }
}
