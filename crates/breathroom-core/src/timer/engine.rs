//! Breathing timer engine.
//!
//! A wall-clock-based state machine with no internal thread: the caller
//! invokes `tick()` periodically and renders from `snapshot()`. Every
//! operation has an `_at` form taking an explicit monotonic instant.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   ^        |          |
//!   +--------+----------+   (stop, or cycle limit reached)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = BreathingEngine::new(EngineOptions::default());
//! engine.select(pattern);
//! engine.start()?;
//! // In a loop:
//! for event in engine.tick() { /* phase changes, cycle completions */ }
//! ```

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sequencer::PhaseSequencer;
use crate::error::UsageError;
use crate::events::{EndReason, Event, SessionSnapshot, SessionSummary};
use crate::pattern::{BreathingPattern, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Tunable engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Keep `completed_cycles` in the read model after `stop()`.
    /// `start()` always resets the count.
    pub preserve_cycles_on_stop: bool,
    /// Cycle limit used when neither the start call nor the pattern sets one.
    pub default_max_cycles: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preserve_cycles_on_stop: true,
            default_max_cycles: None,
        }
    }
}

/// Per-session bookkeeping, dropped when the session ends.
#[derive(Debug, Clone)]
struct ActiveSession {
    sequencer: PhaseSequencer,
    /// Progress as of the last tick.
    progress: f64,
    remaining: Duration,
    /// Phase time already elapsed when paused. `Some` iff paused.
    paused_elapsed: Option<Duration>,
    /// Running time banked before the current run segment.
    active_banked: Duration,
    /// Start of the current run segment; `None` while paused.
    run_anchor: Option<Instant>,
    started_at: DateTime<Utc>,
}

impl ActiveSession {
    fn active_time(&self, now: Instant) -> Duration {
        let segment = self
            .run_anchor
            .map(|a| now.saturating_duration_since(a))
            .unwrap_or_default();
        self.active_banked + segment
    }
}

/// Core breathing timer engine.
#[derive(Debug, Clone)]
pub struct BreathingEngine {
    options: EngineOptions,
    pattern: Option<BreathingPattern>,
    session: Option<ActiveSession>,
    /// Cycle count shown while idle (kept from the last session per options).
    idle_cycles: u32,
}

impl BreathingEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            pattern: None,
            session: None,
            idle_cycles: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        match &self.session {
            None => TimerState::Idle,
            Some(s) if s.paused_elapsed.is_some() => TimerState::Paused,
            Some(_) => TimerState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    pub fn pattern(&self) -> Option<&BreathingPattern> {
        self.pattern.as_ref()
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn phase(&self) -> Phase {
        self.session
            .as_ref()
            .map(|s| s.sequencer.current_phase())
            .unwrap_or(Phase::Ready)
    }

    /// 0.0 .. 1.0 progress within the current phase, as of the last tick.
    pub fn progress(&self) -> f64 {
        self.session.as_ref().map(|s| s.progress).unwrap_or(0.0)
    }

    pub fn completed_cycles(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.sequencer.completed_cycles())
            .unwrap_or(self.idle_cycles)
    }

    /// Build the read model.
    pub fn snapshot(&self) -> SessionSnapshot {
        let pattern_id = self.pattern.as_ref().map(|p| p.id().to_string());
        let Some(s) = &self.session else {
            return SessionSnapshot::idle(pattern_id, self.idle_cycles);
        };
        let phase = s.sequencer.current_phase();
        SessionSnapshot {
            phase,
            phase_label: phase.label().to_string(),
            progress: s.progress,
            completed_cycles: s.sequencer.completed_cycles(),
            running: s.paused_elapsed.is_none(),
            paused: s.paused_elapsed.is_some(),
            remaining_ms: s.remaining.as_millis() as u64,
            max_cycles: s.sequencer.cycle_limit(),
            pattern_id,
        }
    }

    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            snapshot: self.snapshot(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bind the pattern used by the next `start()`. An active session is
    /// stopped first, since a running session's pattern never changes.
    pub fn select(&mut self, pattern: BreathingPattern) -> Option<Event> {
        self.select_at(pattern, Instant::now())
    }

    pub fn select_at(&mut self, pattern: BreathingPattern, now: Instant) -> Option<Event> {
        let stopped = self.end_session(now, EndReason::Stopped);
        self.pattern = Some(pattern);
        stopped
    }

    pub fn start(&mut self, max_cycles: Option<u32>) -> Result<Vec<Event>, UsageError> {
        self.start_at(Instant::now(), max_cycles)
    }

    /// Begin a session with the selected pattern at `now`.
    ///
    /// Fails with [`UsageError::NoPatternSelected`] without touching any
    /// state. An active session is ended first and reported as stopped.
    pub fn start_at(
        &mut self,
        now: Instant,
        max_cycles: Option<u32>,
    ) -> Result<Vec<Event>, UsageError> {
        let pattern = self.pattern.clone().ok_or(UsageError::NoPatternSelected)?;
        let mut events = Vec::new();
        events.extend(self.end_session(now, EndReason::Stopped));

        let limit = max_cycles
            .or(pattern.cycles())
            .or(self.options.default_max_cycles);
        let sequencer = PhaseSequencer::new(&pattern, now, limit);
        let first = sequencer.current();
        self.idle_cycles = 0;
        self.session = Some(ActiveSession {
            sequencer,
            progress: 0.0,
            remaining: first.duration,
            paused_elapsed: None,
            active_banked: Duration::ZERO,
            run_anchor: Some(now),
            started_at: Utc::now(),
        });

        info!(
            pattern = pattern.id(),
            rhythm = %pattern.rhythm(),
            max_cycles = ?limit,
            "breathing session started"
        );
        events.push(Event::SessionStarted {
            pattern_id: pattern.id().to_string(),
            pattern_name: pattern.name().to_string(),
            phase: first.phase,
            max_cycles: limit,
            at: Utc::now(),
        });
        Ok(events)
    }

    /// Start with `pattern` in one step.
    pub fn start_with_at(
        &mut self,
        pattern: BreathingPattern,
        now: Instant,
        max_cycles: Option<u32>,
    ) -> Vec<Event> {
        self.pattern = Some(pattern);
        // A pattern is bound, so starting cannot fail.
        self.start_at(now, max_cycles).unwrap_or_default()
    }

    pub fn pause(&mut self) -> Vec<Event> {
        self.pause_at(Instant::now())
    }

    /// Freeze the current phase. Transitions due up to `now` are applied
    /// first. No-op unless running.
    pub fn pause_at(&mut self, now: Instant) -> Vec<Event> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut events = self.tick_at(now);
        // The tick may have ended the session at its cycle limit.
        let Some(s) = self.session.as_mut() else {
            return events;
        };
        let elapsed = s.sequencer.clock().elapsed(now);
        s.paused_elapsed = Some(elapsed);
        if let Some(anchor) = s.run_anchor.take() {
            s.active_banked += now.saturating_duration_since(anchor);
        }
        debug!(
            phase = %s.sequencer.current_phase(),
            elapsed_ms = elapsed.as_millis() as u64,
            "session paused"
        );
        events.push(Event::SessionPaused {
            phase: s.sequencer.current_phase(),
            progress: s.progress,
            at: Utc::now(),
        });
        events
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(Instant::now())
    }

    /// Continue from the paused position: the phase anchor is moved to
    /// `now - elapsed` so pause time is excluded. No-op unless paused.
    pub fn resume_at(&mut self, now: Instant) -> Option<Event> {
        let s = self.session.as_mut()?;
        let elapsed = s.paused_elapsed.take()?;
        s.sequencer.clock_mut().resume_at(now, elapsed);
        s.run_anchor = Some(now);
        debug!(phase = %s.sequencer.current_phase(), "session resumed");
        Some(Event::SessionResumed {
            phase: s.sequencer.current_phase(),
            progress: s.progress,
            at: Utc::now(),
        })
    }

    pub fn stop(&mut self) -> Option<Event> {
        self.stop_at(Instant::now())
    }

    /// End the session. Always leaves `{phase: ready, progress: 0,
    /// running: false}`; the cycle count follows
    /// [`EngineOptions::preserve_cycles_on_stop`].
    pub fn stop_at(&mut self, now: Instant) -> Option<Event> {
        let event = self.end_session(now, EndReason::Stopped);
        if !self.options.preserve_cycles_on_stop {
            self.idle_cycles = 0;
        }
        event
    }

    pub fn tick(&mut self) -> Vec<Event> {
        self.tick_at(Instant::now())
    }

    /// Sample progress at `now` and apply due transitions. Returns the
    /// phase changes, cycle completions and, at the cycle limit, the
    /// completion event.
    pub fn tick_at(&mut self, now: Instant) -> Vec<Event> {
        let Some(s) = self.session.as_mut() else {
            return Vec::new();
        };
        if s.paused_elapsed.is_some() {
            return Vec::new();
        }

        let outcome = s.sequencer.tick(now);
        s.progress = outcome.reading.fraction;
        s.remaining = outcome.reading.remaining;

        let mut events = Vec::with_capacity(outcome.transitions.len());
        for t in &outcome.transitions {
            debug!(from = %t.from, to = %t.to, cycles = t.completed_cycles, "phase changed");
            events.push(Event::PhaseChanged {
                from: t.from,
                to: t.to,
                completed_cycles: t.completed_cycles,
                at: Utc::now(),
            });
            if t.wrapped {
                events.push(Event::CycleCompleted {
                    completed_cycles: t.completed_cycles,
                    at: Utc::now(),
                });
            }
        }

        if outcome.finished {
            // Active time ends at the final boundary, not at the late tick.
            let end = s.sequencer.clock().phase_start();
            events.extend(self.end_session(end, EndReason::Completed));
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn end_session(&mut self, now: Instant, reason: EndReason) -> Option<Event> {
        let session = self.session.take()?;
        let pattern = self.pattern.as_ref()?;
        let completed_cycles = session.sequencer.completed_cycles();
        self.idle_cycles = completed_cycles;

        let summary = SessionSummary {
            pattern_id: pattern.id().to_string(),
            pattern_name: pattern.name().to_string(),
            completed_cycles,
            active_ms: session.active_time(now).as_millis() as u64,
            started_at: session.started_at,
            ended_at: Utc::now(),
            end_reason: reason,
        };
        info!(
            pattern = %summary.pattern_id,
            cycles = completed_cycles,
            active_ms = summary.active_ms,
            reason = reason.as_str(),
            "breathing session ended"
        );
        let at = Utc::now();
        Some(match reason {
            EndReason::Stopped => Event::SessionStopped { summary, at },
            EndReason::Completed => Event::SessionCompleted { summary, at },
        })
    }
}

impl Default for BreathingEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}
