use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pattern::Phase;

/// Read model published once per tick and after every control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub phase_label: String,
    /// Elapsed fraction of the current phase, `0.0..=1.0`.
    pub progress: f64,
    pub completed_cycles: u32,
    /// True while the sampler is active. False when idle or paused.
    pub running: bool,
    pub paused: bool,
    /// Milliseconds left in the current phase as of the last sample.
    pub remaining_ms: u64,
    pub max_cycles: Option<u32>,
    pub pattern_id: Option<String>,
}

impl SessionSnapshot {
    /// The state of a controller with no session.
    pub fn idle(pattern_id: Option<String>, completed_cycles: u32) -> Self {
        Self {
            phase: Phase::Ready,
            phase_label: Phase::Ready.label().to_string(),
            progress: 0.0,
            completed_cycles,
            running: false,
            paused: false,
            remaining_ms: 0,
            max_cycles: None,
            pattern_id,
        }
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::idle(None, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// Ended by `stop()` or by starting over.
    Stopped,
    /// Reached its configured cycle limit.
    Completed,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Stopped => "stopped",
            EndReason::Completed => "completed",
        }
    }
}

/// What a finished session amounted to. Recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub pattern_id: String,
    pub pattern_name: String,
    pub completed_cycles: u32,
    /// Time spent running, pauses excluded.
    pub active_ms: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub end_reason: EndReason,
}

/// Every state change of a session produces an Event.
/// UIs render from snapshots; history and logs subscribe to events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        pattern_id: String,
        pattern_name: String,
        phase: Phase,
        max_cycles: Option<u32>,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    CycleCompleted {
        completed_cycles: u32,
        at: DateTime<Utc>,
    },
    SessionPaused {
        phase: Phase,
        progress: f64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        phase: Phase,
        progress: f64,
        at: DateTime<Utc>,
    },
    SessionStopped {
        summary: SessionSummary,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        summary: SessionSummary,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        #[serde(flatten)]
        snapshot: SessionSnapshot,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Summary carried by the events that end a session.
    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            Event::SessionStopped { summary, .. } | Event::SessionCompleted { summary, .. } => {
                Some(summary)
            }
            _ => None,
        }
    }
}
