use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One named segment of a breathing cycle.
///
/// `Ready` is the idle state before a session starts and after it stops;
/// it never appears in a pattern's active phase list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Ready,
    Inhale,
    Hold,
    Exhale,
    HoldAfterExhale,
}

impl Phase {
    /// Fixed traversal order of a cycle. Zero-duration phases are dropped
    /// from this order per pattern.
    pub const CYCLE_ORDER: [Phase; 4] = [
        Phase::Inhale,
        Phase::Hold,
        Phase::Exhale,
        Phase::HoldAfterExhale,
    ];

    /// Prompt shown to the user while this phase is active.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Ready => "Get Ready",
            Phase::Inhale => "Breathe In",
            Phase::Hold | Phase::HoldAfterExhale => "Hold",
            Phase::Exhale => "Breathe Out",
        }
    }

    /// Wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::Inhale => "inhale",
            Phase::Hold => "hold",
            Phase::Exhale => "exhale",
            Phase::HoldAfterExhale => "holdAfterExhale",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    Builtin,
    Custom,
}

impl PatternSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternSource::Builtin => "builtin",
            PatternSource::Custom => "custom",
        }
    }
}

/// Id given to a validated custom pattern that has not been stored yet.
pub const UNSAVED_PATTERN_ID: &str = "custom";

/// A validated breathing pattern.
///
/// Only the catalog constructs these (built-ins, or a draft that passed
/// validation), so `inhale > 0 && exhale > 0` always holds. Durations are
/// whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreathingPattern {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) source: PatternSource,
    pub(crate) inhale: u32,
    pub(crate) hold: u32,
    pub(crate) exhale: u32,
    pub(crate) hold_after_exhale: u32,
    pub(crate) color: String,
    /// Default maximum cycle count for sessions run with this pattern.
    pub(crate) cycles: Option<u32>,
    /// Owning user for custom patterns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) created_at: Option<DateTime<Utc>>,
}

impl BreathingPattern {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn source(&self) -> PatternSource {
        self.source
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn cycles(&self) -> Option<u32> {
        self.cycles
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_builtin(&self) -> bool {
        self.source == PatternSource::Builtin
    }

    /// Configured duration of `phase` in seconds. `Ready` has no duration.
    pub fn duration_secs(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Ready => 0,
            Phase::Inhale => self.inhale,
            Phase::Hold => self.hold,
            Phase::Exhale => self.exhale,
            Phase::HoldAfterExhale => self.hold_after_exhale,
        }
    }

    pub fn duration(&self, phase: Phase) -> Duration {
        Duration::from_secs(u64::from(self.duration_secs(phase)))
    }

    /// Phases with a non-zero duration, in cycle order.
    pub fn active_phases(&self) -> Vec<Phase> {
        Phase::CYCLE_ORDER
            .into_iter()
            .filter(|p| self.duration_secs(*p) > 0)
            .collect()
    }

    /// Short `4-7-8-0` style summary of the durations.
    pub fn rhythm(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.inhale, self.hold, self.exhale, self.hold_after_exhale
        )
    }
}

/// Numeric form input. Accepts JSON numbers and numeric strings so that
/// non-numeric values reach validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    /// Finite numeric value, if the input is one.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            NumericInput::Number(n) => *n,
            NumericInput::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

impl From<u32> for NumericInput {
    fn from(v: u32) -> Self {
        NumericInput::Number(f64::from(v))
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Number(v)
    }
}

impl From<&str> for NumericInput {
    fn from(v: &str) -> Self {
        NumericInput::Text(v.to_string())
    }
}

/// Unvalidated candidate for a custom pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inhale: Option<NumericInput>,
    #[serde(default)]
    pub hold: Option<NumericInput>,
    #[serde(default)]
    pub exhale: Option<NumericInput>,
    #[serde(default)]
    pub hold_after_exhale: Option<NumericInput>,
    #[serde(default)]
    pub cycles: Option<NumericInput>,
    #[serde(default)]
    pub color: Option<String>,
}

impl PatternDraft {
    /// Draft with a name and all four durations set.
    pub fn new(name: &str, inhale: u32, hold: u32, exhale: u32, hold_after_exhale: u32) -> Self {
        Self {
            name: Some(name.to_string()),
            inhale: Some(inhale.into()),
            hold: Some(hold.into()),
            exhale: Some(exhale.into()),
            hold_after_exhale: Some(hold_after_exhale.into()),
            ..Self::default()
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = Some(cycles.into());
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

impl From<&BreathingPattern> for PatternDraft {
    fn from(p: &BreathingPattern) -> Self {
        Self {
            name: Some(p.name.clone()),
            description: Some(p.description.clone()),
            inhale: Some(p.inhale.into()),
            hold: Some(p.hold.into()),
            exhale: Some(p.exhale.into()),
            hold_after_exhale: Some(p.hold_after_exhale.into()),
            cycles: p.cycles.map(NumericInput::from),
            color: Some(p.color.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_camel_case() {
        let json = serde_json::to_string(&Phase::HoldAfterExhale).unwrap();
        assert_eq!(json, "\"holdAfterExhale\"");
        assert_eq!(Phase::HoldAfterExhale.as_str(), "holdAfterExhale");
    }

    #[test]
    fn numeric_input_accepts_numbers_and_numeric_strings() {
        let draft: PatternDraft =
            serde_json::from_str(r#"{"inhale": 4, "hold": "7", "exhale": "abc"}"#).unwrap();
        assert_eq!(draft.inhale.unwrap().as_f64(), Some(4.0));
        assert_eq!(draft.hold.unwrap().as_f64(), Some(7.0));
        assert_eq!(draft.exhale.unwrap().as_f64(), None);
        assert!(draft.hold_after_exhale.is_none());
    }

    #[test]
    fn labels_match_prompts() {
        assert_eq!(Phase::Ready.label(), "Get Ready");
        assert_eq!(Phase::Inhale.label(), "Breathe In");
        assert_eq!(Phase::Exhale.label(), "Breathe Out");
        assert_eq!(Phase::HoldAfterExhale.label(), "Hold");
    }
}
