mod catalog;
mod model;

pub use catalog::{
    builtin_by_id, list_builtins, validate, PatternCatalog, DEFAULT_MAX_CUSTOM_PATTERNS,
    MAX_CYCLES, MAX_NAME_CHARS, MAX_PHASE_SECS, MIN_CYCLES,
};
pub use model::{
    BreathingPattern, NumericInput, PatternDraft, PatternSource, Phase, UNSAVED_PATTERN_ID,
};
