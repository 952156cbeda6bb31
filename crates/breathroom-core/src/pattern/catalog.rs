//! Built-in patterns, validation of custom ones, and the handoff to storage.
//!
//! No timing logic lives here. Every custom pattern that reaches the timer
//! engine has been through [`PatternCatalog::validate`].

use tracing::{debug, info};

use super::model::{
    BreathingPattern, NumericInput, PatternDraft, PatternSource, UNSAVED_PATTERN_ID,
};
use crate::error::{CatalogError, CoreError, FieldViolation, PatternValidationError, Result};
use crate::storage::PatternStore;

/// Maximum seconds for any single phase.
pub const MAX_PHASE_SECS: u32 = 10;
/// Accepted range for a pattern's cycle count.
pub const MIN_CYCLES: u32 = 1;
pub const MAX_CYCLES: u32 = 50;
/// Maximum characters in a pattern name.
pub const MAX_NAME_CHARS: usize = 50;
/// Default number of custom patterns a single owner may keep.
pub const DEFAULT_MAX_CUSTOM_PATTERNS: usize = 10;

const CUSTOM_COLOR: &str = "#FF5722";
const CUSTOM_DESCRIPTION: &str = "Your personalized breathing pattern";

fn builtin(
    id: &str,
    name: &str,
    description: &str,
    durations: [u32; 4],
    color: &str,
) -> BreathingPattern {
    let [inhale, hold, exhale, hold_after_exhale] = durations;
    BreathingPattern {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        source: PatternSource::Builtin,
        inhale,
        hold,
        exhale,
        hold_after_exhale,
        color: color.into(),
        cycles: None,
        owner: None,
        created_at: None,
    }
}

/// Pattern catalog backed by a [`PatternStore`] for custom patterns.
pub struct PatternCatalog<S> {
    store: S,
    max_custom_patterns: usize,
}

impl<S: PatternStore> PatternCatalog<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_custom_patterns: DEFAULT_MAX_CUSTOM_PATTERNS,
        }
    }

    pub fn with_max_custom_patterns(mut self, limit: usize) -> Self {
        self.max_custom_patterns = limit;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The fixed, ordered set of built-in patterns.
    pub fn list_builtins() -> Vec<BreathingPattern> {
        list_builtins()
    }

    pub fn builtin(id: &str) -> Option<BreathingPattern> {
        builtin_by_id(id)
    }

    pub fn validate(
        draft: &PatternDraft,
    ) -> std::result::Result<BreathingPattern, PatternValidationError> {
        validate(draft)
    }

    /// Validate and persist a custom pattern for `owner`.
    ///
    /// Returns the stored pattern with its assigned id.
    pub fn save(&self, draft: &PatternDraft, owner: &str) -> Result<BreathingPattern> {
        let mut pattern = Self::validate(draft)?;
        let existing = self.store.count_patterns(owner)?;
        if existing >= self.max_custom_patterns {
            return Err(CatalogError::LimitReached {
                owner: owner.to_string(),
                limit: self.max_custom_patterns,
            }
            .into());
        }
        pattern.owner = Some(owner.to_string());
        let stored = self.store.insert_pattern(&pattern)?;
        info!(id = %stored.id, name = %stored.name, owner, "custom pattern saved");
        Ok(stored)
    }

    /// Look up a built-in or one of `owner`'s custom patterns.
    pub fn get(&self, id: &str, owner: &str) -> Result<BreathingPattern> {
        if let Some(p) = Self::builtin(id) {
            return Ok(p);
        }
        self.store
            .get_pattern(id, owner)?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()).into())
    }

    /// Built-ins first, then `owner`'s custom patterns in creation order.
    pub fn list(&self, owner: &str) -> Result<Vec<BreathingPattern>> {
        let mut all = Self::list_builtins();
        all.extend(self.store.list_patterns(owner)?);
        Ok(all)
    }

    /// Replace a custom pattern's fields. Id, owner and creation time are kept.
    pub fn update(&self, id: &str, draft: &PatternDraft, owner: &str) -> Result<BreathingPattern> {
        if Self::builtin(id).is_some() {
            return Err(CatalogError::BuiltinImmutable(id.to_string()).into());
        }
        let current = self
            .store
            .get_pattern(id, owner)?
            .ok_or_else(|| CoreError::from(CatalogError::NotFound(id.to_string())))?;

        let mut next = Self::validate(draft)?;
        next.id = current.id;
        next.owner = current.owner;
        next.created_at = current.created_at;

        if !self.store.update_pattern(&next)? {
            return Err(CatalogError::NotFound(id.to_string()).into());
        }
        info!(id, owner, "custom pattern updated");
        Ok(next)
    }

    pub fn delete(&self, id: &str, owner: &str) -> Result<()> {
        if Self::builtin(id).is_some() {
            return Err(CatalogError::BuiltinImmutable(id.to_string()).into());
        }
        if !self.store.delete_pattern(id, owner)? {
            return Err(CatalogError::NotFound(id.to_string()).into());
        }
        let mut favorites = self.store.favorites(owner)?;
        if favorites.iter().any(|f| f == id) {
            favorites.retain(|f| f != id);
            self.store.set_favorites(owner, &favorites)?;
        }
        info!(id, owner, "custom pattern deleted");
        Ok(())
    }

    /// Favorite patterns of `owner`, in the order they were marked.
    /// Ids that no longer resolve are skipped.
    pub fn favorites(&self, owner: &str) -> Result<Vec<BreathingPattern>> {
        let mut out = Vec::new();
        for id in self.store.favorites(owner)? {
            match self.get(&id, owner) {
                Ok(p) => out.push(p),
                Err(CoreError::Catalog(CatalogError::NotFound(_))) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Flip the favorite flag of `id`. Returns whether it is now a favorite.
    pub fn toggle_favorite(&self, id: &str, owner: &str) -> Result<bool> {
        self.get(id, owner)?;
        let mut favorites = self.store.favorites(owner)?;
        let now_favorite = if favorites.iter().any(|f| f == id) {
            favorites.retain(|f| f != id);
            false
        } else {
            favorites.push(id.to_string());
            true
        };
        self.store.set_favorites(owner, &favorites)?;
        Ok(now_favorite)
    }
}

/// The fixed, ordered set of built-in patterns.
pub fn list_builtins() -> Vec<BreathingPattern> {
    vec![
        builtin(
            "4-7-8",
            "4-7-8 Breathing",
            "Inhale for 4, hold for 7, exhale for 8",
            [4, 7, 8, 0],
            "#4CAF50",
        ),
        builtin(
            "box",
            "Box Breathing",
            "Equal duration for inhale, hold, exhale, and hold",
            [4, 4, 4, 4],
            "#2196F3",
        ),
        builtin(
            "relaxing",
            "Relaxing Breath",
            "Long exhale for deep relaxation",
            [4, 0, 6, 0],
            "#9C27B0",
        ),
    ]
}

pub fn builtin_by_id(id: &str) -> Option<BreathingPattern> {
    list_builtins().into_iter().find(|p| p.id == id)
}

/// Check every field of `draft` and build an unsaved custom pattern.
///
/// All violations are collected so the caller can highlight each
/// offending field at once.
pub fn validate(
    draft: &PatternDraft,
) -> std::result::Result<BreathingPattern, PatternValidationError> {
    let mut violations = Vec::new();

    let name = draft.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        violations.push(FieldViolation::new("name", "is required"));
    } else if name.chars().count() > MAX_NAME_CHARS {
        violations.push(FieldViolation::new(
            "name",
            format!("must be at most {MAX_NAME_CHARS} characters"),
        ));
    }

    let inhale = check_duration("inhale", draft.inhale.as_ref(), true, &mut violations);
    let hold = check_duration("hold", draft.hold.as_ref(), false, &mut violations);
    let exhale = check_duration("exhale", draft.exhale.as_ref(), true, &mut violations);
    let hold_after_exhale = check_duration(
        "holdAfterExhale",
        draft.hold_after_exhale.as_ref(),
        false,
        &mut violations,
    );

    let cycles = match &draft.cycles {
        None => None,
        Some(input) => match whole_number(input) {
            Some(n) if (f64::from(MIN_CYCLES)..=f64::from(MAX_CYCLES)).contains(&n) => {
                Some(n as u32)
            }
            Some(_) => {
                violations.push(FieldViolation::new(
                    "cycles",
                    format!("must be between {MIN_CYCLES} and {MAX_CYCLES}"),
                ));
                None
            }
            None => {
                violations.push(FieldViolation::new("cycles", "must be a whole number"));
                None
            }
        },
    };

    let color = match draft.color.as_deref().map(str::trim) {
        None | Some("") => CUSTOM_COLOR.to_string(),
        Some(c) if is_hex_color(c) => c.to_string(),
        Some(_) => {
            violations.push(FieldViolation::new("color", "must be a #RRGGBB hex color"));
            String::new()
        }
    };

    if !violations.is_empty() {
        debug!(count = violations.len(), "pattern draft rejected");
        return Err(PatternValidationError { violations });
    }

    let description = draft
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(CUSTOM_DESCRIPTION);

    Ok(BreathingPattern {
        id: UNSAVED_PATTERN_ID.into(),
        name: name.to_string(),
        description: description.to_string(),
        source: PatternSource::Custom,
        inhale: inhale.unwrap_or_default(),
        hold: hold.unwrap_or_default(),
        exhale: exhale.unwrap_or_default(),
        hold_after_exhale: hold_after_exhale.unwrap_or_default(),
        color,
        cycles,
        owner: None,
        created_at: None,
    })
}

fn whole_number(input: &NumericInput) -> Option<f64> {
    input.as_f64().filter(|v| v.fract() == 0.0)
}

fn check_duration(
    field: &str,
    input: Option<&NumericInput>,
    positive: bool,
    violations: &mut Vec<FieldViolation>,
) -> Option<u32> {
    let Some(input) = input else {
        violations.push(FieldViolation::new(field, "is required"));
        return None;
    };
    let Some(value) = input.as_f64() else {
        violations.push(FieldViolation::new(field, "must be numeric"));
        return None;
    };

    let before = violations.len();
    if positive && value <= 0.0 {
        violations.push(FieldViolation::new(field, "must be > 0"));
    } else if !positive && value < 0.0 {
        violations.push(FieldViolation::new(field, "must be >= 0"));
    }
    if value > f64::from(MAX_PHASE_SECS) {
        violations.push(FieldViolation::new(field, format!("must be <= {MAX_PHASE_SECS}")));
    }
    if value.fract() != 0.0 {
        violations.push(FieldViolation::new(field, "must be a whole number of seconds"));
    }
    (violations.len() == before).then_some(value as u32)
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}
