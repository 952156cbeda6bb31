//! Integration tests for breathing sessions.
//!
//! Drives the engine through the public API with synthetic instants, from
//! pattern selection through completion and history recording.

use std::time::{Duration, Instant};

use breathroom_core::pattern::{builtin_by_id, validate};
use breathroom_core::{
    BreathingEngine, Database, EndReason, EngineOptions, Event, PatternCatalog, PatternDraft,
    Phase, UsageError,
};
use proptest::prelude::*;

fn at(t0: Instant, secs: f64) -> Instant {
    t0 + Duration::from_secs_f64(secs)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

fn started(id: &str, t0: Instant, max_cycles: Option<u32>) -> BreathingEngine {
    let mut engine = BreathingEngine::default();
    let pattern = builtin_by_id(id).unwrap();
    engine.start_with_at(pattern, t0, max_cycles);
    engine
}

#[test]
fn test_start_without_pattern_is_usage_error() {
    let mut engine = BreathingEngine::default();
    assert_eq!(engine.start(None), Err(UsageError::NoPatternSelected));
    assert!(!engine.is_running());
    assert_eq!(engine.phase(), Phase::Ready);
}

#[test]
fn test_four_seven_eight_walks_every_phase() {
    let t0 = Instant::now();
    let mut engine = started("4-7-8", t0, None);
    assert_eq!(engine.phase(), Phase::Inhale);

    engine.tick_at(at(t0, 2.0));
    assert_close(engine.progress(), 0.5);

    engine.tick_at(at(t0, 4.0));
    assert_eq!(engine.phase(), Phase::Hold);

    engine.tick_at(at(t0, 11.0));
    assert_eq!(engine.phase(), Phase::Exhale);

    // No hold after exhale: the cycle wraps straight back to inhale.
    let events = engine.tick_at(at(t0, 19.0));
    assert_eq!(engine.phase(), Phase::Inhale);
    assert_eq!(engine.completed_cycles(), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CycleCompleted { completed_cycles: 1, .. })));
}

#[test]
fn test_relaxing_never_visits_hold() {
    let t0 = Instant::now();
    let mut engine = started("relaxing", t0, None);
    let mut seen = Vec::new();
    for step in 1..=205 {
        engine.tick_at(at(t0, step as f64 * 0.1));
        seen.push(engine.phase());
    }
    assert!(seen.contains(&Phase::Exhale));
    assert!(!seen.contains(&Phase::Hold));
    assert!(!seen.contains(&Phase::HoldAfterExhale));
    assert_eq!(engine.completed_cycles(), 2);
}

#[test]
fn test_pause_excludes_paused_time() {
    let t0 = Instant::now();
    let mut engine = started("box", t0, None);

    engine.pause_at(at(t0, 2.0));
    let snap = engine.snapshot();
    assert!(snap.paused);
    assert!(!snap.running);
    assert_close(snap.progress, 0.5);

    // Ticks while paused change nothing.
    engine.tick_at(at(t0, 60.0));
    assert_eq!(engine.phase(), Phase::Inhale);

    engine.resume_at(at(t0, 100.0));
    engine.tick_at(at(t0, 101.0));
    assert_eq!(engine.phase(), Phase::Inhale);
    assert_close(engine.progress(), 0.75);
}

#[test]
fn test_stop_resets_phase_and_keeps_cycles() {
    let t0 = Instant::now();
    let mut engine = started("box", t0, None);
    engine.tick_at(at(t0, 17.0));
    assert_eq!(engine.completed_cycles(), 1);

    let event = engine.stop_at(at(t0, 18.0)).unwrap();
    let summary = event.summary().unwrap();
    assert_eq!(summary.end_reason, EndReason::Stopped);
    assert_eq!(summary.completed_cycles, 1);

    let snap = engine.snapshot();
    assert_eq!(snap.phase, Phase::Ready);
    assert_eq!(snap.progress, 0.0);
    assert!(!snap.running);
    assert_eq!(snap.completed_cycles, 1);
    assert!(engine.stop_at(at(t0, 19.0)).is_none());
}

#[test]
fn test_stop_can_reset_cycles() {
    let t0 = Instant::now();
    let mut engine = BreathingEngine::new(EngineOptions {
        preserve_cycles_on_stop: false,
        ..EngineOptions::default()
    });
    engine.start_with_at(builtin_by_id("box").unwrap(), t0, None);
    engine.tick_at(at(t0, 33.0));
    assert_eq!(engine.completed_cycles(), 2);

    engine.stop_at(at(t0, 34.0));
    assert_eq!(engine.completed_cycles(), 0);
}

#[test]
fn test_cycle_limit_completes_session_at_boundary() {
    let t0 = Instant::now();
    let mut engine = started("box", t0, Some(2));

    // A late tick still ends exactly at the second boundary.
    let events = engine.tick_at(at(t0, 40.0));
    let summary = events
        .iter()
        .find_map(|e| match e {
            Event::SessionCompleted { summary, .. } => Some(summary.clone()),
            _ => None,
        })
        .expect("session should complete");
    assert_eq!(summary.completed_cycles, 2);
    assert_eq!(summary.active_ms, 32_000);
    assert_eq!(summary.end_reason, EndReason::Completed);

    assert!(!engine.is_running());
    assert_eq!(engine.phase(), Phase::Ready);
    assert_eq!(engine.completed_cycles(), 2);
}

#[test]
fn test_custom_pattern_session_is_recorded() {
    let db = Database::open_memory().unwrap();
    let catalog = PatternCatalog::new(db);
    let draft = PatternDraft::new("Quick", 2, 1, 2, 0).with_cycles(3);
    let pattern = catalog.save(&draft, "alice").unwrap();

    let t0 = Instant::now();
    let mut engine = BreathingEngine::default();
    engine.select_at(catalog.get(pattern.id(), "alice").unwrap(), t0);
    engine.start_at(t0, None).unwrap();

    let mut summary = None;
    for step in 1..=400 {
        for event in engine.tick_at(at(t0, step as f64 * 0.05)) {
            if let Some(s) = event.summary() {
                summary = Some(s.clone());
            }
        }
    }
    let summary = summary.expect("limit of 3 cycles should end the session");
    assert_eq!(summary.completed_cycles, 3);
    assert_eq!(summary.active_ms, 15_000);

    catalog.store().record_session(&summary).unwrap();
    let history = catalog.store().history(10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].pattern_id, pattern.id());
    assert_eq!(history[0].completed_cycles, 3);
}

proptest! {
    #[test]
    fn prop_ticks_stay_within_invariants(
        inhale in 1u32..=10,
        hold in 0u32..=10,
        exhale in 1u32..=10,
        hold_after in 0u32..=10,
        steps in prop::collection::vec(0u64..3_000, 1..60),
    ) {
        let draft = PatternDraft::new("Prop", inhale, hold, exhale, hold_after);
        let pattern = validate(&draft).unwrap();
        let active = pattern.active_phases();
        let t0 = Instant::now();
        let mut engine = BreathingEngine::default();
        engine.start_with_at(pattern, t0, None);

        let mut now = t0;
        let mut last_cycles = 0;
        for ms in steps {
            now += Duration::from_millis(ms);
            engine.tick_at(now);
            let progress = engine.progress();
            prop_assert!((0.0..=1.0).contains(&progress));
            prop_assert!(engine.completed_cycles() >= last_cycles);
            prop_assert!(active.contains(&engine.phase()));
            last_cycles = engine.completed_cycles();
        }
    }
}
