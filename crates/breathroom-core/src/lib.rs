//! # Breathroom Core Library
//!
//! This library provides the core logic for the Breathroom breathing-pattern
//! timer. Every operation is available through the standalone CLI binary;
//! other front ends are thin layers over the same core library.
//!
//! ## Architecture
//!
//! - **Pattern Catalog**: built-in patterns plus validated, per-user custom
//!   patterns handed to a [`PatternStore`]
//! - **Timer Engine**: a wall-clock-based state machine over a pattern's
//!   active phases; the caller invokes `tick()` for progress updates
//! - **Session Controller**: an async task that owns one engine and samples
//!   it on a fixed interval, publishing a read model every tick
//! - **Storage**: SQLite-based patterns, history and favorites, and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`PatternCatalog`]: built-ins, validation and custom pattern CRUD
//! - [`BreathingEngine`]: core timer state machine
//! - [`SessionController`]: periodic sampler and control entry points
//! - [`Database`]: pattern, history and favorites persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod pattern;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{
    CatalogError, ConfigError, CoreError, DatabaseError, FieldViolation, PatternValidationError,
    UsageError,
};
pub use events::{EndReason, Event, SessionSnapshot, SessionSummary};
pub use pattern::{BreathingPattern, PatternCatalog, PatternDraft, PatternSource, Phase};
pub use session::{SessionController, SessionOptions};
pub use storage::{Config, Database, PatternStore};
pub use timer::{BreathingEngine, EngineOptions, PhaseSequencer, ProgressClock, TimerState};
