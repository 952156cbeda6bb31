//! SQLite-based storage.
//!
//! Provides persistent storage for:
//! - Custom breathing patterns (per owner)
//! - Session history and statistics
//! - Key-value store for favorites and other UI state

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::data_dir;
use super::migrations;
use super::store::PatternStore;
use crate::error::{CoreError, DatabaseError, Result};
use crate::events::SessionSummary;
use crate::pattern::{validate, BreathingPattern, PatternDraft};

const FAVORITES_KEY: &str = "favorite_patterns";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub pattern_id: String,
    pub pattern_name: String,
    pub completed_cycles: u32,
    pub active_ms: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub end_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HistoryStats {
    pub total_sessions: u64,
    pub total_cycles: u64,
    pub total_active_ms: u64,
    pub today_sessions: u64,
    pub today_cycles: u64,
}

/// SQLite database for patterns, history and kv state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/breathroom/breathroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join("breathroom.db"))
    }

    /// Open (or create) the database file at `path`.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and embedders without a disk).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        migrations::migrate(&self.conn)
    }

    // ── History ──────────────────────────────────────────────────────

    /// Record a finished session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, summary: &SessionSummary) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions
                (pattern_id, pattern_name, completed_cycles, active_ms, started_at, ended_at, end_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.pattern_id,
                summary.pattern_name,
                summary.completed_cycles,
                summary.active_ms as i64,
                summary.started_at.to_rfc3339(),
                summary.ended_at.to_rfc3339(),
                summary.end_reason.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn history(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pattern_id, pattern_name, completed_cycles, active_ms,
                    started_at, ended_at, end_reason
             FROM sessions
             ORDER BY ended_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (
                id,
                pattern_id,
                pattern_name,
                completed_cycles,
                active_ms,
                started,
                ended,
                reason,
            ) = row?;
            out.push(SessionRecord {
                id,
                pattern_id,
                pattern_name,
                completed_cycles,
                active_ms: active_ms.max(0) as u64,
                started_at: parse_ts("sessions", &started)?,
                ended_at: parse_ts("sessions", &ended)?,
                end_reason: reason,
            });
        }
        Ok(out)
    }

    pub fn stats_all(&self) -> Result<HistoryStats, rusqlite::Error> {
        self.stats_at(Utc::now())
    }

    /// Totals, with "today" meaning the UTC day containing `now`.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<HistoryStats, rusqlite::Error> {
        let today = now.format("%Y-%m-%d").to_string();
        let (total_sessions, total_cycles, total_active_ms) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(completed_cycles), 0), COALESCE(SUM(active_ms), 0)
             FROM sessions",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?, row.get::<_, u64>(2)?)),
        )?;
        let (today_sessions, today_cycles) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(completed_cycles), 0)
             FROM sessions
             WHERE ended_at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(HistoryStats {
            total_sessions,
            total_cycles,
            total_active_ms,
            today_sessions,
            today_cycles,
        })
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

const PATTERN_COLUMNS: &str =
    "id, owner, name, description, inhale, hold, exhale, hold_after_exhale, color, cycles, created_at";

/// Decode a `patterns` row. Rows are re-validated so a hand-edited
/// database can never feed an invalid pattern to the timer.
fn pattern_from_row(row: &Row<'_>) -> Result<BreathingPattern> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let created_at: String = row.get(10)?;
    let cycles: Option<u32> = row.get(9)?;

    let mut draft = PatternDraft::new(
        &row.get::<_, String>(2)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    )
    .with_description(&row.get::<_, String>(3)?)
    .with_color(&row.get::<_, String>(8)?);
    if let Some(c) = cycles {
        draft = draft.with_cycles(c);
    }

    let mut pattern = validate(&draft).map_err(|e| DatabaseError::CorruptRow {
        table: "patterns".into(),
        message: format!("{id}: {e}"),
    })?;
    pattern.id = id;
    pattern.owner = Some(owner);
    pattern.created_at = Some(parse_ts("patterns", &created_at)?);
    Ok(pattern)
}

fn parse_ts(table: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            DatabaseError::CorruptRow {
                table: table.into(),
                message: format!("bad timestamp '{raw}': {e}"),
            }
            .into()
        })
}

fn owner_of(pattern: &BreathingPattern) -> &str {
    pattern.owner().unwrap_or_default()
}

impl PatternStore for Database {
    fn insert_pattern(&self, pattern: &BreathingPattern) -> Result<BreathingPattern> {
        let mut stored = pattern.clone();
        stored.id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        stored.created_at = Some(created_at);

        self.conn.execute(
            "INSERT INTO patterns
                (id, owner, name, description, inhale, hold, exhale, hold_after_exhale, color, cycles, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                stored.id,
                owner_of(&stored),
                stored.name,
                stored.description,
                stored.inhale,
                stored.hold,
                stored.exhale,
                stored.hold_after_exhale,
                stored.color,
                stored.cycles,
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(stored)
    }

    fn list_patterns(&self, owner: &str) -> Result<Vec<BreathingPattern>> {
        let sql = format!(
            "SELECT {PATTERN_COLUMNS} FROM patterns WHERE owner = ?1 ORDER BY created_at, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![owner])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            match pattern_from_row(row) {
                Ok(p) => out.push(p),
                Err(e) => warn!(error = %e, "skipping unreadable pattern row"),
            }
        }
        Ok(out)
    }

    fn get_pattern(&self, id: &str, owner: &str) -> Result<Option<BreathingPattern>> {
        let sql = format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1 AND owner = ?2");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id, owner])?;
        match rows.next()? {
            Some(row) => pattern_from_row(row).map(Some),
            None => Ok(None),
        }
    }

    fn update_pattern(&self, pattern: &BreathingPattern) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE patterns
             SET name = ?3, description = ?4, inhale = ?5, hold = ?6, exhale = ?7,
                 hold_after_exhale = ?8, color = ?9, cycles = ?10
             WHERE id = ?1 AND owner = ?2",
            params![
                pattern.id,
                owner_of(pattern),
                pattern.name,
                pattern.description,
                pattern.inhale,
                pattern.hold,
                pattern.exhale,
                pattern.hold_after_exhale,
                pattern.color,
                pattern.cycles,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_pattern(&self, id: &str, owner: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM patterns WHERE id = ?1 AND owner = ?2",
            params![id, owner],
        )?;
        Ok(changed > 0)
    }

    fn count_patterns(&self, owner: &str) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patterns WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    fn favorites(&self, owner: &str) -> Result<Vec<String>> {
        match self.kv_get(&format!("{FAVORITES_KEY}:{owner}"))? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn set_favorites(&self, owner: &str, ids: &[String]) -> Result<()> {
        let json = serde_json::to_string(ids).map_err(CoreError::from)?;
        self.kv_set(&format!("{FAVORITES_KEY}:{owner}"), &json)?;
        Ok(())
    }
}
