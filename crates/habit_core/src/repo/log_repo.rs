//! Habit completion log repository.
//!
//! # Responsibility
//! - Append completion records and read them back per habit.
//! - Answer "was this habit logged in a time window" for reminder jobs.
//!
//! # Invariants
//! - Logs are append-only; there is no update or delete API.
//! - Logs are listed newest first.

use super::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
};
use crate::model::habit::{HabitId, HabitLog, HabitLogId};
use rusqlite::{params, Connection, Row};

/// Repository interface for completion logs.
pub trait HabitLogRepository {
    fn append_log(&self, log: &HabitLog) -> RepoResult<HabitLogId>;
    fn list_logs(&self, habit_id: HabitId) -> RepoResult<Vec<HabitLog>>;
    /// Whether any log exists in `[start_ms, end_ms)`.
    ///
    /// With `completed_only`, logs with `is_completed = false` are ignored.
    fn has_log_between(
        &self,
        habit_id: HabitId,
        start_ms: i64,
        end_ms: i64,
        completed_only: bool,
    ) -> RepoResult<bool>;
}

/// SQLite-backed completion log repository.
pub struct SqliteHabitLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHabitLogRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["habits", "habit_logs"])?;
        Ok(Self { conn })
    }
}

impl HabitLogRepository for SqliteHabitLogRepository<'_> {
    fn append_log(&self, log: &HabitLog) -> RepoResult<HabitLogId> {
        let habit_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM habits WHERE uuid = ?1);",
            [log.habit_id.to_string()],
            |row| row.get(0),
        )?;
        if habit_exists != 1 {
            return Err(RepoError::NotFound(log.habit_id));
        }

        self.conn.execute(
            "INSERT INTO habit_logs (uuid, habit_uuid, completed_at, is_completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                log.id.to_string(),
                log.habit_id.to_string(),
                log.completed_at,
                bool_to_int(log.is_completed),
            ],
        )?;

        Ok(log.id)
    }

    fn list_logs(&self, habit_id: HabitId) -> RepoResult<Vec<HabitLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, habit_uuid, completed_at, is_completed
             FROM habit_logs
             WHERE habit_uuid = ?1
             ORDER BY completed_at DESC, uuid ASC;",
        )?;
        let mut rows = stmt.query([habit_id.to_string()])?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_log_row(row)?);
        }
        Ok(logs)
    }

    fn has_log_between(
        &self,
        habit_id: HabitId,
        start_ms: i64,
        end_ms: i64,
        completed_only: bool,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM habit_logs
                WHERE habit_uuid = ?1
                  AND completed_at >= ?2
                  AND completed_at < ?3
                  AND (?4 = 0 OR is_completed = 1)
            );",
            params![
                habit_id.to_string(),
                start_ms,
                end_ms,
                bool_to_int(completed_only)
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_log_row(row: &Row<'_>) -> RepoResult<HabitLog> {
    let uuid_text: String = row.get("uuid")?;
    let habit_text: String = row.get("habit_uuid")?;
    Ok(HabitLog {
        id: parse_uuid(&uuid_text, "habit_logs.uuid")?,
        habit_id: parse_uuid(&habit_text, "habit_logs.habit_uuid")?,
        completed_at: row.get("completed_at")?,
        is_completed: parse_flag(row.get("is_completed")?, "habit_logs.is_completed")?,
    })
}
