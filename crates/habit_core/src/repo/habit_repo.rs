//! Habit repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and filtered listing over `habits` storage.
//! - Act as the data-layer enforcement point of the habit rule engine.
//!
//! # Invariants
//! - Write paths run `Habit::check_fields()` and `validate_habit()` before
//!   SQL mutations; a rejected write leaves storage untouched.
//! - A self-referencing habit is checked against its own `is_pleasant`.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::{
    bool_to_int, ensure_connection_ready, parse_flag, parse_uuid, RepoError, RepoResult,
};
use crate::model::habit::{Habit, HabitId, UserId};
use crate::validation::{validate_habit, RelatedHabitRef};
use chrono::{NaiveTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const HABIT_SELECT_SQL: &str = "SELECT
    uuid,
    owner_uuid,
    place,
    time,
    action,
    is_pleasant,
    related_habit_uuid,
    periodicity,
    reward,
    estimated_time,
    is_public,
    created_at,
    updated_at
FROM habits";

const TIME_DB_FORMAT: &str = "%H:%M:%S";
const MINUTE_DB_FORMAT: &str = "%H:%M";

/// Sort order for habit listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HabitOrder {
    /// Newest first.
    #[default]
    CreatedDesc,
    CreatedAsc,
    /// Earliest time of day first.
    TimeAsc,
    TimeDesc,
}

impl HabitOrder {
    /// Parses an `ordering` value such as `time` or `-created_at`.
    pub fn from_ordering_param(value: &str) -> Option<Self> {
        match value.trim() {
            "created_at" => Some(Self::CreatedAsc),
            "-created_at" => Some(Self::CreatedDesc),
            "time" => Some(Self::TimeAsc),
            "-time" => Some(Self::TimeDesc),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::CreatedDesc => " ORDER BY created_at DESC, uuid ASC",
            Self::CreatedAsc => " ORDER BY created_at ASC, uuid ASC",
            Self::TimeAsc => " ORDER BY time ASC, uuid ASC",
            Self::TimeDesc => " ORDER BY time DESC, uuid ASC",
        }
    }
}

/// Query options for listing habits.
#[derive(Debug, Clone, Default)]
pub struct HabitListQuery {
    pub owner_id: Option<UserId>,
    pub is_pleasant: Option<bool>,
    pub is_public: Option<bool>,
    /// Matches habits scheduled at this hour and minute.
    pub at_minute: Option<NaiveTime>,
    pub order: HabitOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for habit CRUD operations.
pub trait HabitRepository {
    fn create_habit(&self, habit: &Habit) -> RepoResult<HabitId>;
    fn update_habit(&self, habit: &Habit) -> RepoResult<()>;
    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>>;
    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>>;
    /// Hard delete; logs cascade and referencing habits lose their pointer.
    fn delete_habit(&self, id: HabitId) -> RepoResult<()>;
    /// Reads the one flag the rule engine needs from a referenced habit.
    fn related_habit_ref(&self, id: HabitId) -> RepoResult<Option<RelatedHabitRef>>;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHabitRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["habits"])?;
        Ok(Self { conn })
    }

    fn validate_for_write(&self, habit: &Habit) -> RepoResult<()> {
        habit.check_fields()?;
        let related = resolve_related_ref(self, habit)?;
        validate_habit(habit.candidate(related))?;
        Ok(())
    }
}

/// Resolves `habit.related_habit` to the flag the rule engine reads.
///
/// A habit pointing at itself resolves to its own candidate flag rather than
/// the stored row, so the pending write is what gets judged.
///
/// # Errors
/// - `RepoError::RelatedNotFound` when the referenced habit does not exist.
pub fn resolve_related_ref<R: HabitRepository + ?Sized>(
    repo: &R,
    habit: &Habit,
) -> RepoResult<Option<RelatedHabitRef>> {
    match habit.related_habit {
        None => Ok(None),
        Some(id) if id == habit.id => Ok(Some(RelatedHabitRef {
            is_pleasant: habit.is_pleasant,
        })),
        Some(id) => repo
            .related_habit_ref(id)?
            .map(Some)
            .ok_or(RepoError::RelatedNotFound(id)),
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn create_habit(&self, habit: &Habit) -> RepoResult<HabitId> {
        self.validate_for_write(habit)?;

        self.conn.execute(
            "INSERT INTO habits (
                uuid,
                owner_uuid,
                place,
                time,
                action,
                is_pleasant,
                related_habit_uuid,
                periodicity,
                reward,
                estimated_time,
                is_public,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                habit.id.to_string(),
                habit.owner_id.to_string(),
                habit.place.as_str(),
                habit.time.format(TIME_DB_FORMAT).to_string(),
                habit.action.as_str(),
                bool_to_int(habit.is_pleasant),
                habit.related_habit.map(|id| id.to_string()),
                habit.periodicity,
                habit.reward.as_deref(),
                habit.estimated_time,
                bool_to_int(habit.is_public),
                habit.created_at,
                habit.updated_at,
            ],
        )?;

        Ok(habit.id)
    }

    fn update_habit(&self, habit: &Habit) -> RepoResult<()> {
        self.validate_for_write(habit)?;

        let changed = self.conn.execute(
            "UPDATE habits
             SET
                place = ?1,
                time = ?2,
                action = ?3,
                is_pleasant = ?4,
                related_habit_uuid = ?5,
                periodicity = ?6,
                reward = ?7,
                estimated_time = ?8,
                is_public = ?9,
                updated_at = MAX(?10, created_at)
             WHERE uuid = ?11;",
            params![
                habit.place.as_str(),
                habit.time.format(TIME_DB_FORMAT).to_string(),
                habit.action.as_str(),
                bool_to_int(habit.is_pleasant),
                habit.related_habit.map(|id| id.to_string()),
                habit.periodicity,
                habit.reward.as_deref(),
                habit.estimated_time,
                bool_to_int(habit.is_public),
                Utc::now().timestamp_millis(),
                habit.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(habit.id));
        }

        Ok(())
    }

    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_habit_row(row)?));
        }

        Ok(None)
    }

    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>> {
        let mut sql = format!("{HABIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(owner_id) = query.owner_id {
            sql.push_str(" AND owner_uuid = ?");
            bind_values.push(Value::Text(owner_id.to_string()));
        }

        if let Some(is_pleasant) = query.is_pleasant {
            sql.push_str(" AND is_pleasant = ?");
            bind_values.push(Value::Integer(bool_to_int(is_pleasant)));
        }

        if let Some(is_public) = query.is_public {
            sql.push_str(" AND is_public = ?");
            bind_values.push(Value::Integer(bool_to_int(is_public)));
        }

        if let Some(at_minute) = query.at_minute {
            sql.push_str(" AND substr(time, 1, 5) = ?");
            bind_values.push(Value::Text(at_minute.format(MINUTE_DB_FORMAT).to_string()));
        }

        sql.push_str(query.order.sql());

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut habits = Vec::new();

        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }

        Ok(habits)
    }

    fn delete_habit(&self, id: HabitId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM habits WHERE uuid = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn related_habit_ref(&self, id: HabitId) -> RepoResult<Option<RelatedHabitRef>> {
        let mut stmt = self
            .conn
            .prepare("SELECT is_pleasant FROM habits WHERE uuid = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let is_pleasant = parse_flag(row.get(0)?, "habits.is_pleasant")?;
            return Ok(Some(RelatedHabitRef { is_pleasant }));
        }
        Ok(None)
    }
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;

    let time_text: String = row.get("time")?;
    let time = NaiveTime::parse_from_str(&time_text, TIME_DB_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid time value `{time_text}` in habits.time"))
    })?;

    let related_habit = match row.get::<_, Option<String>>("related_habit_uuid")? {
        Some(value) => Some(parse_uuid(&value, "habits.related_habit_uuid")?),
        None => None,
    };

    let habit = Habit {
        id: parse_uuid(&uuid_text, "habits.uuid")?,
        owner_id: parse_uuid(&owner_text, "habits.owner_uuid")?,
        place: row.get("place")?,
        time,
        action: row.get("action")?,
        is_pleasant: parse_flag(row.get("is_pleasant")?, "habits.is_pleasant")?,
        related_habit,
        periodicity: row.get("periodicity")?,
        reward: row.get("reward")?,
        estimated_time: row.get("estimated_time")?,
        is_public: parse_flag(row.get("is_public")?, "habits.is_public")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    habit.check_fields()?;
    Ok(habit)
}
