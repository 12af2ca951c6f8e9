//! Habit, completion log and owner records.
//!
//! # Responsibility
//! - Define the stored shape of habits, logs and users.
//! - Check per-field shape (blank text, length, positivity) that the
//!   cross-field rule engine deliberately leaves to the intake boundary.
//!
//! # Invariants
//! - `periodicity` and `estimated_time` are strictly positive.
//! - `related_habit` is a non-owning pointer; logs are owned by their habit.

use crate::validation::{HabitCandidate, RelatedHabitRef};
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type HabitId = Uuid;
pub type HabitLogId = Uuid;
pub type UserId = Uuid;

/// Maximum length for `place`, `action` and `reward`.
pub const MAX_TEXT_CHARS: usize = 200;
/// Periodicity assigned when a caller does not provide one.
pub const DEFAULT_PERIODICITY_DAYS: u32 = 1;

/// A recurring action performed at a place and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub owner_id: UserId,
    pub place: String,
    /// Time of day the habit should be performed.
    pub time: NaiveTime,
    pub action: String,
    /// Reward-type habit; may be referenced but never carries a reward itself.
    pub is_pleasant: bool,
    pub related_habit: Option<HabitId>,
    /// Interval in days.
    pub periodicity: u32,
    pub reward: Option<String>,
    /// Time budget in seconds.
    pub estimated_time: u32,
    pub is_public: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed by storage on update.
    pub updated_at: i64,
}

impl Habit {
    /// Creates a useful, private habit with a generated ID and default periodicity.
    pub fn new(
        owner_id: UserId,
        action: impl Into<String>,
        place: impl Into<String>,
        time: NaiveTime,
        estimated_time: u32,
    ) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            place: place.into(),
            time,
            action: action.into(),
            is_pleasant: false,
            related_habit: None,
            periodicity: DEFAULT_PERIODICITY_DAYS,
            reward: None,
            estimated_time,
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the rule-engine snapshot for this habit.
    ///
    /// `related` must carry the referenced habit's `is_pleasant` flag when
    /// `related_habit` is set; it is ignored otherwise.
    pub fn candidate(&self, related: Option<RelatedHabitRef>) -> HabitCandidate<'_> {
        HabitCandidate {
            is_pleasant: self.is_pleasant,
            reward: self.reward.as_deref(),
            related_habit: self.related_habit.and(related),
            periodicity: Some(self.periodicity),
            estimated_time: Some(self.estimated_time),
        }
    }

    /// Checks single-field shape constraints.
    ///
    /// # Errors
    /// - Blank `place`/`action`, text over [`MAX_TEXT_CHARS`], or a zero
    ///   `periodicity`/`estimated_time`.
    pub fn check_fields(&self) -> Result<(), HabitFieldError> {
        check_text("place", &self.place, true)?;
        check_text("action", &self.action, true)?;
        if let Some(reward) = self.reward.as_deref() {
            check_text("reward", reward, false)?;
        }
        check_positive("periodicity", self.periodicity)?;
        check_positive("estimated_time", self.estimated_time)?;
        Ok(())
    }
}

/// Single-field shape violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitFieldError {
    pub field: &'static str,
    pub message: String,
}

impl HabitFieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for HabitFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for HabitFieldError {}

fn check_text(field: &'static str, value: &str, required: bool) -> Result<(), HabitFieldError> {
    if required && value.trim().is_empty() {
        return Err(HabitFieldError::new(field, "this field may not be blank"));
    }
    if value.chars().count() > MAX_TEXT_CHARS {
        return Err(HabitFieldError::new(
            field,
            format!("ensure this field has no more than {MAX_TEXT_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_positive(field: &'static str, value: u32) -> Result<(), HabitFieldError> {
    if value == 0 {
        return Err(HabitFieldError::new(field, "must be a positive integer"));
    }
    Ok(())
}

/// Append-only completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitLog {
    pub id: HabitLogId,
    pub habit_id: HabitId,
    /// Unix epoch milliseconds.
    pub completed_at: i64,
    pub is_completed: bool,
}

impl HabitLog {
    /// Completion at the given instant.
    pub fn completed(habit_id: HabitId, completed_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            habit_id,
            completed_at,
            is_completed: true,
        }
    }

    /// Completion stamped with the current time.
    pub fn completed_now(habit_id: HabitId) -> Self {
        Self::completed(habit_id, Utc::now().timestamp_millis())
    }
}

/// Habit owner and reminder target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Messaging channel chat for reminders.
    pub chat_id: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>, chat_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            chat_id,
        }
    }
}
