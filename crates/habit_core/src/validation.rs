//! Habit cross-field rule engine.
//!
//! # Responsibility
//! - Evaluate the five habit invariants against one candidate snapshot.
//! - Report every violated field in a single, deterministic error map.
//!
//! # Invariants
//! - Pure: no I/O, no logging, no shared state.
//! - Never short-circuits; all rules run before failure is reported.
//! - Absent `periodicity`/`estimated_time` never trigger the ceiling rules.
//!
//! Both the repository write path and the service intake path call
//! [`validate_habit`], so the rule text exists exactly once.

use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for `estimated_time`, in seconds.
pub const MAX_ESTIMATED_TIME_SECS: u32 = 120;
/// Upper bound for `periodicity`, in days.
pub const MAX_PERIODICITY_DAYS: u32 = 7;

pub const MSG_REWARD_AND_RELATED: &str = "a related habit and a reward cannot be set together";
pub const MSG_ESTIMATED_TIME_CEILING: &str = "estimated time must be at most 120 seconds";
pub const MSG_RELATED_NOT_PLEASANT: &str = "only pleasant habits can be used as a related habit";
pub const MSG_PLEASANT_WITH_REWARD: &str = "a pleasant habit cannot have a reward";
pub const MSG_PLEASANT_WITH_RELATED: &str = "a pleasant habit cannot have a related habit";
pub const MSG_PERIODICITY_CEILING: &str = "a habit must be performed at least once every 7 days";

/// Habit fields the rule engine can flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitField {
    Reward,
    RelatedHabit,
    EstimatedTime,
    Periodicity,
}

impl HabitField {
    /// Stable external field name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reward => "reward",
            Self::RelatedHabit => "related_habit",
            Self::EstimatedTime => "estimated_time",
            Self::Periodicity => "periodicity",
        }
    }
}

impl Display for HabitField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one flag the rule engine needs from a referenced habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedHabitRef {
    pub is_pleasant: bool,
}

/// Field snapshot evaluated by [`validate_habit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HabitCandidate<'a> {
    pub is_pleasant: bool,
    pub reward: Option<&'a str>,
    pub related_habit: Option<RelatedHabitRef>,
    pub periodicity: Option<u32>,
    pub estimated_time: Option<u32>,
}

/// Rejection carrying one message per flagged field.
///
/// The map is never empty and iterates in `HabitField` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HabitValidationError {
    errors: BTreeMap<HabitField, &'static str>,
}

impl HabitValidationError {
    /// Field-to-message mapping.
    pub fn errors(&self) -> &BTreeMap<HabitField, &'static str> {
        &self.errors
    }

    /// Message attached to `field`, if it was flagged.
    pub fn message(&self, field: HabitField) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    /// Whether `field` was flagged.
    pub fn has(&self, field: HabitField) -> bool {
        self.errors.contains_key(&field)
    }

    /// Flagged fields in deterministic order.
    pub fn fields(&self) -> Vec<HabitField> {
        self.errors.keys().copied().collect()
    }
}

impl Display for HabitValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "habit validation failed:")?;
        for (index, (field, message)) in self.errors.iter().enumerate() {
            let sep = if index == 0 { " " } else { "; " };
            write!(f, "{sep}{field}: {message}")?;
        }
        Ok(())
    }
}

impl Error for HabitValidationError {}

/// Evaluates all habit rules and returns the candidate unchanged when valid.
///
/// When a field is flagged by more than one rule, the message of the later
/// rule wins (pleasant purity over eligibility over mutual exclusivity).
///
/// # Errors
/// - Returns [`HabitValidationError`] listing every violated field.
pub fn validate_habit(
    candidate: HabitCandidate<'_>,
) -> Result<HabitCandidate<'_>, HabitValidationError> {
    let mut errors = BTreeMap::new();
    let has_reward = candidate.reward.is_some_and(|value| !value.is_empty());
    let related = candidate.related_habit;

    if has_reward && related.is_some() {
        errors.insert(HabitField::RelatedHabit, MSG_REWARD_AND_RELATED);
        errors.insert(HabitField::Reward, MSG_REWARD_AND_RELATED);
    }

    if candidate
        .estimated_time
        .is_some_and(|secs| secs > MAX_ESTIMATED_TIME_SECS)
    {
        errors.insert(HabitField::EstimatedTime, MSG_ESTIMATED_TIME_CEILING);
    }

    if related.is_some_and(|habit| !habit.is_pleasant) {
        errors.insert(HabitField::RelatedHabit, MSG_RELATED_NOT_PLEASANT);
    }

    if candidate.is_pleasant {
        if has_reward {
            errors.insert(HabitField::Reward, MSG_PLEASANT_WITH_REWARD);
        }
        if related.is_some() {
            errors.insert(HabitField::RelatedHabit, MSG_PLEASANT_WITH_RELATED);
        }
    }

    if candidate
        .periodicity
        .is_some_and(|days| days > MAX_PERIODICITY_DAYS)
    {
        errors.insert(HabitField::Periodicity, MSG_PERIODICITY_CEILING);
    }

    if errors.is_empty() {
        Ok(candidate)
    } else {
        Err(HabitValidationError { errors })
    }
}
