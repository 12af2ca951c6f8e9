//! Habit use-case service.
//!
//! # Responsibility
//! - Accept untrusted create/update/patch payloads and turn them into habits.
//! - Enforce ownership: anyone may read public habits, only owners write.
//! - Record completions and expose completion history.
//!
//! # Invariants
//! - Intake runs the same `validate_habit()` the repository runs on write,
//!   after resolving `related_habit` to its `is_pleasant` flag.
//! - Patches are merged onto the stored record and the merged record is
//!   validated as a whole.
//! - Service APIs never bypass repository validation/persistence contracts.

use crate::model::habit::{
    Habit, HabitFieldError, HabitId, HabitLog, UserId, DEFAULT_PERIODICITY_DAYS,
};
use crate::repo::habit_repo::{resolve_related_ref, HabitListQuery, HabitOrder, HabitRepository};
use crate::repo::log_repo::HabitLogRepository;
use crate::repo::RepoError;
use crate::validation::{validate_habit, HabitValidationError};
use chrono::NaiveTime;
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const HABITS_DEFAULT_LIMIT: u32 = 20;
const HABITS_LIMIT_MAX: u32 = 100;

const MSG_REQUIRED: &str = "this field is required";
const MSG_RELATED_MISSING: &str = "related habit does not exist";

/// Service error for habit use-cases.
#[derive(Debug)]
pub enum HabitServiceError {
    /// Payload is missing fields or carries malformed values.
    InvalidInput(Vec<HabitFieldError>),
    /// Cross-field habit rules rejected the payload.
    Validation(HabitValidationError),
    NotFound(HabitId),
    /// Requester does not own the habit.
    Forbidden(HabitId),
    Repo(RepoError),
}

impl HabitServiceError {
    /// HTTP-style status an adapter should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Repo(_) => 500,
        }
    }

    /// Client-facing response body.
    ///
    /// Validation failures render the field-error mapping verbatim.
    pub fn to_json_body(&self) -> Value {
        match self {
            Self::Validation(err) => {
                let body: Map<String, Value> = err
                    .errors()
                    .iter()
                    .map(|(field, message)| (field.as_str().to_string(), json!(message)))
                    .collect();
                Value::Object(body)
            }
            Self::InvalidInput(errors) => {
                let body: Map<String, Value> = errors
                    .iter()
                    .map(|err| (err.field.to_string(), json!(err.message)))
                    .collect();
                Value::Object(body)
            }
            Self::NotFound(_) => json!({ "detail": "not found" }),
            Self::Forbidden(_) => {
                json!({ "detail": "you do not have permission to perform this action" })
            }
            Self::Repo(_) => json!({ "detail": "internal error" }),
        }
    }
}

impl Display for HabitServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(errors) => {
                write!(f, "invalid input: ")?;
                for (index, err) in errors.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::Forbidden(id) => write!(f, "habit {id} is owned by another user"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HabitServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(errors) => errors.first().map(|err| err as &(dyn Error + 'static)),
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HabitServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::InvalidField(err) => Self::InvalidInput(vec![err]),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::RelatedNotFound(_) => {
                Self::InvalidInput(vec![HabitFieldError::new(
                    "related_habit",
                    MSG_RELATED_MISSING,
                )])
            }
            other => Self::Repo(other),
        }
    }
}

impl From<HabitValidationError> for HabitServiceError {
    fn from(value: HabitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<HabitFieldError> for HabitServiceError {
    fn from(value: HabitFieldError) -> Self {
        Self::InvalidInput(vec![value])
    }
}

pub type ServiceResult<T> = Result<T, HabitServiceError>;

/// Full create/replace payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HabitInput {
    pub place: Option<String>,
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    #[serde(default)]
    pub is_pleasant: bool,
    #[serde(default)]
    pub related_habit: Option<HabitId>,
    /// Defaults to one day when omitted.
    pub periodicity: Option<u32>,
    #[serde(default)]
    pub reward: Option<String>,
    pub estimated_time: Option<u32>,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial update payload.
///
/// For `reward` and `related_habit`, an absent key leaves the stored value
/// alone while an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HabitPatch {
    pub place: Option<String>,
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub related_habit: Option<Option<HabitId>>,
    pub periodicity: Option<u32>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub reward: Option<Option<String>>,
    pub estimated_time: Option<u32>,
    pub is_public: Option<bool>,
}

fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Listing filters for a user's own habits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HabitFilter {
    pub is_pleasant: Option<bool>,
    pub is_public: Option<bool>,
    pub order: HabitOrder,
}

/// Page request; `limit` defaults to 20 and clamps to 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitPage {
    pub items: Vec<Habit>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Habit service facade over repository implementations.
pub struct HabitService<H: HabitRepository, L: HabitLogRepository> {
    habits: H,
    logs: L,
}

impl<H: HabitRepository, L: HabitLogRepository> HabitService<H, L> {
    /// Creates a service using the provided repository implementations.
    pub fn new(habits: H, logs: L) -> Self {
        Self { habits, logs }
    }

    /// Accepts a create payload for `owner` and persists the habit.
    pub fn create_habit(&self, owner: UserId, input: HabitInput) -> ServiceResult<Habit> {
        let habit = habit_from_input(Uuid::new_v4(), owner, input)?;
        self.accept(&habit)?;
        let id = self.habits.create_habit(&habit)?;
        self.read_back(id)
    }

    /// Replaces every writable field of an owned habit.
    pub fn update_habit(
        &self,
        requester: UserId,
        id: HabitId,
        input: HabitInput,
    ) -> ServiceResult<Habit> {
        let stored = self.owned_habit(requester, id)?;
        let mut habit = habit_from_input(id, stored.owner_id, input)?;
        habit.created_at = stored.created_at;
        self.accept(&habit)?;
        self.habits.update_habit(&habit)?;
        self.read_back(id)
    }

    /// Applies a partial update to an owned habit.
    pub fn patch_habit(
        &self,
        requester: UserId,
        id: HabitId,
        patch: HabitPatch,
    ) -> ServiceResult<Habit> {
        let mut habit = self.owned_habit(requester, id)?;
        apply_patch(&mut habit, patch);
        self.accept(&habit)?;
        self.habits.update_habit(&habit)?;
        self.read_back(id)
    }

    /// Gets one habit the requester owns, or any public habit.
    pub fn get_habit(&self, requester: UserId, id: HabitId) -> ServiceResult<Habit> {
        let habit = self
            .habits
            .get_habit(id)?
            .ok_or(HabitServiceError::NotFound(id))?;
        if habit.owner_id != requester && !habit.is_public {
            return Err(HabitServiceError::NotFound(id));
        }
        Ok(habit)
    }

    /// Deletes an owned habit together with its logs.
    pub fn delete_habit(&self, requester: UserId, id: HabitId) -> ServiceResult<()> {
        self.owned_habit(requester, id)?;
        self.habits.delete_habit(id)?;
        Ok(())
    }

    /// Lists the requester's habits.
    pub fn my_habits(
        &self,
        owner: UserId,
        filter: HabitFilter,
        page: PageRequest,
    ) -> ServiceResult<HabitPage> {
        let applied_limit = normalize_habit_limit(page.limit);
        let query = HabitListQuery {
            owner_id: Some(owner),
            is_pleasant: filter.is_pleasant,
            is_public: filter.is_public,
            order: filter.order,
            limit: Some(applied_limit),
            offset: page.offset,
            ..HabitListQuery::default()
        };
        let items = self.habits.list_habits(&query)?;
        Ok(HabitPage {
            items,
            applied_limit,
        })
    }

    /// Lists habits published by any user.
    pub fn public_habits(&self, page: PageRequest) -> ServiceResult<HabitPage> {
        let applied_limit = normalize_habit_limit(page.limit);
        let query = HabitListQuery {
            is_public: Some(true),
            limit: Some(applied_limit),
            offset: page.offset,
            ..HabitListQuery::default()
        };
        let items = self.habits.list_habits(&query)?;
        Ok(HabitPage {
            items,
            applied_limit,
        })
    }

    /// Marks an owned habit as done; `completed_at` defaults to now.
    pub fn complete_habit(
        &self,
        requester: UserId,
        id: HabitId,
        completed_at: Option<i64>,
    ) -> ServiceResult<HabitLog> {
        self.owned_habit(requester, id)?;
        let log = match completed_at {
            Some(at) => HabitLog::completed(id, at),
            None => HabitLog::completed_now(id),
        };
        self.logs.append_log(&log)?;
        Ok(log)
    }

    /// Completion history of an owned habit, newest first.
    pub fn habit_logs(&self, requester: UserId, id: HabitId) -> ServiceResult<Vec<HabitLog>> {
        self.owned_habit(requester, id)?;
        Ok(self.logs.list_logs(id)?)
    }

    fn accept(&self, habit: &Habit) -> ServiceResult<()> {
        habit.check_fields()?;
        let related = resolve_related_ref(&self.habits, habit)?;
        if let Err(err) = validate_habit(habit.candidate(related)) {
            debug!(
                "event=habit_intake module=service status=rejected habit_id={} fields={:?}",
                habit.id,
                err.fields()
            );
            return Err(err.into());
        }
        Ok(())
    }

    fn owned_habit(&self, requester: UserId, id: HabitId) -> ServiceResult<Habit> {
        let habit = self
            .habits
            .get_habit(id)?
            .ok_or(HabitServiceError::NotFound(id))?;
        if habit.owner_id != requester {
            return Err(HabitServiceError::Forbidden(id));
        }
        Ok(habit)
    }

    fn read_back(&self, id: HabitId) -> ServiceResult<Habit> {
        self.habits
            .get_habit(id)?
            .ok_or(HabitServiceError::NotFound(id))
    }
}

/// Normalizes list limit according to the listing contract.
pub fn normalize_habit_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => HABITS_DEFAULT_LIMIT,
        Some(value) => value.min(HABITS_LIMIT_MAX),
    }
}

fn habit_from_input(id: HabitId, owner: UserId, input: HabitInput) -> ServiceResult<Habit> {
    let mut missing = Vec::new();
    let place = required("place", input.place, &mut missing);
    let time = required("time", input.time, &mut missing);
    let action = required("action", input.action, &mut missing);
    let estimated_time = required("estimated_time", input.estimated_time, &mut missing);
    let (Some(place), Some(time), Some(action), Some(estimated_time)) =
        (place, time, action, estimated_time)
    else {
        return Err(HabitServiceError::InvalidInput(missing));
    };

    let mut habit = Habit::new(owner, action, place, time, estimated_time);
    habit.id = id;
    habit.is_pleasant = input.is_pleasant;
    habit.related_habit = input.related_habit;
    habit.periodicity = input.periodicity.unwrap_or(DEFAULT_PERIODICITY_DAYS);
    habit.reward = input.reward;
    habit.is_public = input.is_public;
    Ok(habit)
}

fn required<T>(
    field: &'static str,
    value: Option<T>,
    missing: &mut Vec<HabitFieldError>,
) -> Option<T> {
    if value.is_none() {
        missing.push(HabitFieldError::new(field, MSG_REQUIRED));
    }
    value
}

fn apply_patch(habit: &mut Habit, patch: HabitPatch) {
    if let Some(place) = patch.place {
        habit.place = place;
    }
    if let Some(time) = patch.time {
        habit.time = time;
    }
    if let Some(action) = patch.action {
        habit.action = action;
    }
    if let Some(is_pleasant) = patch.is_pleasant {
        habit.is_pleasant = is_pleasant;
    }
    if let Some(related_habit) = patch.related_habit {
        habit.related_habit = related_habit;
    }
    if let Some(periodicity) = patch.periodicity {
        habit.periodicity = periodicity;
    }
    if let Some(reward) = patch.reward {
        habit.reward = reward;
    }
    if let Some(estimated_time) = patch.estimated_time {
        habit.estimated_time = estimated_time;
    }
    if let Some(is_public) = patch.is_public {
        habit.is_public = is_public;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_habit_limit(None), HABITS_DEFAULT_LIMIT);
        assert_eq!(normalize_habit_limit(Some(0)), HABITS_DEFAULT_LIMIT);
        assert_eq!(normalize_habit_limit(Some(5)), 5);
        assert_eq!(normalize_habit_limit(Some(500)), HABITS_LIMIT_MAX);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: HabitPatch = serde_json::from_str(r#"{"periodicity": 3}"#).unwrap();
        assert_eq!(absent.reward, None);
        assert_eq!(absent.periodicity, Some(3));

        let cleared: HabitPatch = serde_json::from_str(r#"{"reward": null}"#).unwrap();
        assert_eq!(cleared.reward, Some(None));
    }

    #[test]
    fn input_requires_core_fields() {
        let input: HabitInput =
            serde_json::from_str(r#"{"place": "home", "action": "read"}"#).unwrap();
        let err = habit_from_input(Uuid::new_v4(), Uuid::new_v4(), input).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.to_json_body(),
            json!({ "time": MSG_REQUIRED, "estimated_time": MSG_REQUIRED })
        );
    }

    #[test]
    fn input_parses_time_of_day_and_defaults_periodicity() {
        let input: HabitInput = serde_json::from_str(
            r#"{"place": "park", "time": "07:30:00", "action": "walk", "estimated_time": 90}"#,
        )
        .unwrap();
        let habit = habit_from_input(Uuid::new_v4(), Uuid::new_v4(), input).unwrap();
        assert_eq!(habit.time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(habit.periodicity, DEFAULT_PERIODICITY_DAYS);
    }
}
