//! Core domain logic for the habit tracker.
//! This crate is the single source of truth for habit invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;
pub mod validation;

pub use config::{ConfigError, ConfigOverrides, TrackerConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::habit::{Habit, HabitFieldError, HabitId, HabitLog, HabitLogId, User, UserId};
pub use reminder::{LogMessenger, Messenger, MessengerError, ReminderJobs, ReminderReport};
pub use repo::habit_repo::{HabitListQuery, HabitOrder, HabitRepository, SqliteHabitRepository};
pub use repo::log_repo::{HabitLogRepository, SqliteHabitLogRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::habit_service::{
    HabitFilter, HabitInput, HabitPage, HabitPatch, HabitService, HabitServiceError, PageRequest,
};
pub use validation::{
    validate_habit, HabitCandidate, HabitField, HabitValidationError, RelatedHabitRef,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
