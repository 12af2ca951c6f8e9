//! Reminder, completion-check and daily-summary jobs.
//!
//! # Responsibility
//! - Select due habits for a given instant and render their messages.
//! - Resolve each habit owner's chat, falling back to a default chat.
//!
//! # Invariants
//! - "Today" is the UTC calendar day containing `now`.
//! - A habit logged today is not reminded again.
//! - Owners without any useful habit receive no summary.

use super::messenger::Messenger;
use crate::model::habit::{Habit, UserId};
use crate::repo::habit_repo::{HabitListQuery, HabitOrder, HabitRepository};
use crate::repo::log_repo::HabitLogRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoResult;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const TIME_DISPLAY_FORMAT: &str = "%H:%M";

/// Outcome counters for one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    /// Messages accepted by the messenger.
    pub sent: usize,
    /// Candidates skipped (already logged today, or no chat to deliver to).
    pub skipped: usize,
    /// Messages the messenger failed to deliver.
    pub failed: usize,
}

/// Notification jobs over read-only repositories and an injected messenger.
pub struct ReminderJobs<'a, M: Messenger> {
    habits: &'a dyn HabitRepository,
    logs: &'a dyn HabitLogRepository,
    users: &'a dyn UserRepository,
    messenger: M,
    default_chat_id: Option<String>,
}

impl<'a, M: Messenger> ReminderJobs<'a, M> {
    pub fn new(
        habits: &'a dyn HabitRepository,
        logs: &'a dyn HabitLogRepository,
        users: &'a dyn UserRepository,
        messenger: M,
    ) -> Self {
        Self {
            habits,
            logs,
            users,
            messenger,
            default_chat_id: None,
        }
    }

    /// Chat used for owners who have not linked one.
    pub fn with_default_chat_id(mut self, chat_id: Option<String>) -> Self {
        self.default_chat_id = chat_id.filter(|value| !value.trim().is_empty());
        self
    }

    /// Reminds about useful habits scheduled at `now`'s hour and minute that
    /// have no log for today yet.
    pub fn send_habit_reminders(&self, now: DateTime<Utc>) -> RepoResult<ReminderReport> {
        let (day_start, day_end) = utc_day_bounds(now);
        let query = HabitListQuery {
            is_pleasant: Some(false),
            at_minute: Some(now.time()),
            order: HabitOrder::TimeAsc,
            ..HabitListQuery::default()
        };

        let mut report = ReminderReport::default();
        let mut chats = ChatCache::default();
        for habit in self.habits.list_habits(&query)? {
            if self
                .logs
                .has_log_between(habit.id, day_start, day_end, false)?
            {
                report.skipped += 1;
                continue;
            }

            let related_action = match habit.related_habit {
                Some(related_id) => self
                    .habits
                    .get_habit(related_id)?
                    .map(|related| related.action),
                None => None,
            };
            let text = render_reminder(&habit, related_action.as_deref());
            self.deliver(&mut chats, habit.owner_id, &text, &mut report)?;
        }

        info!(
            "event=reminder_job module=reminder status=ok job=habit_reminders sent={} skipped={} failed={}",
            report.sent, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Notifies owners about useful habits with no completed log today.
    pub fn check_habit_completion(&self, now: DateTime<Utc>) -> RepoResult<ReminderReport> {
        let (day_start, day_end) = utc_day_bounds(now);
        let mut report = ReminderReport::default();
        let mut chats = ChatCache::default();

        for habit in self.useful_habits()? {
            if self
                .logs
                .has_log_between(habit.id, day_start, day_end, true)?
            {
                continue;
            }
            let text = render_missed(&habit);
            self.deliver(&mut chats, habit.owner_id, &text, &mut report)?;
        }

        info!(
            "event=reminder_job module=reminder status=ok job=completion_check sent={} skipped={} failed={}",
            report.sent, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Sends each owner of useful habits their completion ratio for today.
    pub fn send_daily_summary(&self, now: DateTime<Utc>) -> RepoResult<ReminderReport> {
        let (day_start, day_end) = utc_day_bounds(now);
        let mut tallies: BTreeMap<UserId, (usize, usize)> = BTreeMap::new();

        for habit in self.useful_habits()? {
            let completed = self
                .logs
                .has_log_between(habit.id, day_start, day_end, true)?;
            let tally = tallies.entry(habit.owner_id).or_default();
            tally.1 += 1;
            if completed {
                tally.0 += 1;
            }
        }

        let mut report = ReminderReport::default();
        let mut chats = ChatCache::default();
        for (owner_id, (completed, total)) in tallies {
            let text = render_summary(completed, total);
            self.deliver(&mut chats, owner_id, &text, &mut report)?;
        }

        info!(
            "event=reminder_job module=reminder status=ok job=daily_summary sent={} skipped={} failed={}",
            report.sent, report.skipped, report.failed
        );
        Ok(report)
    }

    fn useful_habits(&self) -> RepoResult<Vec<Habit>> {
        self.habits.list_habits(&HabitListQuery {
            is_pleasant: Some(false),
            order: HabitOrder::TimeAsc,
            ..HabitListQuery::default()
        })
    }

    fn deliver(
        &self,
        chats: &mut ChatCache,
        owner_id: UserId,
        text: &str,
        report: &mut ReminderReport,
    ) -> RepoResult<()> {
        let chat_id = match chats.get(owner_id) {
            Some(cached) => cached,
            None => {
                let resolved = self
                    .users
                    .get_user(owner_id)?
                    .and_then(|user| user.chat_id)
                    .filter(|value| !value.trim().is_empty())
                    .or_else(|| self.default_chat_id.clone());
                chats.insert(owner_id, resolved.clone());
                resolved
            }
        };

        let Some(chat_id) = chat_id else {
            warn!(
                "event=message_send module=reminder status=skipped owner_id={owner_id} reason=no_chat"
            );
            report.skipped += 1;
            return Ok(());
        };

        match self.messenger.send_message(&chat_id, text) {
            Ok(()) => report.sent += 1,
            Err(err) => {
                warn!(
                    "event=message_send module=reminder status=error owner_id={owner_id} chat_id={chat_id} error={err}"
                );
                report.failed += 1;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct ChatCache {
    resolved: HashMap<UserId, Option<String>>,
}

impl ChatCache {
    fn get(&self, owner_id: UserId) -> Option<Option<String>> {
        self.resolved.get(&owner_id).cloned()
    }

    fn insert(&mut self, owner_id: UserId, chat_id: Option<String>) {
        self.resolved.insert(owner_id, chat_id);
    }
}

/// Epoch-millisecond range `[start, end)` of the UTC day containing `now`.
pub fn utc_day_bounds(now: DateTime<Utc>) -> (i64, i64) {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = Utc.from_utc_datetime(&midnight).timestamp_millis();
    (start, start + DAY_MS)
}

/// Renders the reminder text for a due habit.
pub fn render_reminder(habit: &Habit, related_action: Option<&str>) -> String {
    let mut text = String::from("Habit reminder!\n\n");
    push_habit_lines(&mut text, habit);
    let _ = writeln!(text, "Estimated time: {} sec.", habit.estimated_time);
    if let Some(reward) = habit.reward.as_deref().filter(|value| !value.is_empty()) {
        let _ = writeln!(text, "Reward: {reward}");
    } else if let Some(action) = related_action {
        let _ = writeln!(text, "Related habit: {action}");
    }
    text
}

/// Renders the notice for a habit not completed today.
pub fn render_missed(habit: &Habit) -> String {
    let mut text = String::from("You have not completed this habit today!\n\n");
    push_habit_lines(&mut text, habit);
    text
}

/// Renders one owner's daily completion summary.
pub fn render_summary(completed: usize, total: usize) -> String {
    let percent = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };
    let mut text = String::from("Daily summary\n\n");
    let _ = writeln!(text, "Completed habits: {completed}/{total}");
    let _ = writeln!(text, "Completion rate: {percent:.1}%");
    let closing = if completed == total {
        "Excellent! Every habit is done!"
    } else if completed > 0 {
        "Good work! Keep it up!"
    } else {
        "Don't be discouraged! Tomorrow is a new day!"
    };
    text.push_str(closing);
    text
}

fn push_habit_lines(text: &mut String, habit: &Habit) {
    let _ = writeln!(text, "Action: {}", habit.action);
    let _ = writeln!(text, "Place: {}", habit.place);
    let _ = writeln!(text, "Time: {}", habit.time.format(TIME_DISPLAY_FORMAT));
}
