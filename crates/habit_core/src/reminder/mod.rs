//! Scheduled habit notifications.
//!
//! # Responsibility
//! - Decide which habits need a reminder, a missed-completion notice or a
//!   daily summary at a given instant.
//! - Hand rendered messages to an explicitly provided [`Messenger`].
//!
//! # Invariants
//! - Jobs never write habits; they only read habits, logs and owners.
//! - Delivery is best-effort: messenger failures are logged and counted,
//!   never propagated. Storage failures propagate.
//! - Only useful (non-pleasant) habits are reminded about.

pub mod jobs;
pub mod messenger;

pub use jobs::{ReminderJobs, ReminderReport};
pub use messenger::{LogMessenger, Messenger, MessengerError};
