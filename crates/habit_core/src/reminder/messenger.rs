//! Outbound messaging seam for reminders.

use crate::logging::sanitize_message;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_LOGGED_MESSAGE_CHARS: usize = 160;

/// Delivery failure reported by a [`Messenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// Target chat is unknown or refused the message.
    Rejected { chat_id: String, reason: String },
    /// Channel could not be reached.
    Transport(String),
}

impl Display for MessengerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { chat_id, reason } => {
                write!(f, "message to chat `{chat_id}` rejected: {reason}")
            }
            Self::Transport(reason) => write!(f, "messaging transport failed: {reason}"),
        }
    }
}

impl Error for MessengerError {}

/// Client able to deliver a text message to a chat.
///
/// Implementations are constructed by the caller and passed to the jobs
/// that need them.
pub trait Messenger {
    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), MessengerError>;
}

impl<M: Messenger + ?Sized> Messenger for &M {
    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), MessengerError> {
        (**self).send_message(chat_id, text)
    }
}

/// Messenger that writes every message to the log instead of a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), MessengerError> {
        info!(
            "event=message_send module=reminder status=ok channel=log chat_id={} text={}",
            chat_id,
            sanitize_message(text, MAX_LOGGED_MESSAGE_CHARS)
        );
        Ok(())
    }
}
