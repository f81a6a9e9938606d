//! Runtimes that drive the pure models against the backend
//!
//! `ChatRuntime` executes conversation effects, keeps the history index and
//! the feedback guard. `SessionRuntime` drives sign-in and onboarding.
//! Both publish `ViewEvent`s on a broadcast channel.

mod executor;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;
pub use session::SessionRuntime;
pub use traits::*;

use crate::conversation::{MessageId, Notice, TransitionError};
use crate::history::HistoryDiff;
use crate::session::SessionStatus;
use thiserror::Error;

/// Capacity of the view event channel; slow subscribers lag, never block
pub(crate) const VIEW_EVENT_CAPACITY: usize = 64;

/// Result of an operation that may be skipped by a guard.
///
/// Skips are not failures: nothing was sent and nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Skipped(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}

/// Why an operation was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A message is already being sent")]
    SendPending,
    #[error("A newer selection replaced this one")]
    Superseded,
    #[error("The conversation changed before the result arrived")]
    ConversationChanged,
    #[error("The conversation has not been saved yet")]
    NotPersisted,
    #[error("No message {0} in the active conversation")]
    UnknownMessage(MessageId),
    #[error("Message {0} does not take feedback")]
    NotReactable(MessageId),
    #[error("A feedback change for this message is still in flight")]
    FeedbackInFlight,
    #[error("Nobody is signed in")]
    SignedOut,
}

impl From<TransitionError> for SkipReason {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::EmptyMessage => SkipReason::EmptyMessage,
            TransitionError::SendPending => SkipReason::SendPending,
            TransitionError::StaleSelection { .. } => SkipReason::Superseded,
            TransitionError::ConversationChanged => SkipReason::ConversationChanged,
            TransitionError::NotPersisted => SkipReason::NotPersisted,
            TransitionError::UnknownMessage(id) => SkipReason::UnknownMessage(id),
            TransitionError::NotReactable(id) => SkipReason::NotReactable(id),
        }
    }
}

/// Notifications for the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    MessagesChanged,
    ActiveChatChanged { chat_id: Option<String> },
    HistoryChanged(HistoryDiff),
    SessionChanged(SessionStatus),
    Error { message: String },
}

impl From<Notice> for ViewEvent {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::MessagesChanged => ViewEvent::MessagesChanged,
            Notice::ActiveChatChanged { chat_id } => ViewEvent::ActiveChatChanged { chat_id },
            Notice::Error { message } => ViewEvent::Error { message },
        }
    }
}
