//! Events that can occur in a conversation

use super::state::{Epoch, MessageId, Role, SelectTicket};
use crate::feedback::Feedback;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    StartNew,
    InputChanged {
        text: String,
    },
    SendRequested {
        text: String,
        at: DateTime<Utc>,
    },
    SelectRequested {
        chat_id: String,
    },

    // Backend results
    SendSucceeded {
        epoch: Epoch,
        reply: String,
        chat_id: String,
        /// The request carried no chat id, so the backend created one
        created_chat: bool,
        at: DateTime<Utc>,
    },
    SendFailed {
        epoch: Epoch,
        error: String,
        at: DateTime<Utc>,
    },
    SelectLoaded {
        ticket: SelectTicket,
        messages: Vec<LoadedMessage>,
        /// Length of the stored list, counting entries that were not loaded
        stored_count: usize,
    },
    SelectFailed {
        ticket: SelectTicket,
        error: String,
    },
    FeedbackConfirmed {
        chat_id: String,
        message_id: MessageId,
        feedback: Option<Feedback>,
    },
}

/// A stored message as fetched from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub feedback: Option<Feedback>,
    /// Position in the stored list
    pub server_index: usize,
}
