//! Effects produced by state transitions

use super::state::{Epoch, SelectTicket};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Post the user's text; `chat_id` is absent for a conversation the
    /// backend has not seen yet
    RequestSend {
        epoch: Epoch,
        text: String,
        chat_id: Option<String>,
    },

    /// Load the full transcript for a selection
    FetchChat { ticket: SelectTicket },

    /// Re-fetch the history list
    RefreshHistory,

    /// Tell the view something changed
    Notify(Notice),
}

/// View-facing notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    MessagesChanged,
    ActiveChatChanged { chat_id: Option<String> },
    Error { message: String },
}

impl Effect {
    pub fn messages_changed() -> Self {
        Effect::Notify(Notice::MessagesChanged)
    }

    pub fn active_chat_changed(chat_id: Option<String>) -> Self {
        Effect::Notify(Notice::ActiveChatChanged { chat_id })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Effect::Notify(Notice::Error {
            message: message.into(),
        })
    }
}
