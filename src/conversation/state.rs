//! Conversation state types

use crate::content::{segment, Segment};
use crate::feedback::Feedback;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Messages
// ============================================================================

/// Stable identity of a message within the active conversation.
///
/// Assigned from a counter when the message enters the model, so it does
/// not shift if messages are ever inserted or removed around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    /// Local clock for optimistic messages, server clock for loaded ones
    pub timestamp: Option<DateTime<Utc>>,
    pub feedback: Option<Feedback>,
    /// Index in the backend's stored list; `None` for messages the backend
    /// never stored (a send that failed, the apology shown for it)
    pub server_index: Option<usize>,
}

impl Message {
    /// Render-ready pieces of the content; recomputed on every call
    pub fn segments(&self) -> Vec<Segment> {
        segment(&self.content)
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

// ============================================================================
// Conversation identity
// ============================================================================

/// Whether the active conversation exists on the backend yet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Persistence {
    /// Nothing on screen
    #[default]
    Inactive,
    /// Messages exist locally, the backend has not assigned an id yet
    Draft,
    Persisted { chat_id: String },
}

impl Persistence {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Persistence::Persisted { chat_id } => Some(chat_id),
            Persistence::Inactive | Persistence::Draft => None,
        }
    }
}

/// Generation of the visible conversation. Bumped whenever the message list
/// is swapped for a different conversation, so replies addressed to an
/// older generation can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Epoch(pub u64);

/// Identifies one `select` request; only the latest one may apply
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectTicket {
    pub chat_id: String,
    pub seq: u64,
}

// ============================================================================
// Conversation State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub(super) persistence: Persistence,
    pub(super) messages: Vec<Message>,
    pub(super) input: String,
    /// The user message whose send is awaiting a reply
    pub(super) pending_send: Option<MessageId>,
    /// How many messages the backend holds for this conversation
    pub(super) stored_count: usize,
    pub(super) epoch: Epoch,
    pub(super) selecting: Option<SelectTicket>,
    pub(super) next_message_id: u64,
    pub(super) next_select_seq: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.persistence.chat_id()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_pending(&self) -> bool {
        self.pending_send.is_some()
    }

    pub fn stored_count(&self) -> usize {
        self.stored_count
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The selection currently being fetched, if any
    pub fn selecting(&self) -> Option<&SelectTicket> {
        self.selecting.as_ref()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Position of a message in the local list
    pub fn position_of(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub(super) fn push_message(
        &mut self,
        role: Role,
        content: String,
        timestamp: Option<DateTime<Utc>>,
        feedback: Option<Feedback>,
        server_index: Option<usize>,
    ) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        self.messages.push(Message {
            id,
            role,
            content,
            timestamp,
            feedback,
            server_index,
        });
        id
    }

    /// Drop the visible conversation and move to a new generation.
    /// The select counter survives so tickets are never reused.
    pub(super) fn reset(&mut self) {
        *self = Self {
            epoch: Epoch(self.epoch.0 + 1),
            next_select_seq: self.next_select_seq,
            ..Self::default()
        };
    }
}
