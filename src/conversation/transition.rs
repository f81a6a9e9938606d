//! Pure state transition function
//!
//! Given the same state and event this always produces the same result and
//! performs no I/O. Guard failures come back as `TransitionError` with the
//! state untouched.

use super::effect::Effect;
use super::event::{Event, LoadedMessage};
use super::state::{ConversationState, MessageId, Persistence, Role, SelectTicket};
use thiserror::Error;

/// Shown in place of a reply when a send fails
pub const SEND_FAILED_APOLOGY: &str = "Sorry, an error occurred. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons an event was not applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A message is already being sent")]
    SendPending,
    #[error("Selection of chat {chat_id} was superseded")]
    StaleSelection { chat_id: String },
    #[error("Conversation changed before the result arrived")]
    ConversationChanged,
    #[error("Conversation has not been saved yet")]
    NotPersisted,
    #[error("No message {0} in the active conversation")]
    UnknownMessage(MessageId),
    #[error("Only stored assistant replies take feedback")]
    NotReactable(MessageId),
}

impl TransitionError {
    /// True for skips caused by a precondition the user can retry past,
    /// as opposed to results that arrived too late to matter
    pub fn is_guard(&self) -> bool {
        !matches!(
            self,
            TransitionError::StaleSelection { .. } | TransitionError::ConversationChanged
        )
    }
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Local edits
        // ============================================================
        Event::StartNew => {
            let mut next = state.clone();
            next.reset();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::messages_changed())
                .with_effect(Effect::active_chat_changed(None)))
        }

        Event::InputChanged { text } => {
            let mut next = state.clone();
            next.input = text;
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Sending (optimistic)
        // ============================================================
        Event::SendRequested { text, at } => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            if state.pending_send.is_some() {
                return Err(TransitionError::SendPending);
            }

            let mut next = state.clone();
            let sent = next.push_message(Role::User, text.clone(), Some(at), None, None);
            next.pending_send = Some(sent);
            next.input.clear();
            if next.persistence == Persistence::Inactive {
                next.persistence = Persistence::Draft;
            }

            let chat_id = next.chat_id().map(str::to_string);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::messages_changed())
                .with_effect(Effect::RequestSend {
                    epoch: state.epoch,
                    text,
                    chat_id,
                }))
        }

        Event::SendSucceeded {
            epoch,
            reply,
            chat_id,
            created_chat,
            at,
        } => {
            if epoch != state.epoch {
                // The user moved on; the reply is stored remotely but belongs
                // to a conversation that is no longer on screen.
                let result = TransitionResult::new(state.clone());
                return Ok(if created_chat {
                    result.with_effect(Effect::RefreshHistory)
                } else {
                    result
                });
            }

            // The backend stores the user message and the reply together,
            // so both get their index only now.
            let mut next = state.clone();
            let stored = next.stored_count;
            if let Some(position) = next.pending_send.take().and_then(|sent| next.position_of(sent)) {
                next.messages[position].server_index = Some(stored);
            }
            next.push_message(Role::Assistant, reply, Some(at), None, Some(stored + 1));
            next.stored_count = stored + 2;

            let mut effects = vec![Effect::messages_changed()];
            if next.persistence == Persistence::Draft {
                next.persistence = Persistence::Persisted {
                    chat_id: chat_id.clone(),
                };
                effects.push(Effect::active_chat_changed(Some(chat_id)));
                effects.push(Effect::RefreshHistory);
            } else if created_chat {
                effects.push(Effect::RefreshHistory);
            }
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::SendFailed { epoch, at, .. } => {
            if epoch != state.epoch {
                return Ok(TransitionResult::new(state.clone()));
            }

            // The user's own message stays; the failure is shown as a reply.
            let mut next = state.clone();
            next.push_message(
                Role::Assistant,
                SEND_FAILED_APOLOGY.to_string(),
                Some(at),
                None,
                None,
            );
            next.pending_send = None;
            Ok(TransitionResult::new(next).with_effect(Effect::messages_changed()))
        }

        // ============================================================
        // Selecting a stored conversation
        // ============================================================
        Event::SelectRequested { chat_id } => {
            let mut next = state.clone();
            let ticket = SelectTicket {
                chat_id,
                seq: next.next_select_seq,
            };
            next.next_select_seq += 1;
            next.selecting = Some(ticket.clone());
            Ok(TransitionResult::new(next).with_effect(Effect::FetchChat { ticket }))
        }

        Event::SelectLoaded {
            ticket,
            messages,
            stored_count,
        } => {
            if state.selecting.as_ref() != Some(&ticket) {
                return Err(TransitionError::StaleSelection {
                    chat_id: ticket.chat_id,
                });
            }

            let mut next = state.clone();
            next.reset();
            next.input.clone_from(&state.input);
            for LoadedMessage {
                role,
                content,
                timestamp,
                feedback,
                server_index,
            } in messages
            {
                next.push_message(role, content, timestamp, feedback, Some(server_index));
            }
            next.stored_count = stored_count;
            next.persistence = Persistence::Persisted {
                chat_id: ticket.chat_id.clone(),
            };

            Ok(TransitionResult::new(next)
                .with_effect(Effect::messages_changed())
                .with_effect(Effect::active_chat_changed(Some(ticket.chat_id))))
        }

        Event::SelectFailed { ticket, error } => {
            if state.selecting.as_ref() != Some(&ticket) {
                return Err(TransitionError::StaleSelection {
                    chat_id: ticket.chat_id,
                });
            }

            let mut next = state.clone();
            next.selecting = None;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::error(format!("Could not load conversation: {error}"))))
        }

        // ============================================================
        // Feedback (applied only after confirmation)
        // ============================================================
        Event::FeedbackConfirmed {
            chat_id,
            message_id,
            feedback,
        } => {
            if state.chat_id() != Some(chat_id.as_str()) {
                return Err(TransitionError::ConversationChanged);
            }
            let position = state
                .position_of(message_id)
                .ok_or(TransitionError::UnknownMessage(message_id))?;

            let mut next = state.clone();
            next.messages[position].feedback = feedback;
            Ok(TransitionResult::new(next).with_effect(Effect::messages_changed()))
        }
    }
}

/// Resolve where a feedback call for `message_id` must be addressed: the
/// persisted chat id and the message's index in the stored list.
///
/// Messages the backend never stored cannot take feedback.
pub fn feedback_target(
    state: &ConversationState,
    message_id: MessageId,
) -> Result<(String, usize), TransitionError> {
    let chat_id = state.chat_id().ok_or(TransitionError::NotPersisted)?;
    let message = state
        .message(message_id)
        .ok_or(TransitionError::UnknownMessage(message_id))?;
    match message.server_index {
        Some(index) if message.is_assistant() => Ok((chat_id.to_string(), index)),
        _ => Err(TransitionError::NotReactable(message_id)),
    }
}
