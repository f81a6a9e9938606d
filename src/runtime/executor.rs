//! Chat runtime: executes conversation effects against a backend
//!
//! Every operation takes `&self`. Locks are held only while reading or
//! replacing state, never across a backend call, so a select can proceed
//! while a send or a feedback call is still outstanding.

use super::traits::ChatBackend;
use super::{Outcome, SkipReason, ViewEvent, VIEW_EVENT_CAPACITY};
use crate::api::ApiError;
use crate::conversation::{
    feedback_target, transition, ConversationState, Effect, Event, Message, MessageId,
    TransitionError,
};
use crate::feedback::{Feedback, FeedbackAction, FeedbackController, FeedbackKey, FeedbackKind};
use crate::history::{ChatSummary, HistoryDiff, HistoryIndex};
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

/// What executing one effect produced
enum Step {
    Quiet,
    Next(Event),
    /// A follow-up event plus the error the caller should see
    Failed(Event, ApiError),
}

/// Result of driving an event and everything it caused
struct Processed {
    outcome: Outcome<()>,
    failure: Option<ApiError>,
}

/// Owns the active conversation, the history index and the feedback guard
pub struct ChatRuntime<B: ChatBackend> {
    backend: B,
    conversation: Mutex<ConversationState>,
    history: Mutex<HistoryIndex>,
    /// Only locked between awaits; claims release it from `Drop`
    feedback: std::sync::Mutex<FeedbackController>,
    events: broadcast::Sender<ViewEvent>,
}

impl<B: ChatBackend> ChatRuntime<B> {
    pub fn new(backend: B) -> Self {
        let (events, _) = broadcast::channel(VIEW_EVENT_CAPACITY);
        Self {
            backend,
            conversation: Mutex::new(ConversationState::new()),
            history: Mutex::new(HistoryIndex::new()),
            feedback: std::sync::Mutex::new(FeedbackController::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub async fn conversation(&self) -> ConversationState {
        self.conversation.lock().await.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.conversation.lock().await.messages().to_vec()
    }

    pub async fn active_chat_id(&self) -> Option<String> {
        self.conversation.lock().await.chat_id().map(str::to_string)
    }

    pub async fn history(&self) -> Vec<ChatSummary> {
        self.history.lock().await.summaries().to_vec()
    }

    /// History entry for the active chat, if it is listed
    pub async fn selected_summary(&self) -> Option<ChatSummary> {
        let active = self.active_chat_id().await;
        self.history
            .lock()
            .await
            .selected(active.as_deref())
            .cloned()
    }

    pub async fn is_feedback_in_flight(&self, message_id: MessageId) -> bool {
        let Some(chat_id) = self.active_chat_id().await else {
            return false;
        };
        crate::feedback::lock(&self.feedback).is_in_flight(&FeedbackKey::new(chat_id, message_id))
    }

    // ========================================================================
    // Conversation operations
    // ========================================================================

    /// Clear the visible conversation. No network call.
    pub async fn start_new(&self) {
        self.process(Event::StartNew).await;
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.process(Event::InputChanged { text: text.into() }).await;
    }

    /// Send the current input buffer
    pub async fn submit_input(&self) -> Outcome<()> {
        let text = self.conversation.lock().await.input().to_string();
        self.send(text).await
    }

    /// Send a message. A failed send shows up as an apology reply rather
    /// than an error, so this only reports guard skips.
    pub async fn send(&self, text: impl Into<String>) -> Outcome<()> {
        let event = Event::SendRequested {
            text: text.into(),
            at: Utc::now(),
        };
        self.process(event).await.outcome
    }

    /// Load a stored conversation. A newer `select` issued while this one
    /// is loading wins; this one then reports `Superseded`.
    pub async fn select(&self, chat_id: impl Into<String>) -> Result<Outcome<()>, ApiError> {
        let processed = self
            .process(Event::SelectRequested {
                chat_id: chat_id.into(),
            })
            .await;
        match processed.failure {
            Some(error) => Err(error),
            None => Ok(processed.outcome),
        }
    }

    /// Replace the history list from the backend. When refreshes overlap,
    /// a response older than one already applied reports `Superseded`.
    pub async fn refresh_history(&self) -> Result<Outcome<HistoryDiff>, ApiError> {
        let ticket = self.history.lock().await.begin_refresh();
        let summaries = match self.backend.list_chats().await {
            Ok(summaries) => summaries,
            Err(error) => {
                tracing::warn!(error = %error, "History refresh failed");
                self.emit(ViewEvent::Error {
                    message: format!("Could not load chat history: {error}"),
                });
                return Err(error);
            }
        };

        let Some(diff) = self.history.lock().await.apply(ticket, summaries) else {
            tracing::info!(ticket = ticket.0, "Dropping superseded history snapshot");
            return Ok(Outcome::Skipped(SkipReason::Superseded));
        };
        if !diff.is_empty() {
            tracing::debug!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                retitled = diff.retitled.len(),
                "History changed"
            );
            self.emit(ViewEvent::HistoryChanged(diff.clone()));
        }
        Ok(Outcome::Done(diff))
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Set a reaction on an assistant message. The local copy changes only
    /// once the backend confirms.
    pub async fn apply_feedback(
        &self,
        message_id: MessageId,
        kind: FeedbackKind,
    ) -> Result<Outcome<Option<Feedback>>, ApiError> {
        self.change_feedback(message_id, FeedbackAction::Apply(kind))
            .await
    }

    pub async fn remove_feedback(
        &self,
        message_id: MessageId,
    ) -> Result<Outcome<Option<Feedback>>, ApiError> {
        self.change_feedback(message_id, FeedbackAction::Remove)
            .await
    }

    async fn change_feedback(
        &self,
        message_id: MessageId,
        action: FeedbackAction,
    ) -> Result<Outcome<Option<Feedback>>, ApiError> {
        let target = feedback_target(&*self.conversation.lock().await, message_id);
        let (chat_id, index) = match target {
            Ok(target) => target,
            Err(reason) => return Ok(skipped(reason)),
        };

        let key = FeedbackKey::new(chat_id.clone(), message_id);
        let Some(claim) = FeedbackController::claim(&self.feedback, key) else {
            tracing::debug!(chat_id = %chat_id, message_id = %message_id, "Feedback already in flight");
            return Ok(Outcome::Skipped(SkipReason::FeedbackInFlight));
        };

        let result = match action {
            FeedbackAction::Apply(kind) => self
                .backend
                .set_feedback(&chat_id, index, kind)
                .await
                .map(Some),
            FeedbackAction::Remove => self
                .backend
                .clear_feedback(&chat_id, index)
                .await
                .map(|()| None),
        };
        drop(claim);

        let feedback = match result {
            Ok(feedback) => feedback,
            Err(error) => {
                tracing::warn!(chat_id = %chat_id, message_id = %message_id, error = %error, "Feedback call failed");
                self.emit(ViewEvent::Error {
                    message: format!("Could not save feedback: {error}"),
                });
                return Err(error);
            }
        };

        tracing::info!(
            chat_id = %chat_id,
            message_id = %message_id,
            kind = feedback.as_ref().map_or("none", |f| f.kind.as_str()),
            "Feedback saved"
        );
        let processed = self
            .process(Event::FeedbackConfirmed {
                chat_id,
                message_id,
                feedback: feedback.clone(),
            })
            .await;
        Ok(processed.outcome.map(|()| feedback))
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Apply `event`, execute its effects, and keep going with whatever
    /// events those produce until nothing is left
    async fn process(&self, event: Event) -> Processed {
        let mut processed = Processed {
            outcome: Outcome::Done(()),
            failure: None,
        };
        let mut pending = vec![event];

        while let Some(event) = pending.pop() {
            let effects = {
                let mut state = self.conversation.lock().await;
                match transition(&state, event) {
                    Ok(result) => {
                        *state = result.new_state;
                        result.effects
                    }
                    Err(reason) => {
                        processed.outcome = skipped(reason);
                        continue;
                    }
                }
            };

            for effect in effects {
                match self.execute_effect(effect).await {
                    Step::Quiet => {}
                    Step::Next(next) => pending.push(next),
                    Step::Failed(next, error) => {
                        pending.push(next);
                        processed.failure = Some(error);
                    }
                }
            }
        }
        processed
    }

    async fn execute_effect(&self, effect: Effect) -> Step {
        match effect {
            Effect::RequestSend {
                epoch,
                text,
                chat_id,
            } => {
                let created_chat = chat_id.is_none();
                match self.backend.send_message(&text, chat_id.as_deref()).await {
                    Ok(reply) => {
                        tracing::info!(chat_id = %reply.chat_id, created_chat, "Reply received");
                        Step::Next(Event::SendSucceeded {
                            epoch,
                            reply: reply.message,
                            chat_id: reply.chat_id,
                            created_chat,
                            at: Utc::now(),
                        })
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Send failed");
                        Step::Next(Event::SendFailed {
                            epoch,
                            error: error.to_string(),
                            at: Utc::now(),
                        })
                    }
                }
            }

            Effect::FetchChat { ticket } => match self.backend.fetch_chat(&ticket.chat_id).await {
                Ok(transcript) => {
                    tracing::info!(
                        chat_id = %ticket.chat_id,
                        messages = transcript.messages.len(),
                        "Conversation loaded"
                    );
                    Step::Next(Event::SelectLoaded {
                        ticket,
                        messages: transcript.messages,
                        stored_count: transcript.stored_count,
                    })
                }
                Err(error) => {
                    tracing::warn!(chat_id = %ticket.chat_id, error = %error, "Conversation load failed");
                    Step::Failed(
                        Event::SelectFailed {
                            ticket,
                            error: error.to_string(),
                        },
                        error,
                    )
                }
            },

            // A failed refresh is reported on the channel; the operation
            // that asked for it still succeeded.
            Effect::RefreshHistory => {
                let _ = self.refresh_history().await;
                Step::Quiet
            }

            Effect::Notify(notice) => {
                self.emit(notice.into());
                Step::Quiet
            }
        }
    }

    fn emit(&self, event: ViewEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn skipped<T>(reason: TransitionError) -> Outcome<T> {
    if reason.is_guard() {
        tracing::debug!(reason = %reason, "Skipped");
    } else {
        tracing::info!(reason = %reason, "Dropping late result");
    }
    Outcome::Skipped(reason.into())
}
