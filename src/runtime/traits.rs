//! Trait abstractions for backend I/O
//!
//! The runtimes are generic over these so tests can swap in mocks.

use crate::api::{ApiError, AuthGrant, Credentials, ProfileDetails, Registration};
use crate::conversation::LoadedMessage;
use crate::feedback::{Feedback, FeedbackKind};
use crate::history::ChatSummary;
use crate::session::User;
use async_trait::async_trait;
use std::sync::Arc;

/// Full stored transcript of one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTranscript {
    pub chat_id: String,
    pub title: String,
    pub messages: Vec<LoadedMessage>,
    /// Length of the stored list, including entries `messages` leaves out
    pub stored_count: usize,
}

/// Assistant reply to a posted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReply {
    pub message: String,
    /// Id of the chat the exchange was stored in (new if none was given)
    pub chat_id: String,
}

/// Chat endpoints
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// List stored chats, most recently updated first
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError>;

    /// Fetch a chat's full message list
    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatTranscript, ApiError>;

    /// Post a user message; `chat_id` is `None` for a chat not yet stored
    async fn send_message(&self, text: &str, chat_id: Option<&str>) -> Result<SendReply, ApiError>;

    /// Attach a reaction to the message at `index`
    async fn set_feedback(
        &self,
        chat_id: &str,
        index: usize,
        kind: FeedbackKind,
    ) -> Result<Feedback, ApiError>;

    /// Remove the reaction from the message at `index`
    async fn clear_feedback(&self, chat_id: &str, index: usize) -> Result<(), ApiError>;
}

/// Account and onboarding endpoints plus the bearer credential they share
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError>;

    /// Identity and completion flags for the held credential
    async fn current_user(&self) -> Result<User, ApiError>;

    async fn complete_profile(&self, details: &ProfileDetails) -> Result<(), ApiError>;

    async fn complete_persona_selection(&self) -> Result<(), ApiError>;

    /// Replace (or drop) the credential attached to every request
    async fn set_token(&self, token: Option<String>);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        (**self).list_chats().await
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatTranscript, ApiError> {
        (**self).fetch_chat(chat_id).await
    }

    async fn send_message(&self, text: &str, chat_id: Option<&str>) -> Result<SendReply, ApiError> {
        (**self).send_message(text, chat_id).await
    }

    async fn set_feedback(
        &self,
        chat_id: &str,
        index: usize,
        kind: FeedbackKind,
    ) -> Result<Feedback, ApiError> {
        (**self).set_feedback(chat_id, index, kind).await
    }

    async fn clear_feedback(&self, chat_id: &str, index: usize) -> Result<(), ApiError> {
        (**self).clear_feedback(chat_id, index).await
    }
}

#[async_trait]
impl<T: AuthBackend + ?Sized> AuthBackend for Arc<T> {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        (**self).login(credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError> {
        (**self).register(registration).await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        (**self).current_user().await
    }

    async fn complete_profile(&self, details: &ProfileDetails) -> Result<(), ApiError> {
        (**self).complete_profile(details).await
    }

    async fn complete_persona_selection(&self) -> Result<(), ApiError> {
        (**self).complete_persona_selection().await
    }

    async fn set_token(&self, token: Option<String>) {
        (**self).set_token(token).await;
    }
}
