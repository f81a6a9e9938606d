//! Mock backends for testing
//!
//! Responses can be queued per operation, and any operation can be held
//! open with a `Gate` to simulate a call that is still in flight.

use super::traits::*;
use crate::api::{ApiError, AuthGrant, Credentials, ProfileDetails, Registration};
use crate::conversation::LoadedMessage;
use crate::feedback::{Feedback, FeedbackKind};
use crate::history::ChatSummary;
use crate::session::User;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

// ============================================================================
// Gates
// ============================================================================

/// Backend operations that can be held open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListChats,
    FetchChat,
    Send,
    SetFeedback,
    ClearFeedback,
}

/// Handle for a held call: `started` fires once the call is in flight,
/// sending on `release` lets it complete
pub struct Gate {
    pub started: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

struct HeldCall {
    started: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Gates(Mutex<HashMap<Op, HeldCall>>);

impl Gates {
    fn hold(&self, op: Op) -> Gate {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.0.lock().unwrap().insert(
            op,
            HeldCall {
                started: started_tx,
                release: release_rx,
            },
        );
        Gate {
            started: started_rx,
            release: release_tx,
        }
    }

    async fn pass(&self, op: Op) {
        let held = self.0.lock().unwrap().remove(&op);
        if let Some(held) = held {
            let _ = held.started.send(());
            let _ = held.release.await;
        }
    }
}

// ============================================================================
// Mock Chat Backend
// ============================================================================

/// A call the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListChats,
    FetchChat(String),
    Send {
        text: String,
        chat_id: Option<String>,
    },
    SetFeedback {
        chat_id: String,
        index: usize,
        kind: FeedbackKind,
    },
    ClearFeedback {
        chat_id: String,
        index: usize,
    },
}

/// In-memory chat backend.
///
/// Unqueued sends echo the text back and create `chat-new` when no chat id
/// is given; unqueued feedback calls succeed.
#[derive(Default)]
pub struct MockChatBackend {
    history: Mutex<Vec<ChatSummary>>,
    history_errors: Mutex<VecDeque<ApiError>>,
    transcripts: Mutex<HashMap<String, Vec<LoadedMessage>>>,
    replies: Mutex<VecDeque<Result<SendReply, ApiError>>>,
    feedback_errors: Mutex<VecDeque<ApiError>>,
    gates: Gates,
    calls: Mutex<Vec<Call>>,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, summaries: Vec<ChatSummary>) {
        *self.history.lock().unwrap() = summaries;
    }

    pub fn fail_next_history(&self, error: ApiError) {
        self.history_errors.lock().unwrap().push_back(error);
    }

    /// Store a chat; messages are numbered in list order
    pub fn add_chat(&self, chat_id: &str, mut messages: Vec<LoadedMessage>) {
        for (index, message) in messages.iter_mut().enumerate() {
            message.server_index = index;
        }
        self.transcripts
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), messages);
    }

    pub fn queue_reply(&self, reply: Result<SendReply, ApiError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn fail_next_feedback(&self, error: ApiError) {
        self.feedback_errors.lock().unwrap().push_back(error);
    }

    /// Hold the next call of `op` open until released
    pub fn hold(&self, op: Op) -> Gate {
        self.gates.hold(op)
    }

    pub fn recorded_calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        // The list is read when the call starts, even if it is held
        self.record(Call::ListChats);
        let listed = self.history.lock().unwrap().clone();
        self.gates.pass(Op::ListChats).await;
        if let Some(error) = self.history_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(listed)
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatTranscript, ApiError> {
        self.record(Call::FetchChat(chat_id.to_string()));
        self.gates.pass(Op::FetchChat).await;
        let messages = self.transcripts.lock().unwrap().get(chat_id).cloned();
        messages
            .map(|messages| ChatTranscript {
                chat_id: chat_id.to_string(),
                title: format!("Chat {chat_id}"),
                stored_count: messages.len(),
                messages,
            })
            .ok_or_else(|| ApiError::rejected(404, "Chat not found"))
    }

    async fn send_message(&self, text: &str, chat_id: Option<&str>) -> Result<SendReply, ApiError> {
        self.record(Call::Send {
            text: text.to_string(),
            chat_id: chat_id.map(str::to_string),
        });
        self.gates.pass(Op::Send).await;
        let queued = self.replies.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(SendReply {
                message: format!("echo: {text}"),
                chat_id: chat_id.unwrap_or("chat-new").to_string(),
            })
        })
    }

    async fn set_feedback(
        &self,
        chat_id: &str,
        index: usize,
        kind: FeedbackKind,
    ) -> Result<Feedback, ApiError> {
        self.record(Call::SetFeedback {
            chat_id: chat_id.to_string(),
            index,
            kind,
        });
        self.gates.pass(Op::SetFeedback).await;
        match self.feedback_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(Feedback::new(kind)),
        }
    }

    async fn clear_feedback(&self, chat_id: &str, index: usize) -> Result<(), ApiError> {
        self.record(Call::ClearFeedback {
            chat_id: chat_id.to_string(),
            index,
        });
        self.gates.pass(Op::ClearFeedback).await;
        match self.feedback_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Mock Auth Backend
// ============================================================================

const MOCK_TOKEN: &str = "token-1";

/// Single-account auth backend. The account's password is `secret` and the
/// only valid credential is the one it hands out.
pub struct MockAuthBackend {
    account: Mutex<Option<User>>,
    token: Mutex<Option<String>>,
    expired: Mutex<bool>,
    user_errors: Mutex<VecDeque<ApiError>>,
}

impl MockAuthBackend {
    pub const PASSWORD: &'static str = "secret";

    /// Backend with no account yet; `register` creates one
    pub fn empty() -> Self {
        Self {
            account: Mutex::new(None),
            token: Mutex::new(None),
            expired: Mutex::new(false),
            user_errors: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_account(user: User) -> Self {
        let backend = Self::empty();
        *backend.account.lock().unwrap() = Some(user);
        backend
    }

    /// A credential that `current_user` accepts
    pub fn valid_token() -> String {
        MOCK_TOKEN.to_string()
    }

    /// Make the issued credential stop working
    pub fn expire(&self) {
        *self.expired.lock().unwrap() = true;
    }

    /// Fail the next `current_user` call even with a valid credential
    pub fn fail_next_user(&self, error: ApiError) {
        self.user_errors.lock().unwrap().push_back(error);
    }

    pub fn held_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn account(&self) -> Option<User> {
        self.account.lock().unwrap().clone()
    }

    fn authorized(&self) -> Result<(), ApiError> {
        let valid = !*self.expired.lock().unwrap()
            && self.token.lock().unwrap().as_deref() == Some(MOCK_TOKEN);
        if valid {
            Ok(())
        } else {
            Err(ApiError::unauthorized("Token has expired"))
        }
    }

    fn grant(user: &User) -> AuthGrant {
        AuthGrant {
            token: MOCK_TOKEN.to_string(),
            user_id: user.id.clone(),
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        let account = self.account.lock().unwrap().clone();
        match account {
            Some(user)
                if user.display_name == credentials.username
                    && credentials.password == Self::PASSWORD =>
            {
                *self.expired.lock().unwrap() = false;
                Ok(Self::grant(&user))
            }
            _ => Err(ApiError::unauthorized("Invalid username or password")),
        }
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError> {
        let mut account = self.account.lock().unwrap();
        if account
            .as_ref()
            .is_some_and(|u| u.display_name == registration.username)
        {
            return Err(ApiError::rejected(400, "Username already exists"));
        }
        let user = User {
            id: "u-new".to_string(),
            display_name: registration.username.clone(),
            email: Some(registration.email.clone()),
            profile_complete: false,
            persona_selected: false,
        };
        let grant = Self::grant(&user);
        *account = Some(user);
        Ok(grant)
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        if let Some(error) = self.user_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.authorized()?;
        self.account()
            .ok_or_else(|| ApiError::rejected(404, "User not found"))
    }

    async fn complete_profile(&self, _details: &ProfileDetails) -> Result<(), ApiError> {
        self.authorized()?;
        if let Some(user) = self.account.lock().unwrap().as_mut() {
            user.profile_complete = true;
        }
        Ok(())
    }

    async fn complete_persona_selection(&self) -> Result<(), ApiError> {
        self.authorized()?;
        if let Some(user) = self.account.lock().unwrap().as_mut() {
            user.persona_selected = true;
        }
        Ok(())
    }

    async fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_chat_backend_defaults() {
        let mock = MockChatBackend::new();
        let reply = mock.send_message("hi", None).await.unwrap();
        assert_eq!(reply.message, "echo: hi");
        assert_eq!(reply.chat_id, "chat-new");

        assert!(mock.fetch_chat("nope").await.unwrap_err().is_rejection());
        assert_eq!(
            mock.recorded_calls(),
            vec![
                Call::Send {
                    text: "hi".to_string(),
                    chat_id: None
                },
                Call::FetchChat("nope".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_gate_holds_call_until_released() {
        let mock = MockChatBackend::new();
        let gate = mock.hold(Op::ListChats);

        let call = mock.list_chats();
        let driver = async {
            gate.started.await.unwrap();
            gate.release.send(()).unwrap();
        };
        let (listed, ()) = futures::join!(call, driver);
        assert!(listed.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_auth_expiry() {
        let mock = MockAuthBackend::empty();
        assert!(mock.current_user().await.unwrap_err().is_unauthorized());

        let grant = mock
            .register(&Registration {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        mock.set_token(Some(grant.token)).await;
        assert_eq!(mock.current_user().await.unwrap().display_name, "ada");

        mock.expire();
        assert!(mock.current_user().await.unwrap_err().is_unauthorized());
    }
}
