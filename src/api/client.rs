//! `reqwest` implementation of the backend traits

use super::error::ApiError;
use super::types::{
    AuthGrant, AuthResponse, ChatResponse, Credentials, ErrorResponse, FeedbackRequest,
    FeedbackResponse, HistoryResponse, ProfileDetails, Registration, SendRequest, SendResponse,
    SuccessResponse, UserResponse, WireFeedback,
};
use crate::config::ClientConfig;
use crate::feedback::{Feedback, FeedbackKind};
use crate::history::ChatSummary;
use crate::runtime::{AuthBackend, ChatBackend, ChatTranscript, SendReply};
use crate::session::User;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

/// HTTP client for the companion backend.
///
/// Holds the bearer credential; every request carries it when present. A
/// 401 from any endpoint drops the credential.
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to build HTTP client: {e}")))?;
        let token = RwLock::new(config.saved_token.clone());
        Ok(Self {
            client,
            config,
            token,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credential currently attached to requests
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.endpoint(path);
        let builder = self.client.request(method, url);
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and return the body of a successful response
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ApiError::network(format!("Connection failed: {e}"))
            } else {
                ApiError::from(e)
            }
        })?;

        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if status.is_success() {
            tracing::debug!(path = %url, status = status.as_u16(), "Backend call succeeded");
            return Ok(body);
        }

        let error = Self::classify_error(status, &body);
        if error.is_unauthorized() {
            tracing::warn!(path = %url, "Credential rejected, signing out");
            *self.token.write().await = None;
        } else {
            tracing::warn!(path = %url, status = status.as_u16(), error = %error, "Backend call failed");
        }
        Err(error)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::decode(format!("Failed to parse response: {e}")))
    }

    fn classify_error(status: StatusCode, body: &str) -> ApiError {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        ApiError::from_status(status.as_u16(), message)
    }

    async fn authenticate(&self, path: &str, body: &impl serde::Serialize) -> Result<AuthGrant, ApiError> {
        let request = self.request(Method::POST, path).await.json(body);
        let response: AuthResponse = self.call(request).await?;
        tracing::info!(user_id = %response.user.id, "Authenticated");
        Ok(AuthGrant {
            token: response.access_token,
            user_id: response.user.id,
        })
    }
}

fn feedback_path(chat_id: &str, index: usize) -> String {
    format!("chat/{chat_id}/message/{index}/feedback")
}

#[async_trait]
impl ChatBackend for HttpApi {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        let request = self.request(Method::GET, "chat/history").await;
        let response: HistoryResponse = self.call(request).await?;
        Ok(response.chats.into_iter().map(ChatSummary::from).collect())
    }

    async fn fetch_chat(&self, chat_id: &str) -> Result<ChatTranscript, ApiError> {
        let request = self.request(Method::GET, &format!("chat/{chat_id}")).await;
        let response: ChatResponse = self.call(request).await?;
        let chat = response.chat;
        let stored_count = chat.messages.len();
        Ok(ChatTranscript {
            chat_id: if chat.id.is_empty() {
                chat_id.to_string()
            } else {
                chat.id
            },
            title: chat.title,
            messages: chat
                .messages
                .into_iter()
                .enumerate()
                .filter_map(|(index, message)| message.into_loaded(index))
                .collect(),
            stored_count,
        })
    }

    async fn send_message(&self, text: &str, chat_id: Option<&str>) -> Result<SendReply, ApiError> {
        let request = self
            .request(Method::POST, "chat")
            .await
            .json(&SendRequest {
                message: text,
                chat_id,
            });
        let response: SendResponse = self.call(request).await?;
        Ok(SendReply {
            message: response.message,
            chat_id: response.chat_id,
        })
    }

    async fn set_feedback(
        &self,
        chat_id: &str,
        index: usize,
        kind: FeedbackKind,
    ) -> Result<Feedback, ApiError> {
        let request = self
            .request(Method::POST, &feedback_path(chat_id, index))
            .await
            .json(&FeedbackRequest {
                feedback_type: kind,
            });
        let response: FeedbackResponse = self.call(request).await?;
        if !response.success {
            return Err(ApiError::rejected(
                200,
                response
                    .message
                    .unwrap_or_else(|| "Feedback was not saved".to_string()),
            ));
        }
        Ok(response
            .feedback
            .and_then(WireFeedback::into_feedback)
            .unwrap_or_else(|| Feedback::new(kind)))
    }

    async fn clear_feedback(&self, chat_id: &str, index: usize) -> Result<(), ApiError> {
        let request = self
            .request(Method::DELETE, &feedback_path(chat_id, index))
            .await;
        let response: SuccessResponse = self.call(request).await?;
        if response.success {
            Ok(())
        } else {
            Err(ApiError::rejected(
                200,
                response
                    .message
                    .unwrap_or_else(|| "Feedback was not removed".to_string()),
            ))
        }
    }
}

#[async_trait]
impl AuthBackend for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        self.authenticate("login", credentials).await
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError> {
        self.authenticate("register", registration).await
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        let request = self.request(Method::GET, "user").await;
        let response: UserResponse = self.call(request).await?;
        Ok(User::from(response.user))
    }

    async fn complete_profile(&self, details: &ProfileDetails) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "complete-profile")
            .await
            .json(details);
        self.execute(request).await.map(drop)
    }

    async fn complete_persona_selection(&self) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "complete-persona-selection")
            .await;
        self.execute(request).await.map(drop)
    }

    async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }
}
