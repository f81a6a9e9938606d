//! Wire request and response types
//!
//! Field names follow the backend's JSON (`_id`, `chat_id`,
//! `profileComplete`, ...). Conversions into the domain types live here so
//! the rest of the crate never sees wire shapes.

use crate::conversation::{LoadedMessage, Role};
use crate::feedback::{Feedback, FeedbackKind};
use crate::history::ChatSummary;
use crate::session::User;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Timestamps
// ============================================================================

/// Parse a backend timestamp: RFC 3339, HTTP-date (what Flask's `jsonify`
/// emits for datetimes), or a naive ISO string taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub chats: Vec<WireChatSummary>,
}

#[derive(Debug, Deserialize)]
pub struct WireChatSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<WireChatSummary> for ChatSummary {
    fn from(wire: WireChatSummary) -> Self {
        ChatSummary {
            id: wire.id,
            title: wire.title,
            last_updated_at: wire.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub chat: WireChat,
}

#[derive(Debug, Deserialize)]
pub struct WireChat {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_feedback: Option<WireFeedback>,
}

impl WireMessage {
    /// Convert the message stored at `index` to a domain message; roles
    /// other than user/assistant are not part of the visible conversation
    pub fn into_loaded(self, index: usize) -> Option<LoadedMessage> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                tracing::debug!(role = %other, "Skipping message with unknown role");
                return None;
            }
        };
        Some(LoadedMessage {
            role,
            content: self.content,
            timestamp: self.timestamp,
            feedback: self.user_feedback.and_then(WireFeedback::into_feedback),
            server_index: index,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireFeedback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireFeedback {
    pub fn into_feedback(self) -> Option<Feedback> {
        match self.kind.parse::<FeedbackKind>() {
            Ok(kind) => Some(Feedback {
                kind,
                timestamp: self.timestamp,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring stored feedback");
                None
            }
        }
    }
}

/// Request to post a chat message
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub message: &'a str,
    /// `null` asks the backend to create a new chat
    pub chat_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub message: String,
    pub chat_id: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackRequest {
    pub feedback_type: FeedbackKind,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub feedback: Option<WireFeedback>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Generic `{success, message}` acknowledgement
#[derive(Debug, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body: `{"error": "..."}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Answers collected on the profile-completion screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileDetails {
    #[serde(rename = "ageGroup")]
    pub age_group: Option<String>,
    pub pronouns: Option<String>,
    pub occupation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: WireUser,
}

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub user: WireUser,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "profileComplete", default)]
    pub profile_complete: bool,
    #[serde(rename = "personaSelected", default)]
    pub persona_selected: bool,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        User {
            id: wire.id,
            display_name: wire.username,
            email: wire.email,
            profile_complete: wire.profile_complete,
            persona_selected: wire.persona_selected,
        }
    }
}

/// Token plus the identity it was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub user_id: String,
}
