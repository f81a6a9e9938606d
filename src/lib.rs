//! Companion client core
//!
//! Client-side engine for a conversational companion: the onboarding access
//! gate, the session store, and the chat session engine (messages, history,
//! per-message feedback, rich-content segmentation) kept consistent with a
//! REST backend.

pub mod access_gate;
pub mod api;
pub mod config;
pub mod content;
pub mod conversation;
pub mod feedback;
pub mod history;
pub mod runtime;
pub mod session;
pub mod telemetry;

pub use access_gate::{decide, resolve, AccessFlags, GateDecision, Screen};
pub use api::{ApiError, ApiErrorKind, HttpApi};
pub use config::ClientConfig;
pub use content::{segment, Segment, VideoRef};
pub use conversation::{ConversationState, Message, MessageId, Persistence, Role};
pub use feedback::{Feedback, FeedbackController, FeedbackKind};
pub use history::{ChatSummary, HistoryDiff, HistoryIndex, RefreshTicket};
pub use runtime::{AuthBackend, ChatBackend, ChatRuntime, Outcome, SessionRuntime, SkipReason, ViewEvent};
pub use session::{SessionStatus, SessionStore, User};
