//! Per-message reactions
//!
//! A message carries at most one reaction. Changes are never applied
//! optimistically: the local state only moves once the backend confirms,
//! and at most one call may be outstanding per message.

use crate::conversation::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The closed set of reactions a user can attach to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
    Love,
    Funny,
    Meaningless,
    Offensive,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 6] = [
        FeedbackKind::ThumbsUp,
        FeedbackKind::ThumbsDown,
        FeedbackKind::Love,
        FeedbackKind::Funny,
        FeedbackKind::Meaningless,
        FeedbackKind::Offensive,
    ];

    /// Wire name used by the backend
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::ThumbsUp => "thumbs_up",
            FeedbackKind::ThumbsDown => "thumbs_down",
            FeedbackKind::Love => "love",
            FeedbackKind::Funny => "funny",
            FeedbackKind::Meaningless => "meaningless",
            FeedbackKind::Offensive => "offensive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeedbackKind::ThumbsUp => "Like",
            FeedbackKind::ThumbsDown => "Dislike",
            FeedbackKind::Love => "Love",
            FeedbackKind::Funny => "Funny",
            FeedbackKind::Meaningless => "Meaningless",
            FeedbackKind::Offensive => "Offensive",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feedback kind: {0}")]
pub struct UnknownFeedbackKind(pub String);

impl FromStr for FeedbackKind {
    type Err = UnknownFeedbackKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownFeedbackKind(s.to_string()))
    }
}

/// A confirmed reaction on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Feedback {
    pub fn new(kind: FeedbackKind) -> Self {
        Self {
            kind,
            timestamp: None,
        }
    }
}

/// What the user asked to do with a message's reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAction {
    Apply(FeedbackKind),
    Remove,
}

/// Identifies one message's reaction slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedbackKey {
    pub chat_id: String,
    pub message_id: MessageId,
}

impl FeedbackKey {
    pub fn new(chat_id: impl Into<String>, message_id: MessageId) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id,
        }
    }
}

/// Tracks which reaction slots have a call outstanding
#[derive(Debug, Default)]
pub struct FeedbackController {
    in_flight: HashSet<FeedbackKey>,
}

impl FeedbackController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a call. Returns false if one is already outstanding;
    /// the caller must drop the request rather than queue it.
    pub fn try_begin(&mut self, key: &FeedbackKey) -> bool {
        self.in_flight.insert(key.clone())
    }

    /// Release the slot once the call settled, whatever its outcome
    pub fn finish(&mut self, key: &FeedbackKey) {
        if !self.in_flight.remove(key) {
            tracing::warn!(chat_id = %key.chat_id, message_id = %key.message_id, "Finished feedback call that was not in flight");
        }
    }

    pub fn is_in_flight(&self, key: &FeedbackKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }

    /// Claim the slot through a shared controller. The slot stays claimed
    /// until the returned guard drops, which also covers a caller that
    /// abandons the call midway.
    pub fn claim(controller: &Mutex<Self>, key: FeedbackKey) -> Option<FeedbackClaim<'_>> {
        let claimed = lock(controller).try_begin(&key);
        claimed.then_some(FeedbackClaim { controller, key })
    }
}

/// A claimed reaction slot; released on drop
#[derive(Debug)]
pub struct FeedbackClaim<'a> {
    controller: &'a Mutex<FeedbackController>,
    key: FeedbackKey,
}

impl FeedbackClaim<'_> {
    pub fn key(&self) -> &FeedbackKey {
        &self.key
    }
}

impl Drop for FeedbackClaim<'_> {
    fn drop(&mut self) {
        lock(self.controller).finish(&self.key);
    }
}

/// Lock ignoring poison; no operation leaves the set half-updated
pub(crate) fn lock(controller: &Mutex<FeedbackController>) -> MutexGuard<'_, FeedbackController> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}
