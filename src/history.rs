//! Chat history index
//!
//! The summary list is always replaced wholesale from the backend, never
//! patched. A diff against the previous snapshot is computed for callers
//! that want to react to what changed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of one stored chat, as listed in the sidebar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// What changed between two history snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub retitled: Vec<String>,
    /// Same members, different order (e.g. a chat was bumped by a new message)
    pub reordered: bool,
}

impl HistoryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.retitled.is_empty() && !self.reordered
    }
}

/// Identifies one history fetch; a snapshot older than the last one
/// applied is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(pub u64);

#[derive(Debug, Clone, Default)]
pub struct HistoryIndex {
    summaries: Vec<ChatSummary>,
    next_refresh: u64,
    applied: Option<RefreshTicket>,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> &[ChatSummary] {
        &self.summaries
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn find(&self, chat_id: &str) -> Option<&ChatSummary> {
        self.summaries.iter().find(|s| s.id == chat_id)
    }

    /// The summary for the active chat, matched by id on every call so a
    /// rename or reorder on the backend shows up after the next refresh
    pub fn selected(&self, active_chat_id: Option<&str>) -> Option<&ChatSummary> {
        active_chat_id.and_then(|id| self.find(id))
    }

    /// Issue a ticket for a fetch that is about to start
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        let ticket = RefreshTicket(self.next_refresh);
        self.next_refresh += 1;
        ticket
    }

    /// Replace the snapshot with the result of the fetch behind `ticket`,
    /// unless a later fetch has already been applied. Fetches may finish in
    /// any order.
    pub fn apply(&mut self, ticket: RefreshTicket, summaries: Vec<ChatSummary>) -> Option<HistoryDiff> {
        if self.applied.is_some_and(|applied| applied > ticket) {
            return None;
        }
        self.applied = Some(ticket);
        Some(self.replace(summaries))
    }

    /// Replace the snapshot and report the differences from the old one
    pub fn replace(&mut self, summaries: Vec<ChatSummary>) -> HistoryDiff {
        let previous: HashMap<&str, &ChatSummary> =
            self.summaries.iter().map(|s| (s.id.as_str(), s)).collect();
        let current: HashMap<&str, &ChatSummary> =
            summaries.iter().map(|s| (s.id.as_str(), s)).collect();

        let added = summaries
            .iter()
            .filter(|s| !previous.contains_key(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect();
        let removed: Vec<String> = self
            .summaries
            .iter()
            .filter(|s| !current.contains_key(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect();
        let retitled = summaries
            .iter()
            .filter(|s| previous.get(s.id.as_str()).is_some_and(|old| old.title != s.title))
            .map(|s| s.id.clone())
            .collect();

        let kept_old: Vec<&str> = self
            .summaries
            .iter()
            .map(|s| s.id.as_str())
            .filter(|id| current.contains_key(id))
            .collect();
        let kept_new: Vec<&str> = summaries
            .iter()
            .map(|s| s.id.as_str())
            .filter(|id| previous.contains_key(id))
            .collect();
        let reordered = kept_old != kept_new;

        let diff = HistoryDiff {
            added,
            removed,
            retitled,
            reordered,
        };
        self.summaries = summaries;
        diff
    }
}
