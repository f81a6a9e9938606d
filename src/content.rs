//! Rich-content segmentation of message text
//!
//! Assistant replies may embed video references as
//! `[YOUTUBE_VIDEO]<id>[/YOUTUBE_VIDEO]`. Rendering needs the reply split
//! into an ordered run of text and video segments.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const VIDEO_OPEN: &str = "[YOUTUBE_VIDEO]";
pub const VIDEO_CLOSE: &str = "[/YOUTUBE_VIDEO]";

static VIDEO_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[YOUTUBE_VIDEO\](.*?)\[/YOUTUBE_VIDEO\]").expect("static pattern is valid")
});

/// Opaque reference to an embedded video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRef(pub String);

impl VideoRef {
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Privacy-enhanced embed URL for the player frame
    pub fn embed_url(&self) -> String {
        format!(
            "https://www.youtube-nocookie.com/embed/{}?rel=0&modestbranding=1",
            self.0.trim()
        )
    }
}

/// One renderable piece of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Video(VideoRef),
}

impl Segment {
    /// Zero-length text between adjacent videos; callers skip these
    pub fn is_blank(&self) -> bool {
        matches!(self, Segment::Text(text) if text.is_empty())
    }
}

/// Split `content` into text and video segments.
///
/// The result always alternates `Text, Video, Text, ..., Text`, so a reply
/// with `n` videos yields `n + 1` text segments, some possibly empty. With
/// no markup the whole input comes back as a single text segment.
pub fn segment(content: &str) -> Vec<Segment> {
    let mut texts = VIDEO_MARKUP.split(content);
    let mut segments = Vec::new();

    // split() yields one more piece than there are matches
    segments.push(Segment::Text(texts.next().unwrap_or_default().to_string()));
    for (captures, text) in VIDEO_MARKUP.captures_iter(content).zip(texts) {
        let id = captures.get(1).map_or("", |m| m.as_str());
        segments.push(Segment::Video(VideoRef(id.to_string())));
        segments.push(Segment::Text(text.to_string()));
    }

    segments
}

/// Concatenated text of a message with video markup removed
pub fn plain_text(content: &str) -> String {
    segment(content)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text(text) => Some(text),
            Segment::Video(_) => None,
        })
        .collect()
}
