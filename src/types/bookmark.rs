use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::anchor::AnchorPayload;

/// Maximum number of whitespace-separated words in a bookmark label.
pub const DESCRIPTION_WORD_LIMIT: usize = 10;

/// Conversation key used when the location carries no conversation segment.
pub const UNKNOWN_CONVERSATION: &str = "unknown";

/// Represents a saved text anchor inside one transcript message.
///
/// Only `desc` changes after creation; the message id and offsets are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: String,
    pub message_id: String,
    #[serde(default)]
    pub role: Option<String>,
    pub start_abs: usize,
    pub end_abs: usize,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub preview: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Bookmark {
    /// Builds a new bookmark from a resolved anchor.
    ///
    /// `desc` is truncated to [`DESCRIPTION_WORD_LIMIT`] words; when it is missing or
    /// blank the preview derived from the selected text is used instead.
    pub fn from_anchor(payload: &AnchorPayload, desc: Option<&str>) -> Self {
        let preview = default_description(&payload.selected_text);
        let desc = desc
            .and_then(normalize_description)
            .unwrap_or_else(|| preview.clone());

        Self {
            id: Uuid::new_v4().to_string(),
            message_id: payload.message_id.clone(),
            role: payload.role.clone(),
            start_abs: payload.start_abs,
            end_abs: payload.end_abs,
            desc,
            preview,
            created_at: now_millis(),
            fingerprint: payload.fingerprint.clone(),
        }
    }

    /// Text shown for this bookmark in markers and lists.
    pub fn label(&self) -> &str {
        if !self.desc.is_empty() {
            &self.desc
        } else if !self.preview.is_empty() {
            &self.preview
        } else {
            "Bookmark"
        }
    }

    /// True when both anchors point at the same span of the same message.
    pub fn same_anchor(&self, other: &Bookmark) -> bool {
        self.message_id == other.message_id
            && self.start_abs == other.start_abs
            && self.end_abs == other.end_abs
    }

    pub fn has_valid_offsets(&self) -> bool {
        self.start_abs < self.end_abs
    }
}

/// Default label for a selection: its first ten words, single-space joined.
pub fn default_description(text: &str) -> String {
    text.split_whitespace()
        .take(DESCRIPTION_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes user-entered label text. Returns `None` when nothing is left.
pub fn normalize_description(text: &str) -> Option<String> {
    let desc = default_description(text);
    if desc.is_empty() {
        None
    } else {
        Some(desc)
    }
}

/// Derives the conversation key from a location path such as `/c/abc-123`.
///
/// The first `/c/` segment followed by at least one `[A-Za-z0-9-]` character wins.
pub fn conversation_id_from_path(path: &str) -> String {
    for (idx, _) in path.match_indices("/c/") {
        let id: String = path[idx + 3..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if !id.is_empty() {
            return id;
        }
    }
    UNKNOWN_CONVERSATION.to_string()
}

/// Returns the current UNIX timestamp in milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
