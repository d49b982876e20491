use serde::{Deserialize, Serialize};

use crate::dom::NodeId;

/// One boundary of a live range: a text node and a character offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A live range over the host document, expressed with node-local offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPoint,
    pub end: TextPoint,
}

impl TextRange {
    pub fn new(start: TextPoint, end: TextPoint) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// The active selection as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSelection {
    pub range: TextRange,
    /// Stringified selection, as the host renders it.
    pub text: String,
}

impl HostSelection {
    pub fn is_collapsed(&self) -> bool {
        self.range.is_collapsed()
    }
}

/// A resolved selection candidate, ready to become a bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPayload {
    pub message_id: String,
    pub role: Option<String>,
    pub start_abs: usize,
    pub end_abs: usize,
    /// Trimmed selection text.
    pub selected_text: String,
    /// Digest of the exact flattened text between the two offsets, when known.
    #[serde(default)]
    pub fingerprint: Option<String>,
}
