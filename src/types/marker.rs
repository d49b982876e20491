use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::anchor::TextRange;
use crate::dom::NodeId;

/// How a marker's position was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPlacement {
    /// Centered on the anchored text itself.
    Exact,
    /// The anchor could not be resolved; centered on the owning message.
    MessageFallback,
}

/// Normalized rail position of one bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPosition {
    pub bookmark_id: String,
    /// Fraction of the scroll rail, in `[0, max_percent]`.
    pub percent: f64,
    pub placement: MarkerPlacement,
}

/// What caused a marker render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTrigger {
    Resize,
    OrientationChange,
    Scroll,
    Mutation,
    StoreChanged,
    ContainerChanged,
}

/// Instructions for bringing a bookmark into view and flashing it.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealPlan {
    pub bookmark_id: String,
    pub message: NodeId,
    pub range: TextRange,
    pub container: NodeId,
    pub target_scroll_top: f64,
    /// Scroll the window rather than the container element.
    pub scroll_window: bool,
    pub flash: Duration,
}
