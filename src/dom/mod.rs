//! Host document abstraction.
//!
//! The transcript lives in a page this crate does not control. Everything the core
//! needs from that page goes through [`HostDocument`], so the offset mapper, the
//! scroll-container locator and the marker engine run the same way against a live
//! browser bridge or against the in-memory [`MemoryDocument`].

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::types::anchor::{HostSelection, TextRange};
use crate::types::geometry::{Overflow, Rect, ScrollMetrics};

pub use memory::MemoryDocument;

/// Opaque handle to a node of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Read-only view of the host page.
pub trait HostDocument {
    /// The document element.
    fn root(&self) -> NodeId;
    /// Element that scrolls the whole page (`document.scrollingElement`).
    fn scrolling_element(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    /// Character data of a text node; `None` for elements.
    fn text(&self, node: NodeId) -> Option<&str>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    /// Computed `overflow-y`.
    fn overflow_y(&self, node: NodeId) -> Overflow;
    fn scroll_metrics(&self, node: NodeId) -> ScrollMetrics;
    /// Bounding box in viewport coordinates.
    fn bounding_rect(&self, node: NodeId) -> Rect;
    /// Bounding box of a live range, or `None` if its boundaries are detached.
    fn range_rect(&self, range: &TextRange) -> Option<Rect>;
    /// The first range of the active selection.
    fn selection(&self) -> Option<HostSelection>;

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    /// Pre-order traversal starting at (and including) `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = self.children(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Text nodes under `root` in document order.
    fn text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    /// First element in document order carrying `name`.
    fn first_with_attribute(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.attribute(*n, name).is_some())
    }

    /// First element in document order whose `name` attribute equals `value`.
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.attribute(*n, name) == Some(value))
    }

    /// Nearest ancestor-or-self element carrying `name`.
    fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if !self.is_text(n) && self.attribute(n, name).is_some() {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }
}
