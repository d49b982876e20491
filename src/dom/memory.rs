//! In-memory host document.
//!
//! An arena-backed tree with explicit layout: every node carries the rectangle,
//! overflow style and scroll metrics the host would report for it. Used by tests,
//! the demo binary, and hosts that ship a serialized snapshot of their transcript.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{HostDocument, NodeId};
use crate::services::text_offset_mapper::FlattenedText;
use crate::types::anchor::{HostSelection, TextPoint, TextRange};
use crate::types::geometry::{Overflow, Rect, ScrollMetrics};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    #[serde(default)]
    rect: Rect,
    #[serde(default)]
    overflow_y: Overflow,
    #[serde(default)]
    metrics: ScrollMetrics,
}

impl MemoryNode {
    fn new(parent: Option<NodeId>, data: NodeData) -> Self {
        Self {
            parent,
            children: Vec::new(),
            data,
            rect: Rect::default(),
            overflow_y: Overflow::Visible,
            metrics: ScrollMetrics::default(),
        }
    }
}

/// Synthetic document tree implementing [`HostDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    nodes: Vec<MemoryNode>,
    selection: Option<TextRange>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Creates a document holding only an `html` element, which is also the scrolling element.
    pub fn new() -> Self {
        let root = MemoryNode::new(
            None,
            NodeData::Element {
                tag: "html".to_string(),
                attributes: BTreeMap::new(),
            },
        );
        Self {
            nodes: vec![root],
            selection: None,
        }
    }

    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemoryNode::new(Some(parent), data));
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id.0)
    }

    /// Appends a new element under `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(
            parent,
            NodeData::Element {
                tag: tag.to_string(),
                attributes: BTreeMap::new(),
            },
        )
    }

    /// Appends a new text node under `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Text(text.to_string()))
    }

    /// Sets an attribute on an element. Ignored for text nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(MemoryNode {
            data: NodeData::Element { attributes, .. },
            ..
        }) = self.node_mut(node)
        {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// Replaces the character data of a text node. Ignored for elements.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(MemoryNode {
            data: NodeData::Text(t),
            ..
        }) = self.node_mut(node)
        {
            *t = text.to_string();
        }
    }

    /// Detaches `node` (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        let parent = match self.node_mut(node) {
            Some(n) => n.parent.take(),
            None => return,
        };
        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.retain(|c| *c != node);
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(n) = self.node_mut(node) {
            n.rect = rect;
        }
    }

    pub fn set_overflow_y(&mut self, node: NodeId, overflow: Overflow) {
        if let Some(n) = self.node_mut(node) {
            n.overflow_y = overflow;
        }
    }

    pub fn set_scroll_metrics(&mut self, node: NodeId, metrics: ScrollMetrics) {
        if let Some(n) = self.node_mut(node) {
            n.metrics = metrics;
        }
    }

    /// Updates only `scrollTop`, leaving content and client heights untouched.
    pub fn set_scroll_top(&mut self, node: NodeId, scroll_top: f64) {
        if let Some(n) = self.node_mut(node) {
            n.metrics.scroll_top = scroll_top;
        }
    }

    /// Makes `range` the active selection.
    pub fn select(&mut self, range: TextRange) {
        self.selection = Some(range);
    }

    /// Selects `[start, end)` of the flattened text under `root`.
    pub fn select_offsets(&mut self, root: NodeId, start: usize, end: usize) -> bool {
        let flat = self.flatten(root);
        match flat.range(start, end) {
            Some((s, e)) => {
                self.selection = Some(TextRange::new(
                    TextPoint::new(s.0, s.1),
                    TextPoint::new(e.0, e.1),
                ));
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Concatenated text content of `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        self.text_nodes(node)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    fn flatten(&self, root: NodeId) -> FlattenedText<NodeId> {
        FlattenedText::from_chunks(
            self.text_nodes(root)
                .into_iter()
                .filter_map(|n| self.text(n).map(|t| (n, t))),
        )
    }

    fn range_text(&self, range: &TextRange) -> String {
        let root = self.root();
        let flat = self.flatten(root);
        let start = flat.resolve_offset(range.start.node, range.start.offset);
        let end = flat.resolve_offset(range.end.node, range.end.offset);
        match (start, end) {
            (Some(s), Some(e)) if e > s => self
                .text_content(root)
                .chars()
                .skip(s)
                .take(e - s)
                .collect(),
            _ => String::new(),
        }
    }
}

impl HostDocument for MemoryDocument {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn scrolling_element(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.node(node).map(|n| &n.data) {
            Some(NodeData::Element { attributes, .. }) => attributes.get(name).map(|v| v.as_str()),
            _ => None,
        }
    }

    fn overflow_y(&self, node: NodeId) -> Overflow {
        self.node(node).map(|n| n.overflow_y).unwrap_or_default()
    }

    fn scroll_metrics(&self, node: NodeId) -> ScrollMetrics {
        self.node(node).map(|n| n.metrics).unwrap_or_default()
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.node(node).map(|n| n.rect).unwrap_or_default()
    }

    fn range_rect(&self, range: &TextRange) -> Option<Rect> {
        let texts = self.text_nodes(self.root());
        let first = texts.iter().position(|n| *n == range.start.node)?;
        let last = texts.iter().position(|n| *n == range.end.node)?;
        if last < first {
            return None;
        }
        let rect = texts[first..=last]
            .iter()
            .map(|n| self.bounding_rect(*n))
            .filter(|r| !r.is_flat())
            .reduce(|acc, r| acc.union(&r));
        Some(rect.unwrap_or_default())
    }

    fn selection(&self) -> Option<HostSelection> {
        let range = self.selection?;
        Some(HostSelection {
            range,
            text: self.range_text(&range),
        })
    }
}
