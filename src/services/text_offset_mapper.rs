//! Text-Offset Mapper.
//!
//! Converts between live selections/ranges and absolute offsets into a message's
//! flattened text. The host decides how a message's visible text is split into
//! nodes, and that split can differ between renders of the same content, so
//! anchors are stored as character offsets into the concatenated text instead of
//! node paths. Every lookup runs against the live document; nothing is cached.

use log::debug;

use crate::dom::{HostDocument, NodeId};
use crate::services::fingerprint;
use crate::types::anchor::{AnchorPayload, HostSelection, TextPoint, TextRange};
use crate::types::errors::AnchorError;
use crate::types::settings::HostSettings;

/// One chunk of a flattened text sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk<N> {
    node: N,
    start: usize,
    len: usize,
}

/// The text under a root, viewed as one sequence of characters.
///
/// Built from `(node, length)` pairs in document order, so it works with any tree
/// representation. Lengths and offsets count `char`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedText<N> {
    chunks: Vec<Chunk<N>>,
    len: usize,
}

impl<N: Copy + PartialEq> FlattenedText<N> {
    /// Builds the sequence from `(node, length)` pairs.
    pub fn from_lengths<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, usize)>,
    {
        let mut chunks = Vec::new();
        let mut len = 0;
        for (node, chunk_len) in pairs {
            chunks.push(Chunk {
                node,
                start: len,
                len: chunk_len,
            });
            len += chunk_len;
        }
        Self { chunks, len }
    }

    /// Builds the sequence from `(node, text)` pairs.
    pub fn from_chunks<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, &'a str)>,
    {
        Self::from_lengths(pairs.into_iter().map(|(n, t)| (n, t.chars().count())))
    }

    /// Total number of characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset of `node_offset` inside `node`, or `None` if `node` is not
    /// one of the chunks or the offset lies past its end.
    pub fn resolve_offset(&self, node: N, node_offset: usize) -> Option<usize> {
        self.chunks
            .iter()
            .find(|c| c.node == node)
            .filter(|c| node_offset <= c.len)
            .map(|c| c.start + node_offset)
    }

    /// Node-local position of absolute offset `abs`, searching from chunk `from`.
    ///
    /// An offset that falls exactly on a chunk boundary binds to the end of the
    /// earlier chunk.
    fn locate_from(&self, from: usize, abs: usize) -> Option<(usize, N, usize)> {
        self.chunks
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, c)| c.start + c.len >= abs)
            .map(|(i, c)| (i, c.node, abs.saturating_sub(c.start)))
    }

    /// Node-local position of an absolute offset.
    pub fn locate(&self, abs: usize) -> Option<(N, usize)> {
        if abs > self.len {
            return None;
        }
        self.locate_from(0, abs).map(|(_, n, o)| (n, o))
    }

    /// Node-local boundaries for `[start, end)`; `None` when the span does not fit.
    pub fn range(&self, start: usize, end: usize) -> Option<((N, usize), (N, usize))> {
        if start > end || end > self.len {
            return None;
        }
        let (idx, start_node, start_offset) = self.locate_from(0, start)?;
        let (_, end_node, end_offset) = self.locate_from(idx, end)?;
        Some(((start_node, start_offset), (end_node, end_offset)))
    }
}

/// Maps selections and stored anchors onto a host document.
#[derive(Debug, Clone)]
pub struct TextOffsetMapper {
    message_id_attribute: String,
    role_attribute: String,
}

impl TextOffsetMapper {
    pub fn new(host: &HostSettings) -> Self {
        Self {
            message_id_attribute: host.message_id_attribute.clone(),
            role_attribute: host.role_attribute.clone(),
        }
    }

    pub fn message_id_attribute(&self) -> &str {
        &self.message_id_attribute
    }

    /// Flattened text of everything under `root`.
    pub fn flatten<D: HostDocument + ?Sized>(&self, doc: &D, root: NodeId) -> FlattenedText<NodeId> {
        FlattenedText::from_chunks(
            doc.text_nodes(root)
                .into_iter()
                .filter_map(|n| doc.text(n).map(|t| (n, t))),
        )
    }

    /// Absolute offset of `(node, node_offset)` within `root`'s flattened text.
    ///
    /// Returns `None` when `node` is not a text node under `root`.
    pub fn resolve_offset<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        root: NodeId,
        node: NodeId,
        node_offset: usize,
    ) -> Option<usize> {
        self.flatten(doc, root).resolve_offset(node, node_offset)
    }

    /// Rebuilds a live range for `[start, end)` of `root`'s flattened text.
    ///
    /// Returns `None` when either boundary lies outside the current text.
    pub fn reconstruct_range<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        root: NodeId,
        start: usize,
        end: usize,
    ) -> Option<TextRange> {
        let ((sn, so), (en, eo)) = self.flatten(doc, root).range(start, end)?;
        Some(TextRange::new(TextPoint::new(sn, so), TextPoint::new(en, eo)))
    }

    /// Exact flattened substring `[start, end)` of `root`.
    pub fn slice_text<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        root: NodeId,
        start: usize,
        end: usize,
    ) -> Option<String> {
        if start > end {
            return None;
        }
        let text: String = doc
            .text_nodes(root)
            .into_iter()
            .filter_map(|n| doc.text(n))
            .collect();
        if end > text.chars().count() {
            return None;
        }
        Some(text.chars().skip(start).take(end - start).collect())
    }

    /// Fingerprint of `[start, end)` in the rendered message `message_id`.
    ///
    /// `None` when the message is not rendered or the span does not fit its text.
    pub fn span_fingerprint<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        message_id: &str,
        start: usize,
        end: usize,
    ) -> Option<String> {
        let message = self.message_element(doc, message_id)?;
        self.slice_text(doc, message, start, end)
            .map(|text| fingerprint::fingerprint(&text))
    }

    /// Element of the message that owns `node`.
    pub fn find_message_element<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        node: NodeId,
    ) -> Option<NodeId> {
        let start = if doc.is_text(node) {
            doc.parent(node)?
        } else {
            node
        };
        doc.closest_with_attribute(start, &self.message_id_attribute)
    }

    /// Element of the message with the given id, if it is currently rendered.
    pub fn message_element<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        message_id: &str,
    ) -> Option<NodeId> {
        doc.find_by_attribute(&self.message_id_attribute, message_id)
    }

    /// Turns the active selection into an anchor payload.
    pub fn build_anchor_from_selection<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        selection: &HostSelection,
    ) -> Result<AnchorPayload, AnchorError> {
        let selected_text = selection.text.trim();
        if selection.is_collapsed() || selected_text.is_empty() {
            return Err(AnchorError::EmptySelection);
        }

        let range = selection.range;
        let message = self
            .find_message_element(doc, range.start.node)
            .ok_or(AnchorError::NoEnclosingMessage)?;
        let message_id = doc
            .attribute(message, &self.message_id_attribute)
            .ok_or(AnchorError::NoEnclosingMessage)?
            .to_string();

        let flat = self.flatten(doc, message);
        let start = flat.resolve_offset(range.start.node, range.start.offset);
        let end = flat.resolve_offset(range.end.node, range.end.offset);
        let (start_abs, end_abs) = match (start, end) {
            (Some(s), Some(e)) if e > s => (s, e),
            (Some(s), Some(e)) => return Err(AnchorError::InvalidOffsets { start: s, end: e }),
            _ => {
                debug!("selection boundary outside message {}", message_id);
                return Err(AnchorError::UnresolvedBoundary);
            }
        };

        let exact = self
            .slice_text(doc, message, start_abs, end_abs)
            .ok_or(AnchorError::InvalidOffsets {
                start: start_abs,
                end: end_abs,
            })?;

        Ok(AnchorPayload {
            role: doc.attribute(message, &self.role_attribute).map(str::to_string),
            message_id,
            start_abs,
            end_abs,
            selected_text: selected_text.to_string(),
            fingerprint: Some(fingerprint::fingerprint(&exact)),
        })
    }
}
