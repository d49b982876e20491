//! Scroll-Container Locator.
//!
//! Finds the element that actually scrolls the transcript. The host page gives
//! no signal when it moves scrolling to a different ancestor, so the locator is
//! paired with [`ScrollContainerPoller`], which re-runs discovery on a fixed
//! period and reports identity changes. Polling is the accepted cost here.

use log::info;

use crate::dom::{HostDocument, NodeId};

/// Returns the nearest scrollable ancestor of the transcript content.
///
/// Starts from the first element carrying `content_attribute` and walks up,
/// returning the first element whose `overflow-y` is `auto` or `scroll` and
/// whose content is taller than its box. Falls back to the document scroller.
pub fn locate_scroll_container<D: HostDocument + ?Sized>(doc: &D, content_attribute: &str) -> NodeId {
    let mut current = doc.first_with_attribute(content_attribute);
    while let Some(node) = current {
        if doc.overflow_y(node).allows_scrolling() && doc.scroll_metrics(node).overflows() {
            return node;
        }
        current = doc.parent(node);
    }
    doc.scrolling_element()
}

/// A change of the transcript's scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerChange {
    pub previous: Option<NodeId>,
    pub current: NodeId,
}

/// Tracks the scroll container across polls.
#[derive(Debug, Clone)]
pub struct ScrollContainerPoller {
    content_attribute: String,
    current: Option<NodeId>,
}

impl ScrollContainerPoller {
    pub fn new(content_attribute: &str) -> Self {
        Self {
            content_attribute: content_attribute.to_string(),
            current: None,
        }
    }

    /// Container seen on the last poll.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// Re-locates the container; returns a change when its identity differs from the last poll.
    pub fn poll<D: HostDocument + ?Sized>(&mut self, doc: &D) -> Option<ContainerChange> {
        let found = locate_scroll_container(doc, &self.content_attribute);
        if self.current == Some(found) {
            return None;
        }
        let previous = self.current.replace(found);
        info!("scroll container changed: {:?} -> {:?}", previous, found);
        Some(ContainerChange {
            previous,
            current: found,
        })
    }

    /// Forgets the last container so the next poll reports a change.
    pub fn reset(&mut self) {
        self.current = None;
    }
}
