//! Marker Position Engine.
//!
//! Places every bookmark on the scroll rail as a fraction of the scrollable
//! content height, and keeps those positions current while the transcript
//! streams, resizes and scrolls. A bookmark whose text can no longer be resolved
//! is placed at the center of its message; it is left out only while the message
//! itself is absent.

use log::debug;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dom::{HostDocument, NodeId};
use crate::managers::bookmark_store::BookmarkStore;
use crate::services::fingerprint;
use crate::services::scheduler::{Debouncer, Subscribers, Subscription};
use crate::services::scroll_locator::locate_scroll_container;
use crate::services::text_offset_mapper::TextOffsetMapper;
use crate::types::anchor::TextRange;
use crate::types::bookmark::Bookmark;
use crate::types::errors::AnchorError;
use crate::types::geometry::{Rect, ScrollMetrics};
use crate::types::marker::{MarkerPlacement, MarkerPosition, RenderTrigger, RevealPlan};
use crate::types::settings::TrailSettings;

/// Geometry of the scroll container needed to place markers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerGeometry {
    /// Viewport y of the container's top edge.
    pub viewport_top: f64,
    pub metrics: ScrollMetrics,
}

impl ContainerGeometry {
    /// Reads the container's geometry. The document scroller's box starts at the viewport top.
    pub fn read<D: HostDocument + ?Sized>(doc: &D, container: NodeId) -> Self {
        let viewport_top = if container == doc.scrolling_element() {
            0.0
        } else {
            doc.bounding_rect(container).top
        };
        Self {
            viewport_top,
            metrics: doc.scroll_metrics(container),
        }
    }

    /// Position of a viewport y inside the container's scrollable content.
    pub fn content_y(&self, viewport_y: f64) -> f64 {
        self.metrics.scroll_top + (viewport_y - self.viewport_top)
    }
}

/// Normalized rail position of `anchor_rect`'s vertical center, clamped to `[0, max_percent]`.
pub fn compute_marker_percent(container: &ContainerGeometry, anchor_rect: &Rect, max_percent: f64) -> f64 {
    let position = container.content_y(anchor_rect.center_y());
    (position / container.metrics.scroll_range()).min(max_percent).max(0.0)
}

/// Resolves bookmarks against the live document.
#[derive(Debug, Clone)]
pub struct MarkerPositionEngine {
    mapper: TextOffsetMapper,
    content_attribute: String,
    max_percent: f64,
    verify_fingerprints: bool,
    flash: std::time::Duration,
}

impl MarkerPositionEngine {
    pub fn new(settings: &TrailSettings) -> Self {
        Self {
            mapper: TextOffsetMapper::new(&settings.host),
            content_attribute: settings.host.message_id_attribute.clone(),
            max_percent: settings.markers.max_percent,
            verify_fingerprints: settings.markers.verify_fingerprints,
            flash: settings.timing.highlight_flash(),
        }
    }

    pub fn mapper(&self) -> &TextOffsetMapper {
        &self.mapper
    }

    pub fn locate_container<D: HostDocument + ?Sized>(&self, doc: &D) -> NodeId {
        locate_scroll_container(doc, &self.content_attribute)
    }

    /// Live range of a bookmark inside its message element.
    ///
    /// Fails with `Stale` when the offsets no longer fit or, if verification is on,
    /// when the text under them no longer matches the stored fingerprint.
    pub fn resolve_range<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        message: NodeId,
        bookmark: &Bookmark,
    ) -> Result<TextRange, AnchorError> {
        let stale = || AnchorError::Stale(bookmark.id.clone());
        let range = self
            .mapper
            .reconstruct_range(doc, message, bookmark.start_abs, bookmark.end_abs)
            .ok_or_else(stale)?;
        if self.verify_fingerprints && bookmark.fingerprint.is_some() {
            let text = self
                .mapper
                .slice_text(doc, message, bookmark.start_abs, bookmark.end_abs)
                .ok_or_else(stale)?;
            if !fingerprint::matches(bookmark.fingerprint.as_deref(), &text) {
                return Err(stale());
            }
        }
        Ok(range)
    }

    /// Rail position of one bookmark, or `None` when its message is not rendered.
    pub fn position_for<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        container: &ContainerGeometry,
        bookmark: &Bookmark,
    ) -> Option<MarkerPosition> {
        let message = self.mapper.message_element(doc, &bookmark.message_id)?;

        let exact = self
            .resolve_range(doc, message, bookmark)
            .ok()
            .and_then(|range| doc.range_rect(&range))
            .filter(|rect| !rect.is_flat());

        let (rect, placement) = match exact {
            Some(rect) => (rect, MarkerPlacement::Exact),
            None => (doc.bounding_rect(message), MarkerPlacement::MessageFallback),
        };

        Some(MarkerPosition {
            bookmark_id: bookmark.id.clone(),
            percent: compute_marker_percent(container, &rect, self.max_percent),
            placement,
        })
    }

    /// Positions of all bookmarks whose message is rendered, in list order.
    pub fn compute_positions<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        container: NodeId,
        bookmarks: &[Bookmark],
    ) -> Vec<MarkerPosition> {
        let geometry = ContainerGeometry::read(doc, container);
        bookmarks
            .iter()
            .filter_map(|b| self.position_for(doc, &geometry, b))
            .collect()
    }

    /// Scroll target that centers the bookmark's text in the container.
    pub fn reveal_plan<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        container: NodeId,
        bookmark: &Bookmark,
    ) -> Result<RevealPlan, AnchorError> {
        let message = self
            .mapper
            .message_element(doc, &bookmark.message_id)
            .ok_or_else(|| AnchorError::MessageMissing(bookmark.message_id.clone()))?;
        let range = self.resolve_range(doc, message, bookmark)?;
        let rect = doc
            .range_rect(&range)
            .ok_or_else(|| AnchorError::Stale(bookmark.id.clone()))?;

        let geometry = ContainerGeometry::read(doc, container);
        let centered = geometry.content_y(rect.center_y()) - geometry.metrics.client_height / 2.0;
        let max_scroll = (geometry.metrics.scroll_height - geometry.metrics.client_height).max(0.0);

        Ok(RevealPlan {
            bookmark_id: bookmark.id.clone(),
            message,
            range,
            container,
            target_scroll_top: centered.clamp(0.0, max_scroll),
            scroll_window: container == doc.scrolling_element() || container == doc.root(),
            flash: self.flash,
        })
    }

    /// Bookmarks ordered by the vertical position of their messages.
    ///
    /// Bookmarks whose message is not rendered keep their relative order after the rest.
    pub fn document_order<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        container: NodeId,
        bookmarks: &[Bookmark],
    ) -> Vec<Bookmark> {
        let geometry = ContainerGeometry::read(doc, container);
        let mut keyed: Vec<(Option<f64>, &Bookmark)> = bookmarks
            .iter()
            .map(|b| {
                let y = self
                    .mapper
                    .message_element(doc, &b.message_id)
                    .map(|m| geometry.content_y(doc.bounding_rect(m).center_y()));
                (y, b)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => a.total_cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        keyed.into_iter().map(|(_, b)| b.clone()).collect()
    }
}

/// Shared, mutable host document.
pub type SharedDocument<D> = Rc<RefCell<D>>;

/// Keeps the rail's marker positions up to date.
///
/// Every trigger (resize, orientation change, container scroll, DOM mutation,
/// store change) funnels into one debounced pass. A pass reads the store and
/// the document as they are when it runs.
pub struct MarkerRenderLoop<D: HostDocument + 'static> {
    engine: MarkerPositionEngine,
    doc: SharedDocument<D>,
    store: BookmarkStore,
    debouncer: Debouncer,
    attached: Cell<Option<NodeId>>,
    markers: RefCell<Rc<[MarkerPosition]>>,
    passes: Cell<u64>,
    subscribers: Subscribers<[MarkerPosition]>,
}

impl<D: HostDocument + 'static> MarkerRenderLoop<D> {
    pub fn new(settings: &TrailSettings, doc: SharedDocument<D>, store: BookmarkStore) -> Rc<Self> {
        Rc::new(Self {
            engine: MarkerPositionEngine::new(settings),
            doc,
            store,
            debouncer: Debouncer::new(settings.timing.render_debounce()),
            attached: Cell::new(None),
            markers: RefCell::new(Rc::from(Vec::new())),
            passes: Cell::new(0),
            subscribers: Subscribers::new(),
        })
    }

    pub fn engine(&self) -> &MarkerPositionEngine {
        &self.engine
    }

    /// Asks for a render pass; requests within the debounce window collapse into one.
    pub fn request(self: &Rc<Self>, trigger: RenderTrigger) {
        debug!("marker render requested: {:?}", trigger);
        let weak = Rc::downgrade(self);
        self.debouncer.schedule(move || {
            if let Some(this) = weak.upgrade() {
                this.render_now();
            }
        });
    }

    /// Scroll event from `source`; ignored unless it is the attached container.
    pub fn on_scroll(self: &Rc<Self>, source: NodeId) {
        if self.attached.get() == Some(source) {
            self.request(RenderTrigger::Scroll);
        }
    }

    /// Starts listening to scroll events of `container` instead of the previous one.
    pub fn attach_container(self: &Rc<Self>, container: NodeId) {
        self.attached.set(Some(container));
        self.request(RenderTrigger::ContainerChanged);
    }

    pub fn attached_container(&self) -> Option<NodeId> {
        self.attached.get()
    }

    /// Runs a pass immediately and publishes the result.
    pub fn render_now(&self) -> Rc<[MarkerPosition]> {
        let bookmarks = self.store.bookmarks();
        let positions: Rc<[MarkerPosition]> = {
            let doc = self.doc.borrow();
            let container = self.engine.locate_container(&*doc);
            Rc::from(self.engine.compute_positions(&*doc, container, &bookmarks))
        };
        self.passes.set(self.passes.get() + 1);
        debug!(
            "marker pass {}: {} of {} bookmark(s) placed",
            self.passes.get(),
            positions.len(),
            bookmarks.len()
        );
        *self.markers.borrow_mut() = Rc::clone(&positions);
        self.subscribers.notify(&positions);
        positions
    }

    /// Result of the latest pass.
    pub fn markers(&self) -> Rc<[MarkerPosition]> {
        Rc::clone(&self.markers.borrow())
    }

    /// Number of passes run so far.
    pub fn pass_count(&self) -> u64 {
        self.passes.get()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[MarkerPosition]) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Drops any pending pass.
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}
