//! Session core for PromptTrail.
//!
//! A [`TrailSession`] owns one of everything for the page it is attached to: the
//! bookmark store, the selection tracker, the marker render loop and the tooltip
//! state. Host events are fed in through [`TrailSession::handle_event`]; the
//! background drivers (container poller, write-behind) start with
//! [`TrailSession::start`] and stop with [`TrailSession::dispose`].
//!
//! Everything is single-threaded. The session must be driven from within a
//! `tokio::task::LocalSet`, since store changes schedule debounced render passes.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::database::{Database, SqliteStorage, StorageBackend};
use crate::dom::{HostDocument, NodeId};
use crate::managers::bookmark_store::{spawn_write_behind, BookmarkStore, Snapshot};
use crate::managers::tooltip_manager::MarkerTooltip;
use crate::platform;
use crate::services::marker_engine::{MarkerRenderLoop, SharedDocument};
use crate::services::scheduler::{spawn_poller, Subscription};
use crate::services::scroll_locator::{ContainerChange, ScrollContainerPoller};
use crate::services::selection_tracker::SelectionTracker;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::anchor::{AnchorPayload, TextRange};
use crate::types::bookmark::{conversation_id_from_path, Bookmark};
use crate::types::errors::{AnchorError, PersistenceError, StoreError};
use crate::types::marker::{MarkerPosition, RenderTrigger, RevealPlan};
use crate::types::settings::{StorageSettings, TrailSettings};

/// Signals the host page forwards to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SelectionChanged,
    PointerUp,
    Resize,
    OrientationChange,
    /// A scroll event from the given element.
    Scroll(NodeId),
    /// A subtree mutation under the given node.
    Mutation(NodeId),
    /// The page location changed to the given path.
    Navigated(String),
}

/// Reads settings from `path_override` or the platform config file.
///
/// A missing or unreadable file yields defaults.
pub fn load_settings(path_override: Option<String>) -> TrailSettings {
    let mut engine = SettingsEngine::new(path_override);
    match engine.load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("ignoring settings at {}: {}", engine.get_config_path(), e);
            TrailSettings::default()
        }
    }
}

/// Opens the SQLite backend described by `storage`.
///
/// `Ok(None)` means persistence is disabled. Failures are only logged at debug
/// level here; the store built from them owns the single user-facing warning.
pub fn open_storage(
    storage: &StorageSettings,
) -> Result<Option<Box<dyn StorageBackend>>, PersistenceError> {
    if !storage.enabled {
        debug!("bookmark persistence disabled by settings");
        return Ok(None);
    }
    let path = storage
        .database_path
        .as_ref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(platform::default_database_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            debug!("cannot create data directory {}: {}", parent.display(), e);
            PersistenceError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let db = Database::open(&path).map_err(|e| {
        debug!("cannot open bookmark database {}: {}", path.display(), e);
        PersistenceError::from(e)
    })?;
    Ok(Some(Box::new(SqliteStorage::new(db))))
}

/// All per-page state of the engine.
pub struct TrailSession<D: HostDocument + 'static> {
    settings: TrailSettings,
    doc: SharedDocument<D>,
    store: BookmarkStore,
    tracker: Rc<SelectionTracker<D>>,
    markers: Rc<MarkerRenderLoop<D>>,
    tooltip: Rc<MarkerTooltip>,
    poller: RefCell<ScrollContainerPoller>,
    drivers: RefCell<Vec<JoinHandle<()>>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<D: HostDocument + 'static> TrailSession<D> {
    /// Wires the components together. No conversation is loaded yet.
    pub fn new(
        settings: TrailSettings,
        doc: SharedDocument<D>,
        backend: Option<Box<dyn StorageBackend>>,
    ) -> Rc<Self> {
        let store = BookmarkStore::new(backend, &settings.storage.namespace);
        Self::with_store(settings, doc, store)
    }

    /// Session whose store persists to the backend configured in `settings.storage`.
    pub fn with_configured_storage(settings: TrailSettings, doc: SharedDocument<D>) -> Rc<Self> {
        let namespace = settings.storage.namespace.clone();
        let store = match open_storage(&settings.storage) {
            Ok(Some(backend)) => BookmarkStore::new(Some(backend), &namespace),
            Ok(None) => BookmarkStore::memory_only(&namespace),
            Err(e) => BookmarkStore::unavailable(&e.to_string(), &namespace),
        };
        Self::with_store(settings, doc, store)
    }

    fn with_store(settings: TrailSettings, doc: SharedDocument<D>, store: BookmarkStore) -> Rc<Self> {
        let tracker = SelectionTracker::new(&settings, Rc::clone(&doc));
        let markers = MarkerRenderLoop::new(&settings, Rc::clone(&doc), store.clone());
        let tooltip = MarkerTooltip::new(store.clone());

        let weak_markers = Rc::downgrade(&markers);
        let rerender = store.subscribe(move |_| {
            if let Some(markers) = weak_markers.upgrade() {
                markers.request(RenderTrigger::StoreChanged);
            }
        });

        Rc::new(Self {
            poller: RefCell::new(ScrollContainerPoller::new(&settings.host.message_id_attribute)),
            settings,
            doc,
            store,
            tracker,
            markers,
            tooltip,
            drivers: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(vec![rerender]),
        })
    }

    pub fn settings(&self) -> &TrailSettings {
        &self.settings
    }

    pub fn document(&self) -> &SharedDocument<D> {
        &self.doc
    }

    pub fn store(&self) -> &BookmarkStore {
        &self.store
    }

    pub fn tracker(&self) -> &Rc<SelectionTracker<D>> {
        &self.tracker
    }

    pub fn markers(&self) -> &Rc<MarkerRenderLoop<D>> {
        &self.markers
    }

    pub fn tooltip(&self) -> &Rc<MarkerTooltip> {
        &self.tooltip
    }

    /// Loads the bookmarks of the conversation at `path` unless it is already loaded.
    ///
    /// Returns the conversation id.
    pub fn enter_conversation(&self, path: &str) -> String {
        let conversation_id = conversation_id_from_path(path);
        if self.store.conversation_id().as_deref() == Some(conversation_id.as_str()) {
            return conversation_id;
        }
        info!("entering conversation {}", conversation_id);
        self.tooltip.close();
        self.tracker.reset();
        self.store.load(&conversation_id);
        conversation_id
    }

    /// Starts the container poller and the write-behind driver.
    pub fn start(self: &Rc<Self>) {
        let mut drivers = self.drivers.borrow_mut();
        if !drivers.is_empty() {
            return;
        }
        let weak = Rc::downgrade(self);
        drivers.push(spawn_poller(self.settings.timing.container_poll(), move || {
            match weak.upgrade() {
                Some(session) => {
                    session.poll_scroll_container();
                    true
                }
                None => false,
            }
        }));
        drivers.push(spawn_write_behind(&self.store));
    }

    /// Re-locates the scroll container and re-attaches the render loop when it changed.
    pub fn poll_scroll_container(&self) -> Option<ContainerChange> {
        let change = {
            let doc = self.doc.borrow();
            self.poller.borrow_mut().poll(&*doc)
        };
        if let Some(change) = change {
            self.markers.attach_container(change.current);
        }
        change
    }

    /// Dispatches one host signal.
    pub fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::SelectionChanged | HostEvent::PointerUp => self.tracker.on_selection_event(),
            HostEvent::Resize => self.markers.request(RenderTrigger::Resize),
            HostEvent::OrientationChange => self.markers.request(RenderTrigger::OrientationChange),
            HostEvent::Scroll(source) => self.markers.on_scroll(source),
            HostEvent::Mutation(target) => {
                // Located afresh: the host may have swapped containers since the last poll.
                let inside = {
                    let doc = self.doc.borrow();
                    let root = self.markers.engine().locate_container(&*doc);
                    doc.is_ancestor_or_self(root, target)
                };
                if inside {
                    self.markers.request(RenderTrigger::Mutation);
                }
            }
            HostEvent::Navigated(path) => {
                self.enter_conversation(&path);
            }
        }
    }

    // === Produced interface ===

    pub fn bookmarks(&self) -> Snapshot {
        self.store.bookmarks()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Bookmark]) + 'static,
    {
        self.store.subscribe(callback)
    }

    pub fn add(&self, bookmark: Bookmark) -> Result<(), StoreError> {
        self.store.add(bookmark)
    }

    pub fn update_description(&self, id: &str, desc: &str) -> Result<(), StoreError> {
        self.store.update_description(id, desc)
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.store.remove(id)
    }

    /// Maps the live selection to an anchor payload, bypassing the debounce.
    pub fn resolve_anchor_from_selection(&self) -> Result<AnchorPayload, AnchorError> {
        self.tracker.resolve()
    }

    /// Bookmarks the live selection.
    ///
    /// An anchor that is already bookmarked yields the existing bookmark.
    pub fn bookmark_selection(&self, desc: Option<&str>) -> Result<Bookmark, AnchorError> {
        let payload = self.resolve_anchor_from_selection()?;
        let bookmark = Bookmark::from_anchor(&payload, desc);
        let stored = match self.store.add(bookmark.clone()) {
            Ok(()) => bookmark,
            Err(StoreError::DuplicateAnchor(existing)) => self
                .store
                .get(&existing)
                .ok_or(AnchorError::UnknownBookmark(existing))?,
            Err(e) => {
                debug!("selection not bookmarked: {}", e);
                return Err(AnchorError::InvalidOffsets {
                    start: payload.start_abs,
                    end: payload.end_abs,
                });
            }
        };
        self.tracker.reset();
        Ok(stored)
    }

    /// Live range of bookmark `id`.
    pub fn reconstruct_range_for_bookmark(&self, id: &str) -> Result<TextRange, AnchorError> {
        let bookmark = self
            .store
            .get(id)
            .ok_or_else(|| AnchorError::UnknownBookmark(id.to_string()))?;
        let doc = self.doc.borrow();
        let engine = self.markers.engine();
        let message = engine
            .mapper()
            .message_element(&*doc, &bookmark.message_id)
            .ok_or_else(|| AnchorError::MessageMissing(bookmark.message_id.clone()))?;
        engine.resolve_range(&*doc, message, &bookmark)
    }

    /// Scroll target and highlight for bookmark `id`.
    pub fn reveal_bookmark(&self, id: &str) -> Result<RevealPlan, AnchorError> {
        let bookmark = self
            .store
            .get(id)
            .ok_or_else(|| AnchorError::UnknownBookmark(id.to_string()))?;
        let doc = self.doc.borrow();
        let engine = self.markers.engine();
        let container = engine.locate_container(&*doc);
        engine.reveal_plan(&*doc, container, &bookmark)
    }

    /// Runs a render pass now.
    pub fn compute_markers(&self) -> Rc<[MarkerPosition]> {
        self.markers.render_now()
    }

    /// Bookmarks in transcript order, for the index list.
    pub fn ordered_bookmarks(&self) -> Vec<Bookmark> {
        let bookmarks = self.store.bookmarks();
        let doc = self.doc.borrow();
        let engine = self.markers.engine();
        let container = engine.locate_container(&*doc);
        engine.document_order(&*doc, container, &bookmarks)
    }

    pub fn locate_scroll_container(&self) -> NodeId {
        let doc = self.doc.borrow();
        self.markers.engine().locate_container(&*doc)
    }

    /// Stops the drivers, flushes pending writes and detaches every subscriber.
    pub fn dispose(&self) {
        for handle in self.drivers.borrow_mut().drain(..) {
            handle.abort();
        }
        for sub in self.subscriptions.borrow_mut().drain(..) {
            sub.unsubscribe();
        }
        self.markers.cancel();
        self.tracker.reset();
        self.tooltip.detach();
        self.store.close();
        info!("session disposed");
    }
}
