//! Selection Lifecycle Tracker.
//!
//! Turns bursts of raw `selectionchange` / pointer-up signals into one stable
//! anchor candidate. Each signal restarts the debounce window; when it expires
//! the selection is resolved once and subscribers learn the outcome
//! (`Some(payload)` or `None`).

use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::HostDocument;
use crate::services::marker_engine::SharedDocument;
use crate::services::scheduler::{Debouncer, Subscribers, Subscription};
use crate::services::text_offset_mapper::TextOffsetMapper;
use crate::types::anchor::AnchorPayload;
use crate::types::errors::AnchorError;
use crate::types::settings::TrailSettings;

/// Where the tracker is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    /// No usable selection.
    Idle,
    /// A signal arrived; resolution is waiting for the debounce window.
    Pending,
    /// The selection resolved to an anchor.
    Ready(AnchorPayload),
}

pub struct SelectionTracker<D: HostDocument + 'static> {
    doc: SharedDocument<D>,
    mapper: TextOffsetMapper,
    debouncer: Debouncer,
    state: RefCell<SelectionState>,
    subscribers: Subscribers<Option<AnchorPayload>>,
}

impl<D: HostDocument + 'static> SelectionTracker<D> {
    pub fn new(settings: &TrailSettings, doc: SharedDocument<D>) -> Rc<Self> {
        Rc::new(Self {
            doc,
            mapper: TextOffsetMapper::new(&settings.host),
            debouncer: Debouncer::new(settings.timing.selection_debounce()),
            state: RefCell::new(SelectionState::Idle),
            subscribers: Subscribers::new(),
        })
    }

    /// Raw selection-change or pointer-up signal.
    pub fn on_selection_event(self: &Rc<Self>) {
        *self.state.borrow_mut() = SelectionState::Pending;
        let weak = Rc::downgrade(self);
        self.debouncer.schedule(move || {
            if let Some(this) = weak.upgrade() {
                this.recompute();
            }
        });
    }

    /// Resolves the current selection now, updates the state and notifies.
    pub fn recompute(&self) -> Option<AnchorPayload> {
        let result = self.resolve();
        let payload = match result {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("no anchor candidate: {}", e);
                None
            }
        };
        *self.state.borrow_mut() = match &payload {
            Some(p) => SelectionState::Ready(p.clone()),
            None => SelectionState::Idle,
        };
        self.subscribers.notify(&payload);
        payload
    }

    /// Maps the live selection to an anchor without touching the tracker state.
    pub fn resolve(&self) -> Result<AnchorPayload, AnchorError> {
        let doc = self.doc.borrow();
        let selection = doc.selection().ok_or(AnchorError::EmptySelection)?;
        self.mapper.build_anchor_from_selection(&*doc, &selection)
    }

    pub fn state(&self) -> SelectionState {
        self.state.borrow().clone()
    }

    /// Anchor of the last successful resolution, if the tracker is `Ready`.
    pub fn current_anchor(&self) -> Option<AnchorPayload> {
        match &*self.state.borrow() {
            SelectionState::Ready(p) => Some(p.clone()),
            _ => None,
        }
    }

    /// Drops the candidate, e.g. after it was turned into a bookmark.
    pub fn reset(&self) {
        self.debouncer.cancel();
        *self.state.borrow_mut() = SelectionState::Idle;
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Option<AnchorPayload>) + 'static,
    {
        self.subscribers.subscribe(callback)
    }
}
