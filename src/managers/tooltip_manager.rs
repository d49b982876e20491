//! Marker tooltip state.
//!
//! Holds what the marker tooltip shows and whether it is editing, independent of
//! how it is drawn. The tooltip follows the store: when its bookmark disappears
//! it closes, otherwise its label is refreshed unless the user is mid-edit.

use std::cell::RefCell;
use std::rc::Rc;

use crate::managers::bookmark_store::BookmarkStore;
use crate::services::scheduler::Subscription;
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;

/// Contents of an open tooltip.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipView {
    pub bookmark_id: String,
    pub label: String,
    /// Text in the edit box while editing.
    pub draft: Option<String>,
    /// Bumped each time the tooltip is re-anchored to its marker.
    pub anchor_generation: u32,
}

impl TooltipView {
    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }
}

pub struct MarkerTooltip {
    store: BookmarkStore,
    view: RefCell<Option<TooltipView>>,
    subscription: RefCell<Option<Subscription>>,
}

impl MarkerTooltip {
    /// Creates the tooltip and subscribes it to `store`.
    pub fn new(store: BookmarkStore) -> Rc<Self> {
        let tooltip = Rc::new(Self {
            store: store.clone(),
            view: RefCell::new(None),
            subscription: RefCell::new(None),
        });
        let weak = Rc::downgrade(&tooltip);
        let sub = store.subscribe(move |bookmarks| {
            if let Some(this) = weak.upgrade() {
                this.sync(bookmarks);
            }
        });
        *tooltip.subscription.borrow_mut() = Some(sub);
        tooltip
    }

    /// Opens the tooltip for `bookmark`; if it is already open for it, only re-anchors.
    pub fn open(&self, bookmark: &Bookmark) {
        let mut view = self.view.borrow_mut();
        if let Some(v) = view.as_mut() {
            if v.bookmark_id == bookmark.id {
                v.anchor_generation += 1;
                return;
            }
        }
        *view = Some(TooltipView {
            bookmark_id: bookmark.id.clone(),
            label: bookmark.label().to_string(),
            draft: None,
            anchor_generation: 0,
        });
    }

    pub fn close(&self) {
        *self.view.borrow_mut() = None;
    }

    pub fn is_open(&self) -> bool {
        self.view.borrow().is_some()
    }

    pub fn active_bookmark_id(&self) -> Option<String> {
        self.view.borrow().as_ref().map(|v| v.bookmark_id.clone())
    }

    pub fn view(&self) -> Option<TooltipView> {
        self.view.borrow().clone()
    }

    /// Enters edit mode with the current label as draft.
    pub fn begin_edit(&self) {
        if let Some(v) = self.view.borrow_mut().as_mut() {
            v.draft = Some(v.label.clone());
        }
    }

    pub fn set_draft(&self, text: &str) {
        if let Some(v) = self.view.borrow_mut().as_mut() {
            if v.draft.is_some() {
                v.draft = Some(text.to_string());
            }
        }
    }

    /// Leaves edit mode without saving and closes.
    pub fn cancel_edit(&self) {
        self.close();
    }

    /// Saves the draft as the bookmark description and closes.
    ///
    /// A blank draft leaves the description unchanged.
    pub fn save_edit(&self) -> Result<(), StoreError> {
        let (id, draft) = match self.view.borrow().as_ref() {
            Some(TooltipView {
                bookmark_id,
                draft: Some(draft),
                ..
            }) => (bookmark_id.clone(), draft.clone()),
            _ => return Ok(()),
        };
        self.close();
        match self.store.update_description(&id, &draft) {
            Err(StoreError::EmptyDescription) => Ok(()),
            other => other,
        }
    }

    /// Deletes the tooltip's bookmark; the store notification closes the tooltip.
    pub fn delete(&self) -> Result<(), StoreError> {
        match self.active_bookmark_id() {
            Some(id) => {
                let result = self.store.remove(&id);
                self.close();
                result
            }
            None => Ok(()),
        }
    }

    /// Stops following the store.
    pub fn detach(&self) {
        if let Some(sub) = self.subscription.borrow_mut().take() {
            sub.unsubscribe();
        }
    }

    fn sync(&self, bookmarks: &[Bookmark]) {
        let mut view = self.view.borrow_mut();
        let Some(v) = view.as_mut() else {
            return;
        };
        match bookmarks.iter().find(|b| b.id == v.bookmark_id) {
            None => *view = None,
            Some(b) => {
                if !v.is_editing() {
                    v.label = b.label().to_string();
                }
            }
        }
    }
}
