//! Bookmark Store for PromptTrail.
//!
//! The single in-memory bookmark list of the current conversation. Mutations are
//! applied synchronously and subscribers are notified right away; persistence is
//! write-behind: each mutation queues the whole list for its conversation and a
//! local task (see [`spawn_write_behind`]) drains the queue, after which
//! subscribers get a confirmatory notification. A failing or missing backend
//! turns the store memory-only for the rest of the session with one warning.

use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::database::storage::{self, StorageBackend};
use crate::services::scheduler::{Subscribers, Subscription};
use crate::types::bookmark::{normalize_description, Bookmark};
use crate::types::errors::{PersistenceError, StoreError};

/// Read-only view of the bookmark list handed to readers and subscribers.
pub type Snapshot = Rc<[Bookmark]>;

struct PendingWrite {
    conversation_id: String,
    bookmarks: Snapshot,
}

struct Persistence {
    backend: Option<Box<dyn StorageBackend>>,
    /// Why there is no backend; `None` when persistence was switched off on purpose.
    missing: Option<String>,
    namespace: String,
    queue: Vec<PendingWrite>,
    warned: bool,
}

impl Persistence {
    /// Switches to memory-only operation, warning once per session.
    fn degrade(&mut self, reason: &str) {
        self.backend = None;
        self.missing.get_or_insert_with(|| reason.to_string());
        self.queue.clear();
        if !self.warned {
            self.warned = true;
            warn!("bookmark persistence unavailable, keeping bookmarks in memory only: {}", reason);
        }
    }
}

struct StoreState {
    conversation_id: Option<String>,
    bookmarks: Vec<Bookmark>,
    snapshot: Snapshot,
}

struct StoreInner {
    state: RefCell<StoreState>,
    persistence: RefCell<Persistence>,
    subscribers: Subscribers<[Bookmark]>,
    write_signal: Rc<Notify>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        // Wakes the write-behind task so it can observe the store is gone.
        self.write_signal.notify_one();
    }
}

/// Shared handle to the bookmark store. Clones refer to the same store.
#[derive(Clone)]
pub struct BookmarkStore {
    inner: Rc<StoreInner>,
}

/// Non-owning handle, used by background tasks so they don't keep a store alive.
#[derive(Clone)]
pub struct WeakBookmarkStore {
    inner: Weak<StoreInner>,
}

impl WeakBookmarkStore {
    pub fn upgrade(&self) -> Option<BookmarkStore> {
        self.inner.upgrade().map(|inner| BookmarkStore { inner })
    }
}

impl BookmarkStore {
    /// Creates an empty store. `backend: None` makes it memory-only and counts
    /// as unavailable persistence, warned about on first load.
    pub fn new(backend: Option<Box<dyn StorageBackend>>, namespace: &str) -> Self {
        let missing = backend.is_none().then(|| "no storage backend".to_string());
        Self::with_persistence(backend, missing, namespace)
    }

    /// Memory-only store for a session whose backend failed to open for `reason`.
    pub fn unavailable(reason: &str, namespace: &str) -> Self {
        Self::with_persistence(None, Some(reason.to_string()), namespace)
    }

    /// Memory-only store for a session with persistence disabled. Never warns.
    pub fn memory_only(namespace: &str) -> Self {
        Self::with_persistence(None, None, namespace)
    }

    fn with_persistence(
        backend: Option<Box<dyn StorageBackend>>,
        missing: Option<String>,
        namespace: &str,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(StoreState {
                    conversation_id: None,
                    bookmarks: Vec::new(),
                    snapshot: Rc::from(Vec::new()),
                }),
                persistence: RefCell::new(Persistence {
                    backend,
                    missing,
                    namespace: namespace.to_string(),
                    queue: Vec::new(),
                    warned: false,
                }),
                subscribers: Subscribers::new(),
                write_signal: Rc::new(Notify::new()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakBookmarkStore {
        WeakBookmarkStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Conversation whose list is currently held, if one was loaded.
    pub fn conversation_id(&self) -> Option<String> {
        self.inner.state.borrow().conversation_id.clone()
    }

    /// Whether writes still reach a backend.
    pub fn is_persistent(&self) -> bool {
        self.inner.persistence.borrow().backend.is_some()
    }

    /// Replaces the in-memory list with the persisted list for `conversation_id`.
    ///
    /// Pending writes are flushed first so the read observes them. Backend failures
    /// leave an empty list and degrade the store to memory-only.
    pub fn load(&self, conversation_id: &str) {
        self.flush_writes();

        let loaded = {
            let mut persistence = self.inner.persistence.borrow_mut();
            let result = match (persistence.backend.as_deref(), &persistence.missing) {
                (Some(backend), _) => Some(storage::read_conversation(
                    backend,
                    &persistence.namespace,
                    conversation_id,
                )),
                (None, Some(reason)) => Some(Err(PersistenceError::Unavailable(reason.clone()))),
                (None, None) => None,
            };
            match result {
                None => Vec::new(),
                Some(Ok(loaded)) => {
                    if loaded.discarded > 0 {
                        warn!(
                            "dropped {} unreadable bookmark(s) for conversation {}",
                            loaded.discarded, conversation_id
                        );
                    }
                    loaded.bookmarks
                }
                Some(Err(e)) => {
                    persistence.degrade(&e.to_string());
                    Vec::new()
                }
            }
        };

        info!(
            "loaded {} bookmark(s) for conversation {}",
            loaded.len(),
            conversation_id
        );
        {
            let mut state = self.inner.state.borrow_mut();
            state.conversation_id = Some(conversation_id.to_string());
            state.snapshot = Rc::from(loaded.clone());
            state.bookmarks = loaded;
        }
        self.notify();
    }

    /// Current list, in insertion order.
    pub fn bookmarks(&self) -> Snapshot {
        Rc::clone(&self.inner.state.borrow().snapshot)
    }

    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.inner
            .state
            .borrow()
            .bookmarks
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a bookmark. Anchors already present (same message and offsets) are rejected.
    pub fn add(&self, bookmark: Bookmark) -> Result<(), StoreError> {
        if !bookmark.has_valid_offsets() {
            return Err(StoreError::InvalidAnchor {
                start: bookmark.start_abs,
                end: bookmark.end_abs,
            });
        }
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(existing) = state.bookmarks.iter().find(|b| b.same_anchor(&bookmark)) {
                debug!("ignoring duplicate anchor for bookmark {}", existing.id);
                return Err(StoreError::DuplicateAnchor(existing.id.clone()));
            }
            if state.bookmarks.iter().any(|b| b.id == bookmark.id) {
                return Err(StoreError::DuplicateId(bookmark.id));
            }
            state.bookmarks.push(bookmark);
        }
        self.commit();
        Ok(())
    }

    /// Changes only the description of bookmark `id`.
    pub fn update_description(&self, id: &str, desc: &str) -> Result<(), StoreError> {
        let desc = normalize_description(desc).ok_or(StoreError::EmptyDescription)?;
        {
            let mut state = self.inner.state.borrow_mut();
            let entry = state
                .bookmarks
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            entry.desc = desc;
        }
        self.commit();
        Ok(())
    }

    /// Removes bookmark `id`.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.borrow_mut();
            let before = state.bookmarks.len();
            state.bookmarks.retain(|b| b.id != id);
            if state.bookmarks.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }
        self.commit();
        Ok(())
    }

    /// Registers `callback` for every state change; it receives the full current list.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Bookmark]) + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Signal raised whenever a write is queued.
    pub fn write_signal(&self) -> Rc<Notify> {
        Rc::clone(&self.inner.write_signal)
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.inner.persistence.borrow().queue.is_empty()
    }

    /// Writes every queued list, then notifies subscribers once if anything was written.
    ///
    /// Only the latest queued list per conversation is written. Returns the number of
    /// conversations written.
    pub fn flush_pending(&self) -> usize {
        let written = self.flush_writes();
        if written > 0 {
            self.notify();
        }
        written
    }

    /// Flushes pending writes and drops all subscribers.
    pub fn close(&self) {
        self.flush_writes();
        self.inner.subscribers.clear();
    }

    fn flush_writes(&self) -> usize {
        let mut persistence = self.inner.persistence.borrow_mut();
        if persistence.queue.is_empty() {
            return 0;
        }

        let mut latest: Vec<PendingWrite> = Vec::new();
        for write in persistence.queue.drain(..) {
            match latest.iter_mut().find(|w| w.conversation_id == write.conversation_id) {
                Some(slot) => *slot = write,
                None => latest.push(write),
            }
        }

        let mut written = 0;
        let mut failure = None;
        if let Some(backend) = persistence.backend.as_deref() {
            for write in &latest {
                match storage::write_conversation(
                    backend,
                    &persistence.namespace,
                    &write.conversation_id,
                    &write.bookmarks,
                ) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }
        if let Some(e) = failure {
            persistence.degrade(&e.to_string());
        }
        written
    }

    /// Publishes the mutated list: refresh the snapshot, queue the write, notify.
    fn commit(&self) {
        let (conversation_id, snapshot) = {
            let mut state = self.inner.state.borrow_mut();
            state.snapshot = Rc::from(state.bookmarks.clone());
            (state.conversation_id.clone(), Rc::clone(&state.snapshot))
        };

        {
            let mut persistence = self.inner.persistence.borrow_mut();
            match (&conversation_id, persistence.backend.is_some()) {
                (Some(id), true) => {
                    persistence.queue.push(PendingWrite {
                        conversation_id: id.clone(),
                        bookmarks: Rc::clone(&snapshot),
                    });
                    self.inner.write_signal.notify_one();
                }
                (None, true) => debug!("no conversation loaded, change kept in memory"),
                _ => {}
            }
        }

        self.inner.subscribers.notify(&snapshot);
    }

    fn notify(&self) {
        let snapshot = self.bookmarks();
        self.inner.subscribers.notify(&snapshot);
    }
}

/// Spawns the local task that drains queued writes as they are signalled.
///
/// The task holds only a weak handle and exits after the store is dropped. Must be
/// called from within a `LocalSet`.
pub fn spawn_write_behind(store: &BookmarkStore) -> JoinHandle<()> {
    let signal = store.write_signal();
    let weak = store.downgrade();
    tokio::task::spawn_local(async move {
        loop {
            signal.notified().await;
            match weak.upgrade() {
                Some(store) => {
                    store.flush_pending();
                }
                None => break,
            }
        }
    })
}
