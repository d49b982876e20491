//! Unit tests for the bookmark store: mutations, notifications, conversation
//! partitioning, write-behind persistence and memory-only degradation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use rstest::rstest;
use serde_json::Value;
use tokio::task::LocalSet;

use prompttrail::database::storage::read_conversation;
use prompttrail::database::{MemoryStorage, StorageBackend};
use prompttrail::managers::bookmark_store::{spawn_write_behind, BookmarkStore};
use prompttrail::types::bookmark::Bookmark;
use prompttrail::types::errors::{PersistenceError, StoreError};

const NS: &str = "prompttrail_bookmarks_v2";

fn bookmark(id: &str, message_id: &str, start: usize, end: usize) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        message_id: message_id.to_string(),
        role: None,
        start_abs: start,
        end_abs: end,
        desc: "original label".to_string(),
        preview: "preview".to_string(),
        created_at: 42,
        fingerprint: None,
    }
}

fn persistent_store() -> (BookmarkStore, Rc<MemoryStorage>) {
    let backend = Rc::new(MemoryStorage::new());
    let store = BookmarkStore::new(Some(Box::new(Rc::clone(&backend))), NS);
    (store, backend)
}

/// Backend that can be told to fail and counts every call it receives.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_get: Cell<bool>,
    fail_set: Cell<bool>,
    calls: Cell<usize>,
}

impl StorageBackend for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail_get.get() {
            return Err(PersistenceError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail_set.get() {
            return Err(PersistenceError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }
}

// ─── Loading ───

#[test]
fn test_empty_conversation_loads_empty_list() {
    let (store, _backend) = persistent_store();
    store.load("conv-empty");
    assert!(store.bookmarks().is_empty());
    assert_eq!(store.conversation_id().as_deref(), Some("conv-empty"));
}

#[test]
fn test_load_notifies_with_loaded_list() {
    let (store, backend) = persistent_store();
    prompttrail::database::storage::write_conversation(
        &*backend,
        NS,
        "conv",
        &[bookmark("a", "m1", 0, 4)],
    )
    .unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let _sub = store.subscribe(move |list| s.borrow_mut().push(list.len()));
    store.load("conv");
    assert_eq!(*seen.borrow(), vec![1]);
}

// ─── Add ───

#[test]
fn test_duplicate_anchor_is_rejected_without_change() {
    let (store, _backend) = persistent_store();
    store.load("conv");
    store.add(bookmark("a", "m1", 3, 9)).unwrap();

    let notified = Rc::new(Cell::new(0));
    let n = Rc::clone(&notified);
    let _sub = store.subscribe(move |_| n.set(n.get() + 1));

    let err = store.add(bookmark("b", "m1", 3, 9)).unwrap_err();
    assert_eq!(err, StoreError::DuplicateAnchor("a".to_string()));
    assert_eq!(store.len(), 1);
    assert_eq!(notified.get(), 0);
}

#[test]
fn test_same_offsets_in_other_message_are_distinct() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 3, 9)).unwrap();
    store.add(bookmark("b", "m2", 3, 9)).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn test_duplicate_id_is_rejected() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 0, 2)).unwrap();
    assert_eq!(
        store.add(bookmark("a", "m1", 5, 8)).unwrap_err(),
        StoreError::DuplicateId("a".to_string())
    );
}

#[test]
fn test_insertion_order_is_kept() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("z", "m2", 10, 12)).unwrap();
    store.add(bookmark("a", "m1", 0, 2)).unwrap();
    store.add(bookmark("m", "m1", 5, 8)).unwrap();
    let ids: Vec<String> = store.bookmarks().iter().map(|b| b.id.clone()).collect();
    assert_eq!(ids, ["z", "a", "m"]);
}

// ─── Update ───

#[test]
fn test_update_description_changes_only_desc() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 3, 9)).unwrap();
    let before = store.get("a").unwrap();

    store.update_description("a", "  a   better\tlabel ").unwrap();
    let after = store.get("a").unwrap();

    assert_eq!(after.desc, "a better label");
    assert_eq!(after.id, before.id);
    assert_eq!(after.message_id, before.message_id);
    assert_eq!(after.start_abs, before.start_abs);
    assert_eq!(after.end_abs, before.end_abs);
    assert_eq!(after.created_at, before.created_at);
}

#[test]
fn test_update_description_truncates_to_ten_words() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 0, 1)).unwrap();
    store
        .update_description("a", "one two three four five six seven eight nine ten eleven twelve")
        .unwrap();
    assert_eq!(
        store.get("a").unwrap().desc,
        "one two three four five six seven eight nine ten"
    );
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("\n\t")]
fn test_blank_description_is_rejected(#[case] desc: &str) {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 0, 1)).unwrap();
    assert_eq!(
        store.update_description("a", desc).unwrap_err(),
        StoreError::EmptyDescription
    );
    assert_eq!(store.get("a").unwrap().desc, "original label");
}

#[test]
fn test_update_unknown_id() {
    let store = BookmarkStore::new(None, NS);
    assert_eq!(
        store.update_description("ghost", "x").unwrap_err(),
        StoreError::NotFound("ghost".to_string())
    );
}

// ─── Remove ───

#[test]
fn test_remove_notifies_and_unknown_is_not_found() {
    let store = BookmarkStore::new(None, NS);
    store.add(bookmark("a", "m1", 0, 1)).unwrap();

    let lengths = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&lengths);
    let _sub = store.subscribe(move |list| l.borrow_mut().push(list.len()));

    store.remove("a").unwrap();
    assert_eq!(
        store.remove("a").unwrap_err(),
        StoreError::NotFound("a".to_string())
    );
    assert_eq!(*lengths.borrow(), vec![0]);
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let store = BookmarkStore::new(None, NS);
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    let sub = store.subscribe(move |_| c.set(c.get() + 1));
    store.add(bookmark("a", "m1", 0, 1)).unwrap();
    sub.unsubscribe();
    store.add(bookmark("b", "m1", 1, 2)).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(store.subscriber_count(), 0);
}

// ─── Conversations ───

#[test]
fn test_switching_conversation_discards_memory_but_keeps_storage() {
    let (store, backend) = persistent_store();
    store.load("first");
    store.add(bookmark("a", "m1", 0, 4)).unwrap();

    // Loading flushes the pending write of "first" before reading "second".
    store.load("second");
    assert!(store.is_empty());
    store.add(bookmark("b", "m9", 1, 2)).unwrap();
    store.flush_pending();

    let first = read_conversation(&*backend, NS, "first").unwrap().bookmarks;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, "a");

    store.load("first");
    assert_eq!(store.bookmarks()[0].id, "a");
}

#[test]
fn test_mutations_before_load_stay_in_memory() {
    let (store, backend) = persistent_store();
    store.add(bookmark("a", "m1", 0, 4)).unwrap();
    assert!(!store.has_pending_writes());
    assert_eq!(store.flush_pending(), 0);
    assert!(backend.get(NS).unwrap().is_none());
}

// ─── Degradation ───

#[test]
fn test_failing_read_degrades_to_memory_only() {
    let backend = Rc::new(FlakyStorage::default());
    backend.fail_get.set(true);
    let store = BookmarkStore::new(Some(Box::new(Rc::clone(&backend))), NS);

    store.load("conv");
    assert!(!store.is_persistent());
    assert!(store.is_empty());

    let calls = backend.calls.get();
    store.add(bookmark("a", "m1", 0, 4)).unwrap();
    store.flush_pending();
    store.load("other");
    assert_eq!(backend.calls.get(), calls, "degraded store must not touch the backend");
}

#[test]
fn test_failing_write_keeps_memory_list() {
    let backend = Rc::new(FlakyStorage::default());
    let store = BookmarkStore::new(Some(Box::new(Rc::clone(&backend))), NS);
    store.load("conv");
    backend.fail_set.set(true);

    store.add(bookmark("a", "m1", 0, 4)).unwrap();
    assert_eq!(store.flush_pending(), 0);
    assert!(!store.is_persistent());
    assert_eq!(store.len(), 1);

    store.add(bookmark("b", "m1", 5, 6)).unwrap();
    assert_eq!(store.len(), 2);
    assert!(!store.has_pending_writes());
}

#[test]
fn test_missing_backend_is_memory_only() {
    let store = BookmarkStore::new(None, NS);
    store.load("conv");
    store.add(bookmark("a", "m1", 0, 4)).unwrap();
    store.update_description("a", "renamed").unwrap();
    assert_eq!(store.get("a").unwrap().desc, "renamed");
    assert!(!store.is_persistent());
}

// ─── Write-behind ───

#[tokio::test(flavor = "current_thread")]
async fn test_write_behind_persists_and_confirms() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (store, backend) = persistent_store();
            store.load("conv");
            let driver = spawn_write_behind(&store);

            let notifications = Rc::new(Cell::new(0));
            let n = Rc::clone(&notifications);
            let _sub = store.subscribe(move |_| n.set(n.get() + 1));

            store.add(bookmark("a", "m1", 0, 4)).unwrap();
            store.add(bookmark("b", "m1", 5, 9)).unwrap();
            assert_eq!(notifications.get(), 2);

            tokio::time::sleep(Duration::from_millis(5)).await;

            assert!(!store.has_pending_writes());
            assert_eq!(notifications.get(), 3, "one confirmatory notification for the batch");
            let persisted = read_conversation(&*backend, NS, "conv").unwrap().bookmarks;
            assert_eq!(persisted.len(), 2);

            driver.abort();
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_write_behind_exits_when_store_dropped() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let (store, _backend) = persistent_store();
            let driver = spawn_write_behind(&store);
            drop(store);
            tokio::time::timeout(Duration::from_secs(1), driver)
                .await
                .expect("driver should stop")
                .unwrap();
        })
        .await;
}
