//! End-to-end tests for a session: selection to bookmark to marker, tooltip
//! following the store, conversation switches and the background drivers.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;

use prompttrail::app::{load_settings, open_storage, HostEvent, TrailSession};
use prompttrail::database::{MemoryStorage, StorageBackend};
use prompttrail::dom::{HostDocument, MemoryDocument, NodeId};
use prompttrail::types::anchor::TextRange;
use prompttrail::types::errors::AnchorError;
use prompttrail::types::geometry::{Overflow, Rect, ScrollMetrics};
use prompttrail::types::marker::MarkerPlacement;
use prompttrail::types::settings::{StorageSettings, TrailSettings};

struct Page {
    doc: Rc<RefCell<MemoryDocument>>,
    container: NodeId,
    outer: NodeId,
    message: NodeId,
    composer: NodeId,
}

/// `body > outer > main(scrollable) > message "Hello world"`, plus a composer outside.
fn page() -> Page {
    let mut doc = MemoryDocument::new();
    let body = doc.append_element(doc.root(), "body");
    let outer = doc.append_element(body, "div");
    doc.set_rect(outer, Rect::new(0.0, 0.0, 800.0, 700.0));
    let container = doc.append_element(outer, "main");
    doc.set_overflow_y(container, Overflow::Auto);
    doc.set_scroll_metrics(container, ScrollMetrics::new(0.0, 1000.0, 500.0));
    doc.set_rect(container, Rect::new(100.0, 0.0, 800.0, 500.0));
    let message = doc.append_element(container, "div");
    doc.set_attribute(message, "data-message-id", "m1");
    doc.set_attribute(message, "data-message-author-role", "assistant");
    doc.set_rect(message, Rect::new(350.0, 0.0, 800.0, 100.0));
    let text = doc.append_text(message, "Hello world");
    doc.set_rect(text, Rect::new(390.0, 0.0, 300.0, 20.0));
    let composer = doc.append_element(body, "form");
    doc.append_text(composer, "Send a message");
    Page {
        doc: Rc::new(RefCell::new(doc)),
        container,
        outer,
        message,
        composer,
    }
}

fn range_text(doc: &Rc<RefCell<MemoryDocument>>, range: TextRange) -> String {
    let mut doc = doc.borrow_mut();
    doc.select(range);
    let text = doc.selection().map(|s| s.text).unwrap_or_default();
    doc.clear_selection();
    text
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_selection_prefix_round_trips() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");

            p.doc.borrow_mut().select_offsets(p.message, 0, 5);
            let bookmark = session.bookmark_selection(None).unwrap();
            assert_eq!((bookmark.start_abs, bookmark.end_abs), (0, 5));
            assert_eq!(bookmark.desc, "Hello");

            let range = session.reconstruct_range_for_bookmark(&bookmark.id).unwrap();
            assert_eq!(range_text(&p.doc, range), "Hello");
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_empty_conversation_has_no_markers() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(
                TrailSettings::default(),
                Rc::clone(&p.doc),
                Some(Box::new(MemoryStorage::new())),
            );
            session.enter_conversation("/c/empty-1");
            assert!(session.bookmarks().is_empty());
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert!(session.markers().markers().is_empty());
            assert!(session.compute_markers().is_empty());
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_new_bookmark_gets_marker_after_debounce() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");
            tokio::time::sleep(Duration::from_millis(300)).await;
            let passes = session.markers().pass_count();

            p.doc.borrow_mut().select_offsets(p.message, 6, 11);
            let bookmark = session.bookmark_selection(Some("the world")).unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;

            assert_eq!(session.markers().pass_count(), passes + 1);
            let markers = session.markers().markers();
            assert_eq!(markers.len(), 1);
            assert_eq!(markers[0].bookmark_id, bookmark.id);
            assert_eq!(markers[0].placement, MarkerPlacement::Exact);
            assert!((markers[0].percent - 0.6).abs() < 1e-9);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_deleting_open_tooltip_bookmark_closes_it() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");
            p.doc.borrow_mut().select_offsets(p.message, 6, 11);
            let bookmark = session.bookmark_selection(None).unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(session.markers().markers().len(), 1);

            session.tooltip().open(&bookmark);
            assert!(session.tooltip().is_open());

            session.remove(&bookmark.id).unwrap();
            assert!(!session.tooltip().is_open());

            tokio::time::sleep(Duration::from_millis(300)).await;
            assert!(session.markers().markers().is_empty());
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_tooltip_edit_updates_label_only() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");
            p.doc.borrow_mut().select_offsets(p.message, 0, 11);
            let bookmark = session.bookmark_selection(None).unwrap();

            let tooltip = session.tooltip();
            tooltip.open(&bookmark);
            tooltip.begin_edit();
            session.update_description(&bookmark.id, "changed elsewhere").unwrap();
            assert_eq!(tooltip.view().unwrap().label, "Hello world", "label frozen while editing");

            tooltip.set_draft("  renamed   bookmark ");
            tooltip.save_edit().unwrap();
            assert!(!tooltip.is_open());

            let stored = session.store().get(&bookmark.id).unwrap();
            assert_eq!(stored.desc, "renamed bookmark");
            assert_eq!((stored.start_abs, stored.end_abs), (0, 11));
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_bookmarking_same_selection_twice_is_idempotent() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");
            p.doc.borrow_mut().select_offsets(p.message, 6, 11);
            let first = session.bookmark_selection(None).unwrap();
            let second = session.bookmark_selection(Some("other label")).unwrap();
            assert_eq!(first.id, second.id);
            assert_eq!(session.bookmarks().len(), 1);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_selection_events_drive_tracker() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            p.doc.borrow_mut().select_offsets(p.message, 0, 5);
            session.handle_event(HostEvent::SelectionChanged);
            session.handle_event(HostEvent::PointerUp);
            tokio::time::sleep(Duration::from_millis(200)).await;
            let anchor = session.tracker().current_anchor().unwrap();
            assert_eq!(anchor.selected_text, "Hello");

            p.doc.borrow_mut().select_offsets(p.composer, 0, 4);
            assert_eq!(
                session.resolve_anchor_from_selection(),
                Err(AnchorError::NoEnclosingMessage)
            );
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_navigation_switches_conversation_and_keeps_others() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let backend = Rc::new(MemoryStorage::new());
            let session = TrailSession::new(
                TrailSettings::default(),
                Rc::clone(&p.doc),
                Some(Box::new(Rc::clone(&backend))),
            );
            session.start();
            assert_eq!(session.enter_conversation("/c/first"), "first");
            p.doc.borrow_mut().select_offsets(p.message, 0, 5);
            session.bookmark_selection(None).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(!session.store().has_pending_writes());

            session.handle_event(HostEvent::Navigated("/c/second?model=x".to_string()));
            assert_eq!(session.store().conversation_id().as_deref(), Some("second"));
            assert!(session.bookmarks().is_empty());

            session.handle_event(HostEvent::Navigated("/c/first".to_string()));
            assert_eq!(session.bookmarks().len(), 1);

            let record = backend.get("prompttrail_bookmarks_v2").unwrap().unwrap();
            assert_eq!(record["first"].as_array().unwrap().len(), 1);
            session.dispose();
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_poller_follows_container_swaps() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.start();
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(session.markers().attached_container(), Some(p.container));

            {
                let mut doc = p.doc.borrow_mut();
                doc.set_overflow_y(p.container, Overflow::Visible);
                doc.set_overflow_y(p.outer, Overflow::Scroll);
                doc.set_scroll_metrics(p.outer, ScrollMetrics::new(0.0, 2400.0, 700.0));
            }
            tokio::time::sleep(Duration::from_millis(900)).await;
            assert_eq!(session.markers().attached_container(), Some(p.outer));
            assert_eq!(session.locate_scroll_container(), p.outer);

            session.dispose();
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_mutations_outside_transcript_are_ignored() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.poll_scroll_container();
            tokio::time::sleep(Duration::from_millis(300)).await;
            let passes = session.markers().pass_count();

            session.handle_event(HostEvent::Mutation(p.composer));
            assert!(!session.markers().is_pending());

            session.handle_event(HostEvent::Mutation(p.message));
            session.handle_event(HostEvent::Resize);
            session.handle_event(HostEvent::Scroll(p.container));
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(session.markers().pass_count(), passes + 1);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_mutation_in_swapped_container_renders_before_next_poll() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.poll_scroll_container();
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(session.markers().attached_container(), Some(p.container));
            let passes = session.markers().pass_count();

            let banner = {
                let mut doc = p.doc.borrow_mut();
                doc.set_overflow_y(p.container, Overflow::Visible);
                doc.set_overflow_y(p.outer, Overflow::Scroll);
                doc.set_scroll_metrics(p.outer, ScrollMetrics::new(0.0, 2400.0, 700.0));
                doc.append_element(p.outer, "div")
            };
            session.handle_event(HostEvent::Mutation(banner));
            assert!(session.markers().is_pending());
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(session.markers().pass_count(), passes + 1);
        })
        .await;
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_reveal_and_ordering() {
    LocalSet::new()
        .run_until(async {
            let p = page();
            let session = TrailSession::new(TrailSettings::default(), Rc::clone(&p.doc), None);
            session.enter_conversation("/c/abc");
            p.doc.borrow_mut().select_offsets(p.message, 6, 11);
            let b = session.bookmark_selection(None).unwrap();

            let plan = session.reveal_bookmark(&b.id).unwrap();
            assert_eq!(plan.container, p.container);
            assert!((plan.target_scroll_top - 50.0).abs() < 1e-9);
            assert_eq!(session.ordered_bookmarks()[0].id, b.id);

            assert_eq!(
                session.reveal_bookmark("nope"),
                Err(AnchorError::UnknownBookmark("nope".to_string()))
            );
        })
        .await;
}

#[test]
fn test_disabled_storage_opens_nothing() {
    let settings = StorageSettings {
        enabled: false,
        ..StorageSettings::default()
    };
    assert!(open_storage(&settings).unwrap().is_none());
}

#[test]
fn test_configured_database_path_is_used() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("trail.db");
    let settings = StorageSettings {
        database_path: Some(path.to_string_lossy().to_string()),
        ..StorageSettings::default()
    };
    let backend = open_storage(&settings).unwrap().unwrap();
    backend.set("k", serde_json::json!(1)).unwrap();
    assert!(path.exists());
}

#[test]
fn test_load_settings_reads_file_and_falls_back_on_garbage() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("settings.json");
    std::fs::write(&path, r#"{"timing": {"render_debounce_ms": 40}}"#).unwrap();
    let settings = load_settings(Some(path.to_string_lossy().to_string()));
    assert_eq!(settings.timing.render_debounce_ms, 40);
    assert_eq!(settings.storage, StorageSettings::default());

    std::fs::write(&path, "not json").unwrap();
    assert_eq!(
        load_settings(Some(path.to_string_lossy().to_string())),
        TrailSettings::default()
    );
}
